//! Binding named input values to a program's declared parameters.

use std::collections::HashMap;

use crate::codec;
use crate::error::{BindError, ConversionError, ValidationError};
use crate::parser::{parse_program, Parameter};
use crate::types::{TypeAnnotation, Value};

/// One resolved parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArgument {
    pub name: String,
    pub value: Value,
    pub declared_type: TypeAnnotation,
}

/// Bound arguments in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgumentList(Vec<BoundArgument>);

impl BoundArgumentList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoundArgument> {
        self.0.iter()
    }

    /// Look up a bound argument by parameter name.
    pub fn get(&self, name: &str) -> Option<&BoundArgument> {
        self.0.iter().find(|a| a.name == name)
    }

    /// Encode every value as JSON-Cadence, in declaration order, ready to be
    /// attached to a transaction or script as positional arguments.
    pub fn encode(&self) -> Result<Vec<Vec<u8>>, ConversionError> {
        self.0
            .iter()
            .map(|a| codec::encode_to_vec(&a.value, Some(&a.declared_type)))
            .collect()
    }

    pub fn into_inner(self) -> Vec<BoundArgument> {
        self.0
    }
}

impl<'a> IntoIterator for &'a BoundArgumentList {
    type Item = &'a BoundArgument;
    type IntoIter = std::slice::Iter<'a, BoundArgument>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Match `inputs` against `parameters`.
///
/// Fails with every missing parameter name first; only when nothing is
/// missing are unmatched input keys reported.
pub fn bind_arguments(
    parameters: &[Parameter],
    inputs: &HashMap<String, Value>,
) -> Result<BoundArgumentList, ValidationError> {
    let missing: Vec<String> = parameters
        .iter()
        .filter(|p| !inputs.contains_key(&p.name))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingArguments { names: missing });
    }

    let mut redundant: Vec<String> = inputs
        .keys()
        .filter(|key| !parameters.iter().any(|p| &p.name == *key))
        .cloned()
        .collect();
    if !redundant.is_empty() {
        redundant.sort();
        return Err(ValidationError::RedundantArguments { names: redundant });
    }

    let bound = parameters
        .iter()
        .filter_map(|p| {
            inputs.get(&p.name).map(|value| BoundArgument {
                name: p.name.clone(),
                value: value.clone(),
                declared_type: p.type_annotation.clone(),
            })
        })
        .collect();
    Ok(BoundArgumentList(bound))
}

/// Parse `code` and bind `inputs` against its parameter list.
pub fn bind_source(
    code: &[u8],
    inputs: &HashMap<String, Value>,
) -> Result<BoundArgumentList, BindError> {
    let program = parse_program(code)?;
    let bound = bind_arguments(program.parameter_list(), inputs)?;
    tracing::trace!(arguments = bound.len(), "bound interaction arguments");
    Ok(bound)
}

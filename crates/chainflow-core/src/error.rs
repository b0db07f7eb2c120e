//! Error types for argument binding, parsing, and transaction normalization.

use thiserror::Error;

/// Mismatch between the declared parameters of an interaction and the
/// supplied named arguments. Every offending name is reported at once.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the interaction is missing [{}]", .names.join(", "))]
    MissingArguments { names: Vec<String> },

    #[error("the interaction has the following extra arguments [{}]", .names.join(", "))]
    RedundantArguments { names: Vec<String> },
}

impl ValidationError {
    /// The names that triggered this error.
    pub fn names(&self) -> &[String] {
        match self {
            Self::MissingArguments { names } | Self::RedundantArguments { names } => names,
        }
    }
}

/// Malformed source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {line}:{column}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            column,
            reason: reason.into(),
        }
    }
}

/// Errors converting between JSON-Cadence payloads and host values.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("field '{field}' of {event} is not numeric: got {found}")]
    NonNumericField {
        event: String,
        field: String,
        found: String,
    },

    #[error("invalid JSON-Cadence payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed JSON-Cadence value: {reason}")]
    Malformed { reason: String },

    #[error("unsupported value type: {type_name}")]
    UnsupportedType { type_name: String },

    #[error("invalid {type_name} value: {reason}")]
    InvalidValue { type_name: String, reason: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("argument index {index} out of range ({count} arguments)")]
    ArgumentIndex { index: usize, count: usize },
}

/// Errors that abort normalization of a single transaction.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("none of the {count} transaction arguments could be decoded")]
    Arguments { count: usize },
}

/// Errors from parsing source and binding arguments in one step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_list_every_name() {
        let missing = ValidationError::MissingArguments {
            names: vec!["name".into(), "age".into()],
        };
        assert_eq!(missing.to_string(), "the interaction is missing [name, age]");

        let extra = ValidationError::RedundantArguments {
            names: vec!["something".into()],
        };
        assert_eq!(
            extra.to_string(),
            "the interaction has the following extra arguments [something]"
        );
        assert_eq!(extra.names(), ["something".to_string()]);
    }

    #[test]
    fn parse_error_display() {
        let e = ParseError::new(3, 7, "unterminated string literal");
        assert_eq!(e.to_string(), "parse error at 3:7: unterminated string literal");
    }
}

//! Host-side value model.
//!
//! Cadence values arrive as JSON-Cadence documents. ChainFlow converts them
//! into a single tagged [`Value`] type so argument binding, event decoding,
//! and fee extraction can match on variants exhaustively instead of probing
//! untyped maps.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ConversionError;

// ─── Address ──────────────────────────────────────────────────────────────────

/// An 8-byte account address.
///
/// Always rendered in canonical form: `0x` followed by 16 lowercase hex digits.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; Address::LENGTH]);

impl Address {
    pub const LENGTH: usize = 8;

    pub const fn new(bytes: [u8; Address::LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Address::LENGTH] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex address, with or without `0x`. Short addresses are
    /// left-padded with zeros (`0x1` == `0x0000000000000001`).
    pub fn from_hex(s: &str) -> Result<Self, ConversionError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.is_empty() || digits.len() > Self::LENGTH * 2 {
            return Err(ConversionError::InvalidAddress(s.to_string()));
        }
        let padded = format!("{:0>width$}", digits, width = Self::LENGTH * 2);
        let mut bytes = [0u8; Self::LENGTH];
        hex::decode_to_slice(&padded, &mut bytes)
            .map_err(|_| ConversionError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ─── TypeAnnotation ───────────────────────────────────────────────────────────

/// A declared parameter type, kept as normalized source text
/// (e.g. `"String"`, `"UFix64?"`, `"[Address]"`, `"{String: UInt64}"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeAnnotation(String);

impl TypeAnnotation {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_optional(&self) -> bool {
        self.0.ends_with('?')
    }

    /// The type with one level of optionality removed.
    pub fn inner(&self) -> TypeAnnotation {
        TypeAnnotation(self.0.strip_suffix('?').unwrap_or(&self.0).trim().to_string())
    }

    /// Element type of a variable or constant-sized array type.
    pub fn array_element(&self) -> Option<TypeAnnotation> {
        let body = self.0.strip_prefix('[')?.strip_suffix(']')?;
        if split_top_level(body, ':').is_some() {
            return None;
        }
        // `[T; N]` is a constant-sized array.
        let elem = match split_top_level(body, ';') {
            Some((elem, _)) => elem,
            None => body,
        };
        Some(TypeAnnotation(elem.trim().to_string()))
    }

    /// Key and value types of a dictionary type.
    pub fn dictionary_types(&self) -> Option<(TypeAnnotation, TypeAnnotation)> {
        let body = self.0.strip_prefix('{')?.strip_suffix('}')?;
        let (key, value) = split_top_level(body, ':')?;
        Some((
            TypeAnnotation(key.trim().to_string()),
            TypeAnnotation(value.trim().to_string()),
        ))
    }
}

impl fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split `s` at the first `sep` that is not nested inside brackets.
fn split_top_level(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '{' | '(' | '<' => depth += 1,
            ']' | '}' | ')' | '>' => depth -= 1,
            c if c == sep && depth == 0 => return Some((&s[..i], &s[i + c.len_utf8()..])),
            _ => {}
        }
    }
    None
}

// ─── Value ────────────────────────────────────────────────────────────────────

/// A struct, resource, event, contract, or enum value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    /// JSON-Cadence kind: `"Struct"`, `"Resource"`, `"Event"`, `"Contract"`, `"Enum"`.
    pub kind: String,
    /// Fully qualified type id, e.g. `A.f919ee77447b7497.FlowFees.FeesDeducted`.
    pub id: String,
    /// Field values in declaration order.
    pub fields: IndexMap<String, Value>,
}

/// A decoded Cadence value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Void,
    /// Absent optional, after optional unwrapping.
    Null,
    Bool(bool),
    Int(i128),
    UInt(u128),
    /// Integers outside the 128-bit range, as a decimal string.
    BigInt(String),
    /// `Fix64` / `UFix64`.
    Fix(f64),
    Str(String),
    Character(String),
    Address(Address),
    Path { domain: String, identifier: String },
    Type(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Optional(Option<Box<Value>>),
    Dictionary(Vec<(Value, Value)>),
    Composite(Composite),
}

impl Value {
    /// Returns `true` for `Null` and empty optionals.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Optional(None))
    }

    /// Strip any number of optional wrappers.
    pub fn unwrap_optional(&self) -> &Value {
        match self {
            Value::Optional(Some(inner)) => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Numeric view used for fee and effort fields. Strings are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self.unwrap_optional() {
            Value::Fix(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::BigInt(v) => v.parse().ok(),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self.unwrap_optional() {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.unwrap_optional() {
            Value::Str(s) | Value::Character(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Look up a composite field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self.unwrap_optional() {
            Value::Composite(c) => c.fields.get(name),
            _ => None,
        }
    }

    /// Short variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::BigInt(_) => "bigint",
            Value::Fix(_) => "fix",
            Value::Str(_) => "string",
            Value::Character(_) => "character",
            Value::Address(_) => "address",
            Value::Path { .. } => "path",
            Value::Type(_) => "type",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Optional(_) => "optional",
            Value::Dictionary(_) => "dictionary",
            Value::Composite(_) => "composite",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v as i128)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v as u128)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Fix(v)
    }
}

impl From<Address> for Value {
    fn from(a: Address) -> Self {
        Value::Address(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        Value::Optional(v.map(|inner| Box::new(inner.into())))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "()"),
            Value::Null => write!(f, "nil"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Fix(v) => write!(f, "{v:.8}"),
            Value::Str(s) | Value::Character(s) => write!(f, "{s:?}"),
            Value::Address(a) => write!(f, "{a}"),
            Value::Path { domain, identifier } => write!(f, "/{domain}/{identifier}"),
            Value::Type(t) => write!(f, "Type<{t}>()"),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Value::Array(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Optional(Some(v)) => write!(f, "{v}"),
            Value::Optional(None) => write!(f, "nil"),
            Value::Dictionary(pairs) => {
                let parts: Vec<_> = pairs.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Composite(c) => {
                let parts: Vec<_> = c.fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{}({})", c.id, parts.join(", "))
            }
        }
    }
}

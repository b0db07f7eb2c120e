//! JSON-Cadence data interchange format ↔ [`Value`].
//!
//! Transaction arguments and event payloads are JSON documents of the form
//! `{"type": "<Type>", "value": ...}`. Decoding maps them onto the canonical
//! host value model; encoding goes the other way, guided by the declared
//! parameter type when one is known.

use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};

use crate::config::ConversionOptions;
use crate::error::ConversionError;
use crate::types::{Address, Composite, TypeAnnotation, Value};

const SIGNED_INTEGERS: &[&str] = &[
    "Int", "Int8", "Int16", "Int32", "Int64", "Int128", "Int256",
];

const UNSIGNED_INTEGERS: &[&str] = &[
    "UInt", "UInt8", "UInt16", "UInt32", "UInt64", "UInt128", "UInt256", "Word8", "Word16",
    "Word32", "Word64", "Word128", "Word256",
];

const COMPOSITES: &[&str] = &["Struct", "Resource", "Event", "Contract", "Enum"];

fn is_fixed_point(type_name: &str) -> bool {
    matches!(type_name, "Fix64" | "UFix64")
}

// ─── Decoding ─────────────────────────────────────────────────────────────────

/// Decode one JSON-Cadence encoded payload.
pub fn decode(payload: &[u8], options: &ConversionOptions) -> Result<Value, ConversionError> {
    let json: Json = serde_json::from_slice(payload)?;
    decode_json(&json, options)
}

/// Decode an already-parsed JSON-Cadence document.
pub fn decode_json(json: &Json, options: &ConversionOptions) -> Result<Value, ConversionError> {
    let obj = json.as_object().ok_or_else(|| malformed("expected an object"))?;
    let type_name = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| malformed("missing \"type\""))?;
    let value = obj.get("value").unwrap_or(&Json::Null);

    match type_name {
        "Void" => Ok(Value::Void),
        "Optional" => {
            if value.is_null() {
                return Ok(if options.unwrap_optionals {
                    Value::Null
                } else {
                    Value::Optional(None)
                });
            }
            let inner = decode_json(value, options)?;
            Ok(if options.unwrap_optionals {
                inner
            } else {
                Value::Optional(Some(Box::new(inner)))
            })
        }
        "Bool" => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(type_name, "expected a boolean")),
        "String" => Ok(Value::Str(expect_str(type_name, value)?.to_string())),
        "Character" => Ok(Value::Character(expect_str(type_name, value)?.to_string())),
        "Address" => Ok(Value::Address(Address::from_hex(expect_str(type_name, value)?)?)),
        t if SIGNED_INTEGERS.contains(&t) || UNSIGNED_INTEGERS.contains(&t) => {
            parse_integer(t, expect_str(t, value)?)
        }
        t if is_fixed_point(t) => parse_fixed(t, expect_str(t, value)?),
        "Array" => decode_array(value, options),
        "Dictionary" => {
            let entries = value
                .as_array()
                .ok_or_else(|| invalid(type_name, "expected an array of entries"))?;
            let pairs = entries
                .iter()
                .map(|entry| {
                    let key = entry.get("key").ok_or_else(|| malformed("entry without key"))?;
                    let val = entry.get("value").ok_or_else(|| malformed("entry without value"))?;
                    Ok((decode_json(key, options)?, decode_json(val, options)?))
                })
                .collect::<Result<Vec<_>, ConversionError>>()?;
            Ok(Value::Dictionary(pairs))
        }
        "Path" => {
            let domain = value.get("domain").and_then(Json::as_str);
            let identifier = value.get("identifier").and_then(Json::as_str);
            match (domain, identifier) {
                (Some(d), Some(i)) => Ok(Value::Path {
                    domain: d.to_string(),
                    identifier: i.to_string(),
                }),
                _ => Err(invalid(type_name, "expected domain and identifier")),
            }
        }
        "Type" => {
            let static_type = value.get("staticType").unwrap_or(&Json::Null);
            let id = match static_type {
                Json::String(s) => s.clone(),
                Json::Object(o) => o
                    .get("typeID")
                    .or_else(|| o.get("kind"))
                    .and_then(Json::as_str)
                    .unwrap_or_default()
                    .to_string(),
                _ => String::new(),
            };
            Ok(Value::Type(id))
        }
        t if COMPOSITES.contains(&t) => decode_composite(t, value, options),
        other => Err(ConversionError::UnsupportedType {
            type_name: other.to_string(),
        }),
    }
}

fn decode_array(value: &Json, options: &ConversionOptions) -> Result<Value, ConversionError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid("Array", "expected an array"))?;

    let all_bytes = !items.is_empty()
        && items
            .iter()
            .all(|i| i.get("type").and_then(Json::as_str) == Some("UInt8"));

    if options.collapse_byte_arrays && all_bytes {
        let bytes = items
            .iter()
            .map(|i| {
                let raw = expect_str("UInt8", i.get("value").unwrap_or(&Json::Null))?;
                raw.parse::<u8>().map_err(|e| invalid("UInt8", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::Bytes(bytes));
    }

    let values = items
        .iter()
        .map(|i| decode_json(i, options))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(values))
}

fn decode_composite(
    kind: &str,
    value: &Json,
    options: &ConversionOptions,
) -> Result<Value, ConversionError> {
    let id = value
        .get("id")
        .and_then(Json::as_str)
        .ok_or_else(|| invalid(kind, "missing id"))?;
    let raw_fields = value
        .get("fields")
        .and_then(Json::as_array)
        .ok_or_else(|| invalid(kind, "missing fields"))?;

    let mut fields = IndexMap::with_capacity(raw_fields.len());
    for field in raw_fields {
        let name = field
            .get("name")
            .and_then(Json::as_str)
            .ok_or_else(|| invalid(kind, "field without name"))?;
        let val = field
            .get("value")
            .ok_or_else(|| invalid(kind, "field without value"))?;
        fields.insert(name.to_string(), decode_json(val, options)?);
    }

    Ok(Value::Composite(Composite {
        kind: kind.to_string(),
        id: id.to_string(),
        fields,
    }))
}

fn parse_integer(type_name: &str, raw: &str) -> Result<Value, ConversionError> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(type_name, format!("not an integer: {raw:?}")));
    }
    if raw.starts_with('-') && !SIGNED_INTEGERS.contains(&type_name) {
        return Err(invalid(type_name, "negative value for unsigned type"));
    }
    if SIGNED_INTEGERS.contains(&type_name) {
        Ok(raw
            .parse::<i128>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::BigInt(raw.to_string())))
    } else {
        Ok(raw
            .parse::<u128>()
            .map(Value::UInt)
            .unwrap_or_else(|_| Value::BigInt(raw.to_string())))
    }
}

fn parse_fixed(type_name: &str, raw: &str) -> Result<Value, ConversionError> {
    if type_name == "UFix64" && raw.starts_with('-') {
        return Err(invalid(type_name, "negative value for unsigned type"));
    }
    raw.parse::<f64>()
        .map(Value::Fix)
        .map_err(|e| invalid(type_name, format!("{raw:?}: {e}")))
}

// ─── Encoding ─────────────────────────────────────────────────────────────────

/// Encode `value` as a JSON-Cadence document.
///
/// When `declared` is given it decides the concrete Cadence type, so a plain
/// string bound to an `Address` parameter becomes an address and an integer
/// bound to `UInt64` keeps that width.
pub fn encode(value: &Value, declared: Option<&TypeAnnotation>) -> Result<Json, ConversionError> {
    if let Some(ty) = declared.filter(|t| t.is_optional()) {
        let inner_ty = ty.inner();
        return match value {
            Value::Null | Value::Optional(None) => Ok(json!({"type": "Optional", "value": null})),
            Value::Optional(Some(inner)) => Ok(json!({
                "type": "Optional",
                "value": encode(inner, Some(&inner_ty))?,
            })),
            other => Ok(json!({
                "type": "Optional",
                "value": encode(other, Some(&inner_ty))?,
            })),
        };
    }

    let declared_name = declared.map(TypeAnnotation::as_str);

    match value {
        Value::Void => Ok(json!({"type": "Void"})),
        Value::Null | Value::Optional(None) => Ok(json!({"type": "Optional", "value": null})),
        Value::Optional(Some(inner)) => Ok(json!({
            "type": "Optional",
            "value": encode(inner, None)?,
        })),
        Value::Bool(b) => Ok(json!({"type": "Bool", "value": b})),
        Value::Str(s) => encode_string(s, declared_name),
        Value::Character(c) => Ok(json!({"type": "Character", "value": c})),
        Value::Address(a) => Ok(json!({"type": "Address", "value": a.to_string()})),
        Value::Int(i) => encode_number(&i.to_string(), declared_name, "Int"),
        Value::UInt(u) => encode_number(&u.to_string(), declared_name, "UInt"),
        Value::BigInt(s) => {
            let fallback = if s.starts_with('-') { "Int" } else { "UInt" };
            encode_number(s, declared_name, fallback)
        }
        Value::Fix(f) => {
            let type_name = match declared_name {
                Some(t) if is_fixed_point(t) => t,
                _ if *f < 0.0 => "Fix64",
                _ => "UFix64",
            };
            Ok(json!({"type": type_name, "value": format!("{f:.8}")}))
        }
        Value::Path { domain, identifier } => Ok(json!({
            "type": "Path",
            "value": {"domain": domain, "identifier": identifier},
        })),
        Value::Type(id) => Ok(json!({"type": "Type", "value": {"staticType": id}})),
        Value::Bytes(bytes) => {
            let items: Vec<Json> = bytes
                .iter()
                .map(|b| json!({"type": "UInt8", "value": b.to_string()}))
                .collect();
            Ok(json!({"type": "Array", "value": items}))
        }
        Value::Array(items) => {
            let elem = declared.and_then(TypeAnnotation::array_element);
            let encoded = items
                .iter()
                .map(|i| encode(i, elem.as_ref()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({"type": "Array", "value": encoded}))
        }
        Value::Dictionary(pairs) => {
            let types = declared.and_then(TypeAnnotation::dictionary_types);
            let (key_ty, val_ty) = match &types {
                Some((k, v)) => (Some(k), Some(v)),
                None => (None, None),
            };
            let encoded = pairs
                .iter()
                .map(|(k, v)| Ok(json!({"key": encode(k, key_ty)?, "value": encode(v, val_ty)?})))
                .collect::<Result<Vec<_>, ConversionError>>()?;
            Ok(json!({"type": "Dictionary", "value": encoded}))
        }
        Value::Composite(c) => {
            let fields = c
                .fields
                .iter()
                .map(|(name, v)| Ok(json!({"name": name, "value": encode(v, None)?})))
                .collect::<Result<Vec<_>, ConversionError>>()?;
            let mut body = Map::new();
            body.insert("id".into(), Json::String(c.id.clone()));
            body.insert("fields".into(), Json::Array(fields));
            Ok(json!({"type": c.kind, "value": body}))
        }
    }
}

/// Encode `value` straight to JSON-Cadence bytes.
pub fn encode_to_vec(
    value: &Value,
    declared: Option<&TypeAnnotation>,
) -> Result<Vec<u8>, ConversionError> {
    Ok(serde_json::to_vec(&encode(value, declared)?)?)
}

fn encode_string(s: &str, declared: Option<&str>) -> Result<Json, ConversionError> {
    match declared {
        Some("Address") => Ok(json!({"type": "Address", "value": Address::from_hex(s)?.to_string()})),
        Some("Character") => Ok(json!({"type": "Character", "value": s})),
        Some(t) if is_fixed_point(t) => {
            let parsed = s
                .parse::<f64>()
                .map_err(|e| invalid(t, format!("{s:?}: {e}")))?;
            Ok(json!({"type": t, "value": format!("{parsed:.8}")}))
        }
        Some(t) if SIGNED_INTEGERS.contains(&t) || UNSIGNED_INTEGERS.contains(&t) => {
            parse_integer(t, s)?;
            Ok(json!({"type": t, "value": s}))
        }
        _ => Ok(json!({"type": "String", "value": s})),
    }
}

fn encode_number(digits: &str, declared: Option<&str>, fallback: &str) -> Result<Json, ConversionError> {
    match declared {
        Some(t) if is_fixed_point(t) => {
            let parsed = digits
                .parse::<f64>()
                .map_err(|e| invalid(t, e.to_string()))?;
            Ok(json!({"type": t, "value": format!("{parsed:.8}")}))
        }
        Some(t) if SIGNED_INTEGERS.contains(&t) || UNSIGNED_INTEGERS.contains(&t) => {
            parse_integer(t, digits)?;
            Ok(json!({"type": t, "value": digits}))
        }
        _ => Ok(json!({"type": fallback, "value": digits})),
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn expect_str<'a>(type_name: &str, value: &'a Json) -> Result<&'a str, ConversionError> {
    value
        .as_str()
        .ok_or_else(|| invalid(type_name, "expected a string"))
}

fn malformed(reason: &str) -> ConversionError {
    ConversionError::Malformed {
        reason: reason.to_string(),
    }
}

fn invalid(type_name: &str, reason: impl Into<String>) -> ConversionError {
    ConversionError::InvalidValue {
        type_name: type_name.to_string(),
        reason: reason.into(),
    }
}

//! JSON fallback encoding.
//!
//! Commands may arrive as JSON bodies, and responses are serialized as JSON
//! when the caller's `Accept` header asks for it. The conversions here map
//! between the MessagePack value tree and `serde_json::Value`; binary data
//! becomes an array of byte numbers in JSON, and extension values have no
//! JSON representation.

use rmpv::Value;

use crate::CodecError;

/// Encodes a value as a JSON string.
///
/// # Errors
///
/// Returns an error for values with no JSON representation (extension
/// payloads, non-string map keys).
pub fn json_encode(value: &Value) -> Result<String, CodecError> {
    let json = value_to_json(value)?;
    Ok(serde_json::to_string(&json)?)
}

/// Parses a JSON string into a value.
///
/// # Errors
///
/// Returns an error on malformed JSON.
pub fn json_parse(input: &str) -> Result<Value, CodecError> {
    let json: serde_json::Value = serde_json::from_str(input)?;
    Ok(json_to_value(json))
}

/// Converts a JSON value into the MessagePack value tree.
#[must_use]
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::from(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::F64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::from(k.as_str()), json_to_value(v)))
                .collect(),
        ),
    }
}

/// Converts a MessagePack value into a JSON value.
///
/// # Errors
///
/// Returns an error for extension values and for maps with non-string keys.
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, CodecError> {
    Ok(match value {
        Value::Nil => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                return Err(CodecError::Unrepresentable("integer out of range"));
            }
        }
        Value::F32(f) => serde_json::Value::from(f64::from(*f)),
        Value::F64(f) => serde_json::Value::from(*f),
        Value::String(s) => {
            let s = s
                .as_str()
                .ok_or(CodecError::Unrepresentable("non-UTF-8 string"))?;
            serde_json::Value::String(s.to_owned())
        }
        Value::Binary(bytes) => {
            serde_json::Value::Array(bytes.iter().map(|b| serde_json::Value::from(*b)).collect())
        }
        Value::Array(items) => {
            let items = items.iter().map(value_to_json).collect::<Result<_, _>>()?;
            serde_json::Value::Array(items)
        }
        Value::Map(entries) => {
            let mut object = serde_json::Map::new();
            for (key, value) in entries {
                let key = key
                    .as_str()
                    .ok_or(CodecError::Unrepresentable("non-string map key"))?;
                object.insert(key.to_owned(), value_to_json(value)?);
            }
            serde_json::Value::Object(object)
        }
        Value::Ext(..) => return Err(CodecError::Unrepresentable("extension value")),
    })
}

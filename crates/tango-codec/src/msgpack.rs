//! Symmetric MessagePack pack/unpack.
//!
//! Value-level [`pack`]/[`unpack`] operate on the dynamic [`rmpv::Value`]
//! tree the dispatcher and transport speak; [`pack_as`]/[`unpack_as`] are
//! the serde-generic counterparts for typed callers.

use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::CodecError;

/// Packs a value into MessagePack bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be encoded (extension payloads the
/// writer rejects).
pub fn pack(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value)
        .map_err(|e| CodecError::MsgpackEncode(e.to_string()))?;
    Ok(buf)
}

/// Unpacks MessagePack bytes into a value.
///
/// # Errors
///
/// Returns an error on malformed or truncated input.
pub fn unpack(bytes: &[u8]) -> Result<Value, CodecError> {
    let mut cursor = bytes;
    rmpv::decode::read_value(&mut cursor).map_err(|e| CodecError::MsgpackDecode(e.to_string()))
}

/// Packs any serializable type into MessagePack bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn pack_as<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    rmp_serde::to_vec_named(value).map_err(|e| CodecError::MsgpackEncode(e.to_string()))
}

/// Unpacks MessagePack bytes into any deserializable type.
///
/// # Errors
///
/// Returns an error on malformed input or a shape mismatch.
pub fn unpack_as<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    rmp_serde::from_slice(bytes).map_err(|e| CodecError::MsgpackDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trip() {
        let value = Value::Map(vec![
            (Value::from("id"), Value::from(1)),
            (Value::from("name"), Value::from("a")),
            (
                Value::from("tags"),
                Value::Array(vec![Value::from("x"), Value::Nil, Value::from(2.5)]),
            ),
            (Value::from("raw"), Value::Binary(vec![0, 255, 128])),
        ]);

        let bytes = pack(&value).unwrap();
        assert_eq!(unpack(&bytes).unwrap(), value);
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        assert!(unpack(&[0xc1]).is_err());
        assert!(unpack(&[]).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
        struct Profile {
            id: u32,
            name: String,
        }

        let profile = Profile {
            id: 7,
            name: "a".into(),
        };
        let bytes = pack_as(&profile).unwrap();
        assert_eq!(unpack_as::<Profile>(&bytes).unwrap(), profile);
    }

    #[test]
    fn test_named_struct_unpacks_as_map() {
        #[derive(serde::Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let bytes = pack_as(&Point { x: 1, y: 2 }).unwrap();
        let value = unpack(&bytes).unwrap();
        let Value::Map(entries) = value else {
            panic!("expected map encoding");
        };
        assert_eq!(entries[0].0, Value::from("x"));
        assert_eq!(entries[1].1, Value::from(2));
    }
}

//! Per-rpc-type argument parsing.
//!
//! `get` reads plain string pairs from the query string; `query` unpacks
//! the base64url-wrapped MessagePack `args` parameter; `command` switches
//! on the body's content type (multipart, JSON, MessagePack).

use bytes::Bytes;
use mime::Mime;

use tango_codec::{base64url_decode, json_parse, unpack};
use tango_core::{value::args_from_value, ArgValue, Args, TangoError, Value};

use crate::multipart::parse_multipart;

/// Parses plain query-string pairs for a `get` endpoint.
///
/// Every value stays a string; no type coercion. A repeated key takes the
/// last value, matching what the client's query building produces.
///
/// # Errors
///
/// Returns a bad-request error for a malformed query string.
pub fn parse_get_args(query: Option<&str>) -> Result<Args, TangoError> {
    let Some(query) = query else {
        return Ok(Args::new());
    };
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| TangoError::bad_request(format!("Invalid query string: {e}")))?;

    let mut args = Args::new();
    for (key, value) in pairs {
        args.insert(key, ArgValue::Value(Value::from(value.as_str())));
    }
    Ok(args)
}

/// Parses the `args` query parameter for a `query` endpoint.
///
/// Absent parameter means empty args; present means
/// `unpack(base64url_decode(value))`, which must yield a map.
///
/// # Errors
///
/// Returns a bad-request error on malformed base64url, malformed
/// MessagePack, or a non-map payload.
pub fn parse_query_args(query: Option<&str>) -> Result<Args, TangoError> {
    let Some(query) = query else {
        return Ok(Args::new());
    };
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| TangoError::bad_request(format!("Invalid query string: {e}")))?;
    let Some((_, encoded)) = pairs.iter().rev().find(|(key, _)| key == "args") else {
        return Ok(Args::new());
    };

    let bytes = base64url_decode(encoded)
        .map_err(|_| TangoError::bad_request("Invalid args parameter"))?;
    let value = unpack(&bytes).map_err(|_| TangoError::bad_request("Invalid MessagePack body"))?;
    into_args(value)
}

/// Parses a `command` body, dispatching on the content type.
///
/// # Errors
///
/// Returns `UnsupportedMediaType` for an unrecognised, malformed, or
/// absent content type and a bad-request error for a malformed body.
pub async fn parse_command_args(
    content_type: Option<&str>,
    body: Bytes,
) -> Result<Args, TangoError> {
    let Some(content_type) = content_type else {
        return Err(TangoError::UnsupportedMediaType { content_type: None });
    };
    let Ok(media_type) = content_type.parse::<Mime>() else {
        return Err(TangoError::UnsupportedMediaType {
            content_type: Some(content_type.to_owned()),
        });
    };

    if media_type.type_() == mime::MULTIPART && media_type.subtype() == mime::FORM_DATA {
        // multer re-reads the boundary parameter from the raw header.
        parse_multipart(content_type, body).await
    } else if media_type.type_() == mime::APPLICATION && media_type.subtype() == mime::JSON {
        let text = std::str::from_utf8(&body)
            .map_err(|_| TangoError::bad_request("Invalid JSON body"))?;
        if text.is_empty() {
            return Ok(Args::new());
        }
        let value = json_parse(text).map_err(|_| TangoError::bad_request("Invalid JSON body"))?;
        into_args(value)
    } else if media_type.type_() == mime::APPLICATION && media_type.subtype() == "msgpack" {
        if body.is_empty() {
            return Ok(Args::new());
        }
        let value =
            unpack(&body).map_err(|_| TangoError::bad_request("Invalid MessagePack body"))?;
        into_args(value)
    } else {
        Err(TangoError::UnsupportedMediaType {
            content_type: Some(content_type.to_owned()),
        })
    }
}

/// Converts an unpacked payload into args, rejecting non-map shapes.
pub(crate) fn into_args(value: Value) -> Result<Args, TangoError> {
    let type_name = value_type_name(&value);
    args_from_value(value)
        .ok_or_else(|| TangoError::bad_request(format!("Unsupported args type: {type_name}")))
}

pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::F32(_) | Value::F64(_) => "float",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(..) => "ext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tango_codec::{base64url_encode, pack};

    #[test]
    fn test_get_args_are_plain_strings() {
        let args = parse_get_args(Some("id=42&name=a%20b")).unwrap();
        assert_eq!(args.get("id").unwrap().as_value(), Some(&Value::from("42")));
        assert_eq!(args.get("name").unwrap().as_value(), Some(&Value::from("a b")));
    }

    #[test]
    fn test_get_args_repeated_key_last_wins() {
        let args = parse_get_args(Some("id=1&id=2&id=3")).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("id").unwrap().as_value(), Some(&Value::from("3")));
    }

    #[test]
    fn test_get_args_absent_query() {
        assert!(parse_get_args(None).unwrap().is_empty());
    }

    #[test]
    fn test_query_args_round_trip() {
        let payload = Value::Map(vec![(Value::from("page"), Value::from(2))]);
        let encoded = base64url_encode(&pack(&payload).unwrap());
        let query = format!("args={encoded}");

        let args = parse_query_args(Some(&query)).unwrap();
        assert_eq!(args.get("page").unwrap().as_value(), Some(&Value::from(2)));
    }

    #[test]
    fn test_query_args_absent_parameter_is_empty() {
        assert!(parse_query_args(Some("other=1")).unwrap().is_empty());
        assert!(parse_query_args(None).unwrap().is_empty());
    }

    #[test]
    fn test_query_args_bad_base64() {
        let err = parse_query_args(Some("args=%21%21")).unwrap_err();
        assert!(matches!(err, TangoError::BadRequest(_)));
    }

    #[test]
    fn test_query_args_non_map_payload() {
        let encoded = base64url_encode(&pack(&Value::from(5)).unwrap());
        let query = format!("args={encoded}");
        match parse_query_args(Some(&query)) {
            Err(TangoError::BadRequest(message)) => {
                assert_eq!(message, "Unsupported args type: integer");
            }
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_command_msgpack_body() {
        let payload = Value::Map(vec![(Value::from("title"), Value::from("Hi"))]);
        let body = Bytes::from(pack(&payload).unwrap());

        let args = parse_command_args(Some("application/msgpack"), body).await.unwrap();
        assert_eq!(args.get("title").unwrap().as_value(), Some(&Value::from("Hi")));
    }

    #[tokio::test]
    async fn test_command_empty_bodies_are_empty_args() {
        let args = parse_command_args(Some("application/msgpack"), Bytes::new()).await.unwrap();
        assert!(args.is_empty());
        let args = parse_command_args(Some("application/json"), Bytes::new()).await.unwrap();
        assert!(args.is_empty());
    }

    #[tokio::test]
    async fn test_command_json_body() {
        let body = Bytes::from_static(br#"{"title":"Hi","count":2}"#);
        let args = parse_command_args(Some("application/json; charset=utf-8"), body)
            .await
            .unwrap();
        assert_eq!(args.get("count").unwrap().as_value(), Some(&Value::from(2)));
    }

    #[tokio::test]
    async fn test_command_malformed_bodies() {
        let err = parse_command_args(Some("application/json"), Bytes::from_static(b"{nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, TangoError::BadRequest(m) if m == "Invalid JSON body"));

        let err = parse_command_args(Some("application/msgpack"), Bytes::from_static(&[0xc1]))
            .await
            .unwrap_err();
        assert!(matches!(err, TangoError::BadRequest(m) if m == "Invalid MessagePack body"));
    }

    #[tokio::test]
    async fn test_command_unknown_content_type() {
        let err = parse_command_args(Some("text/plain"), Bytes::new()).await.unwrap_err();
        assert!(matches!(err, TangoError::UnsupportedMediaType { .. }));

        let err = parse_command_args(None, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, TangoError::UnsupportedMediaType { content_type: None }));
    }
}

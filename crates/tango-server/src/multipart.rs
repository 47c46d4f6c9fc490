//! Multipart command-body parsing.
//!
//! Form entries split into the special `args` field and everything else.
//! The `args` blob (JSON or MessagePack, per its part content type) seeds
//! the base args; remaining entries augment them: a `name[]` key collects
//! every value for that key under `name` as an ordered sequence, any other
//! key takes its first occurrence, and file parts are kept as
//! [`FileUpload`] values.

use bytes::Bytes;
use futures_util::stream;
use mime::Mime;

use tango_codec::{json_parse, unpack};
use tango_core::{ArgValue, Args, FileUpload, TangoError, Value};

use crate::args::into_args;

/// One non-`args` form entry, in arrival order.
enum Entry {
    Text(String),
    File(FileUpload),
}

/// Parses a `multipart/form-data` command body into args.
///
/// # Errors
///
/// Returns a bad-request error for a missing boundary, a malformed body,
/// or an `args` blob that is neither JSON nor MessagePack.
pub async fn parse_multipart(content_type: &str, body: Bytes) -> Result<Args, TangoError> {
    let boundary = multer::parse_boundary(content_type)
        .map_err(|_| TangoError::bad_request("missing or invalid multipart boundary"))?;

    let body_stream = stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    let mut base = Args::new();
    let mut entries: Vec<(String, Entry)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TangoError::bad_request(format!("multipart parse error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(ToOwned::to_owned);
        let content_type = field.content_type().cloned();

        if name == "args" {
            let data = field
                .bytes()
                .await
                .map_err(|e| TangoError::bad_request(format!("multipart parse error: {e}")))?;
            base = parse_args_blob(content_type.as_ref(), &data)?;
        } else if let Some(file_name) = file_name {
            let data = field
                .bytes()
                .await
                .map_err(|e| TangoError::bad_request(format!("multipart parse error: {e}")))?;
            let content_type = content_type.map(|media_type| media_type.to_string());
            entries.push((name, Entry::File(FileUpload::new(file_name, content_type, data))));
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| TangoError::bad_request(format!("multipart parse error: {e}")))?;
            entries.push((name, Entry::Text(text)));
        }
    }

    fold_entries(&mut base, entries);
    Ok(base)
}

/// Decodes the `args` blob by its MIME subtype.
fn parse_args_blob(content_type: Option<&Mime>, data: &[u8]) -> Result<Args, TangoError> {
    let Some(media_type) = content_type else {
        return Err(TangoError::bad_request("Unsupported args type: none"));
    };

    let value = if media_type.type_() == mime::APPLICATION && media_type.subtype() == mime::JSON {
        let text = std::str::from_utf8(data)
            .map_err(|_| TangoError::bad_request("Invalid JSON in args blob"))?;
        json_parse(text).map_err(|_| TangoError::bad_request("Invalid JSON in args blob"))?
    } else if media_type.type_() == mime::APPLICATION && media_type.subtype() == "msgpack" {
        unpack(data).map_err(|_| TangoError::bad_request("Invalid MessagePack in args blob"))?
    } else {
        return Err(TangoError::bad_request(format!(
            "Unsupported args type: {media_type}"
        )));
    };

    into_args(value)
}

/// Augments the base args with the non-`args` entries.
fn fold_entries(base: &mut Args, entries: Vec<(String, Entry)>) {
    let mut scalar_seen: Vec<String> = Vec::new();
    let mut collected: Vec<String> = Vec::new();

    for (name, entry) in entries {
        if let Some(key) = name.strip_suffix("[]") {
            let key = key.to_owned();
            if !collected.contains(&key) {
                collected.push(key.clone());
                base.insert(key.clone(), ArgValue::Files(Vec::new()));
            }
            append_collected(base, &key, entry);
        } else if !scalar_seen.contains(&name) {
            scalar_seen.push(name.clone());
            let value = match entry {
                Entry::Text(text) => ArgValue::Value(Value::from(text.as_str())),
                Entry::File(file) => ArgValue::File(file),
            };
            base.insert(name, value);
        }
    }
}

/// Appends one value to a `name[]` collection, keeping file lists
/// homogeneous: a text value in a collected key demotes the whole entry to
/// a plain value array.
fn append_collected(base: &mut Args, key: &str, entry: Entry) {
    let current = base.shift_remove(key);
    let next = match (current, entry) {
        (Some(ArgValue::Files(mut files)), Entry::File(file)) => {
            files.push(file);
            ArgValue::Files(files)
        }
        (Some(ArgValue::Files(files)), Entry::Text(text)) => {
            let mut items: Vec<Value> =
                files.into_iter().map(|f| Value::Binary(f.data.to_vec())).collect();
            items.push(Value::from(text.as_str()));
            ArgValue::Value(Value::Array(items))
        }
        (Some(ArgValue::Value(Value::Array(mut items))), entry) => {
            items.push(match entry {
                Entry::Text(text) => Value::from(text.as_str()),
                Entry::File(file) => Value::Binary(file.data.to_vec()),
            });
            ArgValue::Value(Value::Array(items))
        }
        (_, Entry::File(file)) => ArgValue::Files(vec![file]),
        (_, Entry::Text(text)) => ArgValue::Value(Value::Array(vec![Value::from(text.as_str())])),
    };
    base.insert(key.to_owned(), next);
}

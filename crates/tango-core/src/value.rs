//! The dynamic argument model.
//!
//! Arguments cross the wire as MessagePack, so the natural in-memory form is
//! the MessagePack value tree ([`Value`]). An argument entry may additionally
//! be a file payload (or a list of them) on its way into or out of a
//! multipart request; [`ArgValue`] captures those three shapes.
//!
//! A list is an upload only when every element is a file. That rule is
//! enforced here by construction: [`ArgValue::Files`] is homogeneous, and a
//! plain [`Value::Array`] can never contain a [`FileUpload`], so it always
//! stays in args.

use bytes::Bytes;
use indexmap::IndexMap;

/// The dynamic value type arguments and results are expressed in.
///
/// Maps preserve insertion order, which keeps argument order stable across
/// a pack/unpack round trip.
pub type Value = rmpv::Value;

/// An insertion-ordered map from argument name to [`ArgValue`].
pub type Args = IndexMap<String, ArgValue>;

/// One argument entry: a plain value, a file, or a list of files.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A MessagePack-representable value.
    Value(Value),
    /// A single file payload, sent as its own multipart part.
    File(FileUpload),
    /// A list of file payloads, sent as repeated `name[]` parts.
    Files(Vec<FileUpload>),
}

impl ArgValue {
    /// Returns the inner value if this entry is a plain value.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if this entry is a file or a list of files.
    #[must_use]
    pub fn is_upload(&self) -> bool {
        matches!(self, Self::File(_) | Self::Files(_))
    }

    /// Converts this entry into a plain [`Value`].
    ///
    /// File payloads degrade to their raw bytes, which is what a file ends
    /// up as when it is packed into a MessagePack body instead of being
    /// split out into a multipart part.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(v) => v,
            Self::File(f) => Value::Binary(f.data.to_vec()),
            Self::Files(fs) => {
                Value::Array(fs.into_iter().map(|f| Value::Binary(f.data.to_vec())).collect())
            }
        }
    }
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<FileUpload> for ArgValue {
    fn from(f: FileUpload) -> Self {
        Self::File(f)
    }
}

impl From<Vec<FileUpload>> for ArgValue {
    fn from(fs: Vec<FileUpload>) -> Self {
        Self::Files(fs)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        Self::Value(Value::from(s.as_str()))
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        Self::Value(Value::from(b))
    }
}

/// Materializes args as a MessagePack map, in insertion order.
///
/// Upload entries degrade to raw bytes, see [`ArgValue::into_value`].
#[must_use]
pub fn args_to_value(args: Args) -> Value {
    Value::Map(
        args.into_iter()
            .map(|(k, v)| (Value::from(k.as_str()), v.into_value()))
            .collect(),
    )
}

/// Builds args from a MessagePack map value.
///
/// Returns `None` if the value is not a map or a key is not a string.
#[must_use]
pub fn args_from_value(value: Value) -> Option<Args> {
    let Value::Map(entries) = value else {
        return None;
    };
    let mut args = Args::new();
    for (key, value) in entries {
        let key = key.as_str()?.to_owned();
        args.insert(key, ArgValue::Value(value));
    }
    Some(args)
}

/// A file payload travelling through a multipart request.
///
/// On the client this is what gets split out of args into its own form
/// part; on the server it is what a file part parses into, kept as-is in
/// args for the implementation to consume.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    /// The original file name, preserved across the wire.
    pub file_name: String,
    /// The MIME type of the file, if known.
    pub content_type: Option<String>,
    /// The file content.
    pub data: Bytes,
}

impl FileUpload {
    /// Creates a new file payload.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            data: data.into(),
        }
    }

    /// Returns the file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the MIME type, if known.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the file extension, if the name carries one.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.file_name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_round_trip_preserves_order() {
        let mut args = Args::new();
        args.insert("zulu".into(), ArgValue::from("z"));
        args.insert("alpha".into(), ArgValue::from(1i64));
        args.insert("mike".into(), ArgValue::from(true));

        let value = args_to_value(args);
        let restored = args_from_value(value).unwrap();
        let keys: Vec<&str> = restored.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zulu", "alpha", "mike"]);
    }

    #[test]
    fn test_args_from_non_map_is_none() {
        assert!(args_from_value(Value::from(42)).is_none());
        assert!(args_from_value(Value::Array(vec![])).is_none());
    }

    #[test]
    fn test_file_degrades_to_binary() {
        let file = FileUpload::new("a.bin", None, &b"abc"[..]);
        let value = ArgValue::File(file).into_value();
        assert_eq!(value, Value::Binary(b"abc".to_vec()));
    }

    #[test]
    fn test_upload_detection() {
        assert!(ArgValue::File(FileUpload::new("a", None, &b""[..])).is_upload());
        assert!(ArgValue::Files(vec![]).is_upload());
        assert!(!ArgValue::Value(Value::Array(vec![Value::from(1)])).is_upload());
    }

    #[test]
    fn test_file_extension() {
        let file = FileUpload::new("report.final.pdf", None, &b""[..]);
        assert_eq!(file.extension(), Some("pdf"));
        let bare = FileUpload::new("README", None, &b""[..]);
        assert_eq!(bare.extension(), None);
    }
}

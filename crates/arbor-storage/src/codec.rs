//! Encoding of the document tree to and from bytes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::tree;

/// On-disk format of the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFormat {
    /// JSON (`serde_json`).
    #[default]
    Json,
    /// YAML (`serde_yaml`).
    Yaml,
}

impl StorageFormat {
    /// Build the codec for this format.
    #[must_use]
    pub fn codec(self, pretty: bool) -> Arc<dyn Codec> {
        match self {
            Self::Json => Arc::new(JsonCodec::new(pretty)),
            Self::Yaml => Arc::new(YamlCodec),
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
        }
    }
}

impl FromStr for StorageFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(StoreError::UnsupportedFormat(s.to_owned())),
        }
    }
}

/// Converts the tree to bytes and back.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Encode `value`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the value cannot be encoded.
    fn encode(&self, value: &Value) -> StoreResult<Vec<u8>>;

    /// Decode `bytes`. Empty input decodes to an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the bytes are malformed.
    fn decode(&self, bytes: &[u8]) -> StoreResult<Value>;

    /// Format this codec writes.
    fn format(&self) -> StorageFormat;
}

/// JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Create a JSON codec; `pretty` indents the output.
    #[must_use]
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> StoreResult<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded.map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Value> {
        if is_blank(bytes) {
            return Ok(tree::empty());
        }
        serde_json::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn format(&self) -> StorageFormat {
        StorageFormat::Json
    }
}

/// YAML codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn encode(&self, value: &Value) -> StoreResult<Vec<u8>> {
        serde_yaml::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| StoreError::Codec(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Value> {
        if is_blank(bytes) {
            return Ok(tree::empty());
        }
        match serde_yaml::from_slice::<Value>(bytes) {
            Ok(Value::Null) => Ok(tree::empty()),
            Ok(value) => Ok(value),
            Err(e) => Err(StoreError::Codec(e.to_string())),
        }
    }

    fn format(&self) -> StorageFormat {
        StorageFormat::Yaml
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("json".parse::<StorageFormat>().unwrap(), StorageFormat::Json);
        assert_eq!("YAML".parse::<StorageFormat>().unwrap(), StorageFormat::Yaml);
        assert!(matches!(
            "xml".parse::<StorageFormat>(),
            Err(StoreError::UnsupportedFormat(f)) if f == "xml"
        ));
    }

    #[test]
    fn test_json_pretty_output() {
        let value = json!({"a": {"b": 1}});
        let compact = JsonCodec::new(false).encode(&value).unwrap();
        let pretty = JsonCodec::new(true).encode(&value).unwrap();
        assert!(!compact.contains(&b'\n'));
        assert!(pretty.contains(&b'\n'));
        assert_eq!(JsonCodec::new(true).decode(&pretty).unwrap(), value);
    }

    #[test]
    fn test_yaml_keeps_key_order() {
        let value = json!({"z": 1, "a": [true, null, "s"]});
        let codec = YamlCodec;
        let bytes = codec.encode(&value).unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, value);
        let keys: Vec<&String> = decoded.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn test_blank_input_is_empty_tree() {
        assert_eq!(JsonCodec::default().decode(b"  \n").unwrap(), json!({}));
        assert_eq!(YamlCodec.decode(b"").unwrap(), json!({}));
        assert_eq!(YamlCodec.decode(b"~\n").unwrap(), json!({}));
    }

    #[test]
    fn test_malformed_input() {
        let err = JsonCodec::default().decode(b"{not json").unwrap_err();
        assert!(err.is_io_failure());
        assert!(YamlCodec.decode(b"a: [unclosed").is_err());
    }
}

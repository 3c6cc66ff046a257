//! Named byte payloads exchanged with file storage and the mailer.

use serde::{Deserialize, Serialize};

/// A file in memory: bytes, file name, and size.
///
/// `size` always equals `buffer.len()`; construct through [`NamedBuffer::new`].
/// In JSON the bytes are a base64 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedBuffer {
    /// File contents
    #[serde(with = "base64_bytes")]
    pub buffer: Vec<u8>,
    /// File name including extension
    pub name: String,
    /// Byte length of `buffer`
    pub size: usize,
}

impl NamedBuffer {
    /// Wrap bytes under a file name
    pub fn new(name: impl Into<String>, buffer: Vec<u8>) -> Self {
        let size = buffer.len();
        NamedBuffer {
            buffer,
            name: name.into(),
            size,
        }
    }

    /// Copy named `"{prefix}_{name}"`, the convention for uploaded request files
    pub fn with_prefix(&self, prefix: &str) -> Self {
        NamedBuffer {
            buffer: self.buffer.clone(),
            name: format!("{}_{}", prefix, self.name),
            size: self.size,
        }
    }

    /// Lower-cased file extension, if any
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_tracks_buffer() {
        let file = NamedBuffer::new("Plan.PDF", b"%PDF-1.7".to_vec());
        assert_eq!(file.size, 8);
        assert_eq!(file.extension().as_deref(), Some("pdf"));
    }

    #[test]
    fn test_prefix() {
        let file = NamedBuffer::new("grundriss.pdf", vec![1, 2, 3]);
        let prefixed = file.with_prefix("1042");
        assert_eq!(prefixed.name, "1042_grundriss.pdf");
        assert_eq!(prefixed.buffer, file.buffer);
    }

    #[test]
    fn test_json_keeps_bytes() {
        let file = NamedBuffer::new("Plan.pdf", b"%PDF-1.7".to_vec());
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["buffer"], "JVBERi0xLjc=");

        let back: NamedBuffer = serde_json::from_value(json).unwrap();
        assert_eq!(back, file);
        assert_eq!(back.buffer.len(), back.size);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let json = serde_json::json!({"buffer": "not base64!", "name": "a.pdf", "size": 3});
        assert!(serde_json::from_value::<NamedBuffer>(json).is_err());
    }
}

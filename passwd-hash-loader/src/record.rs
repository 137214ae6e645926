use std::sync::Arc;

use passwd_digest::digest;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::config::{DigestField, TEXT_FIELD};

/// One password line together with its configured digests.
///
/// Serializes as a flat document: `txt` followed by one field per digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub text: String,
    pub digests: Vec<(Arc<str>, String)>,
}

impl HashRecord {
    /// Hashes the UTF-8 bytes of `text` with every configured algorithm.
    pub fn compute(text: String, fields: &[DigestField]) -> Self {
        let digests = fields
            .iter()
            .map(|f| (Arc::clone(&f.field), digest(text.as_bytes(), f.algorithm).hex))
            .collect();

        Self { text, digests }
    }

    /// Hex digest stored under `field`, if configured.
    pub fn digest(&self, field: &str) -> Option<&str> {
        self.digests
            .iter()
            .find(|(name, _)| &**name == field)
            .map(|(_, hex)| hex.as_str())
    }
}

impl Serialize for HashRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.digests.len() + 1))?;
        map.serialize_entry(TEXT_FIELD, &self.text)?;
        for (field, hex) in &self.digests {
            map.serialize_entry(&**field, hex)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use passwd_digest::Algorithm;

    use super::*;

    #[test]
    fn test_compute_all_fields() {
        let fields = [
            DigestField::new(Algorithm::Md5),
            DigestField::with_field(Algorithm::Sha256, "sha256_hex"),
        ];
        let record = HashRecord::compute("abc".to_string(), &fields);

        assert_eq!(record.text, "abc");
        assert_eq!(record.digest("MD5"), Some("900150983cd24fb0d6963f7d28e17f72"));
        assert_eq!(
            record.digest("sha256_hex"),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(record.digest("SHA256"), None);
    }

    #[test]
    fn test_serializes_flat_document() {
        let fields = [DigestField::new(Algorithm::Sha256)];
        let record = HashRecord::compute(String::new(), &fields);

        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(
            doc,
            serde_json::json!({
                "txt": "",
                "SHA256": "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
            })
        );
    }
}

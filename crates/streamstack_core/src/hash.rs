//! Template digests.
//!
//! BLAKE3 over the rendered template text. Identical declarations render
//! identical text, so the digest pins a build.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 digest of a rendered template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest([u8; blake3::OUT_LEN]);

impl Digest {
    /// Digest of `data`
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(blake3::hash(data).into())
    }

    /// Lowercase hex form
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse the hex form, as printed by the CLI
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDigest`] on bad hex or a wrong length
    pub fn from_hex(text: &str) -> CoreResult<Self> {
        let mut out = [0u8; blake3::OUT_LEN];
        hex::decode_to_slice(text.trim(), &mut out).map_err(|e| CoreError::InvalidDigest {
            reason: e.to_string(),
        })?;
        Ok(Self(out))
    }

    /// Whether `data` hashes to this digest
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Digest {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::from_hex(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_text_same_digest() {
        let a = Digest::compute(b"{\"Resources\":{}}");
        assert_eq!(a, Digest::compute(b"{\"Resources\":{}}"));
        assert_ne!(a, Digest::compute(b"{\"Resources\":{ }}"));
    }

    #[test]
    fn test_hex_form() {
        let d = Digest::compute(b"template");
        let text = d.to_string();
        assert_eq!(text.len(), 64);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(Digest::from_hex(&text).unwrap(), d);
        assert_eq!(Digest::from_hex(&format!("{}\n", text)).unwrap(), d);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(matches!(
            Digest::from_hex("abcd"),
            Err(CoreError::InvalidDigest { .. })
        ));
        assert!(matches!(
            Digest::from_hex(&"zz".repeat(32)),
            Err(CoreError::InvalidDigest { .. })
        ));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let d = Digest::compute(b"x");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_verify() {
        let d = Digest::compute(b"data");
        assert!(d.verify(b"data"));
        assert!(!d.verify(b"data "));
    }
}

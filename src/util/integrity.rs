//! Content integrity: SHA-256 digests in subresource-integrity form.
//!
//! Lockfile entries and cache lookups both use the string
//! `sha256-<standard-base64>`. Cache filenames use the hex form so the
//! cache directory is self-describing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A verified-content identifier: `sha256-<base64(digest)>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Integrity {
    digest: [u8; 32],
}

/// Failure to parse or verify an integrity value.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("malformed integrity string `{0}`")]
    Malformed(String),

    #[error("integrity mismatch: expected {expected}, computed {actual}")]
    Mismatch { expected: String, actual: String },
}

impl Integrity {
    /// Compute the integrity of a byte buffer.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Integrity {
            digest: hasher.finalize().into(),
        }
    }

    /// Build an integrity value from a lowercase-hex SHA-256 checksum,
    /// as returned by the registry version endpoint.
    pub fn from_hex_checksum(checksum: &str) -> Result<Self, IntegrityError> {
        let bytes =
            hex::decode(checksum).map_err(|_| IntegrityError::Malformed(checksum.to_string()))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IntegrityError::Malformed(checksum.to_string()))?;
        Ok(Integrity { digest })
    }

    /// Parse the `sha256-<base64>` form used in lockfiles.
    pub fn parse(s: &str) -> Result<Self, IntegrityError> {
        let encoded = s
            .strip_prefix("sha256-")
            .ok_or_else(|| IntegrityError::Malformed(s.to_string()))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|_| IntegrityError::Malformed(s.to_string()))?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IntegrityError::Malformed(s.to_string()))?;
        Ok(Integrity { digest })
    }

    /// The lockfile form: `sha256-<base64>`.
    pub fn to_string_form(&self) -> String {
        format!("sha256-{}", BASE64.encode(self.digest))
    }

    /// The cache filename: `sha256-<hex>.tgz`.
    pub fn cache_filename(&self) -> String {
        format!("sha256-{}.tgz", hex::encode(self.digest))
    }

    /// Verify bytes against this integrity. Byte-exact.
    pub fn verify(&self, data: &[u8]) -> Result<(), IntegrityError> {
        let actual = Integrity::from_bytes(data);
        if actual == *self {
            Ok(())
        } else {
            Err(IntegrityError::Mismatch {
                expected: self.to_string_form(),
                actual: actual.to_string_form(),
            })
        }
    }
}

impl std::fmt::Display for Integrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_form())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_form_roundtrip() {
        let integrity = Integrity::from_bytes(b"hello");
        let parsed = Integrity::parse(&integrity.to_string_form()).unwrap();
        assert_eq!(integrity, parsed);
    }

    #[test]
    fn test_hex_checksum_matches_bytes() {
        // sha256("hello")
        let hex = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        let from_hex = Integrity::from_hex_checksum(hex).unwrap();
        let from_bytes = Integrity::from_bytes(b"hello");
        assert_eq!(from_hex, from_bytes);
        assert_eq!(from_hex.cache_filename(), format!("sha256-{hex}.tgz"));
    }

    #[test]
    fn test_verify_mismatch() {
        let integrity = Integrity::from_bytes(b"hello");
        assert!(integrity.verify(b"hello").is_ok());
        let err = integrity.verify(b"goodbye").unwrap_err();
        assert!(matches!(err, IntegrityError::Mismatch { .. }));
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(Integrity::parse("md5-abcd").is_err());
        assert!(Integrity::parse("sha256-!!!").is_err());
        assert!(Integrity::from_hex_checksum("zz").is_err());
        assert!(Integrity::from_hex_checksum("abcd").is_err());
    }
}

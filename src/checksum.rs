//! Fingerprints over canonical schema text

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 fingerprint of a schema's canonical string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from canonical schema text
    pub fn of_canonical(canonical: &str) -> Self {
        Self::from_bytes(canonical.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that canonical text matches this checksum
    pub fn verify(&self, canonical: &str) -> bool {
        Self::of_canonical(canonical) == *self
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let canonical = r#"{"name":"test","type":"record","fields":[]}"#;
        assert_eq!(Checksum::of_canonical(canonical), Checksum::of_canonical(canonical));
    }

    #[test]
    fn test_checksum_verification() {
        let canonical = "message A { int32 a = 1; }";
        let checksum = Checksum::of_canonical(canonical);
        assert!(checksum.verify(canonical));
        assert!(!checksum.verify("message A { int32 b = 1; }"));
        assert_eq!(checksum.as_str().len(), 64);
    }
}

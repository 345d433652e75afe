//! Content-addressed digests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{StrataError, StrataResult};

/// A content-addressable digest (e.g., `sha256:abc123...`).
///
/// Only `sha256` is accepted, and the hex part must be exactly 64
/// lowercase hex characters. Other algorithms such as `sha512` are not
/// supported: parsing them, including blob references read from a layout,
/// fails with [`StrataError::InvalidDigest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: String,
    hex: String,
}

impl Digest {
    /// The only supported algorithm.
    pub const SHA256: &'static str = "sha256";

    const SHA256_HEX_LEN: usize = 64;

    /// Parse and validate a digest string.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::InvalidDigest`] if the format is invalid.
    pub fn parse(value: &str) -> StrataResult<Self> {
        let invalid = || StrataError::InvalidDigest {
            value: value.to_string(),
        };
        let (algorithm, hex) = value.split_once(':').ok_or_else(invalid)?;
        if algorithm != Self::SHA256 || hex.len() != Self::SHA256_HEX_LEN {
            return Err(invalid());
        }
        if !hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(invalid());
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }

    /// Compute the SHA-256 digest of some bytes.
    #[must_use]
    pub fn sha256_of(data: &[u8]) -> Self {
        Self {
            algorithm: Self::SHA256.to_string(),
            hex: hex::encode(Sha256::digest(data)),
        }
    }

    /// The algorithm part, e.g. `sha256`.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The hex-encoded hash part.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Returns a short version of the hash (first 12 characters).
    #[must_use]
    pub fn short(&self) -> &str {
        &self.hex[..12]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = StrataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn digest_of_bytes() {
        let digest = Digest::sha256_of(b"hello world");
        assert_eq!(digest.to_string(), HELLO);
        assert_eq!(digest.algorithm(), "sha256");
        assert_eq!(digest.short(), "b94d27b9934d");
    }

    #[test]
    fn digest_parsing() {
        let digest: Digest = HELLO.parse().unwrap();
        assert_eq!(digest, Digest::sha256_of(b"hello world"));
    }

    #[test]
    fn invalid_digests() {
        assert!(Digest::parse("").is_err());
        assert!(Digest::parse("sha256").is_err());
        assert!(Digest::parse("sha256:abc123").is_err());
        assert!(Digest::parse("md5:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9").is_err());
        assert!(matches!(
            Digest::parse(&format!("sha512:{}", "a".repeat(128))),
            Err(StrataError::InvalidDigest { .. })
        ));
        assert!(Digest::parse("sha256:B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9").is_err());
    }

    #[test]
    fn digest_serde_as_string() {
        let digest = Digest::sha256_of(b"hello world");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{HELLO}\""));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
        assert!(serde_json::from_str::<Digest>("\"sha256:nope\"").is_err());
    }
}

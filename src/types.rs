//! Core value types: digests and hash algorithms.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::str::FromStr;

/// Lowercase hex fingerprint of a file or directory
///
/// Used for change detection only, never for security.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Wrap raw hash output
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Digest(hex::encode(bytes))
    }

    /// Parse a hex string, normalizing it to lowercase
    pub fn from_hex(value: &str) -> Result<Self, hex::FromHexError> {
        let lower = value.to_ascii_lowercase();
        hex::decode(&lower)?;
        Ok(Digest(lower))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes behind the hex form
    pub fn to_bytes(&self) -> Vec<u8> {
        // The hex form is validated on construction.
        hex::decode(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Digest {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Digest::from_hex(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

/// Hash algorithm used to fingerprint content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// Configuration identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Hash a complete buffer with a fresh hasher
    pub fn digest_bytes(&self, data: &[u8]) -> Digest {
        match self {
            HashAlgorithm::Md5 => Digest::from_bytes(&md5::compute(data).0),
            HashAlgorithm::Sha256 => Digest::from_bytes(&Sha256::digest(data)),
            HashAlgorithm::Blake3 => Digest::from_bytes(blake3::hash(data).as_bytes()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "blake3" => Ok(HashAlgorithm::Blake3),
            other => Err(format!(
                "Unknown hash algorithm: {} (expected md5, sha256 or blake3)",
                other
            )),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(algorithm: HashAlgorithm) -> Self {
        algorithm.as_str().to_string()
    }
}

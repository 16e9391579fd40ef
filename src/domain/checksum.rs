//! Salted SHA-256 checksums used in both directions of the gateway protocol.
//!
//! Outbound requests carry `sha256(base64(payload) + endpoint + salt_key)`;
//! callbacks carry `sha256(response + salt_key)`. Both are rendered as
//! `<hex digest>###<salt index>` in the `X-VERIFY` header.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

use crate::error::{RegistrationError, Result};

pub const CHECKSUM_SEPARATOR: &str = "###";

/// Name of the header carrying the checksum in both directions.
pub const VERIFY_HEADER: &str = "X-VERIFY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChecksum {
    digest: String,
    salt_index: u32,
}

impl PaymentChecksum {
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn salt_index(&self) -> u32 {
        self.salt_index
    }
}

impl fmt::Display for PaymentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.digest, CHECKSUM_SEPARATOR, self.salt_index)
    }
}

impl FromStr for PaymentChecksum {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        let (digest, index) = s
            .trim()
            .split_once(CHECKSUM_SEPARATOR)
            .ok_or(RegistrationError::ChecksumMismatchError)?;
        let salt_index = index
            .parse()
            .map_err(|_| RegistrationError::ChecksumMismatchError)?;
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RegistrationError::ChecksumMismatchError);
        }
        Ok(Self {
            digest: digest.to_ascii_lowercase(),
            salt_index,
        })
    }
}

/// Holds the merchant salt and produces/validates checksums with it.
#[derive(Clone)]
pub struct ChecksumSigner {
    salt_key: String,
    salt_index: u32,
}

impl fmt::Debug for ChecksumSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumSigner")
            .field("salt_key", &"<redacted>")
            .field("salt_index", &self.salt_index)
            .finish()
    }
}

impl ChecksumSigner {
    pub fn new(salt_key: impl Into<String>, salt_index: u32) -> Self {
        Self {
            salt_key: salt_key.into(),
            salt_index,
        }
    }

    /// Serializes `payload` to JSON and base64-encodes it.
    ///
    /// Struct fields serialize in declaration order and `serde_json::Value`
    /// objects in sorted key order, so equal payloads always encode equally.
    pub fn encode_payload<T: Serialize>(payload: &T) -> Result<String> {
        let json = serde_json::to_vec(payload).map_err(|e| {
            RegistrationError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;
        Ok(STANDARD.encode(json))
    }

    /// Checksum over an already encoded body followed by `endpoint`.
    pub fn sign_encoded(&self, encoded: &str, endpoint: &str) -> PaymentChecksum {
        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        hasher.update(endpoint.as_bytes());
        hasher.update(self.salt_key.as_bytes());
        PaymentChecksum {
            digest: hex::encode(hasher.finalize()),
            salt_index: self.salt_index,
        }
    }

    /// Encodes `payload` and signs it for `endpoint`, returning both the
    /// request body value and the header checksum.
    pub fn sign<T: Serialize>(&self, payload: &T, endpoint: &str) -> Result<(String, PaymentChecksum)> {
        let encoded = Self::encode_payload(payload)?;
        let checksum = self.sign_encoded(&encoded, endpoint);
        Ok((encoded, checksum))
    }

    /// Checksum for a bodiless request such as the status query.
    pub fn sign_path(&self, endpoint: &str) -> PaymentChecksum {
        self.sign_encoded("", endpoint)
    }

    /// Checks the `X-VERIFY` header of a callback against its raw base64 body.
    pub fn verify_callback(&self, response: &str, supplied: &str) -> bool {
        let expected = self.sign_encoded(response, "").to_string();
        constant_time_compare(&expected, supplied.trim())
    }
}

/// Length-independent constant-time comparison.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

use blake2::Blake2b;
use blake2::digest::consts::U32;
use derive_more::{Display, Into};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// One-way hash used to content-address signing requests.
///
/// The digest is always computed over the exact JSON text that is sent to the
/// relay, so implementations must be deterministic over their input bytes.
pub trait RequestHasher: Send + Sync {
    /// Returns the lowercase hex digest of `canonical_json`.
    fn digest_hex(&self, canonical_json: &str) -> String;
}

impl<F> RequestHasher for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn digest_hex(&self, canonical_json: &str) -> String {
        self(canonical_json)
    }
}

/// Default hasher: SHA3-256 over the UTF-8 bytes of the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha3_256Hasher;

impl RequestHasher for Sha3_256Hasher {
    fn digest_hex(&self, canonical_json: &str) -> String {
        hex::encode(Sha3_256::digest(canonical_json.as_bytes()))
    }
}

/// BLAKE2b with a 32 byte output over the UTF-8 bytes of the request. This is
/// the digest the public relays address requests by.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake2b256Hasher;

type Blake2b256 = Blake2b<U32>;

impl RequestHasher for Blake2b256Hasher {
    fn digest_hex(&self, canonical_json: &str) -> String {
        hex::encode(<Blake2b256 as Digest>::digest(canonical_json.as_bytes()))
    }
}

/// Built-in digests, selectable by name from config files and the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "blake2b256")]
    Blake2b256,
    #[serde(rename = "sha3-256")]
    Sha3_256,
}

impl HashAlgorithm {
    pub fn hasher(&self) -> Box<dyn RequestHasher> {
        match self {
            HashAlgorithm::Blake2b256 => Box::new(Blake2b256Hasher),
            HashAlgorithm::Sha3_256 => Box::new(Sha3_256Hasher),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Blake2b256 => "blake2b256",
            HashAlgorithm::Sha3_256 => "sha3-256",
        })
    }
}

#[derive(Debug, Error)]
#[error("unknown hash algorithm {0:?}, expected \"blake2b256\" or \"sha3-256\"")]
pub struct ParseHashAlgorithmError(String);

impl FromStr for HashAlgorithm {
    type Err = ParseHashAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blake2b256" => Ok(HashAlgorithm::Blake2b256),
            "sha3-256" => Ok(HashAlgorithm::Sha3_256),
            other => Err(ParseHashAlgorithmError(other.to_string())),
        }
    }
}

/// Content address of a signing request. Doubles as the relay resource name.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    Into,
)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Derives the id of an already serialized request.
    pub fn derive<H>(canonical_json: &str, hasher: &H) -> Self
    where
        H: RequestHasher + ?Sized,
    {
        Self(hasher.digest_hex(canonical_json))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

use crate::hash::{RequestHasher, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Option key holding the caller's local acceptance callback. It never leaves
/// the process: it is removed before hashing and transmission.
pub const ACCEPTED_CALLBACK_FIELD: &str = "onAccepted";

/// What the wallet is asked to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Tx,
    Cert,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Tx => "tx",
            RequestKind::Cert => "cert",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown request kind {0:?}, expected \"tx\" or \"cert\"")]
pub struct ParseRequestKindError(String);

impl FromStr for RequestKind {
    type Err = ParseRequestKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tx" => Ok(RequestKind::Tx),
            "cert" => Ok(RequestKind::Cert),
            other => Err(ParseRequestKindError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub message: Value,
    pub options: Map<String, Value>,
}

/// A signing request as relayed to the wallet.
///
/// Field order matters: it is part of the canonical encoding that the request
/// id is derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    #[serde(rename = "gid")]
    pub genesis_id: String,
    pub payload: RequestPayload,
    pub nonce: String,
}

impl SigningRequest {
    pub fn new(
        kind: RequestKind,
        genesis_id: impl Into<String>,
        message: Value,
        mut options: Map<String, Value>,
        nonce: impl Into<String>,
    ) -> Self {
        options.remove(ACCEPTED_CALLBACK_FIELD);
        Self {
            kind,
            genesis_id: genesis_id.into(),
            payload: RequestPayload { message, options },
            nonce: nonce.into(),
        }
    }

    /// Compact JSON encoding, identical to what is sent on the wire.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the request once and derives its id from those same bytes.
    pub fn address<H>(&self, hasher: &H) -> Result<AddressedRequest, serde_json::Error>
    where
        H: RequestHasher + ?Sized,
    {
        let body = self.to_canonical_json()?;
        let id = RequestId::derive(&body, hasher);
        Ok(AddressedRequest { id, body })
    }
}

/// A serialized request together with its content address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedRequest {
    pub id: RequestId,
    pub body: String,
}

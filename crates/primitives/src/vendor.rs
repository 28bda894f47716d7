//! Typed messages and responses of the wallet vendor interface.
//!
//! The relay itself only moves opaque JSON around; these types give callers a
//! checked way to build transaction and certificate requests and to read the
//! wallet's answers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Clause value, either a decimal/hex string or a plain number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClauseValue {
    Text(String),
    Number(u64),
}

impl Default for ClauseValue {
    fn default() -> Self {
        ClauseValue::Number(0)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Clause {
    /// Recipient address; `None` deploys a contract.
    pub to: Option<String>,
    pub value: ClauseValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<Value>,
}

pub type TxMessage = Vec<Clause>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegator {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegator: Option<Delegator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    pub txid: String,
    pub signer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertPurpose {
    Identification,
    Agreement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl CertPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertMessage {
    pub purpose: CertPurpose,
    pub payload: CertPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CertOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAnnex {
    pub domain: String,
    pub timestamp: u64,
    pub signer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertResponse {
    pub annex: CertAnnex,
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tx_options_use_camel_case() {
        let options = TxOptions {
            depends_on: Some("0x01".to_string()),
            gas: Some(21000),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"gas": 21000, "dependsOn": "0x01"})
        );
    }

    #[test]
    fn test_clause_accepts_string_and_number_values() {
        let clauses: TxMessage = serde_json::from_value(json!([
            {"to": "0x7567d83b7b8d80addcb281a71d54fc7b3364ffed", "value": "0x10", "data": "0x"},
            {"to": null, "value": 7},
        ]))
        .unwrap();

        assert_eq!(clauses[0].value, ClauseValue::Text("0x10".to_string()));
        assert_eq!(clauses[1].to, None);
        assert_eq!(clauses[1].value, ClauseValue::Number(7));
    }

    #[test]
    fn test_cert_message_shape() {
        let message = CertMessage {
            purpose: CertPurpose::Identification,
            payload: CertPayload::text("log in to example.com"),
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "purpose": "identification",
                "payload": {"type": "text", "content": "log in to example.com"}
            })
        );
    }

    #[test]
    fn test_cert_response_parses() {
        let response: CertResponse = serde_json::from_value(json!({
            "annex": {"domain": "example.com", "timestamp": 1545035330, "signer": "0x01"},
            "signature": "0xbeef"
        }))
        .unwrap();

        assert_eq!(response.annex.timestamp, 1545035330);
        assert_eq!(response.signature, "0xbeef");
    }
}

use crate::cancellation::Aborted;
use thiserror::Error;

/// Ways a signing call can settle without a result.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("failed to submit request")]
    SubmitFailed,
    #[error("timeout")]
    PollTimeout,
    #[error("failed to fetch response")]
    PollFailed,
    /// The wallet answered with an error. Displays as the wallet's message.
    #[error("{0}")]
    RelayError(String),
    #[error("aborted")]
    Aborted,
    #[error("signing request could not be serialized")]
    Serialization(#[source] serde_json::Error),
    #[error("relay returned a malformed response")]
    MalformedResponse(#[source] serde_json::Error),
    #[error("invalid relay url")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<Aborted> for SignError {
    fn from(_: Aborted) -> Self {
        SignError::Aborted
    }
}

impl SignError {
    /// Short label used for metrics and logs.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            SignError::SubmitFailed => "submit_failed",
            SignError::PollTimeout => "poll_timeout",
            SignError::PollFailed => "poll_failed",
            SignError::RelayError(_) => "relay_error",
            SignError::Aborted => "aborted",
            SignError::Serialization(_) => "serialization",
            SignError::MalformedResponse(_) => "malformed_response",
            SignError::InvalidUrl(_) => "invalid_url",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_relay_error_displays_wallet_message() {
        assert_eq!(SignError::RelayError("denied".to_string()).to_string(), "denied");
    }

    #[test]
    fn test_aborted_converts() {
        let error: SignError = Aborted.into();
        assert!(matches!(error, SignError::Aborted));
        assert_eq!(error.outcome_label(), "aborted");
    }

    #[rstest]
    #[case(SignError::SubmitFailed, "failed to submit request", "submit_failed")]
    #[case(SignError::PollTimeout, "timeout", "poll_timeout")]
    #[case(SignError::PollFailed, "failed to fetch response", "poll_failed")]
    #[case(SignError::Aborted, "aborted", "aborted")]
    fn test_messages_and_labels(
        #[case] error: SignError,
        #[case] message: &str,
        #[case] label: &str,
    ) {
        assert_eq!(error.to_string(), message);
        assert_eq!(error.outcome_label(), label);
    }
}

use lazy_static::lazy_static;
use prometheus::{default_registry, Encoder, TextEncoder};

lazy_static! {
    pub static ref SIGN_REQUESTS: prometheus::IntCounterVec =
        prometheus::register_int_counter_vec!(
            "wallet_buddy_sign_requests_total",
            "Signing calls started, by request kind",
            &["kind"],
        )
        .unwrap();
}

lazy_static! {
    pub static ref SIGN_OUTCOMES: prometheus::IntCounterVec =
        prometheus::register_int_counter_vec!(
            "wallet_buddy_sign_outcomes_total",
            "Signing calls settled, by outcome",
            &["outcome"],
        )
        .unwrap();
}

lazy_static! {
    pub static ref RELAY_SUBMIT_FAILURES: prometheus::IntCounter =
        prometheus::register_int_counter!(
            "wallet_buddy_relay_submit_failures_total",
            "Failed attempts to submit a request to the relay"
        )
        .unwrap();
}

lazy_static! {
    pub static ref RELAY_POLL_FAILURES: prometheus::IntCounterVec =
        prometheus::register_int_counter_vec!(
            "wallet_buddy_relay_poll_failures_total",
            "Failed long-poll requests, by polled resource suffix",
            &["suffix"],
        )
        .unwrap();
}

lazy_static! {
    pub static ref BEST_EFFORT_FAILURES: prometheus::IntCounterVec =
        prometheus::register_int_counter_vec!(
            "wallet_buddy_best_effort_failures_total",
            "Failures of background session tasks that do not affect the signing result",
            &["task"],
        )
        .unwrap();
}

lazy_static! {
    pub static ref PRESENTATION_REVEALS: prometheus::IntCounter =
        prometheus::register_int_counter!(
            "wallet_buddy_presentation_reveals_total",
            "Times the presentation surface was shown because the wallet was slow to accept"
        )
        .unwrap();
}

/// Renders every registered metric in the text exposition format.
pub fn gather_text() -> anyhow::Result<String> {
    let metric_families = default_registry().gather();
    let mut buffer = vec![];
    TextEncoder::new().encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_contains_registered_metrics() {
        SIGN_REQUESTS.with_label_values(&["tx"]).inc();
        RELAY_SUBMIT_FAILURES.inc();

        let text = gather_text().unwrap();

        assert!(text.contains("wallet_buddy_sign_requests_total{kind=\"tx\"}"));
        assert!(text.contains("wallet_buddy_relay_submit_failures_total"));
    }
}

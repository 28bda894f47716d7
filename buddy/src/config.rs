use anyhow::Context;
use buddy_primitives::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Relay used when neither the config file nor the command line names one.
pub const DEFAULT_RELAY_URL: &str = "https://tos.vecha.in/";

/// Timing and retry parameters of the relay protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Total number of submission attempts, including the first one.
    pub submit_attempts: usize,
    pub submit_retry_delay_ms: u64,
    /// Upper bound on a single submission attempt, response included.
    pub submit_timeout_ms: u64,
    /// A poll fails once more than this many consecutive requests failed.
    pub max_consecutive_poll_failures: usize,
    pub poll_failure_backoff_ms: u64,
    /// How long to watch for the wallet picking up the request.
    pub accepted_timeout_sec: u64,
    /// How long to wait for the wallet's final answer.
    pub response_timeout_sec: u64,
    /// If the wallet has not accepted the request after this long, the
    /// presentation surface is revealed.
    pub grace_period_ms: u64,
    pub connect_timeout_sec: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            submit_attempts: 3,
            submit_retry_delay_ms: 2000,
            submit_timeout_ms: 30_000,
            max_consecutive_poll_failures: 2,
            poll_failure_backoff_ms: 3000,
            accepted_timeout_sec: 60,
            response_timeout_sec: 600,
            grace_period_ms: 1500,
            connect_timeout_sec: 10,
        }
    }
}

impl RelayConfig {
    pub fn submit_retry_delay(&self) -> Duration {
        Duration::from_millis(self.submit_retry_delay_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn poll_failure_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_failure_backoff_ms)
    }

    pub fn accepted_timeout(&self) -> Duration {
        Duration::from_secs(self.accepted_timeout_sec)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_sec)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }
}

/// The contents of the optional config.yaml file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Base URL of the relay. Request resources are resolved relative to it.
    pub relay_url: Option<Url>,
    /// Genesis id of the network requests are bound to.
    pub genesis_id: Option<String>,
    /// Identifies the wallet to open when the request needs attention.
    pub wallet_id: Option<String>,
    /// Digest the relay addresses requests by.
    pub hash: Option<HashAlgorithm>,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::read_to_string(path)
            .with_context(|| format!("Read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&file).context("Parse config file")?;
        Ok(config)
    }
}

/// Everything a [`crate::WalletBuddy`] needs besides its collaborators.
#[derive(Clone, Debug)]
pub struct BuddyConfig {
    pub relay_url: Url,
    pub genesis_id: String,
    pub wallet_id: Option<String>,
    pub hash: HashAlgorithm,
    pub relay: RelayConfig,
}

impl BuddyConfig {
    pub fn new(genesis_id: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            relay_url: Url::parse(DEFAULT_RELAY_URL).context("Parse default relay url")?,
            genesis_id: genesis_id.into(),
            wallet_id: None,
            hash: HashAlgorithm::default(),
            relay: RelayConfig::default(),
        })
    }
}

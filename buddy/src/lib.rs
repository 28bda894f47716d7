mod buddy;
pub mod cancellation;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod nonce;
pub mod presentation;
pub mod relay;
pub mod session;
#[cfg(test)]
mod test_utils;
pub mod tracing;

pub use buddy::{OnAccepted, SignOptions, WalletBuddy};
pub use error::SignError;

use std::{fmt, str::FromStr};
use thiserror::Error;

const MAINNET_GENESIS_ID: &str =
    "0x00000000851caf3cfdb6e899cf5958bfb1ac3413d346d43539627e6be7ec1b4a";
const TESTNET_GENESIS_ID: &str =
    "0x000000000b2bce3c70bc649a02749e8687721b09ed2e15997f466536b20bb127";
const SOLO_GENESIS_ID: &str = "0x00000000973ceb7f343a58b08f0693d6701a5fd354ff73d7058af3fba222aea4";

/// Networks with a well-known genesis block. Requests are bound to a network
/// through its genesis id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Solo,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Solo];

    pub fn genesis_id(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_GENESIS_ID,
            Network::Testnet => TESTNET_GENESIS_ID,
            Network::Solo => SOLO_GENESIS_ID,
        }
    }

    pub fn from_genesis_id(genesis_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|network| network.genesis_id().eq_ignore_ascii_case(genesis_id))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Solo => "solo",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("unknown network {0:?}")]
pub struct ParseNetworkError(String);

impl FromStr for Network {
    type Err = ParseNetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Mainnet),
            "test" | "testnet" => Ok(Network::Testnet),
            "solo" => Ok(Network::Solo),
            _ => Err(ParseNetworkError(s.to_string())),
        }
    }
}

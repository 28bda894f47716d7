use crate::config::{BuddyConfig, ConfigFile, DEFAULT_RELAY_URL};
use crate::metrics;
use crate::nonce::{NonceSource, RandomNonce};
use crate::presentation::TerminalPresenter;
use crate::relay::ReqwestRelayHttp;
use crate::{SignOptions, WalletBuddy};
use anyhow::Context;
use buddy_primitives::{AddressedRequest, HashAlgorithm, Network, RequestKind, SigningRequest};
use clap::{Args, Parser};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "wallet-buddy", version)]
pub enum Cli {
    /// Asks the wallet to sign a request and prints its answer as JSON.
    Sign(SignCmd),
    /// Prints the request `sign` would send and its id, without contacting
    /// the relay.
    Inspect(InspectCmd),
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// tx or cert
    #[arg(long)]
    pub kind: RequestKind,
    /// Message to sign, as JSON.
    #[arg(long)]
    pub message: String,
    /// Vendor options, as a JSON object.
    #[arg(long)]
    pub options: Option<String>,
}

impl RequestArgs {
    fn parse_json(&self) -> anyhow::Result<(Value, Map<String, Value>)> {
        let message = serde_json::from_str(&self.message).context("Parse --message as JSON")?;
        let options = match &self.options {
            Some(options) => {
                serde_json::from_str(options).context("Parse --options as a JSON object")?
            }
            None => Map::new(),
        };
        Ok((message, options))
    }
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// YAML config file. Command line flags take precedence over it.
    #[arg(long, env("WALLET_BUDDY_CONFIG"))]
    pub config: Option<PathBuf>,
    #[arg(long, env("WALLET_BUDDY_RELAY_URL"))]
    pub relay_url: Option<Url>,
    #[arg(long, conflicts_with = "network")]
    pub genesis_id: Option<String>,
    /// mainnet, testnet or solo
    #[arg(long)]
    pub network: Option<Network>,
    /// Browser extension id of the wallet to open.
    #[arg(long)]
    pub wallet_id: Option<String>,
    /// Digest the relay addresses requests by: blake2b256 or sha3-256.
    #[arg(long)]
    pub hash: Option<HashAlgorithm>,
}

impl TargetArgs {
    pub fn load(&self) -> anyhow::Result<BuddyConfig> {
        let file = match &self.config {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::default(),
        };
        let relay_url = match self.relay_url.clone().or(file.relay_url) {
            Some(url) => url,
            None => Url::parse(DEFAULT_RELAY_URL).context("Parse default relay url")?,
        };
        let genesis_id = self
            .genesis_id
            .clone()
            .or_else(|| self.network.map(|network| network.genesis_id().to_string()))
            .or(file.genesis_id)
            .context("No genesis id: pass --genesis-id or --network, or set genesis_id in the config file")?;
        Ok(BuddyConfig {
            relay_url,
            genesis_id,
            wallet_id: self.wallet_id.clone().or(file.wallet_id),
            hash: self.hash.or(file.hash).unwrap_or_default(),
            relay: file.relay,
        })
    }
}

#[derive(Args, Debug)]
pub struct SignCmd {
    #[command(flatten)]
    pub request: RequestArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Print the collected metrics to stderr when done.
    #[arg(long)]
    pub dump_metrics: bool,
}

impl SignCmd {
    async fn run(self) -> anyhow::Result<()> {
        let config = self.target.load()?;
        let (message, options) = self.request.parse_json()?;
        if let Some(network) = Network::from_genesis_id(&config.genesis_id) {
            tracing::info!(%network, "signing on a well-known network");
        }
        let http = Arc::new(ReqwestRelayHttp::new(&config.relay)?);
        let buddy = WalletBuddy::new(config, http, Arc::new(TerminalPresenter::default()));

        let result = buddy
            .sign(self.request.kind, message, SignOptions::new(options))
            .await;

        if self.dump_metrics {
            eprintln!("{}", metrics::gather_text()?);
        }
        let payload = result.context("Signing failed")?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct InspectCmd {
    #[command(flatten)]
    pub request: RequestArgs,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Use this nonce instead of a random one.
    #[arg(long)]
    pub nonce: Option<String>,
}

impl InspectCmd {
    fn address(&self) -> anyhow::Result<(AddressedRequest, Url)> {
        let config = self.target.load()?;
        let (message, options) = self.request.parse_json()?;
        let nonce = match &self.nonce {
            Some(nonce) => nonce.clone(),
            None => RandomNonce.next_nonce(),
        };
        let request =
            SigningRequest::new(self.request.kind, config.genesis_id, message, options, nonce)
                .address(config.hash.hasher().as_ref())
                .context("Serialize request")?;
        let resource = config
            .relay_url
            .join(request.id.as_str())
            .context("Build request resource url")?;
        Ok((request, resource))
    }

    fn run(self) -> anyhow::Result<()> {
        let (request, resource) = self.address()?;

        println!("{}", request.body);
        println!("id: {}", request.id);
        println!("resource: {resource}");
        Ok(())
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self {
            Cli::Sign(cmd) => cmd.run().await,
            Cli::Inspect(cmd) => cmd.run(),
        }
    }
}

use clap::Parser;
use wallet_buddy::cli::Cli;
use wallet_buddy::tracing::init_logging;

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli.run())
}

use anyhow::Result;
use clap::Parser;
use commission_ledger::cli::Cli;
use commission_ledger::config::load_dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    cli.run().await
}

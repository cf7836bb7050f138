use clap::Parser;
use mlwh_backfill::{config::Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().unwrap_or_default();

    run(Cli::parse()).await
}

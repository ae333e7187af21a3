use anyhow::Result;
use clap::Parser;
use moneta::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    cli.run().await
}

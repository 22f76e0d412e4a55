//! Market Pulse - Market Data Dashboard
//!
//! Polls market data providers and keeps refreshed tables and converters.

use anyhow::Result;
use market_pulse::adapters::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if it exists (API keys go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}

//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the market dashboard.

use clap::{Parser, Subcommand, ValueEnum};
use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::adapters::http::{FetcherConfig, ReqwestFetcher};
use crate::adapters::market_data::AlphaVantageAdapter;
use crate::adapters::proxy::{self, ProxyState};
use crate::adapters::render::{format_row, ConsoleSink};
use crate::application::{
    Dashboard, TriggerOutcome, CRYPTO_CONVERTER_PULL, FIAT_CONVERTER_PULL, SENTIMENT_PULL,
};
use crate::config::{expand_path, load_or_default, Config, DEFAULT_CONFIG_PATH};
use crate::ports::fetcher::HttpFetch;
use crate::ports::render::{PriceMove, QuoteRow, RenderSink};
use crate::ports::source::SourceAdapter;

/// Market Pulse - crypto, equity and sentiment dashboard in the terminal
#[derive(Parser, Debug)]
#[command(
    name = "market-pulse",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Polls market data providers and keeps refreshed tables and converters",
    long_about = "Market Pulse polls crypto, equity, sentiment and fiat-rate providers on \
                  independent timers, merges primary and secondary sources with a fallback, \
                  and keeps the last good data on screen when a refresh fails."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the refresh loop
    Run(RunCmd),

    /// Convert an amount between two assets
    Convert(ConvertCmd),

    /// Fetch one equity quote
    Quote(QuoteCmd),

    /// Show the fear & greed index
    Sentiment,

    /// Serve the equity proxy
    Proxy(ProxyCmd),
}

/// Start refresh loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Refresh every panel once and exit
    #[arg(long)]
    pub once: bool,

    /// Also list the assets each converter accepts
    #[arg(long)]
    pub show_options: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    /// Crypto assets by listing id (bitcoin, ethereum, usd)
    Crypto,
    /// Fiat currencies by ISO code (USD, EUR, BRL)
    Fiat,
}

/// Convert an amount
#[derive(Parser, Debug)]
pub struct ConvertCmd {
    /// Which table to convert with
    #[arg(value_enum)]
    pub kind: ConverterKind,

    /// Amount to convert
    #[arg(value_name = "AMOUNT", allow_hyphen_values = true)]
    pub amount: String,

    /// Asset to convert from
    #[arg(value_name = "FROM")]
    pub from: String,

    /// Asset to convert to
    #[arg(value_name = "TO")]
    pub to: String,
}

/// Fetch one equity quote
#[derive(Parser, Debug)]
pub struct QuoteCmd {
    /// Ticker symbol (e.g., AAPL)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,
}

/// Serve the equity proxy
#[derive(Parser, Debug)]
pub struct ProxyCmd {
    /// Override the bind address from config
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    let config_path = expand_path(&app.config);
    let config = load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    config.validate_keys().context("Invalid API key")?;

    // Initialize logging based on flags
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd, &config).await,
        Command::Convert(cmd) => convert_command(cmd, &config).await,
        Command::Quote(cmd) => quote_command(cmd, &config).await,
        Command::Sentiment => sentiment_command(&config).await,
        Command::Proxy(cmd) => proxy_command(cmd, &config).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level {:?}", level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to install logger")?;

    Ok(())
}

fn build_fetcher(config: &Config) -> Result<Arc<dyn HttpFetch>> {
    let fetcher = ReqwestFetcher::new(FetcherConfig::from(&config.providers))
        .context("Failed to create HTTP client")?;
    Ok(Arc::new(fetcher))
}

/// Handle run command
async fn run_command(cmd: RunCmd, config: &Config) -> Result<()> {
    tracing::info!("Starting market dashboard...");

    let sink: Arc<dyn RenderSink> = Arc::new(ConsoleSink::new().with_options(cmd.show_options));
    let dashboard = Dashboard::from_config(config, build_fetcher(config)?, sink);

    if cmd.once {
        let outcomes = dashboard.refresh_all().await;
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TriggerOutcome::Failed(_)))
            .map(|(name, _)| *name)
            .collect();

        if failed.len() == outcomes.len() {
            bail!("Every panel failed to refresh");
        }
        if !failed.is_empty() {
            println!("\nFailed panels: {}", failed.join(", "));
        }
        return Ok(());
    }

    let scheduler = dashboard.scheduler();
    let handles = scheduler.spawn().await;
    tracing::info!("{} refresh timers running, Ctrl-C to stop", handles.len());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!("\nStopping...");
    scheduler.stop().await;
    for handle in handles {
        handle.abort();
    }

    Ok(())
}

/// Handle convert command
async fn convert_command(cmd: ConvertCmd, config: &Config) -> Result<()> {
    let sink: Arc<dyn RenderSink> = Arc::new(ConsoleSink::new().quiet());
    let dashboard = Dashboard::from_config(config, build_fetcher(config)?, sink);

    let pull = match cmd.kind {
        ConverterKind::Crypto => CRYPTO_CONVERTER_PULL,
        ConverterKind::Fiat => FIAT_CONVERTER_PULL,
    };
    if let TriggerOutcome::Failed(reason) = dashboard.trigger(pull).await? {
        bail!("Could not load rates: {}", reason);
    }

    let converter = dashboard.converter();
    let conversion = match cmd.kind {
        ConverterKind::Crypto => converter.convert_crypto(&cmd.amount, &cmd.from, &cmd.to).await,
        ConverterKind::Fiat => converter.convert_fiat(&cmd.amount, &cmd.from, &cmd.to).await,
    }?;

    println!("{}", conversion);
    Ok(())
}

/// Handle quote command
async fn quote_command(cmd: QuoteCmd, config: &Config) -> Result<()> {
    tracing::info!("Fetching quote for {}", cmd.symbol);

    let providers = &config.providers;
    let adapter = AlphaVantageAdapter::new(&providers.alpha_vantage_url, providers.get_alpha_vantage_key())
        .with_symbols([cmd.symbol.as_str()])
        .with_company_names(config.equities.names.clone());

    let fetcher = build_fetcher(config)?;
    let quotes = adapter
        .pull(fetcher.as_ref())
        .await
        .with_context(|| format!("No quote for {}", cmd.symbol))?;

    for (i, quote) in quotes.into_iter().enumerate() {
        let row = QuoteRow {
            rank: i + 1,
            quote,
            movement: PriceMove::New,
        };
        println!("{}", format_row(&row));
    }

    Ok(())
}

/// Handle sentiment command
async fn sentiment_command(config: &Config) -> Result<()> {
    let sink: Arc<dyn RenderSink> = Arc::new(ConsoleSink::new());
    let dashboard = Dashboard::from_config(config, build_fetcher(config)?, sink);

    match dashboard.trigger(SENTIMENT_PULL).await? {
        TriggerOutcome::Failed(reason) => bail!("Could not load the sentiment index: {}", reason),
        _ => Ok(()),
    }
}

/// Handle proxy command
async fn proxy_command(cmd: ProxyCmd, config: &Config) -> Result<()> {
    let bind = match cmd.bind {
        Some(bind) => bind,
        None => config
            .proxy
            .bind
            .parse()
            .with_context(|| format!("Invalid proxy.bind {:?}", config.proxy.bind))?,
    };

    let state = ProxyState::new(
        build_fetcher(config)?,
        &config.proxy.upstream_url,
        config.providers.get_alpha_vantage_key(),
    )?;

    println!("Equity proxy running on http://{}", bind);
    proxy::serve(bind, state).await?;
    Ok(())
}

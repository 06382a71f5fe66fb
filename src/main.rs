use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use spotbot::api::{BinanceClient, SymbolDirectory, BINANCE_TESTNET_URL};
use spotbot::decision::ThresholdAdvisor;
use spotbot::engine::{EngineConfig, TradingEngine};

/// Unattended spot trading session against a Binance account.
#[derive(Parser, Debug)]
#[command(name = "spotbot", about = "Spot trading engine")]
struct Args {
    /// Session length in minutes before the final liquidation
    #[arg(long, default_value_t = 5.0)]
    minutes: f64,

    /// Quote currency spent per individual buy order
    #[arg(long, default_value_t = 1.0)]
    quote_per_order: f64,

    /// How many ranked candidates each cycle evaluates
    #[arg(long, default_value_t = 20)]
    top_candidates: usize,

    /// Candidate symbols, best first (e.g. ETHUSDT,BTCUSDT)
    #[arg(long, value_delimiter = ',')]
    candidates: Vec<String>,

    /// Exchange REST endpoint
    #[arg(long, default_value = BINANCE_TESTNET_URL)]
    base_url: String,

    /// Quote asset every pair trades against
    #[arg(long, default_value = "USDT")]
    quote_asset: String,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spotbot=info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    let api_key = std::env::var("BINANCE_TESTNET_API_KEY")
        .context("BINANCE_TESTNET_API_KEY not found in environment")?;
    let secret_key = std::env::var("BINANCE_TESTNET_SECRET_KEY")
        .context("BINANCE_TESTNET_SECRET_KEY not found in environment")?;

    let client = Arc::new(BinanceClient::new(&args.base_url, api_key, secret_key));

    tracing::info!("loading symbol directory from {}", args.base_url);
    let directory = Arc::new(
        SymbolDirectory::load(&client, &args.quote_asset)
            .await
            .context("failed to load the exchange symbol directory")?,
    );
    tracing::info!("{} tradable {} pairs", directory.len(), args.quote_asset);

    let config = EngineConfig {
        quote_asset: args.quote_asset.clone(),
        quote_per_order: args.quote_per_order,
        top_candidates: args.top_candidates,
        ..EngineConfig::default()
    };
    let mut engine = TradingEngine::new(client.clone(), directory, config);

    engine
        .resync()
        .await
        .context("initial account sync failed")?;
    let pre_session = engine.total_equity().await?;
    tracing::info!(
        "session starting: {:.2} {} equity, {} candidates",
        pre_session,
        args.quote_asset,
        args.candidates.len()
    );

    let provider = ThresholdAdvisor::new(client, args.candidates);
    let session = Duration::from_secs_f64(args.minutes * 60.0);
    engine.run(&provider, session).await?;

    let post_session = engine.total_equity().await?;
    tracing::info!("pre-session:  {:.2} {}", pre_session, args.quote_asset);
    tracing::info!("post-session: {:.2} {}", post_session, args.quote_asset);
    tracing::info!(
        "profit rate: {:.4}%",
        (post_session - pre_session) / pre_session * 100.0
    );

    Ok(())
}

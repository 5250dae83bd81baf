//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::web::build_router;
use crate::domain::error::PolydashError;
use crate::domain::settings::{Settings, TradingMode};
use crate::services::app::App;
use crate::services::refresh::spawn_refresh_loop;

#[derive(Parser, Debug)]
#[command(name = "polydash", about = "Prediction-market trading dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server and the market refresh loop
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Create the schema and insert the sample market catalogue
    Seed {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print portfolio statistics
    Stats {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print trading signals for the current market snapshot
    Signals {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Serve { config } => load_settings(config.as_deref()).and_then(run_serve),
        Command::Seed { config } => load_settings(config.as_deref()).and_then(run_seed),
        Command::Stats { config } => load_settings(config.as_deref()).and_then(run_stats),
        Command::Signals { config } => load_settings(config.as_deref()).and_then(run_signals),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }
    }
}

/// Reads the INI file at `path`, or falls back to built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, PolydashError> {
    match path {
        Some(path) => FileConfigAdapter::from_file(path),
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn load_settings(path: Option<&Path>) -> Result<Settings, PolydashError> {
    let config = load_config(path)?;
    Settings::resolve(&config)
}

/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("polydash={level},tower_http={level}")));
    // A second init in the same process (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

fn runtime() -> Result<Runtime, PolydashError> {
    Runtime::new().map_err(PolydashError::from)
}

fn run_serve(settings: Settings) -> Result<(), PolydashError> {
    init_tracing(&settings.log_level);
    runtime()?.block_on(serve(settings))
}

async fn serve(settings: Settings) -> Result<(), PolydashError> {
    let addr = settings.bind_addr();
    let interval = settings.refresh.interval;
    let app = Arc::new(App::build(settings)?);
    let seeded = app.seed_sample_markets().await?;
    if seeded > 0 {
        info!(markets = seeded, "sample markets seeded");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = spawn_refresh_loop(
        Arc::clone(&app.snapshot),
        Arc::clone(&app.registry),
        Arc::clone(&app.clock),
        interval,
        shutdown_rx,
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, mode = ?app.settings.mode, "listening");

    let router = build_router(Arc::clone(&app));
    let registry = Arc::clone(&app.registry);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("could not install ctrl-c handler");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
            // Ends open websocket sessions so the server can drain.
            registry.shutdown();
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if refresher.await.is_err() {
        tracing::warn!("refresh loop ended abnormally");
    }
    info!("server stopped");
    Ok(())
}

fn run_seed(settings: Settings) -> Result<(), PolydashError> {
    runtime()?.block_on(seed(settings))
}

async fn seed(settings: Settings) -> Result<(), PolydashError> {
    let app = App::build(settings)?;
    if app.settings.mode != TradingMode::Paper {
        println!("Live mode: sample markets are not seeded");
        return Ok(());
    }
    let inserted = app.seed_sample_markets().await?;
    println!("Seeded {inserted} sample market(s) into {}", app.settings.database_path);
    Ok(())
}

fn run_stats(settings: Settings) -> Result<(), PolydashError> {
    runtime()?.block_on(stats(settings))
}

async fn stats(settings: Settings) -> Result<(), PolydashError> {
    let app = App::build(settings)?;
    let summary = app.portfolio().await?;
    let stats = &summary.stats;
    println!("Mode:             {:?}", summary.mode);
    println!("Balance:          {:.2}", summary.balance);
    println!("Total P&L:        {:.2}", stats.total_pnl);
    println!("Open positions:   {}", stats.open_positions);
    println!("Closed positions: {}", stats.total_closed_positions);
    println!("Total trades:     {}", stats.total_trades);
    println!("Win rate:         {:.1}%", stats.win_rate);
    match stats.sharpe_ratio {
        Some(sharpe) => println!("Sharpe ratio:     {sharpe:.3}"),
        None => println!("Sharpe ratio:     n/a"),
    }
    match stats.max_drawdown {
        Some(drawdown) => println!("Max drawdown:     {drawdown:.2}"),
        None => println!("Max drawdown:     n/a"),
    }
    Ok(())
}

fn run_signals(settings: Settings) -> Result<(), PolydashError> {
    runtime()?.block_on(signals(settings))
}

async fn signals(settings: Settings) -> Result<(), PolydashError> {
    let app = App::build(settings)?;
    app.seed_sample_markets().await?;
    let markets = app.snapshot.refresh().await;
    let signals = app.signals.signals(&markets).await?;
    if signals.is_empty() {
        println!("No signals: no market has enough edge.");
        return Ok(());
    }
    println!(
        "{:<16} {:<4} {:>10} {:>8} {:>8}  rationale",
        "market", "side", "confidence", "size", "entry"
    );
    for signal in &signals {
        println!(
            "{:<16} {:<4} {:>10.3} {:>8.2} {:>8.3}  {}",
            signal.market_id,
            signal.side,
            signal.confidence,
            signal.recommended_size,
            signal.entry_price,
            signal.rationale
        );
    }
    Ok(())
}

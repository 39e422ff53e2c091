//! arriba - gincana task watcher
//!
//! `.env` を読み込んでから引数を解釈するので、`--database-url` などは
//! 環境変数でも指定できる。

mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arriba_core::app::{CrawlService, Crawler};
use arriba_core::config::CrawlerConfig;
use arriba_core::impls::{HttpBrowser, LogChannel, SqliteTaskStore, WebhookChannel};
use arriba_core::ports::{NotificationChannel, TaskStore};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser)]
#[command(name = "arriba")]
#[command(about = "Watch the gincana task page and announce new tasks")]
#[command(long_about = "Watch the gincana task page and announce new tasks.

The page is fetched over plain HTTP and JavaScript is not executed. If the \
page only fills in its title and task table client-side, every run ends in \
a readiness timeout; point ARRIBA_BASE_URL at a server-rendered copy or plug \
a headless browser in behind the Browser port.")]
struct Cli {
    /// SQLite database holding every task seen so far
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://arriba.db?mode=rwc")]
    database_url: String,

    /// Endpoint that relays messages; without it messages are only logged
    #[arg(long, env = "ARRIBA_WEBHOOK_URL")]
    webhook_url: Option<Url>,

    /// Per-request timeout for page fetches and webhook calls
    #[arg(long, env = "ARRIBA_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl in the foreground and print the report
    Crawl,

    /// Crawl periodically until interrupted
    Watch {
        /// Seconds between runs
        #[arg(long, default_value_t = 300)]
        every: u64,
    },

    /// List stored tasks
    Tasks,

    /// List stored tasks whose notification never went out
    Pending,

    /// Serve the HTTP trigger
    Serve {
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let service = build_service(&cli).await?;

    match cli.command {
        Commands::Crawl => crawl_once(&service).await,
        Commands::Watch { every } => watch(&service, Duration::from_secs(every.max(1))).await,
        Commands::Tasks => print_json(&service.list_tasks().await?),
        Commands::Pending => print_json(&service.list_unnotified().await?),
        Commands::Serve { port } => serve(Arc::new(service), port).await,
    }
}

async fn build_service(cli: &Cli) -> Result<CrawlService> {
    let config = CrawlerConfig::from_env().context("Failed to load configuration")?;
    if config.destination.is_none() {
        warn!("ARRIBA_DESTINATION is not set; new tasks will be stored but not announced");
    }
    let timeout = Duration::from_secs(cli.request_timeout_secs);

    let store: Arc<dyn TaskStore> = Arc::new(
        SqliteTaskStore::connect(&cli.database_url)
            .await
            .with_context(|| format!("Failed to open {}", cli.database_url))?,
    );
    let channel: Arc<dyn NotificationChannel> = match &cli.webhook_url {
        Some(url) => Arc::new(WebhookChannel::new(url.clone(), timeout)?),
        None => {
            info!("ARRIBA_WEBHOOK_URL is not set; messages go to the log");
            Arc::new(LogChannel)
        }
    };
    let browser = Arc::new(HttpBrowser::new(timeout)?);

    let crawler = Crawler::new(&config, browser, Arc::clone(&store), channel)
        .context("Invalid page configuration")?;
    Ok(CrawlService::new(crawler, store))
}

async fn crawl_once(service: &CrawlService) -> Result<()> {
    let cancel = cancel_on_ctrl_c();
    let handle = service.start_crawl_with(cancel).await;
    let report = handle.wait().await?;
    print_json(&report)
}

async fn watch(service: &CrawlService, every: Duration) -> Result<()> {
    let shutdown = cancel_on_ctrl_c();
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(every = ?every, "watching task page");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let handle = service.start_crawl_with(shutdown.child_token()).await;
        let run_id = handle.run_id();
        match handle.wait().await {
            Ok(report) => info!(
                %run_id,
                inserted = report.counts.inserted(),
                duplicate = report.counts.duplicate,
                "run finished"
            ),
            Err(e) => error!(%run_id, error = %e, "run failed; next run continues on schedule"),
        }
    }
    info!("stopped watching");
    Ok(())
}

async fn serve(service: Arc<CrawlService>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("Starting server on {}", addr);

    let shutdown = cancel_on_ctrl_c();
    axum::serve(listener, server::router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")?;
    Ok(())
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted; cancelling");
            trigger.cancel();
        }
    });
    token
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

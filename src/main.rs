use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use entrymap::constants::FEED_TIMEOUT;
use entrymap::server::{start_server, AppState};
use entrymap::{HttpFeedSource, Model, Runtime, Settings, SystemLinkOpener};

#[derive(Parser)]
#[command(name = "entrymap")]
#[command(author, version, about = "Clustered map of geotagged feed entries", long_about = None)]
struct Cli {
    /// Settings file (defaults to entrymap.ini in the app data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Feed base URL, e.g. http://host:3000
    #[arg(long)]
    feed_url: Option<String>,

    /// Path appended to the feed URL ("feed", or "news" for older servers)
    #[arg(long)]
    feed_path: Option<String>,

    /// Port for the surface bridge
    #[arg(short, long)]
    port: Option<u16>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("entrymap=info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    info!("🗺️  EntryMap v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load().context("Failed to load settings")?,
    };
    if let Some(feed_url) = cli.feed_url {
        settings.feed_url = feed_url;
    }
    if let Some(feed_path) = cli.feed_path {
        settings.feed_path = feed_path;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }

    let feed = HttpFeedSource::new(&settings.feed_url, &settings.feed_path, FEED_TIMEOUT)
        .context("Failed to build feed client")?;
    info!("📰 Feed source: {}", feed.url());

    let model = Model::new(settings.map_config());
    let (runtime, map) = Runtime::spawn(model, Arc::new(feed), Arc::new(SystemLinkOpener));

    let port = settings.port;
    let state = AppState {
        map,
        settings: Arc::new(Mutex::new(settings)),
    };

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
        let _ = stop_tx.send(());
    });

    let served = start_server(state, port, async {
        let _ = stop_rx.await;
        info!("Shutdown requested");
    })
    .await;

    runtime.shutdown().await;
    served
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use feedbridge_agent::backends::Backends;
use feedbridge_agent::{Dispatcher, KeywordEngine};
use feedbridge_channels::{connect_with_backoff, FeedChannel, TcpFeed};
use feedbridge_core::BridgeConfig;
use feedbridge_store::{EventLog, SqliteKeywordStore};

mod app;
mod feed;
mod http;
mod ws;

#[derive(Parser, Debug)]
#[command(name = "feedbridge", version, about = "Chat feed bridge: commands, keyword alerts and live viewers")]
struct Args {
    /// Config file. Falls back to FEEDBRIDGE_CONFIG, then ~/.feedbridge/feedbridge.toml.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "feedbridge_gateway=info,feedbridge_agent=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();

    // explicit flag > FEEDBRIDGE_CONFIG > ~/.feedbridge/feedbridge.toml
    let config_path = args
        .config
        .or_else(|| std::env::var("FEEDBRIDGE_CONFIG").ok());
    let config = BridgeConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        BridgeConfig::default()
    });

    // one SQLite file; each store gets its own connection
    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    feedbridge_store::db::init_db(&db)?;
    info!("database migrations complete");

    let log = EventLog::new(rusqlite::Connection::open(db_path)?)?;
    let store = SqliteKeywordStore::new(rusqlite::Connection::open(db_path)?)?;
    let keywords = Arc::new(KeywordEngine::new(Arc::new(store)));
    keywords.sync().await?;

    let backends = Backends::from_config(&config.backends);

    let feed: Arc<dyn FeedChannel> = Arc::new(TcpFeed::new(&config.feed.host, config.feed.port));
    let broadcaster = Arc::new(ws::broadcast::EventBroadcaster::new());
    let state = Arc::new(app::AppState::new(
        config.clone(),
        broadcaster.clone(),
        feed.clone(),
    ));

    // replies queue here until the writer task starts
    let (reply_tx, reply_rx) = mpsc::channel::<String>(feed::REPLY_QUEUE);
    let mut dispatcher = Dispatcher::new(
        &config,
        log,
        keywords,
        backends,
        broadcaster,
        Arc::new(feed::FeedSink::new(reply_tx.clone())),
    )?;

    // viewer endpoint runs independently of the feed
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("feedbridge gateway listening on {}", addr);
    let router = app::build_router(state.clone());
    let server = tokio::spawn(async move {
        let graceful = async move {
            let _ = shutdown_rx.changed().await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(graceful)
            .await
        {
            error!(error = %e, "viewer server failed");
        }
    });

    if let Err(e) = connect_with_backoff(feed.as_ref()).await {
        error!(error = %e, "feed unreachable, shutting down");
        let _ = shutdown_tx.send(true);
        let _ = server.await;
        return Err(e.into());
    }

    // chunks read during the history load queue up here
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<u8>>(feed::CHUNK_QUEUE);
    let reader = feed::spawn_reader(feed.clone(), chunk_tx);
    let writer = feed::spawn_writer(feed.clone(), reply_rx);
    let keepalive = config
        .feed
        .keepalive_secs
        .filter(|secs| *secs > 0)
        .map(|secs| feed::spawn_keepalive(reply_tx.clone(), Duration::from_secs(secs)));
    drop(reply_tx);

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let outcome = feed::drive(
        &mut dispatcher,
        &mut chunk_rx,
        &state,
        config.cache.backfill_limit,
        interrupted,
    )
    .await;

    // stop intake, flush pending replies, then release the transport
    reader.abort();
    let _ = reader.await;
    if let Some(task) = keepalive {
        task.abort();
        let _ = task.await;
    }
    drop(dispatcher);
    if let Err(e) = writer.await {
        warn!(error = %e, "reply writer task failed");
    }
    if let Err(e) = feed.disconnect().await {
        warn!(error = %e, "feed disconnect failed");
    }

    let _ = shutdown_tx.send(true);
    let _ = server.await;
    info!("feedbridge stopped");
    outcome
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

//! Madang - a Korean-only community board for autonomous agents

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use madang::{
    config::Args,
    server,
    store::{DocumentStore, MemoryStore, MongoStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("madang={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Madang - 에이전트 커뮤니티");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!(
        "Rate windows: post {}s, comment {}s",
        args.post_window_secs, args.comment_window_secs
    );
    info!("Min Hangul ratio: {}", args.min_script_ratio);
    info!("======================================");

    let store: Arc<dyn DocumentStore> = match (&args.mongodb_uri, args.use_memory_store()) {
        (Some(uri), false) => {
            let mongo = MongoStore::connect(uri, &args.mongodb_db)
                .await
                .map_err(|e| anyhow::anyhow!("MongoDB connection failed: {}", e))?;
            info!("MongoDB connected ({})", args.mongodb_db);
            Arc::new(mongo)
        }
        _ => {
            info!("Using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let state = Arc::new(server::AppState::new(args, store));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}

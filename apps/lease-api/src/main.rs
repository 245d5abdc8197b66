//! Lease analysis API server
//!
//! Provides REST endpoints for:
//! - Lease upload and multi-mode analysis
//! - Live progress over server-sent events
//! - Obligation extraction
//! - Document and portfolio chat

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use lease_analysis::AnalysisConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod db;
mod error;
mod handlers;
mod identity;
mod models;
mod routes;
mod sse;
mod state;
mod storage;

use state::{AppState, ExtractorKind, ServerSettings};

/// Command-line arguments for the lease API server
#[derive(Parser, Debug)]
#[command(name = "lease-api")]
#[command(about = "Lease upload, analysis and chat server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://lease.db?mode=rwc")]
    database_url: String,

    /// Directory uploaded files are written to
    #[arg(long, env = "LEASE_STORAGE_DIR", default_value = "./uploads")]
    storage_dir: PathBuf,

    /// How uploaded files are turned into text
    #[arg(long, value_enum, default_value = "model")]
    extractor: ExtractorKind,

    /// Include internal error detail in error responses
    #[arg(long)]
    expose_error_detail: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("lease_api={}", level).parse()?)
                .add_directive(format!("lease_analysis={}", level).parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let analysis = AnalysisConfig::from_env()?;
    let expose = analysis.expose_error_detail || args.expose_error_detail;
    let settings = ServerSettings {
        database_url: args.database_url,
        storage_dir: args.storage_dir,
        extractor: args.extractor,
        analysis: analysis.with_error_detail(expose),
    };

    info!("Initializing lease API...");
    let state = Arc::new(AppState::new(&settings).await?);
    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!(
        "Upload limit: {} bytes, extractor: {:?}",
        settings.analysis.max_file_bytes, settings.extractor
    );

    axum::serve(listener, app).await?;

    Ok(())
}

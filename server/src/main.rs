use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};
use triage_core::SearchConfig;
use triage_server::{build_app, AppConfig};

#[derive(Parser)]
struct Args {
    /// Knowledge-base file or directory (JSON/JSONL) to load at startup
    #[arg(long)]
    kb: Option<PathBuf>,
    /// JSON search config; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let search = match &args.config {
        Some(p) => SearchConfig::from_json_file(p)?,
        None => SearchConfig::default(),
    };
    let app: Router = build_app(AppConfig::from_env(search, args.kb.clone()))?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

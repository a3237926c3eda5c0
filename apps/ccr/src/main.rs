use std::sync::Arc;

use anyhow::Result;
use axum::routing::post;
use clap::Parser;

mod bootstrap;
mod cli;
mod handler;

use cli::{Cli, Command};
use handler::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let Command::Serve(args) = cli.command else {
        unreachable!("serve is the only subcommand")
    };

    let config = bootstrap::load_config(&args)?;
    let bind = format!("{}:{}", config.host, config.port);

    let state = Arc::new(AppState { config });
    let app = axum::Router::new()
        .route("/v1/messages", post(handler::create_message))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "ccr listening");
    axum::serve(listener, app).await?;
    Ok(())
}

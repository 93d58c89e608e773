// ABOUTME: Strive authorization server binary
// ABOUTME: Loads configuration, opens the database, and serves the authorize endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use strive_auth_server::auth::JwtUserTokenVerifier;
use strive_auth_server::config::ServerConfig;
use strive_auth_server::database::sqlite::SqliteStore;
use strive_auth_server::database::AuthStore;
use strive_auth_server::logging;
use strive_auth_server::oauth2_server::AuthorizationServer;
use strive_auth_server::routes::{self, AppState};

#[derive(Parser)]
#[command(
    name = "strive-auth-server",
    about = "OAuth 2.0 authorization server for the Strive platform",
    version
)]
struct Args {
    /// Override the HTTP listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env().context("failed to initialize logging")?;

    let args = Args::parse();
    let mut config = ServerConfig::from_env().context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    tracing::info!("starting strive-auth-server: {}", config.summary());

    let store: Arc<dyn AuthStore> = Arc::new(
        SqliteStore::new(&config.database_url)
            .await
            .context("failed to open database")?,
    );

    let token_verifier = Arc::new(JwtUserTokenVerifier::new(config.auth.jwt_secret.as_bytes()));
    let server = Arc::new(AuthorizationServer::new(
        store.clone(),
        token_verifier,
        &config,
    ));

    let app = routes::router(AppState {
        server,
        store,
        issuer_url: config.oauth2_server.issuer_url.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")
}

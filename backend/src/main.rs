//! Backend entry-point: wires the WebSocket route and health probes.

use std::net::SocketAddr;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use votecal::api::health::{live, ready, HealthState};
use votecal::inbound::ws;
use votecal::inbound::ws::state::WsState;

/// Command-line and environment configuration.
#[derive(Debug, Parser)]
#[command(name = "votecal", about = "Real-time calendar vote coordination server")]
struct Cli {
    /// Address the HTTP server binds to.
    #[arg(long, env = "VOTECAL_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();

    let health_state = web::Data::new(HealthState::new());
    let ws_state = web::Data::new(WsState::new());

    // Clone for the server factory so the readiness probe stays accessible.
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_health_state.clone())
            .app_data(ws_state.clone())
            .service(ws::ws_entry)
            .service(ready)
            .service(live)
    })
    .bind(cli.bind)?;

    info!(bind = %cli.bind, "server listening");
    health_state.mark_ready();
    server.run().await
}

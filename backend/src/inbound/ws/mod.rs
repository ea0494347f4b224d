//! WebSocket inbound adapter.
//!
//! Responsibilities:
//! - upgrade `/ws` requests and hand the connection to the router
//! - keep transport concerns (framing, heartbeats, fan-out) at the edge
//! - inject the shared core state instead of touching ambient globals

use actix_web::web::{self, Payload};
use actix_web::{get, rt, HttpRequest, HttpResponse};
use tracing::error;

mod connection;

pub mod protocol;
pub mod registry;
pub mod state;

/// Handle WebSocket upgrade for the `/ws` endpoint.
#[get("/ws")]
pub async fn ws_entry(
    state: web::Data<state::WsState>,
    req: HttpRequest,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let remote_addr = req.peer_addr();
    let (response, session, message_stream) = actix_ws::handle(&req, stream).map_err(|err| {
        error!(error = %err, "websocket upgrade failed");
        err
    })?;
    rt::spawn(connection::handle_connection(
        state.get_ref().clone(),
        session,
        message_stream,
        remote_addr,
    ));
    Ok(response)
}

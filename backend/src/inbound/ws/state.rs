//! Shared WebSocket adapter state.
//!
//! All cross-session mutable state (the voting service's registries and the
//! session registry) sits behind one lock, so each message's full
//! parse/validate/execute sequence is serialized exactly as a
//! single-threaded event loop would serialize it. The lock must never be
//! held across an `await`: callers snapshot whatever they need (including
//! broadcast targets) inside the closure and send afterwards.

use std::sync::{Arc, Mutex, PoisonError};

use actix_ws::Session;

use crate::domain::service::VotingService;
use crate::inbound::ws::registry::SessionRegistry;

/// The state the router mutates, one instance per server.
#[derive(Default)]
pub struct CoreState {
    pub voting: VotingService,
    pub sessions: SessionRegistry<Session>,
}

/// Dependency bundle injected into WebSocket handlers at app construction.
#[derive(Clone)]
pub struct WsState {
    core: Arc<Mutex<CoreState>>,
}

impl WsState {
    pub fn new() -> Self {
        Self {
            core: Arc::new(Mutex::new(CoreState::default())),
        }
    }

    /// Run `f` with the core locked. Keep the closure synchronous and short.
    pub fn with_core<T>(&self, f: impl FnOnce(&mut CoreState) -> T) -> T {
        let mut core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut core)
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

//! Real-time calendar vote coordination backend.
//!
//! Clients connect over a WebSocket, bind a session with `init`, and cast
//! votes against calendar dates. Everyone in a department sees a live,
//! converged view of its vote ledger; the department owner (or the global
//! manager) may reset it. All state is in memory for the lifetime of the
//! process.

pub mod api;
pub mod domain;
pub mod inbound;

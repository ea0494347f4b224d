//! Live-session registry with O(1) client-identifier lookup.
//!
//! Each admitted connection gets a registry-minted [`SessionId`]. Sessions
//! start unbound ("connecting"); an `init` message binds a client-chosen
//! identifier and mints a 6-digit secret meant to let a client re-associate
//! after a reconnect. A `client id → session` index keeps bind, steal, and
//! release constant-time; the registry never holds two entries for one
//! client identifier.
//!
//! Lifecycle: `connecting → active → closed` (terminal). Binding is the only
//! way into `active`; release is the only way out of the registry.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use rand::Rng;
use thiserror::Error;
use uuid::Uuid;

/// Failures surfaced by registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("client id must not be empty")]
    EmptyClientId,
    #[error("session is not registered")]
    UnknownSession,
    #[error("invalid secret number; cannot decouple")]
    InvalidSecret,
}

/// Client-chosen connection identifier presented in `init`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Accepts any non-empty identifier; clients mint these themselves.
    pub fn new(id: impl Into<String>) -> Result<Self, RegistryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RegistryError::EmptyClientId);
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Registry-minted identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ephemeral 6-digit reconnection secret, bound at `init` and compared on
/// decoupling. Never sent to peers and never logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretNumber(u32);

impl SecretNumber {
    const MIN: u32 = 100_000;
    const MAX: u32 = 999_999;

    /// Wrap a client-presented number for comparison.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    fn generate() -> Self {
        Self(rand::thread_rng().gen_range(Self::MIN..=Self::MAX))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Binding {
    client_id: ClientId,
    secret: SecretNumber,
}

/// One admitted connection.
#[derive(Clone)]
pub struct SessionRecord<H> {
    handle: H,
    remote_addr: Option<SocketAddr>,
    binding: Option<Binding>,
}

impl<H> SessionRecord<H> {
    /// Client identifier, present once the session is bound.
    pub fn client_id(&self) -> Option<&ClientId> {
        self.binding.as_ref().map(|binding| &binding.client_id)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Whether the session has completed `init`.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }
}

/// Owner of every live [`SessionRecord`]. Generic over the connection handle
/// so it can be exercised without sockets; the server instantiates it with
/// `actix_ws::Session`.
pub struct SessionRegistry<H> {
    sessions: HashMap<SessionId, SessionRecord<H>>,
    by_client: HashMap<ClientId, SessionId>,
}

impl<H: Clone> SessionRegistry<H> {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            by_client: HashMap::new(),
        }
    }

    /// Admit a connection in the unbound ("connecting") state.
    pub fn admit(&mut self, handle: H, remote_addr: Option<SocketAddr>) -> SessionId {
        let session_id = SessionId::generate();
        self.sessions.insert(
            session_id,
            SessionRecord {
                handle,
                remote_addr,
                binding: None,
            },
        );
        session_id
    }

    /// Bind a client identifier to the session, minting a fresh secret.
    ///
    /// Re-binding overwrites the session's previous binding, and a client
    /// identifier already held by another session is stolen from it (the
    /// older session drops back to unbound) so the index never duplicates.
    pub fn bind(
        &mut self,
        session_id: SessionId,
        client_id: ClientId,
    ) -> Result<SecretNumber, RegistryError> {
        if !self.sessions.contains_key(&session_id) {
            return Err(RegistryError::UnknownSession);
        }
        if let Some(holder) = self.by_client.get(&client_id).copied() {
            if holder != session_id {
                if let Some(stolen) = self.sessions.get_mut(&holder) {
                    stolen.binding = None;
                }
            }
        }
        let secret = SecretNumber::generate();
        let Some(record) = self.sessions.get_mut(&session_id) else {
            return Err(RegistryError::UnknownSession);
        };
        if let Some(previous) = record.binding.take() {
            if previous.client_id != client_id {
                self.by_client.remove(&previous.client_id);
            }
        }
        record.binding = Some(Binding {
            client_id: client_id.clone(),
            secret,
        });
        self.by_client.insert(client_id, session_id);
        Ok(secret)
    }

    /// Remove the session, returning its handle so the caller can terminate
    /// the underlying connection resource. Every exit path calls this.
    pub fn release(&mut self, session_id: SessionId) -> Option<H> {
        let record = self.sessions.remove(&session_id)?;
        if let Some(binding) = &record.binding {
            if self.by_client.get(&binding.client_id) == Some(&session_id) {
                self.by_client.remove(&binding.client_id);
            }
        }
        Some(record.handle)
    }

    /// Broadcast targets: every bound session. Sessions that never completed
    /// `init` are excluded.
    pub fn live_sessions(&self) -> Vec<(SessionId, H)> {
        self.sessions
            .iter()
            .filter(|(_, record)| record.is_bound())
            .map(|(session_id, record)| (*session_id, record.handle.clone()))
            .collect()
    }

    /// Validate a client-presented secret and clear the association on
    /// success: the session drops back to unbound and the index entry is
    /// removed, freeing the identifier for a re-associating client. Mismatch
    /// or absence fails with [`RegistryError::InvalidSecret`].
    pub fn verify_and_decouple(
        &mut self,
        client_id: &ClientId,
        secret: SecretNumber,
    ) -> Result<(), RegistryError> {
        let Some(session_id) = self.by_client.get(client_id).copied() else {
            return Err(RegistryError::InvalidSecret);
        };
        let Some(record) = self.sessions.get_mut(&session_id) else {
            return Err(RegistryError::InvalidSecret);
        };
        match &record.binding {
            Some(binding) if binding.secret == secret => {
                record.binding = None;
                self.by_client.remove(client_id);
                Ok(())
            }
            _ => Err(RegistryError::InvalidSecret),
        }
    }

    pub fn get(&self, session_id: SessionId) -> Option<&SessionRecord<H>> {
        self.sessions.get(&session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<H: Clone> Default for SessionRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct FakeHandle(u8);

    fn client(id: &str) -> ClientId {
        ClientId::new(id).expect("valid test client id")
    }

    fn registry() -> SessionRegistry<FakeHandle> {
        SessionRegistry::new()
    }

    fn wrong_secret(secret: SecretNumber) -> SecretNumber {
        if secret.value() == SecretNumber::MAX {
            SecretNumber::new(SecretNumber::MIN)
        } else {
            SecretNumber::new(secret.value() + 1)
        }
    }

    #[rstest]
    fn rejects_empty_client_ids() {
        assert_eq!(ClientId::new("  "), Err(RegistryError::EmptyClientId));
    }

    #[rstest]
    fn admitted_sessions_start_unbound_and_invisible_to_broadcast() {
        let mut registry = registry();
        let session_id = registry.admit(FakeHandle(1), None);
        assert!(!registry
            .get(session_id)
            .expect("session registered")
            .is_bound());
        assert!(registry.live_sessions().is_empty());
    }

    #[rstest]
    fn binding_makes_a_session_a_broadcast_target() {
        let mut registry = registry();
        let session_id = registry.admit(FakeHandle(1), None);
        let secret = registry
            .bind(session_id, client("c1"))
            .expect("bind succeeds");
        assert!((100_000..=999_999).contains(&secret.value()));
        assert_eq!(registry.live_sessions(), vec![(session_id, FakeHandle(1))]);
        assert_eq!(
            registry
                .get(session_id)
                .expect("session registered")
                .client_id()
                .map(AsRef::as_ref),
            Some("c1")
        );
    }

    #[rstest]
    fn binding_an_unknown_session_fails() {
        let mut registry = registry();
        let session_id = registry.admit(FakeHandle(1), None);
        assert!(registry.release(session_id).is_some());
        assert_eq!(
            registry.bind(session_id, client("c1")),
            Err(RegistryError::UnknownSession)
        );
    }

    #[rstest]
    fn rebinding_overwrites_instead_of_duplicating() {
        let mut registry = registry();
        let session_id = registry.admit(FakeHandle(1), None);
        registry
            .bind(session_id, client("c1"))
            .expect("first bind succeeds");
        registry
            .bind(session_id, client("c2"))
            .expect("rebind succeeds");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.live_sessions().len(), 1);
        assert_eq!(
            registry
                .get(session_id)
                .expect("session registered")
                .client_id()
                .map(AsRef::as_ref),
            Some("c2")
        );
        // The abandoned identifier is free again.
        let other = registry.admit(FakeHandle(2), None);
        registry
            .bind(other, client("c1"))
            .expect("freed identifier rebinds");
    }

    #[rstest]
    fn binding_steals_an_identifier_held_by_another_session() {
        let mut registry = registry();
        let first = registry.admit(FakeHandle(1), None);
        let second = registry.admit(FakeHandle(2), None);
        registry.bind(first, client("c1")).expect("bind succeeds");
        registry.bind(second, client("c1")).expect("steal succeeds");
        assert!(!registry.get(first).expect("session registered").is_bound());
        assert_eq!(registry.live_sessions(), vec![(second, FakeHandle(2))]);
    }

    #[rstest]
    fn release_prunes_the_session_and_its_index_entry() {
        let mut registry = registry();
        let session_id = registry.admit(FakeHandle(7), None);
        registry
            .bind(session_id, client("c1"))
            .expect("bind succeeds");
        assert_eq!(registry.release(session_id), Some(FakeHandle(7)));
        assert!(registry.is_empty());
        assert!(registry.live_sessions().is_empty());
        assert_eq!(registry.release(session_id), None, "second release no-ops");

        let replacement = registry.admit(FakeHandle(8), None);
        registry
            .bind(replacement, client("c1"))
            .expect("identifier is free after release");
    }

    #[rstest]
    fn verify_and_decouple_clears_the_association() {
        let mut registry = registry();
        let session_id = registry.admit(FakeHandle(1), None);
        let secret = registry
            .bind(session_id, client("c1"))
            .expect("bind succeeds");

        registry
            .verify_and_decouple(&client("c1"), secret)
            .expect("matching secret decouples");
        assert!(!registry
            .get(session_id)
            .expect("session still admitted")
            .is_bound());
        assert_eq!(
            registry.verify_and_decouple(&client("c1"), secret),
            Err(RegistryError::InvalidSecret),
            "association is gone"
        );
    }

    #[rstest]
    fn verify_fails_closed_on_mismatch_or_absence() {
        let mut registry = registry();
        let session_id = registry.admit(FakeHandle(1), None);
        let secret = registry
            .bind(session_id, client("c1"))
            .expect("bind succeeds");

        assert_eq!(
            registry.verify_and_decouple(&client("c1"), wrong_secret(secret)),
            Err(RegistryError::InvalidSecret)
        );
        assert!(
            registry
                .get(session_id)
                .expect("session registered")
                .is_bound(),
            "a failed attempt leaves the binding intact"
        );
        assert_eq!(
            registry.verify_and_decouple(&client("never-seen"), secret),
            Err(RegistryError::InvalidSecret)
        );
    }

    #[rstest]
    fn remote_addr_is_kept_for_diagnostics() {
        let mut registry = registry();
        let addr = "127.0.0.1:9000".parse().expect("valid test addr");
        let session_id = registry.admit(FakeHandle(1), Some(addr));
        assert_eq!(
            registry
                .get(session_id)
                .expect("session registered")
                .remote_addr(),
            Some(addr)
        );
    }
}

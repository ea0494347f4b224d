//! Per-connection message router.
//!
//! Keeps WebSocket framing and heartbeats at the edge while deferring ledger
//! and registry behaviour to the shared core. Inbound frames are handled to
//! completion, one at a time, under the core lock; malformed frames are
//! logged and dropped without ever closing the connection or producing an
//! error reply. The server pings every 5s and prunes a connection that has
//! been silent for 10s; tests shorten these intervals to speed up feedback.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use chrono::NaiveDate;
use tokio::time;
use tracing::{debug, warn};

use crate::domain::ledger::CalendarMonth;
use crate::domain::service::ResetVotesError;
use crate::domain::user::{DepartmentId, Nickname, UserId};
use crate::inbound::ws::protocol::{
    ClientMessage, ServerMessage, SignInRequest, StatisticsRequest, VoteRequest,
};
use crate::inbound::ws::registry::{ClientId, SessionId};
use crate::inbound::ws::state::WsState;

/// Time between heartbeats to the client (5s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max idle time before a client counts as dead (10s in production, shorter in tests).
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

/// Why the event loop stopped.
enum ExitReason {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Protocol(ProtocolError),
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

/// Drive one connection from admission to release.
pub(super) async fn handle_connection(
    state: WsState,
    session: Session,
    stream: MessageStream,
    remote_addr: Option<SocketAddr>,
) {
    let session_id = state.with_core(|core| core.sessions.admit(session.clone(), remote_addr));
    debug!(session_id = %session_id, remote_addr = ?remote_addr, "connection admitted");

    let mut connection = Connection {
        state: state.clone(),
        session_id,
        current_user: None,
    };
    let reason = connection.run(session, stream).await;
    log_exit(session_id, &reason);

    // Every exit path, abnormal ones included, releases the registry entry
    // and terminates the connection resource.
    let handle = state.with_core(|core| core.sessions.release(session_id));
    if let Some(handle) = handle {
        if let CloseAction::Close(close_reason) = close_action(&reason) {
            if handle.close(close_reason).await.is_err() {
                debug!(session_id = %session_id, "session already closed");
            }
        }
    }
}

struct Connection {
    state: WsState,
    session_id: SessionId,
    /// User most recently signed in over this connection; cleared on logout.
    current_user: Option<UserId>,
}

impl Connection {
    async fn run(&mut self, mut session: Session, mut stream: MessageStream) -> ExitReason {
        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);

        loop {
            let step = tokio::select! {
                _ = heartbeat.tick() => {
                    self.on_heartbeat(&mut session, &last_heartbeat).await
                }
                frame = stream.recv() => {
                    self.on_frame(&mut session, &mut last_heartbeat, frame).await
                }
            };
            if let Err(reason) = step {
                return reason;
            }
        }
    }

    async fn on_heartbeat(
        &mut self,
        session: &mut Session,
        last_heartbeat: &Instant,
    ) -> Result<(), ExitReason> {
        if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
            return Err(ExitReason::HeartbeatTimeout);
        }
        session.ping(b"").await.map_err(ExitReason::Network)
    }

    async fn on_frame(
        &mut self,
        session: &mut Session,
        last_heartbeat: &mut Instant,
        frame: Option<Result<Message, ProtocolError>>,
    ) -> Result<(), ExitReason> {
        let Some(frame) = frame else {
            return Err(ExitReason::StreamClosed);
        };
        let message = frame.map_err(ExitReason::Protocol)?;
        match message {
            Message::Ping(payload) => {
                *last_heartbeat = Instant::now();
                session.pong(&payload).await.map_err(ExitReason::Network)
            }
            Message::Text(text) => {
                *last_heartbeat = Instant::now();
                self.handle_text(session, text.as_ref()).await
            }
            Message::Pong(_) | Message::Binary(_) | Message::Continuation(_) | Message::Nop => {
                *last_heartbeat = Instant::now();
                Ok(())
            }
            Message::Close(reason) => Err(ExitReason::ClientClosed(reason)),
        }
    }

    /// Parse → validate → execute one frame. A failure in the first two
    /// stages is terminal for this frame only: log and carry on.
    async fn handle_text(&mut self, session: &mut Session, text: &str) -> Result<(), ExitReason> {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "ignoring malformed message");
                return Ok(());
            }
        };

        match message {
            ClientMessage::Init(client_id) => self.handle_init(session, client_id).await,
            ClientMessage::Ping => self.reply(session, &ServerMessage::Pong).await,
            ClientMessage::Vote(request) => self.handle_vote(session, request).await,
            ClientMessage::GetStatistics(request) => self.handle_statistics(session, request).await,
            ClientMessage::SignIn(request) => self.handle_sign_in(session, request).await,
            ClientMessage::Logout => {
                self.handle_logout();
                Ok(())
            }
            ClientMessage::ResetVotes => {
                self.handle_reset().await;
                Ok(())
            }
        }
    }

    async fn handle_init(
        &mut self,
        session: &mut Session,
        client_id: String,
    ) -> Result<(), ExitReason> {
        let client_id = match ClientId::new(client_id) {
            Ok(client_id) => client_id,
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "ignoring init");
                return Ok(());
            }
        };
        let bound = self.state.with_core(|core| {
            core.sessions
                .bind(self.session_id, client_id.clone())
                .map(|_secret| core.voting.default_department_snapshot())
        });
        match bound {
            Ok(snapshot) => {
                debug!(session_id = %self.session_id, client_id = %client_id, "session bound");
                self.reply(session, &ServerMessage::update_votes(&snapshot))
                    .await
            }
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "init bind rejected");
                Ok(())
            }
        }
    }

    async fn handle_vote(
        &mut self,
        session: &mut Session,
        request: VoteRequest,
    ) -> Result<(), ExitReason> {
        let user_id = match UserId::new(request.user_id) {
            Ok(user_id) => user_id,
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "ignoring vote");
                return Ok(());
            }
        };

        // Day 0 is a pure query: no mutation, reply to the requester only.
        if request.day == 0 {
            let snapshot = self.state.with_core(|core| core.voting.votes_snapshot(&user_id));
            return self
                .reply(session, &ServerMessage::update_votes(&snapshot))
                .await;
        }

        let Some(date) = NaiveDate::from_ymd_opt(request.year, request.month, request.day) else {
            warn!(
                session_id = %self.session_id,
                year = request.year,
                month = request.month,
                day = request.day,
                "ignoring vote for an invalid date"
            );
            return Ok(());
        };

        let (snapshot, targets) = self.state.with_core(|core| {
            let snapshot = core.voting.toggle_vote(&user_id, date);
            (snapshot, core.sessions.live_sessions())
        });
        self.broadcast(&ServerMessage::update_votes(&snapshot), targets)
            .await;
        Ok(())
    }

    async fn handle_statistics(
        &mut self,
        session: &mut Session,
        request: StatisticsRequest,
    ) -> Result<(), ExitReason> {
        let month = match CalendarMonth::new(request.year, request.month) {
            Ok(month) => month,
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "ignoring getStatistics");
                return Ok(());
            }
        };
        let statistics = self
            .state
            .with_core(|core| core.voting.month_statistics(self.current_user.as_ref(), month));
        self.reply(session, &ServerMessage::statistics(statistics))
            .await
    }

    async fn handle_sign_in(
        &mut self,
        session: &mut Session,
        request: SignInRequest,
    ) -> Result<(), ExitReason> {
        let user_id = match UserId::new(request.user_id) {
            Ok(user_id) => user_id,
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "ignoring signIn");
                return Ok(());
            }
        };
        let nickname = match Nickname::new(request.nickname) {
            Ok(nickname) => nickname,
            Err(error) => {
                warn!(session_id = %self.session_id, error = %error, "ignoring signIn");
                return Ok(());
            }
        };
        // An empty department at sign-in lands the user in the default one.
        let department = if request.department.trim().is_empty() {
            DepartmentId::default_department()
        } else {
            match DepartmentId::new(request.department) {
                Ok(department) => department,
                Err(error) => {
                    warn!(session_id = %self.session_id, error = %error, "ignoring signIn");
                    return Ok(());
                }
            }
        };

        let outcome = self
            .state
            .with_core(|core| core.voting.sign_in(user_id.clone(), department, nickname));
        debug!(
            session_id = %self.session_id,
            user_id = %user_id,
            department = %outcome.department,
            "user signed in"
        );
        self.current_user = Some(user_id);

        if outcome.is_manager {
            self.reply(session, &ServerMessage::ManagerAuthenticated)
                .await
        } else {
            Ok(())
        }
    }

    fn handle_logout(&mut self) {
        let Some(user_id) = self.current_user.take() else {
            debug!(session_id = %self.session_id, "ignoring logout with no signed-in user");
            return;
        };
        let removed = self.state.with_core(|core| core.voting.sign_out(&user_id));
        if removed {
            debug!(session_id = %self.session_id, user_id = %user_id, "user logged out");
        }
    }

    async fn handle_reset(&mut self) {
        let Some(user_id) = self.current_user.clone() else {
            debug!(session_id = %self.session_id, "dropping resetVotes from an anonymous session");
            return;
        };
        let outcome = self.state.with_core(|core| {
            core.voting
                .reset_votes(&user_id)
                .map(|snapshot| (snapshot, core.sessions.live_sessions()))
        });
        match outcome {
            Ok((snapshot, targets)) => {
                self.broadcast(&ServerMessage::update_votes(&snapshot), targets)
                    .await;
            }
            Err(ResetVotesError::Unauthorized) => {
                debug!(
                    session_id = %self.session_id,
                    user_id = %user_id,
                    "dropping unauthorized resetVotes"
                );
            }
        }
    }

    async fn reply(
        &self,
        session: &mut Session,
        message: &ServerMessage,
    ) -> Result<(), ExitReason> {
        let Some(body) = encode(message) else {
            return Ok(());
        };
        session.text(body).await.map_err(ExitReason::Network)
    }

    /// Best-effort fan-out to every bound session; peers that cannot be
    /// written are skipped without affecting the rest.
    async fn broadcast(&self, message: &ServerMessage, targets: Vec<(SessionId, Session)>) {
        let Some(body) = encode(message) else {
            return;
        };
        for (peer_id, mut peer) in targets {
            if peer.text(body.clone()).await.is_err() {
                debug!(peer = %peer_id, "skipping unwritable session during broadcast");
            }
        }
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(body) => Some(body),
        Err(error) => {
            warn!(error = %error, "failed to serialize server message");
            None
        }
    }
}

fn log_exit(session_id: SessionId, reason: &ExitReason) {
    match reason {
        ExitReason::HeartbeatTimeout => {
            warn!(session_id = %session_id, "heartbeat timeout; pruning session");
        }
        ExitReason::Protocol(error) => {
            warn!(session_id = %session_id, error = %error, "websocket protocol error");
        }
        ExitReason::Network(error) => {
            warn!(session_id = %session_id, error = %error, "send failed; closing session");
        }
        ExitReason::ClientClosed(_) | ExitReason::StreamClosed => {
            debug!(session_id = %session_id, "client disconnected");
        }
    }
}

fn close_action(reason: &ExitReason) -> CloseAction {
    match reason {
        ExitReason::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Normal,
            description: Some("heartbeat timeout".to_owned()),
        })),
        ExitReason::Protocol(_) => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Protocol,
            description: Some("protocol error".to_owned()),
        })),
        ExitReason::ClientClosed(reason) => CloseAction::Close(reason.clone()),
        ExitReason::StreamClosed | ExitReason::Network(_) => CloseAction::None,
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;

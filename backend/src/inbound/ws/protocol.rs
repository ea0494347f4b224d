//! Wire-level message definitions for the WebSocket protocol.
//!
//! Every frame is a JSON envelope `{ "type": ..., "data": ... }`; unit
//! variants carry no `data` key at all. Domain snapshots are converted into
//! these payloads before serialization so the domain types never leak wire
//! concerns.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::domain::ledger::VotesSnapshot;
use crate::domain::service::VoteStatistics;

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Bind this connection to a client-chosen identifier.
    Init(String),
    Ping,
    Vote(VoteRequest),
    GetStatistics(StatisticsRequest),
    SignIn(SignInRequest),
    Logout,
    ResetVotes,
}

/// Payload of a `vote` message. Months are 1–12.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub year: i32,
    pub month: u32,
    /// 0 turns the message into a pure query.
    pub day: u32,
    pub client_id: String,
    pub user_id: String,
}

/// Payload of a `getStatistics` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatisticsRequest {
    pub year: i32,
    pub month: u32,
}

/// Payload of a `signIn` message. An empty department string lands the user
/// in the default department.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub user_id: String,
    pub department: String,
    pub nickname: String,
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    UpdateVotes(BTreeMap<String, Vec<String>>),
    UpdateVoteStatistic(StatisticsPayload),
    ManagerAuthenticated,
    Pong,
}

/// Payload of `updateVoteStatistic`. `the_day` is the day-of-month of the
/// most voted date and is omitted when the month holds no votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsPayload {
    pub voters_total: usize,
    pub available_total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub the_day: Option<u32>,
}

impl From<VoteStatistics> for StatisticsPayload {
    fn from(value: VoteStatistics) -> Self {
        Self {
            voters_total: value.voters_total,
            available_total: value.available_total,
            the_day: value.the_day.map(|date| date.day()),
        }
    }
}

impl ServerMessage {
    /// Build an `updateVotes` frame from a ledger snapshot, formatting date
    /// keys as `YYYY-MM-DD`.
    pub fn update_votes(snapshot: &VotesSnapshot) -> Self {
        Self::UpdateVotes(
            snapshot
                .iter()
                .map(|(date, voters)| {
                    (
                        date.format("%Y-%m-%d").to_string(),
                        voters.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect(),
        )
    }

    /// Build an `updateVoteStatistic` frame.
    pub fn statistics(statistics: VoteStatistics) -> Self {
        Self::UpdateVoteStatistic(statistics.into())
    }
}

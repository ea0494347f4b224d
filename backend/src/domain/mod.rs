//! Domain state and operations.
//!
//! Everything here is transport agnostic: ledgers, departments, users, and
//! the voting service the inbound adapters call into. State is explicitly
//! owned and injected rather than ambient, so tests run isolated instances
//! concurrently.

pub mod department;
pub mod ledger;
pub mod service;
pub mod user;

pub use self::department::{Department, DepartmentRegistry, MemberMessage};
pub use self::ledger::{CalendarMonth, MonthError, VoteLedger, VotesSnapshot};
pub use self::service::{ResetVotesError, SignInOutcome, VoteStatistics, VotingService};
pub use self::user::{
    DepartmentId, Nickname, UserDirectory, UserId, UserProfile, ValidationError,
};

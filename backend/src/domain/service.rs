//! Voting service: the operation layer behind the message router.
//!
//! The service owns the cross-registry flows so inbound adapters only
//! translate wire payloads: sign-in wires directory, membership and
//! ownership together; votes resolve to the voting user's department; reset
//! is gated on manager or owner privilege.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::department::DepartmentRegistry;
use crate::domain::ledger::{CalendarMonth, VotesSnapshot};
use crate::domain::user::{DepartmentId, Nickname, UserDirectory, UserId, UserProfile};

/// Aggregate month statistics for one department.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteStatistics {
    /// Distinct users holding at least one vote in the department.
    pub voters_total: usize,
    /// Vote count on the most voted date of the month; 0 when none.
    pub available_total: usize,
    /// Most voted date of the month, earliest date winning ties.
    pub the_day: Option<NaiveDate>,
}

/// Rejection for the administrative ledger reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResetVotesError {
    #[error("requesting user is neither a manager nor the department owner")]
    Unauthorized,
}

/// Result of a sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    /// Department the user landed in.
    pub department: DepartmentId,
    /// Whether the new profile carries manager rights.
    pub is_manager: bool,
}

/// Transport-agnostic operations over the user directory and department
/// registry. One instance per server; tests run isolated instances.
#[derive(Debug, Default)]
pub struct VotingService {
    users: UserDirectory,
    departments: DepartmentRegistry,
}

impl VotingService {
    pub fn new() -> Self {
        Self {
            users: UserDirectory::new(),
            departments: DepartmentRegistry::new(),
        }
    }

    /// Snapshot served to freshly initialised sessions.
    pub fn default_department_snapshot(&mut self) -> VotesSnapshot {
        self.departments
            .get_or_create(&DepartmentId::default_department())
            .ledger()
            .all_votes()
    }

    /// Toggle a vote: record when absent, withdraw when present. Returns the
    /// department snapshot after the change.
    pub fn toggle_vote(&mut self, user_id: &UserId, date: NaiveDate) -> VotesSnapshot {
        let department = self.users.department_of(user_id);
        let ledger = self.departments.get_or_create(&department).ledger_mut();
        if ledger.has_voted(date, user_id) {
            ledger.withdraw_vote(date, user_id);
        } else {
            ledger.record_vote(date, user_id.clone());
        }
        ledger.all_votes()
    }

    /// Read-only snapshot of the department the user votes in.
    pub fn votes_snapshot(&mut self, user_id: &UserId) -> VotesSnapshot {
        let department = self.users.department_of(user_id);
        self.departments
            .get_or_create(&department)
            .ledger()
            .all_votes()
    }

    /// Month statistics for the requester's department; anonymous requesters
    /// read the default department.
    pub fn month_statistics(
        &mut self,
        requester: Option<&UserId>,
        month: CalendarMonth,
    ) -> VoteStatistics {
        let department = requester.map_or_else(DepartmentId::default_department, |user_id| {
            self.users.department_of(user_id)
        });
        let ledger = self.departments.get_or_create(&department).ledger();
        let most_voted = ledger.most_voted_date(month);
        VoteStatistics {
            voters_total: ledger.unique_voters(),
            available_total: most_voted.map_or(0, |(_, count)| count),
            the_day: most_voted.map(|(date, _)| date),
        }
    }

    /// Create or replace the profile, join the department, and claim its
    /// ownership when it has none. Re-signing-in under a different
    /// department leaves the previous one first.
    pub fn sign_in(
        &mut self,
        user_id: UserId,
        department: DepartmentId,
        nickname: Nickname,
    ) -> SignInOutcome {
        if let Some(previous) = self.users.get(&user_id) {
            if previous.department() != &department {
                let left = previous.department().clone();
                self.departments.remove_member(&left, &user_id);
            }
        }
        let profile = UserProfile::new(department.clone(), nickname);
        let is_manager = profile.is_manager();
        self.users.sign_in(user_id.clone(), profile);
        self.departments.add_member(&department, user_id.clone());
        self.departments.assign_owner_if_absent(&department, &user_id);
        SignInOutcome {
            department,
            is_manager,
        }
    }

    /// Explicit logout: destroy the profile and leave the department.
    /// Returns false when the user was not signed in.
    pub fn sign_out(&mut self, user_id: &UserId) -> bool {
        let Some(profile) = self.users.sign_out(user_id) else {
            return false;
        };
        self.departments.remove_member(profile.department(), user_id);
        true
    }

    /// Clear the requester's department ledger. Callers who are neither a
    /// manager nor the department owner change nothing.
    pub fn reset_votes(&mut self, requester: &UserId) -> Result<VotesSnapshot, ResetVotesError> {
        let department = self.users.department_of(requester);
        let authorized = self.users.is_manager(requester)
            || self.departments.is_owner(&department, requester);
        if !authorized {
            return Err(ResetVotesError::Unauthorized);
        }
        let ledger = self.departments.get_or_create(&department).ledger_mut();
        ledger.clear();
        Ok(ledger.all_votes())
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn departments(&self) -> &DepartmentRegistry {
        &self.departments
    }
}

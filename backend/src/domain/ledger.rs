//! Per-department vote ledger.
//!
//! The ledger is a sparse map from calendar date to the users who voted for
//! it. Entries exist only while at least one vote is recorded, so its size is
//! bounded by the count of dates holding votes. Voter order within a date is
//! insertion order.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::domain::user::UserId;

/// Snapshot of a ledger: date → voters in the order their votes arrived.
pub type VotesSnapshot = BTreeMap<NaiveDate, Vec<UserId>>;

/// Calendar month scoping vote statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

/// Rejection for out-of-range month numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MonthError {
    #[error("month must be between 1 and 12, got {0}")]
    OutOfRange(u32),
}

impl CalendarMonth {
    /// Construct a month; `month` is the 1–12 calendar month number.
    pub fn new(year: i32, month: u32) -> Result<Self, MonthError> {
        if !(1..=12).contains(&month) {
            return Err(MonthError::OutOfRange(month));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

/// Map from calendar date to the set of users who voted for it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VoteLedger {
    votes: BTreeMap<NaiveDate, Vec<UserId>>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user_id` to the voters for `date`, creating the entry if absent.
    /// Idempotent: voting twice has no additional effect.
    pub fn record_vote(&mut self, date: NaiveDate, user_id: UserId) {
        let voters = self.votes.entry(date).or_default();
        if !voters.contains(&user_id) {
            voters.push(user_id);
        }
    }

    /// Remove `user_id`'s vote for `date`; the entry is deleted when its last
    /// vote is withdrawn. No-op when the date or user was never present.
    pub fn withdraw_vote(&mut self, date: NaiveDate, user_id: &UserId) {
        let Some(voters) = self.votes.get_mut(&date) else {
            return;
        };
        voters.retain(|voter| voter != user_id);
        if voters.is_empty() {
            self.votes.remove(&date);
        }
    }

    /// Whether `user_id` currently holds a vote for `date`.
    pub fn has_voted(&self, date: NaiveDate, user_id: &UserId) -> bool {
        self.votes
            .get(&date)
            .is_some_and(|voters| voters.contains(user_id))
    }

    /// Copy-out snapshot of every entry; the internal sets are never exposed.
    pub fn all_votes(&self) -> VotesSnapshot {
        self.votes.clone()
    }

    /// The date within `month` holding the most votes, with its vote count.
    /// Ties break toward the earliest date; `None` when the month holds no
    /// votes.
    pub fn most_voted_date(&self, month: CalendarMonth) -> Option<(NaiveDate, usize)> {
        let mut best: Option<(NaiveDate, usize)> = None;
        for (date, voters) in &self.votes {
            if !month.contains(*date) {
                continue;
            }
            let count = voters.len();
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((*date, count)),
            }
        }
        best
    }

    /// Count of distinct users holding at least one vote.
    pub fn unique_voters(&self) -> usize {
        let mut seen = HashSet::new();
        for voters in self.votes.values() {
            for voter in voters {
                seen.insert(voter);
            }
        }
        seen.len()
    }

    /// Drop every entry. Callers gate this behind the owner/manager check.
    pub fn clear(&mut self) {
        self.votes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
    }

    fn uid(id: &str) -> UserId {
        UserId::new(id).expect("valid test user id")
    }

    fn voters(snapshot: &VotesSnapshot, on: NaiveDate) -> Vec<&str> {
        snapshot
            .get(&on)
            .map(|entries| entries.iter().map(AsRef::as_ref).collect())
            .unwrap_or_default()
    }

    #[rstest]
    fn recording_twice_equals_recording_once() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        let once = ledger.clone();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        assert_eq!(ledger, once);
    }

    #[rstest]
    fn withdraw_after_record_restores_prior_state() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 9), uid("u2"));
        let before = ledger.clone();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        ledger.withdraw_vote(date(2025, 6, 10), &uid("u1"));
        assert_eq!(ledger, before);
    }

    #[rstest]
    fn entries_exist_iff_their_vote_set_is_non_empty() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        ledger.record_vote(date(2025, 6, 10), uid("u2"));
        ledger.withdraw_vote(date(2025, 6, 10), &uid("u1"));
        assert_eq!(voters(&ledger.all_votes(), date(2025, 6, 10)), ["u2"]);
        ledger.withdraw_vote(date(2025, 6, 10), &uid("u2"));
        assert!(
            !ledger.all_votes().contains_key(&date(2025, 6, 10)),
            "entry must vanish with its last vote"
        );
        assert!(ledger.is_empty());
    }

    #[rstest]
    fn voters_keep_insertion_order() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        ledger.record_vote(date(2025, 6, 10), uid("u2"));
        assert_eq!(voters(&ledger.all_votes(), date(2025, 6, 10)), ["u1", "u2"]);
    }

    #[rstest]
    fn withdrawing_an_unknown_vote_is_a_no_op() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        let before = ledger.clone();
        ledger.withdraw_vote(date(2025, 6, 11), &uid("u1"));
        ledger.withdraw_vote(date(2025, 6, 10), &uid("stranger"));
        assert_eq!(ledger, before);
    }

    #[rstest]
    fn snapshot_is_a_copy() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        let mut snapshot = ledger.all_votes();
        snapshot.clear();
        assert!(!ledger.is_empty());
    }

    #[rstest]
    fn most_voted_date_prefers_the_largest_set() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        ledger.record_vote(date(2025, 6, 12), uid("u1"));
        ledger.record_vote(date(2025, 6, 12), uid("u2"));
        let month = CalendarMonth::new(2025, 6).expect("valid month");
        assert_eq!(ledger.most_voted_date(month), Some((date(2025, 6, 12), 2)));
    }

    #[rstest]
    fn most_voted_date_breaks_ties_toward_the_earliest_date() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 20), uid("u1"));
        ledger.record_vote(date(2025, 6, 5), uid("u2"));
        let month = CalendarMonth::new(2025, 6).expect("valid month");
        assert_eq!(ledger.most_voted_date(month), Some((date(2025, 6, 5), 1)));
    }

    #[rstest]
    fn most_voted_date_ignores_other_months() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 5, 31), uid("u1"));
        ledger.record_vote(date(2025, 7, 1), uid("u1"));
        let month = CalendarMonth::new(2025, 6).expect("valid month");
        assert_eq!(ledger.most_voted_date(month), None);
    }

    #[rstest]
    #[case(0)]
    #[case(13)]
    fn rejects_out_of_range_months(#[case] month: u32) {
        assert_eq!(
            CalendarMonth::new(2025, month),
            Err(MonthError::OutOfRange(month))
        );
    }

    #[rstest]
    fn unique_voters_counts_users_once_across_dates() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        ledger.record_vote(date(2025, 6, 11), uid("u1"));
        ledger.record_vote(date(2025, 6, 11), uid("u2"));
        assert_eq!(ledger.unique_voters(), 2);
    }

    #[rstest]
    fn clear_empties_the_ledger() {
        let mut ledger = VoteLedger::new();
        ledger.record_vote(date(2025, 6, 10), uid("u1"));
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.all_votes(), VotesSnapshot::new());
    }
}

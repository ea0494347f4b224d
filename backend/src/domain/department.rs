//! Departments: ownership, membership, and their vote ledgers.
//!
//! Departments are created lazily on first reference. The default department
//! always exists and receives users who never joined one.
//!
//! Invariant: a department's owner, when present, is a current member.
//! Ownership is claimed by the first member and cleared when that member
//! leaves, so a later join can claim it again.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::ledger::VoteLedger;
use crate::domain::user::{DepartmentId, UserId};

/// A named group of users sharing one vote ledger and at most one owner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Department {
    owner: Option<UserId>,
    members: BTreeSet<UserId>,
    ledger: VoteLedger,
}

impl Department {
    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut VoteLedger {
        &mut self.ledger
    }
}

/// Message queued for one recipient by
/// [`DepartmentRegistry::direct_messages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberMessage {
    pub recipient: UserId,
    pub body: String,
}

/// Process-wide owner of every [`Department`] and its ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentRegistry {
    departments: BTreeMap<DepartmentId, Department>,
}

impl DepartmentRegistry {
    /// Registry with the default department already materialised.
    pub fn new() -> Self {
        let mut departments = BTreeMap::new();
        departments.insert(DepartmentId::default_department(), Department::default());
        Self { departments }
    }

    /// Return the department, creating an ownerless, memberless one with an
    /// empty ledger when absent. Always succeeds.
    pub fn get_or_create(&mut self, department_id: &DepartmentId) -> &mut Department {
        self.departments.entry(department_id.clone()).or_default()
    }

    pub fn get(&self, department_id: &DepartmentId) -> Option<&Department> {
        self.departments.get(department_id)
    }

    /// Claim ownership for `user_id` when the department has no owner; no-op
    /// otherwise. Only current members can claim, which keeps the
    /// owner-is-a-member invariant true by construction.
    pub fn assign_owner_if_absent(&mut self, department_id: &DepartmentId, user_id: &UserId) {
        let department = self.get_or_create(department_id);
        if department.owner.is_none() && department.members.contains(user_id) {
            department.owner = Some(user_id.clone());
        }
    }

    /// Ownership predicate; false when the department or owner is absent.
    pub fn is_owner(&self, department_id: &DepartmentId, user_id: &UserId) -> bool {
        self.departments
            .get(department_id)
            .is_some_and(|department| department.owner.as_ref() == Some(user_id))
    }

    pub fn add_member(&mut self, department_id: &DepartmentId, user_id: UserId) {
        self.get_or_create(department_id).members.insert(user_id);
    }

    /// Remove a member; removing the owner clears ownership so a later join
    /// can claim the department.
    pub fn remove_member(&mut self, department_id: &DepartmentId, user_id: &UserId) {
        let Some(department) = self.departments.get_mut(department_id) else {
            return;
        };
        department.members.remove(user_id);
        if department.owner.as_ref() == Some(user_id) {
            department.owner = None;
        }
    }

    /// Snapshot of member identifiers; empty when the department is absent.
    pub fn members(&self, department_id: &DepartmentId) -> Vec<UserId> {
        self.departments
            .get(department_id)
            .map(|department| department.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Relay list for an intra-department message: the requested recipients
    /// who are current members, excluding the sender. Empty when the
    /// department is absent.
    pub fn direct_messages(
        &self,
        department_id: &DepartmentId,
        sender: &UserId,
        recipients: &[UserId],
        body: &str,
    ) -> Vec<MemberMessage> {
        let Some(department) = self.departments.get(department_id) else {
            return Vec::new();
        };
        department
            .members
            .iter()
            .filter(|member| *member != sender && recipients.contains(member))
            .map(|member| MemberMessage {
                recipient: member.clone(),
                body: body.to_owned(),
            })
            .collect()
    }
}

impl Default for DepartmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

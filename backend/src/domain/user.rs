//! User identity, sign-in profiles, and manager derivation.
//!
//! Profiles live process-wide, keyed by the client-supplied user identifier,
//! and are created and destroyed by explicit sign-in/logout events. A
//! disconnect leaves the profile in place; identifiers stay stable across
//! reconnects.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Department whose privileged member administers vote ledgers.
pub const MANAGER_DEPARTMENT: &str = "ulsanedu";
/// Nickname granting manager rights within the privileged department.
pub const MANAGER_NICKNAME: &str = "caconam";

/// Identifier of the department users land in when they have not joined one.
pub const DEFAULT_DEPARTMENT: &str = "floating";

/// Validation errors returned by the identity newtypes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("user id must not be empty")]
    EmptyUserId,
    #[error("department id must not be empty")]
    EmptyDepartmentId,
    #[error("nickname must not be empty")]
    EmptyNickname,
}

/// Client-supplied user identifier, stable across reconnects.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Validate and construct a [`UserId`].
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// Department identifier used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepartmentId(String);

impl DepartmentId {
    /// Validate and construct a [`DepartmentId`].
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyDepartmentId);
        }
        Ok(Self(id))
    }

    /// The always-present department for users without an explicit one.
    pub fn default_department() -> Self {
        Self(DEFAULT_DEPARTMENT.to_owned())
    }
}

impl AsRef<str> for DepartmentId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DepartmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<DepartmentId> for String {
    fn from(value: DepartmentId) -> Self {
        value.0
    }
}

/// Display name presented at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nickname(String);

impl Nickname {
    /// Validate and construct a [`Nickname`].
    pub fn new(nickname: impl Into<String>) -> Result<Self, ValidationError> {
        let nickname = nickname.into();
        if nickname.trim().is_empty() {
            return Err(ValidationError::EmptyNickname);
        }
        Ok(Self(nickname))
    }
}

impl AsRef<str> for Nickname {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Nickname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Signed-in user state.
///
/// The manager flag is derived once at construction: it is true iff the
/// department is [`MANAGER_DEPARTMENT`] and the nickname is
/// [`MANAGER_NICKNAME`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    department: DepartmentId,
    nickname: Nickname,
    is_manager: bool,
}

impl UserProfile {
    /// Build a profile, deriving the manager flag.
    pub fn new(department: DepartmentId, nickname: Nickname) -> Self {
        let is_manager =
            department.as_ref() == MANAGER_DEPARTMENT && nickname.as_ref() == MANAGER_NICKNAME;
        Self {
            department,
            nickname,
            is_manager,
        }
    }

    /// Department the user signed into.
    pub fn department(&self) -> &DepartmentId {
        &self.department
    }

    /// Display name presented at sign-in.
    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    /// Whether this user may perform administrative actions.
    pub fn is_manager(&self) -> bool {
        self.is_manager
    }
}

/// Process-wide map of signed-in users.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: HashMap<UserId, UserProfile>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the profile for `user_id`, returning any replaced
    /// profile.
    pub fn sign_in(&mut self, user_id: UserId, profile: UserProfile) -> Option<UserProfile> {
        self.users.insert(user_id, profile)
    }

    /// Destroy the profile for `user_id`, returning it when one existed.
    pub fn sign_out(&mut self, user_id: &UserId) -> Option<UserProfile> {
        self.users.remove(user_id)
    }

    pub fn get(&self, user_id: &UserId) -> Option<&UserProfile> {
        self.users.get(user_id)
    }

    /// Manager predicate; false for users who never signed in.
    pub fn is_manager(&self, user_id: &UserId) -> bool {
        self.users.get(user_id).is_some_and(UserProfile::is_manager)
    }

    /// Department a user belongs to, falling back to the default department
    /// for users who never signed in.
    pub fn department_of(&self, user_id: &UserId) -> DepartmentId {
        self.users
            .get(user_id)
            .map_or_else(DepartmentId::default_department, |profile| {
                profile.department().clone()
            })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

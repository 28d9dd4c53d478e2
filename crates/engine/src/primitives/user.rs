//! User: accounts with a unique username
//!
//! Usernames are lower-cased, 3 to 64 characters of `[a-z0-9_.-]`, and
//! unique across the store. Password hashes are produced upstream and
//! stored opaquely.

use planstore_core::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::required_text;
use crate::entity::{Entity, UniqueKey};

const MIN_USERNAME_CHARS: usize = 3;
const MAX_USERNAME_CHARS: usize = 64;
const MAX_DISPLAY_NAME_CHARS: usize = 100;
const MAX_PASSWORD_HASH_CHARS: usize = 512;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages accounts and all plans
    Admin,
    /// Writes plans for athletes
    Coach,
    /// Follows plans
    Athlete,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Coach => "coach",
            Role::Athlete => "athlete",
        };
        f.write_str(name)
    }
}

/// Normalized user fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFields {
    /// Unique login name
    pub username: String,
    /// Name shown in the UI
    pub display_name: String,
    /// Opaque password hash
    pub password_hash: String,
    /// Account role
    pub role: Role,
}

/// Full user input for create and replace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    /// Login name
    pub username: String,
    /// Display name; the username if absent or blank
    #[serde(default)]
    pub display_name: Option<String>,
    /// Password hash
    pub password_hash: String,
    /// Role
    pub role: Role,
}

impl UserDraft {
    /// Draft with the required fields
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>, role: Role) -> Self {
        UserDraft {
            username: username.into(),
            display_name: None,
            password_hash: password_hash.into(),
            role,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Partial user input; absent fields are left as they are
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    /// New login name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// New display name; blank falls back to the username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New password hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    /// New role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserPatch {
    /// Empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the username
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Change the display name
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Change the password hash
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Change the role
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// User list filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    role: Option<Role>,
}

impl UserFilter {
    /// Every user
    pub fn all() -> Self {
        Self::default()
    }

    /// Only users with `role`
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

/// User entity
#[derive(Debug, Clone, Copy)]
pub struct User;

impl Entity for User {
    const KIND: &'static str = "user";
    const BACKUP_FORMAT_ID: &'static str = "planstore.users";
    const BACKUP_VERSION: u32 = 1;

    type Fields = UserFields;
    type Draft = UserDraft;
    type Patch = UserPatch;
    type Filter = UserFilter;
    type SortKey = String;

    fn normalize(draft: UserDraft) -> Result<UserFields, ValidationError> {
        let username = normalize_username(&draft.username)?;
        let display_name = display_name_or(draft.display_name.as_deref(), &username)?;
        let password_hash =
            required_text("passwordHash", &draft.password_hash, MAX_PASSWORD_HASH_CHARS)?;
        Ok(UserFields {
            username,
            display_name,
            password_hash,
            role: draft.role,
        })
    }

    fn apply_patch(current: &UserFields, patch: UserPatch) -> Result<UserFields, ValidationError> {
        let mut next = current.clone();
        if let Some(username) = patch.username {
            next.username = normalize_username(&username)?;
            // A fallback display name follows the rename
            if current.display_name == current.username {
                next.display_name = next.username.clone();
            }
        }
        if let Some(name) = patch.display_name {
            next.display_name = display_name_or(Some(&name), &next.username)?;
        }
        if let Some(hash) = patch.password_hash {
            next.password_hash = required_text("passwordHash", &hash, MAX_PASSWORD_HASH_CHARS)?;
        }
        if let Some(role) = patch.role {
            next.role = role;
        }
        Ok(next)
    }

    fn renormalize(fields: UserFields) -> Result<UserFields, ValidationError> {
        Self::normalize(UserDraft {
            username: fields.username,
            display_name: Some(fields.display_name),
            password_hash: fields.password_hash,
            role: fields.role,
        })
    }

    fn sort_key(fields: &UserFields) -> String {
        fields.username.clone()
    }

    fn matches(fields: &UserFields, filter: &UserFilter) -> bool {
        filter.role.map_or(true, |r| r == fields.role)
    }

    fn unique_key(fields: &UserFields) -> Option<UniqueKey> {
        Some(UniqueKey {
            field: "username",
            value: fields.username.clone(),
        })
    }
}

fn normalize_username(value: &str) -> Result<String, ValidationError> {
    let username = value.trim().to_lowercase();
    let len = username.chars().count();
    if !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&len) {
        return Err(ValidationError::new(
            "username",
            format!(
                "must be {} to {} characters, got {}",
                MIN_USERNAME_CHARS, MAX_USERNAME_CHARS, len
            ),
        ));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-')))
    {
        return Err(ValidationError::new(
            "username",
            format!("may not contain '{}'", bad),
        ));
    }
    Ok(username)
}

fn display_name_or(name: Option<&str>, username: &str) -> Result<String, ValidationError> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => required_text("displayName", n, MAX_DISPLAY_NAME_CHARS),
        _ => Ok(username.to_string()),
    }
}

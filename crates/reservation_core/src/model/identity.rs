//! Identity record and login/signup validation.
//!
//! # Invariants
//! - `id` is a generated UUID string fixed for the lifetime of the record.
//! - `ProfileUpdate` cannot carry an `id`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Display name used when an email has no local part.
pub const DEFAULT_DISPLAY_NAME: &str = "New User";

/// Currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl IdentityRecord {
    /// Creates a record with a freshly generated id.
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            name: name.into(),
            phone: None,
            timezone: None,
        }
    }

    /// Applies a shallow field merge; `None` fields are left untouched.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(phone) = update.phone {
            self.phone = Some(phone);
        }
        if let Some(timezone) = update.timezone {
            self.timezone = Some(timezone);
        }
    }
}

/// Partial profile edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub timezone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.name.is_none()
            && self.phone.is_none()
            && self.timezone.is_none()
    }
}

/// Derives a display name from the local part of an email address.
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    if local.is_empty() {
        DEFAULT_DISPLAY_NAME.to_string()
    } else {
        local.to_string()
    }
}

/// Missing required login/signup input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// `login` called with an empty email or password.
    MissingCredentials,
    /// `signup` called with an empty email, password or name.
    MissingSignupFields,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCredentials => write!(f, "email and password are required"),
            Self::MissingSignupFields => write!(f, "all fields are required"),
        }
    }
}

impl Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::{display_name_from_email, IdentityRecord, ProfileUpdate, DEFAULT_DISPLAY_NAME};

    #[test]
    fn display_name_uses_local_part() {
        assert_eq!(display_name_from_email("ada@example.com"), "ada");
        assert_eq!(display_name_from_email("no-at-sign"), "no-at-sign");
        assert_eq!(display_name_from_email("@example.com"), DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn apply_merges_only_given_fields() {
        let mut record = IdentityRecord::new("ada@example.com", "Ada");
        let id = record.id.clone();

        record.apply(ProfileUpdate {
            phone: Some("555-0100".to_string()),
            ..ProfileUpdate::default()
        });

        assert_eq!(record.id, id);
        assert_eq!(record.name, "Ada");
        assert_eq!(record.email, "ada@example.com");
        assert_eq!(record.phone.as_deref(), Some("555-0100"));
        assert_eq!(record.timezone, None);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let record = IdentityRecord::new("ada@example.com", "Ada");
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("phone").is_none());
        assert!(json.get("timezone").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }
}

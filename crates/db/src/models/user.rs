use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use natours_core::query::Filter;
use natours_core::roles::{is_valid_role, ROLE_USER};

use super::Model;

pub const DEFAULT_PHOTO: &str = "default.jpg";

pub const MIN_PASSWORD_LENGTH: u64 = 8;

/// A user account. `password` always holds a hash once stored; plaintext
/// only ever exists in the signup and password-change request bodies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[validate(
        required(message = "Please tell us your name"),
        length(min = 1, message = "Please tell us your name")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "Please provide your email"),
        email(message = "Please provide a valid email")
    )]
    pub email: Option<String>,
    pub photo: Option<String>,
    #[validate(custom(function = "validate_role"))]
    pub role: Option<String>,
    #[validate(
        required(message = "Please provide a password"),
        length(min = 8, message = "A password must have at least 8 characters")
    )]
    pub password: Option<String>,
    /// RFC 3339 timestamp of the last password change.
    pub password_changed_at: Option<String>,
    pub active: Option<bool>,
}

fn validate_role(role: &str) -> Result<(), ValidationError> {
    if is_valid_role(role) {
        return Ok(());
    }
    Err(ValidationError::new("role")
        .with_message("Role is either: user, guide, lead-guide, admin".into()))
}

impl Model for User {
    const COLLECTION: &'static str = "users";
    const ENTITY: &'static str = "User";
    const HIDDEN_FIELDS: &'static [&'static str] = &["password", "active"];
    const PROTECTED_FIELDS: &'static [&'static str] = &["password", "passwordChangedAt"];

    /// Deactivated accounts are invisible.
    fn base_filters() -> Vec<Filter> {
        vec![Filter::ne("active", false)]
    }

    fn prepare(&mut self) {
        if let Some(email) = &mut self.email {
            *email = email.trim().to_lowercase();
        }
        if let Some(name) = &mut self.name {
            *name = name.trim().to_string();
        }
        self.photo.get_or_insert_with(|| DEFAULT_PHOTO.to_string());
        self.role.get_or_insert_with(|| ROLE_USER.to_string());
        self.active.get_or_insert(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use natours_core::error::CoreError;

    fn user() -> User {
        User {
            name: Some("Jonas".into()),
            email: Some("  Jonas@Example.COM ".into()),
            password: Some("pass1234".into()),
            ..Default::default()
        }
    }

    #[test]
    fn prepare_fills_defaults_and_lowercases_email() {
        let mut u = user();
        u.prepare();
        assert_eq!(u.email.as_deref(), Some("jonas@example.com"));
        assert_eq!(u.photo.as_deref(), Some(DEFAULT_PHOTO));
        assert_eq!(u.role.as_deref(), Some(ROLE_USER));
        assert_eq!(u.active, Some(true));
    }

    #[test]
    fn short_password_and_bad_role_fail() {
        let mut u = user();
        u.password = Some("short".into());
        u.role = Some("superuser".into());
        let err = u.check().unwrap_err();
        assert_matches!(&err, CoreError::Validation(m) if m.contains("at least 8 characters"));
        assert_matches!(&err, CoreError::Validation(m) if m.contains("Role is either"));
    }

    #[test]
    fn invalid_email_fails() {
        let mut u = user();
        u.email = Some("not-an-email".into());
        assert_matches!(u.check(), Err(CoreError::Validation(m)) if m.contains("valid email"));
    }
}

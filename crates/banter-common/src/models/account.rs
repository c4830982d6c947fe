//! Account model, the identity layer.
//!
//! An account is a username, an email address, and an Argon2id password hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::validation::validate_password_strength;

/// A Banter account as stored in Postgres.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID (UUID v7, time-sortable)
    pub id: Uuid,

    /// Unique username (3-16 chars)
    pub username: String,

    pub email_address: String,

    /// Argon2id password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// The slice of an account that login needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub id: Uuid,
    pub password_hash: String,
}

impl From<&Account> for AccountCredentials {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            password_hash: a.password_hash.clone(),
        }
    }
}

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 16, message = "Username must be 3-16 characters"))]
    #[validate(regex(
        path = *USERNAME_REGEX,
        message = "Username can only contain letters, numbers, underscores, and hyphens"
    ))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email_address: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
}

/// Safe account representation for API responses (no password hash)
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub username: String,
    pub email_address: String,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            username: a.username,
            email_address: a.email_address,
            created_at: a.created_at,
        }
    }
}

/// Offset pagination for account listings.
#[derive(Debug, Deserialize, Validate)]
pub struct AccountListQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "page_size must be 1-100"))]
    pub page_size: u32,
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_page_size() -> u32 {
    10
}

use std::sync::LazyLock;
static USERNAME_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[a-zA-Z0-9_-]+$").expect("username regex is valid"));

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(username: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.into(),
            email_address: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_signup_validation() {
        assert!(signup("cmyui", "cmyui@example.com", "Password1").validate().is_ok());
        assert!(signup("ab", "cmyui@example.com", "Password1").validate().is_err());
        assert!(signup("cmyui", "not-an-email", "Password1").validate().is_err());
        assert!(signup("cmyui", "cmyui@example.com", "password1").validate().is_err());
        assert!(signup("has space", "cmyui@example.com", "Password1").validate().is_err());
    }

    #[test]
    fn test_response_hides_password_hash() {
        let now = Utc::now();
        let account = Account {
            id: Uuid::now_v7(),
            username: "cmyui".into(),
            email_address: "cmyui@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("argon2id"));
    }
}

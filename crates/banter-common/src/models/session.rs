//! Session model: one authenticated login of one account.
//!
//! The Redis record is the canonical copy; a session without a store entry does not exist,
//! whatever any in-memory component thinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::account::{default_page, default_page_size};

/// A session record.
///
/// Serialized as JSON with RFC 3339 timestamps at nanosecond precision, so a
/// store round-trip is lossless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer credential, random UUID v4
    pub session_id: Uuid,
    pub account_id: Uuid,
    /// Advisory only
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Absolute deadline; always after `created_at`
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is past its deadline at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Post-scan filters for listing sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub account_id: Option<Uuid>,
    pub user_agent: Option<String>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        self.account_id.is_none_or(|id| id == session.account_id)
            && self
                .user_agent
                .as_deref()
                .is_none_or(|ua| ua == session.user_agent)
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// `GET /v1/sessions` query string.
#[derive(Debug, Deserialize, Validate)]
pub struct SessionListQuery {
    pub account_id: Option<Uuid>,
    pub user_agent: Option<String>,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "page must be at least 1"))]
    pub page: u32,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "page_size must be 1-100"))]
    pub page_size: u32,
}

impl SessionListQuery {
    pub fn filter(&self) -> SessionFilter {
        SessionFilter {
            account_id: self.account_id,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample() -> Session {
        // Sub-microsecond component on purpose
        let created = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        Session {
            session_id: Uuid::new_v4(),
            account_id: Uuid::now_v7(),
            user_agent: "osu!/2024.1".into(),
            created_at: created,
            updated_at: created,
            expires_at: created + Duration::days(30),
        }
    }

    #[test]
    fn test_round_trip_keeps_every_field() {
        let session = sample();
        let raw = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, session);
        assert_eq!(back.created_at.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn test_filter_matches_on_both_fields() {
        let session = sample();
        assert!(SessionFilter::default().matches(&session));
        assert!(
            SessionFilter {
                account_id: Some(session.account_id),
                user_agent: Some("osu!/2024.1".into()),
            }
            .matches(&session)
        );
        assert!(
            !SessionFilter {
                account_id: Some(Uuid::now_v7()),
                user_agent: None,
            }
            .matches(&session)
        );
        assert!(
            !SessionFilter {
                account_id: None,
                user_agent: Some("curl/8.0".into()),
            }
            .matches(&session)
        );
    }

    #[test]
    fn test_expiry_is_inclusive_of_deadline() {
        let session = sample();
        assert!(!session.is_expired(session.created_at));
        assert!(session.is_expired(session.expires_at));
    }
}

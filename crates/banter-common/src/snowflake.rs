//! ID generation.
//!
//! Accounts get UUID v7 ids, time-sortable and generated without coordination.
//! Session ids are bearer credentials, so they come from [`IdGenerator`] and default
//! to fully random UUID v4 (nothing about them should be guessable from creation time).

use uuid::Uuid;

/// Generate a new time-sortable ID using UUID v7.
///
/// UUID v7 provides:
/// - Monotonically increasing (time-sortable)
/// - 48 bits of Unix timestamp (millisecond precision)
/// - 74 bits of randomness (unique across nodes)
pub fn generate_id() -> Uuid {
    Uuid::now_v7()
}

/// Produces collision-resistant opaque identifiers for sessions.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// 122 random bits per id.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_id();
        let id2 = generate_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_ids_are_time_sortable() {
        let id1 = generate_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = generate_id();
        assert!(id1 < id2);
    }

    #[test]
    fn test_session_ids_are_random_v4() {
        let ids = RandomIdGenerator;
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}

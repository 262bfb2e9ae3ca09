//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with per-operation
//! expiry deadlines.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A stored value with its lifecycle timestamps and expiry deadline.
#[derive(Debug)]
pub struct Entry<V> {
    /// The stored value
    pub value: Arc<V>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Last read timestamp (Unix milliseconds)
    pub last_access_at: u64,
    /// Last value-replacement timestamp (Unix milliseconds)
    pub last_update_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an entry born at `now` with the given expiry deadline.
    pub fn new(value: Arc<V>, now: u64, expires_at: Option<u64>) -> Self {
        Self {
            value,
            created_at: now,
            last_access_at: now,
            last_update_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry is past its deadline at `now`.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to the expiration time, so a zero-length
    /// deadline is expired at birth.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks whether the entry is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Touches ==
    /// Records a read at `now`, moving the deadline when a new one applies.
    ///
    /// `deadline` is `None` when the access expiry is eternal, which leaves
    /// any existing deadline in place rather than erasing it.
    pub fn touch_access(&mut self, now: u64, deadline: Option<u64>) {
        self.last_access_at = now;
        if let Some(deadline) = deadline {
            self.expires_at = Some(deadline);
        }
    }

    /// Records a value replacement at `now`, same deadline rule as
    /// [`Entry::touch_access`].
    pub fn touch_update(&mut self, value: Arc<V>, now: u64, deadline: Option<u64>) {
        self.value = value;
        self.last_update_at = now;
        if let Some(deadline) = deadline {
            self.expires_at = Some(deadline);
        }
    }

    // == Time To Live ==
    /// Remaining time before the deadline in milliseconds.
    ///
    /// # Returns
    /// - `Some(0)` if the entry is already expired
    /// - `Some(remaining_ms)` if a deadline is set and not yet reached
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let now = current_timestamp_ms();
            expires.saturating_sub(now)
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: &str, now: u64, expires_at: Option<u64>) -> Entry<String> {
        Entry::new(Arc::new(value.to_string()), now, expires_at)
    }

    #[test]
    fn test_entry_creation_no_deadline() {
        let e = entry("test_value", 1_000, None);

        assert_eq!(*e.value, "test_value");
        assert_eq!(e.created_at, 1_000);
        assert_eq!(e.last_access_at, 1_000);
        assert_eq!(e.last_update_at, 1_000);
        assert!(e.expires_at.is_none());
        assert!(!e.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_entry_expiration() {
        let e = entry("test_value", 1_000, Some(2_000));

        assert!(!e.is_expired_at(1_999));
        assert!(e.is_expired_at(2_000), "expired exactly at the boundary");
        assert!(e.is_expired_at(2_001));
    }

    #[test]
    fn test_zero_length_deadline_expired_at_birth() {
        let e = entry("test_value", 1_000, Some(1_000));
        assert!(e.is_expired_at(1_000));
    }

    #[test]
    fn test_touch_access_moves_deadline() {
        let mut e = entry("test_value", 1_000, Some(2_000));

        e.touch_access(1_500, Some(3_500));
        assert_eq!(e.last_access_at, 1_500);
        assert_eq!(e.expires_at, Some(3_500));
        assert_eq!(e.created_at, 1_000);
    }

    #[test]
    fn test_touch_access_with_eternal_expiry_keeps_deadline() {
        let mut e = entry("test_value", 1_000, Some(2_000));

        e.touch_access(1_500, None);
        assert_eq!(e.last_access_at, 1_500);
        assert_eq!(e.expires_at, Some(2_000), "eternal access expiry must not erase the deadline");
    }

    #[test]
    fn test_touch_update_replaces_value() {
        let mut e = entry("v1", 1_000, None);

        e.touch_update(Arc::new("v2".to_string()), 1_200, Some(5_000));
        assert_eq!(*e.value, "v2");
        assert_eq!(e.last_update_at, 1_200);
        assert_eq!(e.last_access_at, 1_000);
        assert_eq!(e.expires_at, Some(5_000));
    }

    #[test]
    fn test_ttl_remaining_ms() {
        let far = current_timestamp_ms() + 10_000;
        let e = entry("test_value", 1_000, Some(far));

        let remaining = e.ttl_remaining_ms().unwrap();
        assert!(remaining <= 10_000);
        assert!(remaining >= 9_000);
    }

    #[test]
    fn test_ttl_remaining_expired_and_eternal() {
        let e = entry("test_value", 1_000, Some(1_001));
        assert_eq!(e.ttl_remaining_ms().unwrap(), 0);

        let e = entry("test_value", 1_000, None);
        assert!(e.ttl_remaining_ms().is_none());
    }
}

//! Bounded per-principal ledger of live refresh tokens.
//!
//! The ledger lives inside the principal row as a JSONB array; this module
//! keeps the eviction and expiry rules in a plain data structure so they can
//! be tested without a database. All mutations take `now` explicitly — the
//! persistence layer decides when "now" is.
//!
//! Expired entries are purged lazily on the next mutation or `accept`, never
//! actively swept. When the cap is hit, the entry with the oldest
//! `last_used_at` is evicted so actively-used sessions survive overflow.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of live refresh tokens per principal.
pub const MAX_LIVE_TOKENS: usize = 5;

/// Request metadata recorded with each issued refresh token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshEntry {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    pub last_used_at: DateTime<Utc>,
}

/// The per-principal refresh-token ledger.
///
/// Serializes transparently to the JSONB array stored on the principal row,
/// so a load-mutate-store cycle is one row read and one row write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: Vec<RefreshEntry>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.entries.iter().any(|entry| entry.token == token)
    }

    /// Record a freshly issued refresh token.
    ///
    /// Purges expired entries first; if the cap is still reached, evicts the
    /// least-recently-used entry before appending.
    pub fn add(&mut self, token: &str, ttl: Duration, meta: TokenMeta, now: DateTime<Utc>) {
        self.purge_expired(now);
        while self.entries.len() >= MAX_LIVE_TOKENS {
            self.evict_least_recently_used();
        }
        self.entries.push(RefreshEntry {
            token: token.to_string(),
            expires_at: now + ttl,
            user_agent: meta.user_agent,
            ip: meta.ip,
            last_used_at: now,
        });
    }

    /// Drop the entry with the given token string. No-op if absent.
    pub fn remove(&mut self, token: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.token != token);
        self.entries.len() != before
    }

    /// Replace `old` with `new` in one in-memory step.
    ///
    /// Callers persist the resulting ledger in a single row update, so there
    /// is no durable state where both tokens are absent.
    pub fn rotate(
        &mut self,
        old: &str,
        new: &str,
        ttl: Duration,
        meta: TokenMeta,
        now: DateTime<Utc>,
    ) {
        self.remove(old);
        self.add(new, ttl, meta, now);
    }

    /// Check whether a presented refresh token is live, refreshing its
    /// `last_used_at` on success.
    pub fn accept(&mut self, token: &str, now: DateTime<Utc>) -> bool {
        self.purge_expired(now);
        match self.entries.iter_mut().find(|entry| entry.token == token) {
            Some(entry) => {
                entry.last_used_at = now;
                true
            }
            None => false,
        }
    }

    /// Empty the ledger. Used together with a `token_version` bump for
    /// "log out everywhere".
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|entry| entry.expires_at > now);
    }

    fn evict_least_recently_used(&mut self) {
        let oldest = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.last_used_at)
            .map(|(index, _)| index);
        if let Some(index) = oldest {
            self.entries.remove(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn week() -> Duration {
        Duration::days(7)
    }

    #[test]
    fn add_records_entry_with_expiry_and_last_used() {
        let mut ledger = Ledger::new();
        ledger.add("tok-1", week(), TokenMeta::default(), t0());
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("tok-1"));
    }

    #[test]
    fn cap_evicts_least_recently_used_not_oldest_inserted() {
        let mut ledger = Ledger::new();
        for i in 1..=5 {
            let at = t0() + Duration::minutes(i);
            ledger.add(&format!("tok-{i}"), week(), TokenMeta::default(), at);
        }

        // Touch entry #1 so entry #2 becomes the least recently used.
        assert!(ledger.accept("tok-1", t0() + Duration::minutes(10)));

        ledger.add("tok-6", week(), TokenMeta::default(), t0() + Duration::minutes(11));
        assert_eq!(ledger.len(), MAX_LIVE_TOKENS);
        assert!(ledger.contains("tok-1"), "recently used entry must survive");
        assert!(!ledger.contains("tok-2"), "LRU entry must be evicted");
        assert!(ledger.contains("tok-6"));
    }

    #[test]
    fn expired_entries_are_purged_lazily_on_add() {
        let mut ledger = Ledger::new();
        ledger.add("short", Duration::hours(1), TokenMeta::default(), t0());
        ledger.add("long", week(), TokenMeta::default(), t0());

        // Two hours later the short-lived entry is gone and does not count
        // against the cap.
        let later = t0() + Duration::hours(2);
        ledger.add("fresh", week(), TokenMeta::default(), later);
        assert!(!ledger.contains("short"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn accept_rejects_expired_token() {
        let mut ledger = Ledger::new();
        ledger.add("tok", Duration::hours(1), TokenMeta::default(), t0());
        assert!(!ledger.accept("tok", t0() + Duration::hours(2)));
        assert!(ledger.is_empty());
    }

    #[test]
    fn accept_is_single_use_across_rotation() {
        let mut ledger = Ledger::new();
        ledger.add("old", week(), TokenMeta::default(), t0());

        let now = t0() + Duration::minutes(1);
        assert!(ledger.accept("old", now));
        ledger.rotate("old", "new", week(), TokenMeta::default(), now);

        // Exactly one of {old, new} is present after rotation.
        assert!(!ledger.contains("old"));
        assert!(ledger.contains("new"));
        assert!(!ledger.accept("old", now + Duration::seconds(1)));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut ledger = Ledger::new();
        ledger.add("tok", week(), TokenMeta::default(), t0());
        assert!(ledger.remove("tok"));
        assert!(!ledger.remove("tok"));
    }

    #[test]
    fn clear_empties_the_ledger() {
        let mut ledger = Ledger::new();
        ledger.add("a", week(), TokenMeta::default(), t0());
        ledger.add("b", week(), TokenMeta::default(), t0());
        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn ledger_round_trips_through_json() {
        let mut ledger = Ledger::new();
        ledger.add(
            "tok",
            week(),
            TokenMeta {
                user_agent: Some("tests/1.0".to_string()),
                ip: Some("192.0.2.1".to_string()),
            },
            t0(),
        );
        let value = serde_json::to_value(&ledger).expect("serialize ledger");
        assert!(value.is_array(), "ledger must serialize as a bare array");
        let decoded: Ledger = serde_json::from_value(value).expect("deserialize ledger");
        assert_eq!(decoded, ledger);
    }

    #[test]
    fn legacy_entries_without_metadata_deserialize() {
        let raw = serde_json::json!([{
            "token": "tok",
            "expires_at": "2025-01-08T12:00:00Z",
            "last_used_at": "2025-01-01T12:00:00Z"
        }]);
        let ledger: Ledger = serde_json::from_value(raw).expect("deserialize legacy entry");
        assert!(ledger.contains("tok"));
    }
}

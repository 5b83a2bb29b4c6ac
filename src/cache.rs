//! Per-user cache for exchanged realm tokens.

use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use crate::realm::RealmToken;

/// Keyed token store: primary-domain user id to the most recent realm token.
///
/// An entry is authoritative only while it has not expired; implementations
/// must evict an expired entry on read rather than serve it. There is no
/// background sweep. The default [`InMemoryTokenCache`] is single-process
/// only — deployments that need cross-process consistency swap in a shared,
/// encrypted store behind this same trait.
pub trait TokenCache: Send + Sync {
    /// Get the cached token for a user, evicting and returning `None` if the
    /// entry has expired.
    fn get(&self, user_id: &str) -> Option<RealmToken>;

    /// Store a token for a user, replacing any previous entry.
    fn put(&self, user_id: &str, token: RealmToken);

    /// Remove the entry for a user, if any.
    fn delete(&self, user_id: &str);

    /// Remove all entries.
    fn clear(&self);
}

/// Thread-safe in-memory token cache.
#[derive(Default)]
pub struct InMemoryTokenCache {
    entries: RwLock<HashMap<String, RealmToken>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries, expired or not (for observability).
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self, user_id: &str) -> Option<RealmToken> {
        let Ok(mut entries) = self.entries.write() else {
            return None;
        };
        match entries.get(user_id) {
            Some(token) if !token.is_expired() => Some(token.clone()),
            Some(_) => {
                debug!(user = %user_id, "Evicting expired cached token");
                entries.remove(user_id);
                None
            }
            None => None,
        }
    }

    fn put(&self, user_id: &str, token: RealmToken) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(user_id.to_string(), token);
        }
    }

    fn delete(&self, user_id: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(user_id);
        }
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::token::testutil::token_with;

    #[test]
    fn put_then_get_returns_live_token() {
        let cache = InMemoryTokenCache::new();
        cache.put("user-1", token_with(&["data_reader"], None, 3600));

        let token = cache.get("user-1").unwrap();
        assert_eq!(token.roles, vec!["data_reader"]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = InMemoryTokenCache::new();
        cache.put("user-1", token_with(&[], None, -10));

        assert!(cache.get("user-1").is_none());
        // evicted, not merely hidden: still absent without another put
        assert_eq!(cache.len(), 0);
        assert!(cache.get("user-1").is_none());
    }

    #[test]
    fn stale_but_unexpired_entry_is_still_served() {
        let cache = InMemoryTokenCache::new();
        // inside the refresh window but not expired
        cache.put("user-1", token_with(&[], Some("r"), 240));

        let token = cache.get("user-1").unwrap();
        assert!(token.needs_refresh());
    }

    #[test]
    fn delete_removes_single_entry() {
        let cache = InMemoryTokenCache::new();
        cache.put("user-1", token_with(&[], None, 3600));
        cache.put("user-2", token_with(&[], None, 3600));

        cache.delete("user-1");
        assert!(cache.get("user-1").is_none());
        assert!(cache.get("user-2").is_some());
    }

    #[test]
    fn clear_removes_everything() {
        let cache = InMemoryTokenCache::new();
        cache.put("user-1", token_with(&[], None, 3600));
        cache.put("user-2", token_with(&[], None, 3600));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn put_overwrites_previous_entry() {
        let cache = InMemoryTokenCache::new();
        cache.put("user-1", token_with(&["old_role"], None, 3600));
        cache.put("user-1", token_with(&["new_role"], None, 3600));

        let token = cache.get("user-1").unwrap();
        assert_eq!(token.roles, vec!["new_role"]);
    }
}

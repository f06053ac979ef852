//! Layered key-value state bag threaded through the pipeline.
//!
//! A [`Store`] has two tiers: a volatile tier created fresh for each
//! request/response cycle and discarded after resolution, and a
//! persistent tier shared by every request of a session. Reads check the
//! volatile tier first and fall back to the persistent one; writes land
//! in the volatile tier and, when asked to persist, in the session tier
//! as well. All mutation is last-write-wins with no merge semantics.

use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;

type StoredValue = Arc<dyn Any + Send + Sync>;

/// Two-tier key→value bag. Cloning shares both tiers; use
/// [`Store::leaf`] to start a new cycle over the same session tier.
#[derive(Clone, Default)]
pub struct Store {
    volatile: Arc<DashMap<String, StoredValue>>,
    persistent: Arc<DashMap<String, StoredValue>>,
}

impl Store {
    /// Creates a session-root store with empty tiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh volatile tier over this store's persistent tier.
    ///
    /// The dispatcher calls this once per request/response cycle; data
    /// saved without `persist` never leaks across cycles.
    pub fn leaf(&self) -> Store {
        Store {
            volatile: Arc::new(DashMap::new()),
            persistent: Arc::clone(&self.persistent),
        }
    }

    /// Retrieves a value, checking the volatile tier first.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let value = self
            .volatile
            .get(key)
            .or_else(|| self.persistent.get(key))
            .map(|entry| Arc::clone(entry.value()))?;
        value.downcast::<T>().ok()
    }

    /// Whether either tier holds the key.
    pub fn contains(&self, key: &str) -> bool {
        self.volatile.contains_key(key) || self.persistent.contains_key(key)
    }

    /// Saves a value in the volatile tier, and in the persistent tier as
    /// well when `persist` is set.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T, persist: bool) {
        let key = key.into();
        let value: StoredValue = Arc::new(value);
        if persist {
            self.persistent.insert(key.clone(), Arc::clone(&value));
        }
        self.volatile.insert(key, value);
    }

    /// Removes a key from both tiers, returning whether anything was
    /// removed.
    pub fn remove(&self, key: &str) -> bool {
        let from_volatile = self.volatile.remove(key).is_some();
        let from_persistent = self.persistent.remove(key).is_some();
        from_volatile || from_persistent
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("volatile_len", &self.volatile.len())
            .field("persistent_len", &self.persistent.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatile_shadows_persistent() {
        let root = Store::new();
        root.set("token", "session".to_owned(), true);

        let cycle = root.leaf();
        assert_eq!(cycle.get::<String>("token").as_deref(), Some(&"session".to_owned()));

        cycle.set("token", "override".to_owned(), false);
        assert_eq!(cycle.get::<String>("token").as_deref(), Some(&"override".to_owned()));

        // A new cycle sees the persistent value again.
        let next = root.leaf();
        assert_eq!(next.get::<String>("token").as_deref(), Some(&"session".to_owned()));
    }

    #[test]
    fn persist_flag_controls_tier() {
        let root = Store::new();
        let cycle = root.leaf();
        cycle.set("a", 1u32, false);
        cycle.set("b", 2u32, true);

        let next = root.leaf();
        assert!(next.get::<u32>("a").is_none());
        assert_eq!(next.get::<u32>("b").as_deref(), Some(&2));
    }

    #[test]
    fn remove_clears_both_tiers() {
        let root = Store::new();
        let cycle = root.leaf();
        cycle.set("k", 5i64, true);
        assert!(cycle.remove("k"));
        assert!(!cycle.contains("k"));
        assert!(!root.leaf().contains("k"));
        assert!(!cycle.remove("k"));
    }

    #[test]
    fn downcast_mismatch_returns_none() {
        let store = Store::new();
        store.set("n", 7u8, false);
        assert!(store.get::<String>("n").is_none());
        assert_eq!(store.get::<u8>("n").as_deref(), Some(&7));
    }
}

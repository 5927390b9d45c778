//! Keyed collection of cancellable subscriptions.

use std::collections::HashMap;

use vhdl_types::Disposable;

/// One subscription per key, released exactly once.
///
/// Insertion never overwrites: a second `set` for a present key is refused
/// and the registry does not touch the refused subscription. Removal
/// releases and forgets an entry in a single call, so there is no moment
/// where an entry is gone but still live (or released but still listed).
pub struct WatchRegistry<D: Disposable = Box<dyn Disposable + Send>> {
    entries: HashMap<String, D>,
}

impl<D: Disposable> Default for WatchRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Disposable> WatchRegistry<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Register `subscription` under `key` unless the key is taken.
    ///
    /// Returns `false` for a taken key. The refused subscription is dropped
    /// without being disposed; use [`WatchRegistry::try_set`] to get it back.
    pub fn set(&mut self, key: impl Into<String>, subscription: D) -> bool {
        self.try_set(key, subscription).is_ok()
    }

    /// Like [`WatchRegistry::set`], but hands a refused subscription back.
    pub fn try_set(&mut self, key: impl Into<String>, subscription: D) -> Result<(), D> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            tracing::debug!(key = %key, "Subscription already registered");
            return Err(subscription);
        }
        self.entries.insert(key, subscription);
        Ok(())
    }

    /// Release and remove the entry for `key`. `false` if there was none.
    pub fn dispose_and_delete(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(mut subscription) => {
                subscription.dispose();
                tracing::debug!(key = %key, "Subscription released");
                true
            }
            None => false,
        }
    }

    /// Release every subscription, in no particular order.
    ///
    /// Entries are drained as they are released, so calling this again (or
    /// dropping the registry afterwards) releases nothing twice.
    pub fn dispose(&mut self) {
        for (key, mut subscription) in self.entries.drain() {
            subscription.dispose();
            tracing::trace!(key = %key, "Subscription released");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<D: Disposable> Disposable for WatchRegistry<D> {
    fn dispose(&mut self) {
        WatchRegistry::dispose(self);
    }
}

impl<D: Disposable> Drop for WatchRegistry<D> {
    fn drop(&mut self) {
        WatchRegistry::dispose(self);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Subscription that counts its releases through a shared counter.
    struct Probe(Arc<AtomicUsize>);

    impl Probe {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let count = Arc::new(AtomicUsize::new(0));
            (Self(Arc::clone(&count)), count)
        }
    }

    impl Disposable for Probe {
        fn dispose(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn duplicate_set_keeps_first_subscription() {
        let mut registry = WatchRegistry::new();
        let (w1, w1_count) = Probe::new();
        let (w2, w2_count) = Probe::new();

        assert!(registry.set("/a", w1));
        assert!(!registry.set("/a", w2));
        assert!(registry.has("/a"));
        assert_eq!(registry.len(), 1);

        assert!(registry.dispose_and_delete("/a"));
        assert_eq!(w1_count.load(Ordering::SeqCst), 1);
        assert_eq!(w2_count.load(Ordering::SeqCst), 0);
        assert!(!registry.has("/a"));
    }

    #[test]
    fn try_set_returns_refused_subscription() {
        let mut registry = WatchRegistry::new();
        let (w1, _) = Probe::new();
        let (w2, w2_count) = Probe::new();

        registry.try_set("/a", w1).ok().unwrap();
        let Err(mut refused) = registry.try_set("/a", w2) else {
            panic!("second registration must be refused");
        };
        assert_eq!(w2_count.load(Ordering::SeqCst), 0);

        refused.dispose();
        assert_eq!(w2_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_missing_key_has_no_effect() {
        let mut registry = WatchRegistry::new();
        let (w1, w1_count) = Probe::new();
        registry.set("/a", w1);

        assert!(!registry.dispose_and_delete("/b"));
        assert!(registry.has("/a"));
        assert_eq!(w1_count.load(Ordering::SeqCst), 0);
        assert!(!registry.has("/b"));
    }

    #[test]
    fn dispose_releases_each_subscription_once() {
        let mut registry = WatchRegistry::new();
        let counts: Vec<_> = ["/c", "/a", "/b"]
            .into_iter()
            .map(|key| {
                let (probe, count) = Probe::new();
                assert!(registry.set(key, probe));
                count
            })
            .collect();

        registry.dispose();
        registry.dispose();
        drop(registry);

        for count in counts {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn dispose_empty_registry_is_noop() {
        let mut registry: WatchRegistry<Probe> = WatchRegistry::new();
        registry.dispose();
        assert!(registry.is_empty());
    }

    #[test]
    fn drop_releases_remaining_entries() {
        let (probe, count) = Probe::new();
        {
            let mut registry = WatchRegistry::new();
            registry.set("/a", probe);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn boxed_subscriptions_are_accepted() {
        let mut registry: WatchRegistry = WatchRegistry::new();
        let (probe, count) = Probe::new();
        assert!(registry.set("/a", Box::new(probe)));
        assert!(registry.dispose_and_delete("/a"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registered_count_tracks_successful_operations() {
        let mut registry = WatchRegistry::new();
        let mut successful_sets = 0usize;
        let mut successful_deletes = 0usize;

        // Deterministic mix of sets and deletes over a small key space.
        let mut seed: u32 = 0x2545_f491;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let key = format!("/root{}", seed % 7);
            if seed % 3 == 0 {
                if registry.dispose_and_delete(&key) {
                    successful_deletes += 1;
                }
            } else {
                let (probe, _) = Probe::new();
                if registry.set(key, probe) {
                    successful_sets += 1;
                }
            }
            assert_eq!(registry.len(), successful_sets - successful_deletes);
        }
    }

    #[test]
    fn keys_lists_registered_roots() {
        let mut registry = WatchRegistry::new();
        registry.set("/a", Probe::new().0);
        registry.set("/b", Probe::new().0);
        let mut keys: Vec<&str> = registry.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, ["/a", "/b"]);
    }
}

//! Wall-clock TTL container; the single lifetime authority.
use roast_protocol::Expiry;
use std::collections::HashMap;
use std::hash::Hash;

/// A value governed by its own expiry.
pub trait HasExpiry {
    /// The absolute deadline after which the value is evicted.
    fn expiry(&self) -> Expiry;
}

/// Map evicting expired values lazily on access.
///
/// There is no background reaper: every read sweeps first, so expiry
/// is observed exactly when the map is next touched. [`sweep`]
/// returns the evicted entries so the owner can run eviction side
/// effects; the plain accessors discard them, which is the silent
/// eviction the request path expects.
///
/// [`sweep`]: ExpirableMap::sweep
#[derive(Debug)]
pub struct ExpirableMap<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for ExpirableMap<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> ExpirableMap<K, V>
where
    K: Eq + Hash + Clone,
    V: HasExpiry,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry and return them.
    pub fn sweep(&mut self) -> Vec<(K, V)> {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, value)| value.expiry().is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| {
                self.entries.remove(&key).map(|value| (key, value))
            })
            .collect()
    }

    /// Insert a value, replacing any previous one under the key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.sweep();
        self.entries.insert(key, value)
    }

    /// Look up a live value.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.sweep();
        self.entries.get(key)
    }

    /// Look up a live value mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.sweep();
        self.entries.get_mut(key)
    }

    /// Look up a live value, inserting a fresh one when absent.
    pub fn get_or_insert_with(
        &mut self,
        key: K,
        default: impl FnOnce() -> V,
    ) -> &mut V {
        self.sweep();
        self.entries.entry(key).or_insert_with(default)
    }

    /// Remove a live value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.sweep();
        self.entries.remove(key)
    }

    /// Whether a live value exists under the key.
    pub fn contains(&mut self, key: &K) -> bool {
        self.sweep();
        self.entries.contains_key(key)
    }

    /// Number of live entries.
    pub fn len(&mut self) -> usize {
        self.sweep();
        self.entries.len()
    }

    /// Whether the map holds no live entries.
    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Iterate over live entries.
    pub fn iter(&mut self) -> impl Iterator<Item = (&K, &V)> {
        self.sweep();
        self.entries.iter()
    }

    /// Iterate over live entries mutably.
    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&K, &mut V)> {
        self.sweep();
        self.entries.iter_mut()
    }

    /// Iterate without sweeping; the caller has swept this request.
    pub(crate) fn unswept_iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&K, &mut V)> {
        self.entries.iter_mut()
    }

    /// Look up without sweeping; the caller has swept this request.
    pub(crate) fn unswept_get_mut(
        &mut self,
        key: &K,
    ) -> Option<&mut V> {
        self.entries.get_mut(key)
    }
}

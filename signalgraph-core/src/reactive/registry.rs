//! Weak Registry
//!
//! An identity-keyed map whose values are held through [`Weak`] references.
//! Signals use it to remember their dependents without keeping them alive:
//! a formula that nothing else references can be dropped even while it is
//! still listed here.
//!
//! # Lazy Pruning
//!
//! Dead entries are not removed eagerly. Every access that encounters one
//! (`get`, `contains`, iteration) removes it on the spot, so the map shrinks
//! over time as collected values are swept. `len` is therefore only an upper
//! bound on the number of live values.

use std::hash::Hash;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

/// A map from keys to weakly-held values.
pub struct WeakRegistry<K, V: ?Sized> {
    entries: IndexMap<K, Weak<V>>,
}

impl<K, V> WeakRegistry<K, V>
where
    K: Copy + Eq + Hash,
    V: ?Sized,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Store `value` weakly under `key`, replacing any previous entry.
    pub fn insert(&mut self, key: K, value: &Rc<V>) {
        self.entries.insert(key, Rc::downgrade(value));
    }

    /// Store an existing weak reference under `key`.
    pub fn insert_weak(&mut self, key: K, value: Weak<V>) {
        self.entries.insert(key, value);
    }

    /// Look up the live value for `key`.
    ///
    /// If the stored reference is dead it is removed and `None` is returned.
    pub fn get(&mut self, key: &K) -> Option<Rc<V>> {
        let live = self.entries.get(key)?.upgrade();
        if live.is_none() {
            self.entries.swap_remove(key);
        }
        live
    }

    /// Whether a live value is stored under `key`.
    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Remove the entry for `key`, returning whether one was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.swap_remove(key).is_some()
    }

    /// Upper bound on the number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every dead entry. Returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, weak| weak.strong_count() > 0);
        before - self.entries.len()
    }

    /// Iterate over live entries, removing dead ones as they are encountered.
    pub fn entries(&mut self) -> Entries<'_, K, V> {
        Entries {
            entries: &mut self.entries,
            index: 0,
        }
    }

    /// Iterate over the keys of live entries.
    pub fn keys(&mut self) -> impl Iterator<Item = K> + '_ {
        self.entries().map(|(key, _)| key)
    }

    /// Iterate over live values.
    pub fn values(&mut self) -> impl Iterator<Item = Rc<V>> + '_ {
        self.entries().map(|(_, value)| value)
    }
}

impl<K, V> Default for WeakRegistry<K, V>
where
    K: Copy + Eq + Hash,
    V: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Pruning iterator returned by [`WeakRegistry::entries`].
pub struct Entries<'a, K, V: ?Sized> {
    entries: &'a mut IndexMap<K, Weak<V>>,
    index: usize,
}

impl<K, V> Iterator for Entries<'_, K, V>
where
    K: Copy + Eq + Hash,
    V: ?Sized,
{
    type Item = (K, Rc<V>);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.entries.len() {
            let (key, weak) = self.entries.get_index(self.index)?;
            match weak.upgrade() {
                Some(value) => {
                    let key = *key;
                    self.index += 1;
                    return Some((key, value));
                }
                None => {
                    // swap_remove moves the last entry into this slot; look at it next.
                    self.entries.swap_remove_index(self.index);
                }
            }
        }
        None
    }
}

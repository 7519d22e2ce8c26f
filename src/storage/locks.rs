// Key Locks - Per-natural-key mutual exclusion
//
// Striped mutexes keyed by (entity kind, natural key). A read-compare-write
// sequence on one record holds the stripe for that record, so the merge path
// and the serving path cannot interleave on the same key. Callers hold at
// most one guard at a time; two keys can share a stripe.

use crate::model::EntityKind;
use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default number of stripes
pub const DEFAULT_STRIPES: usize = 64;

/// Guard held for the duration of a keyed read-modify-write
pub type KeyGuard<'a> = MutexGuard<'a, ()>;

/// Striped lock table
#[derive(Debug)]
pub struct KeyLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl KeyLocks {
    /// Create a lock table with `stripes` stripes (at least one)
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Number of stripes
    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Lock the stripe owning `key` of `kind`
    pub fn lock<K: Hash + ?Sized>(&self, kind: EntityKind, key: &K) -> KeyGuard<'_> {
        self.stripes[self.stripe_for(kind, key)].lock()
    }

    fn stripe_for<K: Hash + ?Sized>(&self, kind: EntityKind, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

//! String interning for identifier deduplication.
//!
//! Interned strings are represented by `Atom`, a `Copy` index that makes
//! name comparison O(1). The interner is sharded (`DashMap`) so it can be
//! shared behind an `Arc` without external locking.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;

/// An interned string. Equality and hashing compare the index only, so
/// two `Atom`s are equal iff they came from the same `Interner` and hold
/// the same text.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self.0)
    }
}

/// Shared string interner.
pub struct Interner {
    map: DashMap<Arc<str>, u32, rustc_hash::FxBuildHasher>,
    strings: RwLock<Vec<Arc<str>>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        Self {
            map: DashMap::default(),
            strings: RwLock::new(Vec::new()),
        }
    }

    /// Intern a string, returning its `Atom`.
    pub fn intern(&self, text: &str) -> Atom {
        if let Some(existing) = self.map.get(text) {
            return Atom(*existing);
        }
        let arc: Arc<str> = Arc::from(text);
        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());
        // Re-check under the write lock: another thread may have interned
        // the same text between the lookup above and acquiring the lock.
        if let Some(existing) = self.map.get(text) {
            return Atom(*existing);
        }
        let index = strings.len() as u32;
        strings.push(arc.clone());
        self.map.insert(arc, index);
        Atom(index)
    }

    /// Resolve an `Atom` back to its text.
    ///
    /// Panics if the atom did not come from this interner.
    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
        strings[atom.0 as usize].clone()
    }

    pub fn len(&self) -> usize {
        self.strings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

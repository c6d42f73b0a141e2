//! Versioned state tables
//!
//! A [`StateTable`] is the output of one pipeline step for one run: an
//! ordered sequence of values, each tagged with how it relates to the
//! previous run's output. Tables are immutable once built; a
//! [`TableBuilder`] assembles the entries and is explicitly finished.

use hashbrown::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Provenance of an entry relative to the previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// No predecessor existed
    Added,

    /// The predecessor has no successor; the entry carries the dropped value
    Removed,

    /// A predecessor existed but compared unequal
    Modified,

    /// Equal to the predecessor; the previous value is reused verbatim
    Cached,
}

impl EntryState {
    /// True for states that carry freshly computed data
    pub fn is_new(self) -> bool {
        matches!(self, EntryState::Added | EntryState::Modified)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Added => write!(f, "added"),
            EntryState::Removed => write!(f, "removed"),
            EntryState::Modified => write!(f, "modified"),
            EntryState::Cached => write!(f, "cached"),
        }
    }
}

/// One produced value plus its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<T> {
    pub value: T,
    pub state: EntryState,
}

impl<T> Entry<T> {
    pub fn new(value: T, state: EntryState) -> Self {
        Entry { value, state }
    }

    pub fn is_removed(&self) -> bool {
        self.state == EntryState::Removed
    }
}

/// Immutable, ordered output of one step
pub struct StateTable<T> {
    entries: Arc<[Entry<T>]>,
}

impl<T> Clone for StateTable<T> {
    fn clone(&self) -> Self {
        StateTable {
            entries: self.entries.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<T> Default for StateTable<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> StateTable<T> {
    /// The table a step sees the first time it runs
    pub fn empty() -> Self {
        StateTable {
            entries: Arc::from(Vec::new()),
        }
    }

    /// Number of entries, including removed ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True only if every entry is cached
    pub fn is_cached(&self) -> bool {
        self.entries.iter().all(|e| e.state == EntryState::Cached)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry<T>> {
        self.entries.iter()
    }

    /// Entries that are part of the current output
    pub fn live(&self) -> impl Iterator<Item = &Entry<T>> + '_ {
        self.entries.iter().filter(|e| !e.is_removed())
    }

    /// Values that are part of the current output, in order
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.live().map(|e| &e.value)
    }

    /// The value of a single-valued table
    pub fn single(&self) -> Option<&T> {
        self.values().next()
    }

    pub fn states(&self) -> Vec<EntryState> {
        self.entries.iter().map(|e| e.state).collect()
    }

    /// Count of entries in the given state
    pub fn count(&self, state: EntryState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }

    /// True if both handles point at the same published entries
    pub fn ptr_eq(&self, other: &StateTable<T>) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl<T: Clone> StateTable<T> {
    /// The table as the next run observes it when nothing upstream changed:
    /// removed entries dropped, everything else cached.
    pub fn as_cached(&self) -> Self {
        if self.is_cached() {
            return self.clone();
        }
        let mut builder = TableBuilder::with_capacity(self.len());
        for entry in self.live() {
            builder.push(entry.value.clone(), EntryState::Cached);
        }
        builder.finish()
    }

    /// Diff `candidates` against `previous` by position.
    ///
    /// Removed entries of `previous` are not part of its output and are
    /// skipped before pairing. Leftover predecessors are appended as
    /// [`EntryState::Removed`].
    pub fn diff<I, F>(previous: &StateTable<T>, candidates: I, eq: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T, &T) -> bool,
    {
        let mut prev = previous.values();
        let mut builder = TableBuilder::with_capacity(previous.len());

        for candidate in candidates {
            match prev.next() {
                Some(old) if eq(old, &candidate) => builder.push(old.clone(), EntryState::Cached),
                Some(_) => builder.push(candidate, EntryState::Modified),
                None => builder.push(candidate, EntryState::Added),
            }
        }

        for old in prev {
            builder.push(old.clone(), EntryState::Removed);
        }

        builder.finish()
    }

    /// Diff `candidates` against `previous`, pairing entries by key instead
    /// of by position. Output order follows `candidates`; predecessors whose
    /// key disappeared are appended as removed, in their previous order.
    pub fn diff_by_key<I, K, KF, F>(previous: &StateTable<T>, candidates: I, key: KF, eq: F) -> Self
    where
        I: IntoIterator<Item = T>,
        K: Eq + Hash,
        KF: Fn(&T) -> K,
        F: Fn(&T, &T) -> bool,
    {
        let old: Vec<&T> = previous.values().collect();
        let mut index: HashMap<K, usize> = HashMap::with_capacity(old.len());
        for (i, value) in old.iter().enumerate() {
            index.entry(key(value)).or_insert(i);
        }

        let mut consumed = vec![false; old.len()];
        let mut builder = TableBuilder::with_capacity(old.len());

        for candidate in candidates {
            match index.get(&key(&candidate)).copied() {
                Some(i) if !consumed[i] => {
                    consumed[i] = true;
                    if eq(old[i], &candidate) {
                        builder.push(old[i].clone(), EntryState::Cached);
                    } else {
                        builder.push(candidate, EntryState::Modified);
                    }
                }
                _ => builder.push(candidate, EntryState::Added),
            }
        }

        for (i, value) in old.iter().enumerate() {
            if !consumed[i] {
                builder.push((*value).clone(), EntryState::Removed);
            }
        }

        builder.finish()
    }
}

/// Mutable staging area for a table
///
/// Never shared with another step; [`TableBuilder::finish`] freezes it.
#[derive(Debug)]
pub struct TableBuilder<T> {
    entries: Vec<Entry<T>>,
}

impl<T> TableBuilder<T> {
    pub fn new() -> Self {
        TableBuilder {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        TableBuilder {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: T, state: EntryState) {
        self.entries.push(Entry::new(value, state));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> StateTable<T> {
        StateTable {
            entries: Arc::from(self.entries),
        }
    }
}

impl<T> Default for TableBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

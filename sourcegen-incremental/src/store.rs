//! Table store
//!
//! The engine's persistent cache: one [`StateTable`] per step identity,
//! carried from one run to the next. A published [`TableStore`] is never
//! mutated; each run assembles a fresh one through a [`TableStoreBuilder`].

use crate::error::EngineError;
use crate::node::{GraphId, NodeId};
use crate::table::{EntryState, StateTable};
use hashbrown::HashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Which of a node's tables a key refers to
///
/// Most nodes publish only [`TablePart::Output`]; nodes that cache work per
/// input item publish intermediate tables alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TablePart {
    /// The node's visible output
    Output,

    /// Per syntax tree intermediate results
    PerTree,

    /// Per upstream entry intermediate results
    PerInput,

    /// Selector: per file global alias declarations
    Aliases,

    /// Selector: per file compilation unit roots
    Units,

    /// Selector: compilation-wide alias set
    GlobalAliases,

    /// Selector: per file matching results
    Matches,
}

/// Stable identity of one table across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub graph: GraphId,
    pub node: NodeId,
    pub part: TablePart,
}

impl TableKey {
    pub fn new(graph: GraphId, node: NodeId, part: TablePart) -> Self {
        TableKey { graph, node, part }
    }

    pub fn output(graph: GraphId, node: NodeId) -> Self {
        Self::new(graph, node, TablePart::Output)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{:?}", self.graph, self.node, self.part)
    }
}

/// Type-erased view of a table, so tables of every value type share a store
pub(crate) trait ErasedTable: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_cached(&self) -> Arc<dyn ErasedTable>;

    fn states(&self) -> Vec<EntryState>;

    fn len(&self) -> usize;
}

impl<T> ErasedTable for StateTable<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_cached(&self) -> Arc<dyn ErasedTable> {
        Arc::new(StateTable::as_cached(self))
    }

    fn states(&self) -> Vec<EntryState> {
        StateTable::states(self)
    }

    fn len(&self) -> usize {
        StateTable::len(self)
    }
}

fn downcast<T: Clone + Send + Sync + 'static>(
    key: TableKey,
    table: &Arc<dyn ErasedTable>,
) -> Result<StateTable<T>, EngineError> {
    table
        .as_any()
        .downcast_ref::<StateTable<T>>()
        .cloned()
        .ok_or(EngineError::TableTypeMismatch { key })
}

/// Published snapshot of every step's latest table
#[derive(Clone, Default)]
pub struct TableStore {
    tables: HashMap<TableKey, Arc<dyn ErasedTable>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table for `key`, if the step ran before
    pub fn get<T: Clone + Send + Sync + 'static>(
        &self,
        key: TableKey,
    ) -> Result<Option<StateTable<T>>, EngineError> {
        self.tables.get(&key).map(|t| downcast(key, t)).transpose()
    }

    /// The table for `key`, or an empty table on a step's first run
    pub fn get_or_empty<T: Clone + Send + Sync + 'static>(
        &self,
        key: TableKey,
    ) -> Result<StateTable<T>, EngineError> {
        Ok(self.get(key)?.unwrap_or_default())
    }

    pub fn contains(&self, key: TableKey) -> bool {
        self.tables.contains_key(&key)
    }

    /// Entry states of a table without knowing its value type
    pub fn states(&self, key: TableKey) -> Option<Vec<EntryState>> {
        self.tables.get(&key).map(|t| t.states())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<TableKey> {
        let mut keys: Vec<_> = self.tables.keys().copied().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for TableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in self.keys() {
            if let Some(table) = self.tables.get(&key) {
                map.entry(&key, &table.len());
            }
        }
        map.finish()
    }
}

/// Staging area for the store a run will publish
#[derive(Default)]
pub struct TableStoreBuilder {
    tables: HashMap<TableKey, Arc<dyn ErasedTable>>,
}

impl TableStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table for `key`
    pub fn set<T: Clone + Send + Sync + 'static>(&mut self, key: TableKey, table: StateTable<T>) {
        self.tables.insert(key, Arc::new(table));
    }

    /// A table produced earlier in this run
    pub fn get<T: Clone + Send + Sync + 'static>(
        &self,
        key: TableKey,
    ) -> Result<Option<StateTable<T>>, EngineError> {
        self.tables.get(&key).map(|t| downcast(key, t)).transpose()
    }

    pub fn contains(&self, key: TableKey) -> bool {
        self.tables.contains_key(&key)
    }

    pub(crate) fn states(&self, key: TableKey) -> Option<Vec<EntryState>> {
        self.tables.get(&key).map(|t| t.states())
    }

    /// Copy every table `node` published last run, marked cached.
    ///
    /// Returns false if the node never published an output table.
    pub fn carry_over(&mut self, previous: &TableStore, graph: GraphId, node: NodeId) -> bool {
        let output = TableKey::output(graph, node);
        if !previous.contains(output) {
            return false;
        }
        for (key, table) in previous.tables.iter() {
            if key.graph == graph && key.node == node {
                self.tables.insert(*key, table.as_cached());
            }
        }
        true
    }

    pub fn finish(self) -> TableStore {
        TableStore {
            tables: self.tables,
        }
    }
}

impl fmt::Debug for TableStoreBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableStoreBuilder")
            .field("tables", &self.tables.len())
            .finish()
    }
}

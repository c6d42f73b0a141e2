//! Per-node execution context

use crate::cancel::CancellationToken;
use crate::error::EngineError;
use crate::node::{GraphId, NodeId};
use crate::store::{TableKey, TablePart, TableStore, TableStoreBuilder};
use crate::table::{EntryState, StateTable};
use sourcegen_types::{AdditionalText, SyntaxTree};

/// External inputs of one run
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunInputs<'a> {
    pub trees: &'a [SyntaxTree],
    pub texts: &'a [AdditionalText],
}

/// An internal step reported by a node alongside its own output
#[derive(Debug, Clone)]
pub(crate) struct SubStep {
    pub suffix: &'static str,
    pub states: Vec<EntryState>,
    pub executions: usize,
}

/// What a node sees while it runs
///
/// Reads go to the previous published store or to tables produced earlier
/// in this run; writes go only to this node's own keys.
pub(crate) struct RunContext<'a> {
    pub graph: GraphId,
    pub node: NodeId,
    pub previous: &'a TableStore,
    pub tables: &'a mut TableStoreBuilder,
    pub inputs: RunInputs<'a>,
    pub cancel: &'a CancellationToken,
    pub executions: usize,
    pub substeps: Vec<SubStep>,
}

impl<'a> RunContext<'a> {
    /// This node's table from the previous run
    pub fn previous<T: Clone + Send + Sync + 'static>(
        &self,
        part: TablePart,
    ) -> Result<Option<StateTable<T>>, EngineError> {
        self.previous
            .get(TableKey::new(self.graph, self.node, part))
    }

    /// Another node's output from the previous run
    pub fn previous_output_of<T: Clone + Send + Sync + 'static>(
        &self,
        node: NodeId,
    ) -> Result<StateTable<T>, EngineError> {
        self.previous
            .get_or_empty(TableKey::output(self.graph, node))
    }

    /// An upstream node's output from this run
    pub fn input<T: Clone + Send + Sync + 'static>(
        &self,
        node: NodeId,
    ) -> Result<StateTable<T>, EngineError> {
        Ok(self
            .tables
            .get(TableKey::output(self.graph, node))?
            .unwrap_or_default())
    }

    pub fn publish<T: Clone + Send + Sync + 'static>(&mut self, part: TablePart, table: StateTable<T>) {
        self.tables
            .set(TableKey::new(self.graph, self.node, part), table);
    }

    /// Record units of user work (transforms run, files walked)
    pub fn executed(&mut self, count: usize) {
        self.executions += count;
    }

    pub fn check_cancelled(&self) -> Result<(), EngineError> {
        self.cancel.check()
    }

    pub fn substep<T>(&mut self, suffix: &'static str, table: &StateTable<T>, executions: usize) {
        self.substeps.push(SubStep {
            suffix,
            states: table.states(),
            executions,
        });
    }
}

//! Driver state and the edit-application protocol
//!
//! A [`DriverState`] is an immutable value. Every operation returns a new
//! state and leaves the receiver valid, so a cancelled or failed run simply
//! means the caller keeps using the state it already had.
//!
//! ```text
//!             queue_edit              apply_pending_edits (ok)
//!   Clean ─────────────────▶ EditsPending ──────────────────────▶ Clean
//!     ▲                           │
//!     │ run_full                  │ apply_pending_edits (unmappable edit)
//!     │                           ▼
//!     └────────────────────── EditsFailed  (sticky until run_full)
//! ```

use crate::cancel::CancellationToken;
use crate::config::DriverOptions;
use crate::context::RunInputs;
use crate::edits;
use crate::error::{EditFailure, EngineError};
use crate::executor::{self, GeneratorRun, RunMode};
use crate::node::{GraphId, Revision};
use crate::pipeline::Generator;
use crate::result::DriverRunResult;
use crate::store::{TableStore, TableStoreBuilder};
use sourcegen_types::{AdditionalText, Compilation, PendingEdit};
use std::sync::Arc;
use std::time::Instant;

/// Where a driver stands with respect to queued edits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverStatus {
    /// No pending edits
    Clean,

    /// Edits queued but not yet applied
    EditsPending,

    /// A batch of edits could not be absorbed; only a full run clears this
    EditsFailed(EditFailure),
}

/// Registered generators, cached tables, auxiliary texts, and pending edits
#[derive(Debug, Clone)]
pub struct DriverState {
    generators: Arc<[Generator]>,
    options: Arc<DriverOptions>,
    texts: Arc<[AdditionalText]>,
    tables: Arc<TableStore>,
    pending: Arc<[PendingEdit]>,
    edit_failure: Option<EditFailure>,
    last_result: Option<Arc<DriverRunResult>>,
    /// Inputs the published tables were computed from
    last_trees: Option<Compilation>,
    last_texts: Option<Arc<[AdditionalText]>>,
    revision: Revision,
}

impl DriverState {
    pub fn new(generators: Vec<Generator>, options: DriverOptions) -> Self {
        DriverState {
            generators: Arc::from(generators),
            options: Arc::new(options),
            texts: Arc::from(Vec::new()),
            tables: Arc::new(TableStore::new()),
            pending: Arc::from(Vec::new()),
            edit_failure: None,
            last_result: None,
            last_trees: None,
            last_texts: None,
            revision: Revision::ZERO,
        }
    }

    pub fn status(&self) -> DriverStatus {
        match &self.edit_failure {
            Some(failure) => DriverStatus::EditsFailed(failure.clone()),
            None if !self.pending.is_empty() => DriverStatus::EditsPending,
            None => DriverStatus::Clean,
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn additional_texts(&self) -> &[AdditionalText] {
        &self.texts
    }

    pub fn pending_edits(&self) -> &[PendingEdit] {
        &self.pending
    }

    /// The published table store
    pub fn tables(&self) -> &Arc<TableStore> {
        &self.tables
    }

    /// Outputs of the most recent successful run
    pub fn last_result(&self) -> Option<&Arc<DriverRunResult>> {
        self.last_result.as_ref()
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Queue an auxiliary-input edit for the next application
    pub fn queue_edit(&self, edit: PendingEdit) -> DriverState {
        let mut pending = self.pending.to_vec();
        pending.push(edit);
        DriverState {
            pending: Arc::from(pending),
            ..self.clone()
        }
    }

    /// Absorb the queued edits by re-running only the steps that read
    /// auxiliary texts.
    ///
    /// If the edits cannot be reconciled with the last run, the returned
    /// state is [`DriverStatus::EditsFailed`] and keeps the previous result
    /// and tables; the caller is expected to fall back to [`run_full`].
    /// In that state this method does nothing.
    ///
    /// [`run_full`]: DriverState::run_full
    pub fn apply_pending_edits(
        &self,
        compilation: &Compilation,
        cancel: &CancellationToken,
    ) -> Result<DriverState, EngineError> {
        if self.edit_failure.is_some() {
            return Ok(self.clone());
        }
        if !self.options.incremental_edits {
            return Ok(self.fail(EditFailure::IncrementalEditsDisabled));
        }
        let Some(last_trees) = self.last_trees.as_ref().filter(|_| self.last_result.is_some()) else {
            return Ok(self.fail(EditFailure::NoPriorRun));
        };
        if !last_trees.same_trees(compilation) {
            return Ok(self.fail(EditFailure::SyntaxTreesChanged));
        }

        let texts_unchanged = self
            .last_texts
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, &self.texts) || **last == *self.texts);
        if self.pending.is_empty() && texts_unchanged {
            return Ok(self.clone());
        }

        let texts = match edits::apply_strict(&self.texts, &self.pending) {
            Ok(texts) => texts,
            Err(failure) => return Ok(self.fail(failure)),
        };
        self.execute(compilation, Arc::from(texts), RunMode::Edits, cancel)
    }

    /// Queue `edits` and apply everything pending
    pub fn apply_edits<I>(
        &self,
        edits: I,
        compilation: &Compilation,
        cancel: &CancellationToken,
    ) -> Result<DriverState, EngineError>
    where
        I: IntoIterator<Item = PendingEdit>,
    {
        let mut state = self.clone();
        for edit in edits {
            state = state.queue_edit(edit);
        }
        state.apply_pending_edits(compilation, cancel)
    }

    /// Recompute every step from the current inputs.
    ///
    /// Pending edits that still map onto the text set are folded in first;
    /// the rest are dropped. Clears any edit failure.
    pub fn run_full(
        &self,
        compilation: &Compilation,
        cancel: &CancellationToken,
    ) -> Result<DriverState, EngineError> {
        let texts = edits::apply_lenient(&self.texts, &self.pending);
        self.execute(compilation, Arc::from(texts), RunMode::Full, cancel)
    }

    /// Add auxiliary texts, replacing any with the same path
    pub fn add_additional_texts<I>(&self, texts: I) -> DriverState
    where
        I: IntoIterator<Item = AdditionalText>,
    {
        let mut current = self.texts.to_vec();
        for text in texts {
            match current.iter().position(|t| t.path() == text.path()) {
                Some(index) => current[index] = text,
                None => current.push(text),
            }
        }
        self.with_texts(current)
    }

    /// Remove auxiliary texts by path
    pub fn remove_additional_texts<'p, I>(&self, paths: I) -> DriverState
    where
        I: IntoIterator<Item = &'p str>,
    {
        let paths: Vec<&str> = paths.into_iter().collect();
        let remaining = self
            .texts
            .iter()
            .filter(|t| !paths.iter().any(|p| *p == t.path()))
            .cloned()
            .collect();
        self.with_texts(remaining)
    }

    /// Swap `old` for `new`; unchanged state if `old` is not present
    pub fn replace_additional_text(&self, old: &AdditionalText, new: AdditionalText) -> DriverState {
        let mut current = self.texts.to_vec();
        match current.iter().position(|t| t == old) {
            Some(index) => {
                current[index] = new;
                self.with_texts(current)
            }
            None => self.clone(),
        }
    }

    fn with_texts(&self, texts: Vec<AdditionalText>) -> DriverState {
        DriverState {
            texts: Arc::from(texts),
            ..self.clone()
        }
    }

    fn fail(&self, failure: EditFailure) -> DriverState {
        tracing::warn!(%failure, pending = self.pending.len(), "incremental edit application failed");
        DriverState {
            edit_failure: Some(failure),
            ..self.clone()
        }
    }

    /// Evaluate every generator and publish the result as a new state.
    /// Nothing is published unless every generator succeeds.
    fn execute(
        &self,
        compilation: &Compilation,
        texts: Arc<[AdditionalText]>,
        mode: RunMode,
        cancel: &CancellationToken,
    ) -> Result<DriverState, EngineError> {
        let started = Instant::now();
        let inputs = RunInputs {
            trees: compilation.trees(),
            texts: &texts,
        };
        let mut tables = TableStoreBuilder::new();
        let mut generators = Vec::with_capacity(self.generators.len());

        for (index, generator) in self.generators.iter().enumerate() {
            let run = GeneratorRun {
                graph: GraphId(index as u32),
                previous: &self.tables,
                tables: &mut tables,
                inputs,
                options: &self.options,
                mode,
                cancel,
            };
            generators.push(executor::run_generator(generator, run)?);
        }

        let revision = self.revision.next();
        let result = DriverRunResult {
            revision,
            generators,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            mode = mode.as_str(),
            %revision,
            sources = result.sources().count(),
            elapsed_ms = result.elapsed.as_secs_f64() * 1000.0,
            "driver run complete"
        );

        Ok(DriverState {
            generators: Arc::clone(&self.generators),
            options: Arc::clone(&self.options),
            texts: Arc::clone(&texts),
            tables: Arc::new(tables.finish()),
            pending: Arc::from(Vec::new()),
            edit_failure: None,
            last_result: Some(Arc::new(result)),
            last_trees: Some(compilation.clone()),
            last_texts: Some(texts),
            revision,
        })
    }
}

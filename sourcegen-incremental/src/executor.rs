//! Per-generator run loop

use crate::cancel::CancellationToken;
use crate::config::DriverOptions;
use crate::context::{RunContext, RunInputs};
use crate::error::EngineError;
use crate::metrics::StepRun;
use crate::node::{GraphId, NodeKind};
use crate::nodes::GeneratedSource;
use crate::pipeline::Generator;
use crate::result::GeneratorRunResult;
use crate::store::{TableKey, TableStore, TableStoreBuilder};
use hashbrown::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// How much of the graph a run re-evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    /// Every step, diffed against the previous tables
    Full,

    /// Only steps that read auxiliary texts; the rest keep last run's tables
    Edits,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Edits => "edits",
        }
    }
}

/// Everything one generator needs to evaluate its graph
pub(crate) struct GeneratorRun<'a> {
    pub graph: GraphId,
    pub previous: &'a TableStore,
    pub tables: &'a mut TableStoreBuilder,
    pub inputs: RunInputs<'a>,
    pub options: &'a DriverOptions,
    pub mode: RunMode,
    pub cancel: &'a CancellationToken,
}

pub(crate) fn run_generator(
    generator: &Generator,
    run: GeneratorRun<'_>,
) -> Result<GeneratorRunResult, EngineError> {
    let started = Instant::now();
    let GeneratorRun {
        graph,
        previous,
        tables,
        inputs,
        options,
        mode,
        cancel,
    } = run;
    let mut steps = Vec::new();

    for node in &generator.pipeline.nodes {
        cancel.check()?;

        if let NodeKind::Output { kind, .. } = node.kind {
            if !options.is_output_enabled(kind) {
                continue;
            }
        }

        let step_started = Instant::now();

        if mode == RunMode::Edits
            && !node.depends_on_texts
            && tables.carry_over(previous, graph, node.id)
        {
            if let (true, Some(name)) = (options.track_incremental_steps, &node.name) {
                let states = tables
                    .states(TableKey::output(graph, node.id))
                    .unwrap_or_default();
                steps.push(StepRun {
                    name: Arc::clone(name),
                    node: node.id,
                    states,
                    executions: 0,
                    elapsed: step_started.elapsed(),
                });
            }
            continue;
        }

        let mut ctx = RunContext {
            graph,
            node: node.id,
            previous,
            tables: &mut *tables,
            inputs,
            cancel,
            executions: 0,
            substeps: Vec::new(),
        };
        node.exec.execute(&mut ctx)?;
        let RunContext {
            executions,
            substeps,
            ..
        } = ctx;
        let elapsed = step_started.elapsed();

        let states = tables
            .states(TableKey::output(graph, node.id))
            .unwrap_or_default();
        tracing::debug!(
            generator = generator.name(),
            node = %node.id,
            step = node.name.as_deref().unwrap_or(node.kind.label()),
            entries = states.len(),
            executions,
            "evaluated step"
        );

        if let (true, Some(name)) = (options.track_incremental_steps, &node.name) {
            for sub in substeps {
                steps.push(StepRun {
                    name: Arc::from(format!("{}.{}", name, sub.suffix)),
                    node: node.id,
                    states: sub.states,
                    executions: sub.executions,
                    elapsed,
                });
            }
            steps.push(StepRun {
                name: Arc::clone(name),
                node: node.id,
                states,
                executions,
                elapsed,
            });
        }
    }

    let mut sources: Vec<GeneratedSource> = Vec::new();
    let mut hints = HashSet::new();
    for (node, kind) in &generator.pipeline.outputs {
        if !options.is_output_enabled(*kind) {
            continue;
        }
        let table = tables
            .get::<GeneratedSource>(TableKey::output(graph, *node))?
            .unwrap_or_default();
        for source in table.values() {
            if !hints.insert(Arc::clone(&source.hint_name)) {
                return Err(EngineError::DuplicateHintName {
                    generator: generator.name().to_owned(),
                    hint: source.hint_name.to_string(),
                });
            }
            sources.push(source.clone());
        }
    }

    Ok(GeneratorRunResult {
        generator: Arc::clone(generator.name_arc()),
        sources,
        steps,
        elapsed: started.elapsed(),
    })
}

//! Run results

use crate::metrics::{MetricsSnapshot, StepRun};
use crate::node::Revision;
use crate::nodes::GeneratedSource;
use std::sync::Arc;
use std::time::Duration;

/// What one generator produced in one run
#[derive(Debug, Clone)]
pub struct GeneratorRunResult {
    pub generator: Arc<str>,

    /// Generated files, in output registration order
    pub sources: Vec<GeneratedSource>,

    /// Named steps, in evaluation order; empty unless step tracking is on
    pub steps: Vec<StepRun>,

    pub elapsed: Duration,
}

impl GeneratorRunResult {
    pub fn source(&self, hint_name: &str) -> Option<&GeneratedSource> {
        self.sources.iter().find(|s| &*s.hint_name == hint_name)
    }

    pub fn step(&self, name: &str) -> Option<&StepRun> {
        self.steps.iter().find(|s| &*s.name == name)
    }

    pub fn metrics(&self) -> Vec<MetricsSnapshot> {
        self.steps.iter().map(StepRun::metrics).collect()
    }
}

/// Outputs of every generator for one published driver state
#[derive(Debug, Clone)]
pub struct DriverRunResult {
    pub revision: Revision,
    pub generators: Vec<GeneratorRunResult>,
    pub elapsed: Duration,
}

impl DriverRunResult {
    pub fn generator(&self, name: &str) -> Option<&GeneratorRunResult> {
        self.generators.iter().find(|g| &*g.generator == name)
    }

    /// All generated files, generator by generator
    pub fn sources(&self) -> impl Iterator<Item = &GeneratedSource> + '_ {
        self.generators.iter().flat_map(|g| g.sources.iter())
    }

    /// Same generated files from the same generators, ignoring timing and
    /// step tracking
    pub fn same_outputs(&self, other: &DriverRunResult) -> bool {
        self.generators.len() == other.generators.len()
            && self
                .generators
                .iter()
                .zip(other.generators.iter())
                .all(|(a, b)| a.generator == b.generator && a.sources == b.sources)
    }
}

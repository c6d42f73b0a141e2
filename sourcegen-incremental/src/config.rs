//! Driver options

use crate::nodes::OutputKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Options fixed for the lifetime of a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOptions {
    /// Record a [`StepRun`](crate::metrics::StepRun) for every named step
    #[serde(default)]
    pub track_incremental_steps: bool,

    /// Allow pending edits to be absorbed without a full run
    #[serde(default = "default_true")]
    pub incremental_edits: bool,

    /// Output kinds that are never evaluated
    #[serde(default)]
    pub disabled_outputs: Vec<OutputKind>,
}

fn default_true() -> bool {
    true
}

impl Default for DriverOptions {
    fn default() -> Self {
        DriverOptions {
            track_incremental_steps: false,
            incremental_edits: true,
            disabled_outputs: Vec::new(),
        }
    }
}

impl DriverOptions {
    /// Load options from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn with_step_tracking(mut self) -> Self {
        self.track_incremental_steps = true;
        self
    }

    pub fn without_incremental_edits(mut self) -> Self {
        self.incremental_edits = false;
        self
    }

    pub fn disable_output(mut self, kind: OutputKind) -> Self {
        if !self.disabled_outputs.contains(&kind) {
            self.disabled_outputs.push(kind);
        }
        self
    }

    pub fn is_output_enabled(&self, kind: OutputKind) -> bool {
        !self.disabled_outputs.contains(&kind)
    }
}

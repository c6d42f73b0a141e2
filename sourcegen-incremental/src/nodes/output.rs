//! Output nodes and generated sources

use crate::context::RunContext;
use crate::error::EngineError;
use crate::node::NodeId;
use crate::nodes::NodeExec;
use crate::store::TablePart;
use crate::table::StateTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Category of a registered output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Sources that affect semantic analysis
    Source,

    /// Sources only needed to emit the final program
    Implementation,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Source => write!(f, "source"),
            OutputKind::Implementation => write!(f, "implementation"),
        }
    }
}

/// A generated file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneratedSource {
    pub hint_name: Arc<str>,
    pub text: Arc<str>,
}

impl GeneratedSource {
    pub fn new(hint_name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        GeneratedSource {
            hint_name: hint_name.into(),
            text: text.into(),
        }
    }
}

pub(crate) struct OutputNode {
    pub input: NodeId,
}

impl NodeExec for OutputNode {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let input = ctx.input::<GeneratedSource>(self.input)?;
        let previous = ctx.previous::<GeneratedSource>(TablePart::Output)?;

        let table = match previous {
            Some(previous) if input.is_cached() => previous.as_cached(),
            previous => StateTable::diff(
                &previous.unwrap_or_default(),
                input.values().cloned(),
                |a, b| a == b,
            ),
        };

        ctx.publish(TablePart::Output, table);
        Ok(())
    }
}

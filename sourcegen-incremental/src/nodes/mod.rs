//! Pipeline node executors
//!
//! Each executor turns its inputs' tables for the current run, plus its own
//! tables from the previous run, into fresh tables. The shared rule: when
//! every input is fully cached and a previous output exists, the previous
//! output is republished as cached without invoking user code.

pub(crate) mod inputs;
pub mod output;
pub mod syntax;
pub(crate) mod transform;

pub use output::{GeneratedSource, OutputKind};
pub use syntax::SyntaxContext;

use crate::context::RunContext;
use crate::error::EngineError;
use crate::table::{Entry, EntryState};

/// A type-erased node body
pub(crate) trait NodeExec: Send + Sync {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError>;
}

/// The previous result at live position `index`, if the upstream entry there
/// is cached and equal to the upstream value that produced it.
pub(crate) fn reusable<'p, T: PartialEq, U>(
    entry: &Entry<T>,
    index: usize,
    previous_inputs: &[&T],
    previous_outputs: &[&'p U],
) -> Option<&'p U> {
    if entry.state != EntryState::Cached {
        return None;
    }
    match (previous_inputs.get(index), previous_outputs.get(index)) {
        (Some(old), Some(out)) if **old == entry.value => Some(*out),
        _ => None,
    }
}

//! Input nodes
//!
//! These are the leaves of every graph: the compilation's syntax trees and
//! the auxiliary texts, both diffed by identity against the last run.

use crate::context::RunContext;
use crate::error::EngineError;
use crate::nodes::NodeExec;
use crate::store::TablePart;
use crate::table::StateTable;
use sourcegen_types::{AdditionalText, SyntaxTree};

/// Publishes the current syntax trees, keyed by tree id
pub(crate) struct SyntaxTreesNode;

impl NodeExec for SyntaxTreesNode {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let previous = ctx
            .previous::<SyntaxTree>(TablePart::Output)?
            .unwrap_or_default();

        let table = StateTable::diff_by_key(
            &previous,
            ctx.inputs.trees.iter().cloned(),
            |tree| tree.id(),
            |a, b| a.path() == b.path() && a.same_content(b),
        );

        ctx.publish(TablePart::Output, table);
        Ok(())
    }
}

/// Publishes the current auxiliary texts, keyed by path
pub(crate) struct AdditionalTextsNode;

impl NodeExec for AdditionalTextsNode {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let previous = ctx
            .previous::<AdditionalText>(TablePart::Output)?
            .unwrap_or_default();

        let table = StateTable::diff_by_key(
            &previous,
            ctx.inputs.texts.iter().cloned(),
            |text| text.path().to_owned(),
            |a, b| a == b,
        );

        ctx.publish(TablePart::Output, table);
        Ok(())
    }
}

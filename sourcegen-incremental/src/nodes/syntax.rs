//! Syntax filter + transform node
//!
//! Walks every syntax tree, keeps the nodes a predicate accepts, and maps
//! each one. Results are cached per tree, so a run only re-walks trees whose
//! syntax changed.

use crate::context::RunContext;
use crate::error::EngineError;
use crate::node::{NodeId, PipelineValue};
use crate::nodes::NodeExec;
use crate::store::TablePart;
use crate::table::{EntryState, StateTable};
use hashbrown::HashMap;
use sourcegen_types::{SyntaxNode, SyntaxTree, TreeId};
use std::sync::Arc;

/// What a transform sees for one matched node
#[derive(Debug, Clone, Copy)]
pub struct SyntaxContext<'a> {
    pub node: &'a Arc<SyntaxNode>,
    pub tree: &'a SyntaxTree,
}

/// One tree's mapped matches, in document order
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TreeItems<T> {
    pub tree: TreeId,
    pub items: Arc<[T]>,
}

pub(crate) type Predicate = dyn Fn(&SyntaxNode) -> bool + Send + Sync;
pub(crate) type Transform<T> = dyn Fn(&SyntaxContext<'_>) -> T + Send + Sync;

pub(crate) struct SourceFilterTransformNode<T> {
    pub trees: NodeId,
    pub predicate: Arc<Predicate>,
    pub transform: Arc<Transform<T>>,
}

impl<T: PipelineValue> SourceFilterTransformNode<T> {
    fn walk(
        &self,
        tree: &SyntaxTree,
        node: &Arc<SyntaxNode>,
        ctx: &RunContext<'_>,
        out: &mut Vec<T>,
    ) -> Result<(), EngineError> {
        ctx.check_cancelled()?;

        if (self.predicate)(node) {
            out.push((self.transform)(&SyntaxContext { node, tree }));
        }
        for child in node.children() {
            self.walk(tree, child, ctx, out)?;
        }
        Ok(())
    }
}

impl<T: PipelineValue> NodeExec for SourceFilterTransformNode<T> {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let trees = ctx.input::<SyntaxTree>(self.trees)?;
        let prev_per_tree = ctx.previous::<TreeItems<T>>(TablePart::PerTree)?;
        let prev_output = ctx.previous::<T>(TablePart::Output)?;

        if let (Some(per_tree), Some(output)) = (&prev_per_tree, &prev_output) {
            if trees.is_cached() {
                ctx.publish(TablePart::PerTree, per_tree.as_cached());
                ctx.publish(TablePart::Output, output.as_cached());
                return Ok(());
            }
        }

        let prev_per_tree = prev_per_tree.unwrap_or_default();
        let by_tree: HashMap<TreeId, &TreeItems<T>> =
            prev_per_tree.values().map(|t| (t.tree, t)).collect();

        let mut candidates = Vec::new();
        let mut walked = 0;
        for entry in trees.live() {
            ctx.check_cancelled()?;
            let tree = &entry.value;

            if entry.state == EntryState::Cached {
                if let Some(items) = by_tree.get(&tree.id()) {
                    candidates.push((*items).clone());
                    continue;
                }
            }

            let mut items = Vec::new();
            self.walk(tree, tree.root(), ctx, &mut items)?;
            walked += 1;
            candidates.push(TreeItems {
                tree: tree.id(),
                items: Arc::from(items),
            });
        }

        let per_tree = StateTable::diff_by_key(&prev_per_tree, candidates, |t| t.tree, |a, b| {
            a.items == b.items
        });
        let output = StateTable::diff(
            &prev_output.unwrap_or_default(),
            per_tree.values().flat_map(|t| t.items.iter().cloned()),
            |a, b| a == b,
        );

        tracing::trace!(node = %ctx.node, walked, "filter transform re-walked trees");
        ctx.executed(walked);
        ctx.publish(TablePart::PerTree, per_tree);
        ctx.publish(TablePart::Output, output);
        Ok(())
    }
}

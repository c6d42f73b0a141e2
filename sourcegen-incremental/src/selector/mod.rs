//! Alias-aware marker selector
//!
//! Finds declarations carrying a marker, written directly or through import
//! aliases. Work is split into per-file tables so that an edit to one file
//! only re-walks that file:
//!
//! 1. `Aliases`: each file's `global using X = Y;` pairs
//! 2. `Units`: each file's compilation unit
//! 3. `GlobalAliases`: the concatenation of (1), recomputed only when some
//!    file's aliases changed
//! 4. `Matches`: each file's matched declarations
//!
//! A file is re-walked when its syntax changed, or when a global alias name
//! it looked up during its last walk now resolves differently.

mod aliases;
mod matcher;

pub use aliases::{AliasPair, GlobalAliases};
pub use matcher::{is_valid_marker_name, NodeShape, MARKER_SUFFIX};

pub(crate) use matcher::MarkerTarget;

use crate::context::RunContext;
use crate::error::EngineError;
use crate::node::NodeId;
use crate::nodes::NodeExec;
use crate::store::TablePart;
use crate::table::{EntryState, StateTable};
use aliases::{changed_alias_names, AliasIndex};
use hashbrown::HashMap;
use sourcegen_types::{SyntaxNode, SyntaxTree, TreeId};
use std::sync::Arc;

/// A declaration selected by marker, with the tree it lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchedNode {
    pub tree: TreeId,
    pub node: Arc<SyntaxNode>,
}

impl MatchedNode {
    pub fn name(&self) -> Option<&str> {
        self.node.name()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FileAliases {
    tree: TreeId,
    aliases: GlobalAliases,
}

#[derive(Debug, Clone)]
pub(crate) struct FileUnit {
    tree: TreeId,
    root: Arc<SyntaxNode>,
}

impl PartialEq for FileUnit {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree && (Arc::ptr_eq(&self.root, &other.root) || self.root == other.root)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FileMatches {
    tree: TreeId,
    nodes: Arc<[MatchedNode]>,
    /// Global alias names the last walk looked up
    consulted: Arc<[String]>,
}

pub(crate) struct AliasSelectorNode {
    pub trees: NodeId,
    pub target: MarkerTarget,
    pub shape: NodeShape,
}

impl AliasSelectorNode {
    fn file_aliases(
        &self,
        ctx: &mut RunContext<'_>,
        trees: &StateTable<SyntaxTree>,
    ) -> Result<StateTable<FileAliases>, EngineError> {
        let previous = ctx.previous::<FileAliases>(TablePart::Aliases)?.unwrap_or_default();
        let by_tree: HashMap<TreeId, &FileAliases> =
            previous.values().map(|a| (a.tree, a)).collect();

        let mut candidates = Vec::with_capacity(trees.len());
        let mut executed = 0;
        for entry in trees.live() {
            let tree = &entry.value;
            if entry.state == EntryState::Cached {
                if let Some(aliases) = by_tree.get(&tree.id()) {
                    candidates.push((*aliases).clone());
                    continue;
                }
            }
            executed += 1;
            candidates.push(FileAliases {
                tree: tree.id(),
                aliases: GlobalAliases::from_compilation_unit(tree.root()),
            });
        }

        let table = StateTable::diff_by_key(&previous, candidates, |a| a.tree, |a, b| a == b);
        ctx.substep("aliases", &table, executed);
        Ok(table)
    }

    fn file_units(
        &self,
        ctx: &mut RunContext<'_>,
        trees: &StateTable<SyntaxTree>,
    ) -> Result<StateTable<FileUnit>, EngineError> {
        let previous = ctx.previous::<FileUnit>(TablePart::Units)?.unwrap_or_default();
        let table = StateTable::diff_by_key(
            &previous,
            trees.values().map(|tree| FileUnit {
                tree: tree.id(),
                root: Arc::clone(tree.root()),
            }),
            |u| u.tree,
            |a, b| a == b,
        );
        ctx.substep("units", &table, 0);
        Ok(table)
    }

    /// The aggregate alias set, plus the set the previous run published
    fn global_aliases(
        &self,
        ctx: &mut RunContext<'_>,
        per_file: &StateTable<FileAliases>,
    ) -> Result<(StateTable<GlobalAliases>, GlobalAliases), EngineError> {
        let previous = ctx.previous::<GlobalAliases>(TablePart::GlobalAliases)?;
        let before = previous
            .as_ref()
            .and_then(|t| t.single().cloned())
            .unwrap_or_default();

        let (table, executed) = match previous {
            Some(previous) if per_file.is_cached() && !previous.is_empty() => (previous.as_cached(), 0),
            previous => {
                let all = GlobalAliases::concat(per_file.values().map(|f| &f.aliases));
                (StateTable::diff(&previous.unwrap_or_default(), [all], |a, b| a == b), 1)
            }
        };
        ctx.substep("global_aliases", &table, executed);
        Ok((table, before))
    }
}

impl NodeExec for AliasSelectorNode {
    fn execute(&self, ctx: &mut RunContext<'_>) -> Result<(), EngineError> {
        let trees = ctx.input::<SyntaxTree>(self.trees)?;

        let per_file_aliases = self.file_aliases(ctx, &trees)?;
        let units = self.file_units(ctx, &trees)?;
        let (global, before) = self.global_aliases(ctx, &per_file_aliases)?;

        let current = global.single().cloned().unwrap_or_default();
        let changed_names = if global.is_cached() {
            Default::default()
        } else {
            changed_alias_names(&before, &current)
        };

        let prev_matches = ctx.previous::<FileMatches>(TablePart::Matches)?.unwrap_or_default();
        let by_tree: HashMap<TreeId, &FileMatches> =
            prev_matches.values().map(|m| (m.tree, m)).collect();
        let index = AliasIndex::new(&current);

        let mut candidates = Vec::with_capacity(units.len());
        let mut walked = 0;
        for unit in units.live() {
            ctx.check_cancelled()?;
            let file = &unit.value;

            if unit.state == EntryState::Cached {
                if let Some(previous) = by_tree.get(&file.tree) {
                    let affected = previous
                        .consulted
                        .iter()
                        .any(|name| changed_names.contains(name));
                    if !affected {
                        candidates.push((*previous).clone());
                        continue;
                    }
                }
            }

            let scan = matcher::scan_file(&file.root, &self.target, &self.shape, &index, ctx.cancel)?;
            walked += 1;
            tracing::trace!(
                node = %ctx.node,
                tree = %file.tree,
                matches = scan.nodes.len(),
                "selector walked file"
            );
            candidates.push(FileMatches {
                tree: file.tree,
                nodes: scan
                    .nodes
                    .into_iter()
                    .map(|node| MatchedNode { tree: file.tree, node })
                    .collect(),
                consulted: Arc::from(scan.consulted),
            });
        }

        let matches = StateTable::diff_by_key(&prev_matches, candidates, |m| m.tree, |a, b| a == b);
        ctx.substep("matches", &matches, walked);

        let output = match ctx.previous::<MatchedNode>(TablePart::Output)? {
            Some(previous) if matches.is_cached() => previous.as_cached(),
            previous => StateTable::diff(
                &previous.unwrap_or_default(),
                matches.values().flat_map(|m| m.nodes.iter().cloned()),
                |a, b| a == b,
            ),
        };

        ctx.executed(walked);
        ctx.publish(TablePart::Aliases, per_file_aliases);
        ctx.publish(TablePart::Units, units);
        ctx.publish(TablePart::GlobalAliases, global);
        ctx.publish(TablePart::Matches, matches);
        ctx.publish(TablePart::Output, output);
        Ok(())
    }
}

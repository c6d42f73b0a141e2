//! Marker resolution and the per-file walk

use super::aliases::{local_aliases, AliasIndex, AliasPair};
use crate::cancel::CancellationToken;
use crate::error::EngineError;
use sourcegen_types::{SyntaxKind, SyntaxNode};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Suffix a marker may be written with or without
pub const MARKER_SUFFIX: &str = "Attribute";

/// Which declarations a selector may return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeShape {
    /// Any declaration kind
    AnyDeclaration,

    /// Classes, structs, interfaces, records and enums
    TypeDeclaration,

    /// Exactly the listed kinds
    Kinds(Vec<SyntaxKind>),
}

impl NodeShape {
    pub fn kind(kind: SyntaxKind) -> Self {
        NodeShape::Kinds(vec![kind])
    }

    pub fn accepts(&self, kind: SyntaxKind) -> bool {
        match self {
            NodeShape::AnyDeclaration => kind.is_declaration(),
            NodeShape::TypeDeclaration => kind.is_type_declaration(),
            NodeShape::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

pub fn is_valid_marker_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// `name` equals `against`, or with `with_suffix` equals `against` minus a
/// trailing [`MARKER_SUFFIX`].
pub(crate) fn matches_name(name: &str, against: &str, with_suffix: bool) -> bool {
    if with_suffix {
        against.len() == name.len() + MARKER_SUFFIX.len()
            && against.ends_with(MARKER_SUFFIX)
            && against.starts_with(name)
    } else {
        name == against
    }
}

/// The literal names a marker resolves to: the name itself, plus the
/// suffixed form when it lacks one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MarkerTarget {
    literals: Vec<String>,
}

impl MarkerTarget {
    pub fn new(name: &str) -> Result<Self, EngineError> {
        if !is_valid_marker_name(name) {
            return Err(EngineError::InvalidMarkerName(name.to_owned()));
        }
        let mut literals = vec![name.to_owned()];
        if !name.ends_with(MARKER_SUFFIX) {
            literals.push(format!("{name}{MARKER_SUFFIX}"));
        }
        Ok(MarkerTarget { literals })
    }

    fn matches(&self, name: &str, with_suffix: bool) -> bool {
        self.literals
            .iter()
            .any(|literal| matches_name(name, literal, with_suffix))
    }
}

/// Result of walking one file
#[derive(Debug, Default)]
pub(crate) struct FileScan {
    pub nodes: Vec<Arc<SyntaxNode>>,
    /// Global alias names looked up, sorted
    pub consulted: Vec<String>,
}

pub(crate) fn scan_file(
    root: &Arc<SyntaxNode>,
    target: &MarkerTarget,
    shape: &NodeShape,
    global: &AliasIndex<'_>,
    cancel: &CancellationToken,
) -> Result<FileScan, EngineError> {
    let mut walk = Walk {
        target,
        shape,
        global,
        cancel,
        local: Vec::new(),
        seen: Vec::new(),
        consulted: BTreeSet::new(),
        results: Vec::new(),
        visited: 0,
        last_owner: None,
    };
    walk.visit(root, None)?;

    Ok(FileScan {
        nodes: walk.results,
        consulted: walk.consulted.into_iter().collect(),
    })
}

struct Walk<'w, 'a> {
    target: &'w MarkerTarget,
    shape: &'w NodeShape,
    global: &'w AliasIndex<'a>,
    cancel: &'w CancellationToken,
    /// Aliases of enclosing scopes, outermost first
    local: Vec<AliasPair>,
    seen: Vec<String>,
    consulted: BTreeSet<String>,
    results: Vec<Arc<SyntaxNode>>,
    /// Preorder position of the next node visited
    visited: usize,
    /// Preorder position of the last result's owner
    last_owner: Option<usize>,
}

impl Walk<'_, '_> {
    fn visit(
        &mut self,
        node: &Arc<SyntaxNode>,
        parent: Option<(&Arc<SyntaxNode>, usize)>,
    ) -> Result<(), EngineError> {
        self.cancel.check()?;
        let position = self.visited;
        self.visited += 1;

        match node.kind() {
            SyntaxKind::AttributeList => {
                // markers never nest, and arguments are not searched
                if let Some((owner, owner_position)) = parent {
                    self.scan_markers(node, owner, owner_position);
                }
                Ok(())
            }
            SyntaxKind::CompilationUnit | SyntaxKind::Namespace => {
                let depth = self.local.len();
                self.local.extend(local_aliases(node.usings()));
                let result = self.visit_children(node, position);
                self.local.truncate(depth);
                result
            }
            _ => self.visit_children(node, position),
        }
    }

    /// Attribute lists go first so that every match on a node is recorded
    /// before anything nested in it.
    fn visit_children(
        &mut self,
        node: &Arc<SyntaxNode>,
        position: usize,
    ) -> Result<(), EngineError> {
        let (lists, members): (Vec<_>, Vec<_>) = node
            .children()
            .iter()
            .partition(|c| c.kind() == SyntaxKind::AttributeList);

        for child in lists.into_iter().chain(members) {
            self.visit(child, Some((node, position)))?;
        }
        Ok(())
    }

    fn scan_markers(&mut self, list: &SyntaxNode, owner: &Arc<SyntaxNode>, position: usize) {
        if !self.shape.accepts(owner.kind()) || self.last_owner == Some(position) {
            return;
        }

        for marker in list.attributes() {
            let name = marker.simple_name();
            let found = [false, true].into_iter().any(|with_suffix| {
                self.seen.clear();
                resolves(
                    self.target,
                    &self.local,
                    self.global,
                    name,
                    with_suffix,
                    &mut self.seen,
                    &mut self.consulted,
                )
            });
            if found {
                self.results.push(Arc::clone(owner));
                self.last_owner = Some(position);
                return;
            }
        }
    }
}

/// Does `name` denote the target, directly or through aliases?
///
/// Local aliases are tried innermost first, then global ones. Names already
/// on the current resolution path are rejected, which breaks alias cycles.
fn resolves(
    target: &MarkerTarget,
    local: &[AliasPair],
    global: &AliasIndex<'_>,
    name: &str,
    with_suffix: bool,
    seen: &mut Vec<String>,
    consulted: &mut BTreeSet<String>,
) -> bool {
    if target.matches(name, with_suffix) {
        return true;
    }
    if seen.iter().any(|s| s == name) {
        return false;
    }
    seen.push(name.to_owned());

    for pair in local.iter().rev() {
        if matches_name(name, &pair.alias, with_suffix)
            && resolves(target, local, global, &pair.target, false, seen, consulted)
        {
            return true;
        }
    }

    let key = if with_suffix {
        format!("{name}{MARKER_SUFFIX}")
    } else {
        name.to_owned()
    };
    let targets = global.targets(&key);
    consulted.insert(key);
    for alias_target in targets {
        if resolves(target, local, global, alias_target, false, seen, consulted) {
            return true;
        }
    }

    seen.pop();
    false
}

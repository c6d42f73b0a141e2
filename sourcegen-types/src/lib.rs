//! Shared input types for sourcegen
//!
//! This crate holds the values the incremental engine consumes from the
//! outside world: already-parsed syntax trees, auxiliary (non-source) input
//! texts, and the edit feed describing how those texts changed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod syntax;

pub use syntax::{unqualified_name, Attribute, SyntaxKind, SyntaxNode, UsingDirective};

/// Stable identity of a syntax tree across edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeId(pub u64);

impl TreeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TreeId {
    fn from(id: u64) -> Self {
        TreeId(id)
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree#{}", self.0)
    }
}

/// A parsed source file
///
/// Equality is structural on the root; two snapshots sharing the same root
/// allocation compare equal without walking it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntaxTree {
    id: TreeId,
    path: Arc<str>,
    root: Arc<SyntaxNode>,
}

impl SyntaxTree {
    pub fn new(id: TreeId, path: impl Into<Arc<str>>, root: impl Into<Arc<SyntaxNode>>) -> Self {
        Self {
            id,
            path: path.into(),
            root: root.into(),
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> &Arc<SyntaxNode> {
        &self.root
    }

    /// Returns a new snapshot of this tree with a different root
    pub fn with_root(&self, root: impl Into<Arc<SyntaxNode>>) -> Self {
        Self {
            id: self.id,
            path: self.path.clone(),
            root: root.into(),
        }
    }

    /// True when both snapshots hold the same syntax
    pub fn same_content(&self, other: &SyntaxTree) -> bool {
        Arc::ptr_eq(&self.root, &other.root) || self.root == other.root
    }
}

/// The syntax trees of one compilation, in document order
#[derive(Debug, Clone)]
pub struct Compilation {
    trees: Arc<[SyntaxTree]>,
}

impl Default for Compilation {
    fn default() -> Self {
        Compilation::new(Vec::new())
    }
}

impl Compilation {
    pub fn new(trees: Vec<SyntaxTree>) -> Self {
        Compilation {
            trees: Arc::from(trees),
        }
    }

    pub fn trees(&self) -> &[SyntaxTree] {
        &self.trees
    }

    pub fn tree(&self, id: TreeId) -> Option<&SyntaxTree> {
        self.trees.iter().find(|t| t.id() == id)
    }

    /// A new compilation with the tree of the same id swapped for `tree`,
    /// or `tree` appended if no such tree exists
    pub fn with_tree(&self, tree: SyntaxTree) -> Self {
        let mut trees = self.trees.to_vec();
        match trees.iter().position(|t| t.id() == tree.id()) {
            Some(index) => trees[index] = tree,
            None => trees.push(tree),
        }
        Compilation::new(trees)
    }

    pub fn without_tree(&self, id: TreeId) -> Self {
        Compilation::new(self.trees.iter().filter(|t| t.id() != id).cloned().collect())
    }

    /// Same trees, in the same order, at the same paths, with the same syntax
    pub fn same_trees(&self, other: &Compilation) -> bool {
        Arc::ptr_eq(&self.trees, &other.trees)
            || (self.trees.len() == other.trees.len()
                && self
                    .trees
                    .iter()
                    .zip(other.trees.iter())
                    .all(|(a, b)| a.id() == b.id() && a.path() == b.path() && a.same_content(b)))
    }
}

/// Blake3 digest of an input's content
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        ContentHash(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}…)", &self.to_hex()[..12])
    }
}

/// A non-source input file, identified by path
#[derive(Debug, Clone)]
pub struct AdditionalText {
    path: Arc<str>,
    text: Arc<str>,
    hash: ContentHash,
}

impl AdditionalText {
    pub fn new(path: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let hash = ContentHash::of(text.as_bytes());
        Self {
            path: path.into(),
            text,
            hash,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn content_hash(&self) -> ContentHash {
        self.hash
    }
}

impl PartialEq for AdditionalText {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.hash == other.hash
    }
}

impl Eq for AdditionalText {}

/// A queued change to the auxiliary input set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingEdit {
    /// A new auxiliary input appeared
    AdditionalFileAdded(AdditionalText),

    /// An auxiliary input went away
    AdditionalFileRemoved(AdditionalText),

    /// An auxiliary input's content changed
    AdditionalFileChanged {
        old: AdditionalText,
        new: AdditionalText,
    },
}

impl PendingEdit {
    /// Path of the input this edit touches
    pub fn path(&self) -> &str {
        match self {
            PendingEdit::AdditionalFileAdded(text) | PendingEdit::AdditionalFileRemoved(text) => {
                text.path()
            }
            PendingEdit::AdditionalFileChanged { old, .. } => old.path(),
        }
    }
}

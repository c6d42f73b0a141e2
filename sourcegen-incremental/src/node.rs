//! Node identities and handles
//!
//! Every step of a pipeline gets a [`NodeId`] when the pipeline is built.
//! Ids are assigned in registration order, and a node can only name inputs
//! that already exist, so ascending id order is a topological order of the
//! graph.

use std::fmt;
use std::marker::PhantomData;

use crate::nodes::OutputKind;

/// Values that can flow between pipeline steps
///
/// Equality decides whether a recomputed value counts as cached.
pub trait PipelineValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T> PipelineValue for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Identity of a node within one pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Identity of a pipeline graph (one per registered generator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(pub u32);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Identity of a pipeline builder, used to reject foreign handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub(crate) u64);

/// Closed set of node shapes, with their declared inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The compilation's syntax trees
    SyntaxTrees,

    /// The auxiliary input texts
    AdditionalTexts,

    /// Filter syntax nodes and map each match
    SourceFilterTransform { trees: NodeId },

    /// Marker lookup with import alias resolution
    AliasSelector { trees: NodeId },

    /// Per-entry map over many values
    Select { input: NodeId },

    /// Map over a single value
    SelectValue { input: NodeId },

    /// One-to-many map, flattened
    SelectMany { input: NodeId },

    /// Gather many values into one
    Collect { input: NodeId },

    /// Pair each left entry with the right value
    Combine { left: NodeId, right: NodeId },

    /// Generated sources of a generator
    Output { input: NodeId, kind: OutputKind },
}

impl NodeKind {
    /// Upstream nodes this node reads
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            NodeKind::SyntaxTrees | NodeKind::AdditionalTexts => Vec::new(),
            NodeKind::SourceFilterTransform { trees } | NodeKind::AliasSelector { trees } => {
                vec![*trees]
            }
            NodeKind::Select { input }
            | NodeKind::SelectValue { input }
            | NodeKind::SelectMany { input }
            | NodeKind::Collect { input }
            | NodeKind::Output { input, .. } => vec![*input],
            NodeKind::Combine { left, right } => vec![*left, *right],
        }
    }

    /// Short label used in default step names
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::SyntaxTrees => "syntax_trees",
            NodeKind::AdditionalTexts => "additional_texts",
            NodeKind::SourceFilterTransform { .. } => "source_filter_transform",
            NodeKind::AliasSelector { .. } => "alias_selector",
            NodeKind::Select { .. } => "select",
            NodeKind::SelectValue { .. } => "select_value",
            NodeKind::SelectMany { .. } => "select_many",
            NodeKind::Collect { .. } => "collect",
            NodeKind::Combine { .. } => "combine",
            NodeKind::Output { .. } => "output",
        }
    }
}

/// Common surface of [`ValuesHandle`] and [`ValueHandle`]
pub trait Handle: Copy {
    fn node(&self) -> NodeId;

    fn pipeline(&self) -> PipelineId;
}

/// A step producing any number of values of type `T`
pub struct ValuesHandle<T> {
    pub(crate) node: NodeId,
    pub(crate) pipeline: PipelineId,
    _marker: PhantomData<fn() -> T>,
}

/// A step producing exactly one value of type `T`
pub struct ValueHandle<T> {
    pub(crate) node: NodeId,
    pub(crate) pipeline: PipelineId,
    _marker: PhantomData<fn() -> T>,
}

macro_rules! impl_handle {
    ($name:ident) => {
        impl<T> $name<T> {
            pub(crate) fn new(pipeline: PipelineId, node: NodeId) -> Self {
                $name {
                    node,
                    pipeline,
                    _marker: PhantomData,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("node", &self.node)
                    .finish()
            }
        }

        impl<T> Handle for $name<T> {
            fn node(&self) -> NodeId {
                self.node
            }

            fn pipeline(&self) -> PipelineId {
                self.pipeline
            }
        }
    };
}

impl_handle!(ValuesHandle);
impl_handle!(ValueHandle);

/// Counter of published driver states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(pub u64);

impl Revision {
    pub const ZERO: Revision = Revision(0);

    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

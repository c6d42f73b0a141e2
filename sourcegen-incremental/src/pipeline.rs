//! Pipeline construction
//!
//! A generator declares its steps once, through a [`PipelineBuilder`]. Each
//! registration returns a typed handle that later registrations take as
//! input; the finished graph is immutable and shared by every driver state
//! built from the generator.

use crate::error::EngineError;
use crate::node::{
    Handle, NodeId, NodeKind, PipelineId, PipelineValue, ValueHandle, ValuesHandle,
};
use crate::nodes::inputs::{AdditionalTextsNode, SyntaxTreesNode};
use crate::nodes::output::OutputNode;
use crate::nodes::syntax::SourceFilterTransformNode;
use crate::nodes::transform::{
    CollectNode, CombineNode, SelectManyNode, SelectNode, SelectValueNode,
};
use crate::nodes::{GeneratedSource, NodeExec, OutputKind, SyntaxContext};
use crate::selector::{AliasSelectorNode, MarkerTarget, MatchedNode, NodeShape};
use sourcegen_types::{AdditionalText, SyntaxNode, SyntaxTree};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_PIPELINE: AtomicU64 = AtomicU64::new(1);

/// One registered step
pub(crate) struct NodeDescriptor {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: Option<Arc<str>>,
    /// Reads the auxiliary texts, directly or through an upstream step
    pub depends_on_texts: bool,
    pub exec: Arc<dyn NodeExec>,
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("depends_on_texts", &self.depends_on_texts)
            .finish()
    }
}

/// A generator's finished step graph, in topological order
#[derive(Debug)]
pub(crate) struct Pipeline {
    pub nodes: Vec<NodeDescriptor>,
    pub outputs: Vec<(NodeId, OutputKind)>,
}

/// Registration API for a generator's steps
#[derive(Debug)]
pub struct PipelineBuilder {
    id: PipelineId,
    nodes: Vec<NodeDescriptor>,
    outputs: Vec<(NodeId, OutputKind)>,
    trees: Option<NodeId>,
    texts: Option<NodeId>,
    /// First handle passed in that another builder issued
    foreign: Option<NodeId>,
}

impl PipelineBuilder {
    fn new() -> Self {
        PipelineBuilder {
            id: PipelineId(NEXT_PIPELINE.fetch_add(1, Ordering::Relaxed)),
            nodes: Vec::new(),
            outputs: Vec::new(),
            trees: None,
            texts: None,
            foreign: None,
        }
    }

    fn push(&mut self, kind: NodeKind, exec: Arc<dyn NodeExec>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let depends_on_texts = matches!(kind, NodeKind::AdditionalTexts)
            || kind
                .inputs()
                .iter()
                .any(|input| self.nodes.get(input.index()).is_some_and(|n| n.depends_on_texts));

        self.nodes.push(NodeDescriptor {
            id,
            kind,
            name: None,
            depends_on_texts,
            exec,
        });
        id
    }

    /// Node id of a handle, remembering it if another builder issued it.
    /// A builder that saw a foreign handle never finishes.
    fn own<H: Handle>(&mut self, handle: &H) -> NodeId {
        let node = handle.node();
        if handle.pipeline() != self.id && self.foreign.is_none() {
            self.foreign = Some(node);
        }
        node
    }

    /// The compilation's syntax trees
    pub fn syntax_trees(&mut self) -> ValuesHandle<SyntaxTree> {
        let node = match self.trees {
            Some(node) => node,
            None => {
                let node = self.push(NodeKind::SyntaxTrees, Arc::new(SyntaxTreesNode));
                self.trees = Some(node);
                node
            }
        };
        ValuesHandle::new(self.id, node)
    }

    /// The auxiliary input texts
    pub fn additional_texts(&mut self) -> ValuesHandle<AdditionalText> {
        let node = match self.texts {
            Some(node) => node,
            None => {
                let node = self.push(NodeKind::AdditionalTexts, Arc::new(AdditionalTextsNode));
                self.texts = Some(node);
                node
            }
        };
        ValuesHandle::new(self.id, node)
    }

    /// Every syntax node accepted by `predicate`, mapped through `transform`,
    /// in tree order then document order
    pub fn source_filter_transform<T, P, F>(&mut self, predicate: P, transform: F) -> ValuesHandle<T>
    where
        T: PipelineValue,
        P: Fn(&SyntaxNode) -> bool + Send + Sync + 'static,
        F: Fn(&SyntaxContext<'_>) -> T + Send + Sync + 'static,
    {
        let trees = self.syntax_trees().node();
        let exec = SourceFilterTransformNode {
            trees,
            predicate: Arc::new(predicate),
            transform: Arc::new(transform),
        };
        let node = self.push(NodeKind::SourceFilterTransform { trees }, Arc::new(exec));
        ValuesHandle::new(self.id, node)
    }

    /// Declarations of the given shape carrying `marker`, directly or
    /// through an import alias
    pub fn alias_aware_selector(
        &mut self,
        marker: &str,
        shape: NodeShape,
    ) -> Result<ValuesHandle<MatchedNode>, EngineError> {
        let target = MarkerTarget::new(marker)?;
        let trees = self.syntax_trees().node();
        let exec = AliasSelectorNode {
            trees,
            target,
            shape,
        };
        let node = self.push(NodeKind::AliasSelector { trees }, Arc::new(exec));
        Ok(ValuesHandle::new(self.id, node))
    }

    pub fn select<T, U, F>(&mut self, input: &ValuesHandle<T>, map: F) -> ValuesHandle<U>
    where
        T: PipelineValue,
        U: PipelineValue,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let input = self.own(input);
        let exec = SelectNode {
            input,
            map: Arc::new(map),
        };
        let node = self.push(NodeKind::Select { input }, Arc::new(exec));
        ValuesHandle::new(self.id, node)
    }

    pub fn select_value<T, U, F>(&mut self, input: &ValueHandle<T>, map: F) -> ValueHandle<U>
    where
        T: PipelineValue,
        U: PipelineValue,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let input = self.own(input);
        let exec = SelectValueNode {
            input,
            map: Arc::new(map),
        };
        let node = self.push(NodeKind::SelectValue { input }, Arc::new(exec));
        ValueHandle::new(self.id, node)
    }

    /// One-to-many map. The flattened result is diffed as a whole, by
    /// position.
    pub fn select_many<T, U, F>(&mut self, input: &ValuesHandle<T>, map: F) -> ValuesHandle<U>
    where
        T: PipelineValue,
        U: PipelineValue,
        F: Fn(&T) -> Vec<U> + Send + Sync + 'static,
    {
        let input = self.own(input);
        let exec = SelectManyNode {
            input,
            map: Arc::new(map),
        };
        let node = self.push(NodeKind::SelectMany { input }, Arc::new(exec));
        ValuesHandle::new(self.id, node)
    }

    /// All values of `input` as one sequence
    pub fn collect<T: PipelineValue>(&mut self, input: &ValuesHandle<T>) -> ValueHandle<Arc<[T]>> {
        let input = self.own(input);
        let exec = CollectNode::<T> {
            input,
            _marker: PhantomData,
        };
        let node = self.push(NodeKind::Collect { input }, Arc::new(exec));
        ValueHandle::new(self.id, node)
    }

    /// Each value of `left` paired with the value of `right`
    pub fn combine<L, R>(&mut self, left: &ValuesHandle<L>, right: &ValueHandle<R>) -> ValuesHandle<(L, R)>
    where
        L: PipelineValue,
        R: PipelineValue,
    {
        let left = self.own(left);
        let right = self.own(right);
        let exec = CombineNode::<L, R> {
            left,
            right,
            _marker: PhantomData,
        };
        let node = self.push(NodeKind::Combine { left, right }, Arc::new(exec));
        ValuesHandle::new(self.id, node)
    }

    /// Publish `sources` as generated files of the given kind
    pub fn register_output(&mut self, kind: OutputKind, sources: &ValuesHandle<GeneratedSource>) {
        let input = self.own(sources);
        let node = self.push(NodeKind::Output { input, kind }, Arc::new(OutputNode { input }));
        self.outputs.push((node, kind));
    }

    /// Name a step so that runs with step tracking report it
    pub fn with_tracking_name<H: Handle>(&mut self, handle: H, name: &str) -> H {
        let node = self.own(&handle);
        if let Some(descriptor) = self.nodes.get_mut(node.index()) {
            descriptor.name = Some(Arc::from(name));
        }
        handle
    }

    fn finish(self) -> Result<Pipeline, EngineError> {
        if let Some(node) = self.foreign {
            return Err(EngineError::ForeignHandle { node });
        }
        Ok(Pipeline {
            nodes: self.nodes,
            outputs: self.outputs,
        })
    }
}

/// A named source generator and its step graph
#[derive(Debug, Clone)]
pub struct Generator {
    name: Arc<str>,
    pub(crate) pipeline: Arc<Pipeline>,
}

impl Generator {
    /// Build a generator by registering its steps in `init`
    pub fn new<F>(name: impl Into<Arc<str>>, init: F) -> Result<Self, EngineError>
    where
        F: FnOnce(&mut PipelineBuilder) -> Result<(), EngineError>,
    {
        let mut builder = PipelineBuilder::new();
        init(&mut builder)?;
        Ok(Generator {
            name: name.into(),
            pipeline: Arc::new(builder.finish()?),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.pipeline.nodes.len()
    }

    /// Kinds of every step, by node id
    pub fn node_kinds(&self) -> Vec<NodeKind> {
        self.pipeline.nodes.iter().map(|n| n.kind.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcegen_types::SyntaxKind;

    #[test]
    fn test_ids_follow_registration_order() {
        let generator = Generator::new("g", |b| {
            let classes = b.source_filter_transform(
                |n| n.kind() == SyntaxKind::Class,
                |ctx| ctx.node.name().unwrap_or_default().to_owned(),
            );
            let all = b.collect(&classes);
            let _ = b.select_value(&all, |names| names.len());
            Ok(())
        })
        .unwrap();

        let kinds = generator.node_kinds();
        assert_eq!(kinds.len(), 4);
        assert_eq!(kinds[0], NodeKind::SyntaxTrees);
        assert_eq!(kinds[1], NodeKind::SourceFilterTransform { trees: NodeId(0) });
        assert_eq!(kinds[2], NodeKind::Collect { input: NodeId(1) });
        assert_eq!(kinds[3], NodeKind::SelectValue { input: NodeId(2) });
    }

    #[test]
    fn test_input_nodes_are_shared() {
        let generator = Generator::new("g", |b| {
            let a = b.syntax_trees();
            let c = b.syntax_trees();
            assert_eq!(a.node(), c.node());
            b.alias_aware_selector("Marker", NodeShape::AnyDeclaration)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(generator.node_count(), 2);
    }

    #[test]
    fn test_text_dependency_propagates() {
        let generator = Generator::new("g", |b| {
            let texts = b.additional_texts();
            let lengths = b.select(&texts, |t: &AdditionalText| t.text().len());
            let trees = b.syntax_trees();
            let _ = b.select(&trees, |t: &SyntaxTree| t.path().to_owned());
            let total = b.collect(&lengths);
            let _ = b.select_value(&total, |l| l.iter().sum::<usize>());
            Ok(())
        })
        .unwrap();

        let flags: Vec<bool> = generator
            .pipeline
            .nodes
            .iter()
            .map(|n| n.depends_on_texts)
            .collect();
        assert_eq!(flags, vec![true, true, false, false, true, true]);
    }

    #[test]
    fn test_invalid_marker_name_rejected() {
        let result = Generator::new("g", |b| {
            b.alias_aware_selector("Not.Valid", NodeShape::AnyDeclaration)?;
            Ok(())
        });
        assert!(matches!(result, Err(EngineError::InvalidMarkerName(_))));
    }

    #[test]
    fn test_tracking_name() {
        let generator = Generator::new("g", |b| {
            let trees = b.syntax_trees();
            b.with_tracking_name(trees, "trees");
            Ok(())
        })
        .unwrap();
        assert_eq!(generator.pipeline.nodes[0].name.as_deref(), Some("trees"));
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut other = PipelineBuilder::new();
        let _ = other.syntax_trees();
        let foreign = other.additional_texts();

        let result = Generator::new("g", |b| {
            let all = b.collect(&foreign);
            b.with_tracking_name(all, "all");
            let _ = b.select(&foreign, |t: &AdditionalText| t.path().to_owned());
            Ok(())
        });
        assert!(matches!(
            result,
            Err(EngineError::ForeignHandle { node: NodeId(1) })
        ));
    }
}

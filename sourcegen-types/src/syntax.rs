//! Syntax node model
//!
//! A deliberately small view of a parsed source file: declarations, scopes
//! carrying import directives, and marker (attribute) lists. Parsing happens
//! elsewhere; the engine only walks these trees.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shape of a syntax node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxKind {
    CompilationUnit,
    Namespace,
    Class,
    Struct,
    Interface,
    Record,
    Enum,
    Method,
    Constructor,
    Property,
    Field,
    Parameter,
    LocalFunction,
    Block,
    Statement,
    Expression,
    Lambda,
    AttributeList,
}

impl SyntaxKind {
    /// Type declarations (classes, structs, ...)
    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            SyntaxKind::Class
                | SyntaxKind::Struct
                | SyntaxKind::Interface
                | SyntaxKind::Record
                | SyntaxKind::Enum
        )
    }

    /// Anything a marker may be attached to
    pub fn is_declaration(self) -> bool {
        self.is_type_declaration()
            || matches!(
                self,
                SyntaxKind::Method
                    | SyntaxKind::Constructor
                    | SyntaxKind::Property
                    | SyntaxKind::Field
                    | SyntaxKind::Parameter
                    | SyntaxKind::LocalFunction
            )
    }
}

/// An import directive (`using X;`, `using A = X.Y;`, `global using ...`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsingDirective {
    pub global: bool,
    pub alias: Option<String>,
    /// Qualified name being imported
    pub name: String,
}

impl UsingDirective {
    pub fn import(name: impl Into<String>) -> Self {
        Self {
            global: false,
            alias: None,
            name: name.into(),
        }
    }

    pub fn alias(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            global: false,
            alias: Some(alias.into()),
            name: name.into(),
        }
    }

    /// Mark this directive as compilation-wide
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// `(alias, unqualified target)` if this directive declares an alias
    pub fn alias_pair(&self) -> Option<(&str, &str)> {
        self.alias
            .as_deref()
            .map(|alias| (alias, unqualified_name(&self.name)))
    }
}

/// A single marker inside a marker list, e.g. `[Serializable]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Name as written, possibly qualified
    pub name: String,
    pub arguments: Vec<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn simple_name(&self) -> &str {
        unqualified_name(&self.name)
    }
}

/// Strip qualification and generic arguments: `global::A.B.C<T>` -> `C`
pub fn unqualified_name(name: &str) -> &str {
    let name = match name.find('<') {
        Some(idx) => &name[..idx],
        None => name,
    };
    let name = match name.rfind("::") {
        Some(idx) => &name[idx + 2..],
        None => name,
    };
    let name = match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => name,
    };
    name.trim()
}

/// A node in a syntax tree
///
/// Marker lists are children of the declaration they annotate. Only
/// compilation units and namespaces carry `usings`; only marker lists carry
/// `attributes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyntaxNode {
    kind: SyntaxKind,
    name: Option<String>,
    usings: Vec<UsingDirective>,
    attributes: Vec<Attribute>,
    children: Vec<Arc<SyntaxNode>>,
}

impl SyntaxNode {
    fn bare(kind: SyntaxKind) -> Self {
        Self {
            kind,
            name: None,
            usings: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn compilation_unit(usings: Vec<UsingDirective>, members: Vec<SyntaxNode>) -> Self {
        let mut node = Self::bare(SyntaxKind::CompilationUnit);
        node.usings = usings;
        node.children = members.into_iter().map(Arc::new).collect();
        node
    }

    pub fn namespace(
        name: impl Into<String>,
        usings: Vec<UsingDirective>,
        members: Vec<SyntaxNode>,
    ) -> Self {
        let mut node = Self::bare(SyntaxKind::Namespace);
        node.name = Some(name.into());
        node.usings = usings;
        node.children = members.into_iter().map(Arc::new).collect();
        node
    }

    /// A named declaration or other named construct
    pub fn declaration(kind: SyntaxKind, name: impl Into<String>) -> Self {
        let mut node = Self::bare(kind);
        node.name = Some(name.into());
        node
    }

    /// An anonymous construct (block, statement, expression, ...)
    pub fn node(kind: SyntaxKind) -> Self {
        Self::bare(kind)
    }

    pub fn attribute_list(attributes: Vec<Attribute>) -> Self {
        let mut node = Self::bare(SyntaxKind::AttributeList);
        node.attributes = attributes;
        node
    }

    /// Attach a marker list carrying the given marker names
    pub fn with_markers<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = Self::attribute_list(names.into_iter().map(Attribute::new).collect());
        self.child(list)
    }

    pub fn child(mut self, child: impl Into<Arc<SyntaxNode>>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_children(mut self, children: Vec<SyntaxNode>) -> Self {
        self.children.extend(children.into_iter().map(Arc::new));
        self
    }

    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn usings(&self) -> &[UsingDirective] {
        &self.usings
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn children(&self) -> &[Arc<SyntaxNode>] {
        &self.children
    }

    /// Find the first direct child declaration with the given name
    pub fn find_child(&self, name: &str) -> Option<&Arc<SyntaxNode>> {
        self.children.iter().find(|c| c.name() == Some(name))
    }
}

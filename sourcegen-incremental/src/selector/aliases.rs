//! Import alias sets

use hashbrown::{HashMap, HashSet};
use sourcegen_types::{SyntaxNode, UsingDirective};
use std::sync::Arc;

/// `alias = target`, with the target reduced to its unqualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasPair {
    pub alias: String,
    pub target: String,
}

impl AliasPair {
    pub fn new(alias: impl Into<String>, target: impl Into<String>) -> Self {
        AliasPair {
            alias: alias.into(),
            target: target.into(),
        }
    }

    fn from_directive(directive: &UsingDirective) -> Option<Self> {
        directive
            .alias_pair()
            .map(|(alias, target)| AliasPair::new(alias, target))
    }
}

/// Aliases visible compilation-wide, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalAliases {
    pairs: Arc<[AliasPair]>,
}

impl Default for GlobalAliases {
    fn default() -> Self {
        GlobalAliases {
            pairs: Arc::from(Vec::new()),
        }
    }
}

impl GlobalAliases {
    pub fn new(pairs: Vec<AliasPair>) -> Self {
        GlobalAliases {
            pairs: Arc::from(pairs),
        }
    }

    /// The `global using A = B;` declarations of one file
    pub fn from_compilation_unit(root: &SyntaxNode) -> Self {
        Self::new(
            root.usings()
                .iter()
                .filter(|u| u.global)
                .filter_map(AliasPair::from_directive)
                .collect(),
        )
    }

    /// Concatenate per-file alias sets, preserving file order
    pub fn concat<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a GlobalAliases>,
    {
        Self::new(
            parts
                .into_iter()
                .flat_map(|p| p.pairs.iter().cloned())
                .collect(),
        )
    }

    pub fn pairs(&self) -> &[AliasPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn targets_by_name(&self) -> HashMap<&str, Vec<&str>> {
        let mut map: HashMap<&str, Vec<&str>> = HashMap::new();
        for pair in self.pairs.iter() {
            map.entry(pair.alias.as_str())
                .or_default()
                .push(pair.target.as_str());
        }
        map
    }
}

/// Block-scoped aliases declared by a scope's own directives
pub(crate) fn local_aliases(usings: &[UsingDirective]) -> impl Iterator<Item = AliasPair> + '_ {
    usings
        .iter()
        .filter(|u| !u.global)
        .filter_map(AliasPair::from_directive)
}

/// Alias name -> targets lookup over a [`GlobalAliases`]
#[derive(Debug)]
pub(crate) struct AliasIndex<'a> {
    by_name: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> AliasIndex<'a> {
    pub fn new(aliases: &'a GlobalAliases) -> Self {
        AliasIndex {
            by_name: aliases.targets_by_name(),
        }
    }

    pub fn targets(&self, alias: &str) -> &[&'a str] {
        self.by_name.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Alias names whose set of targets differs between `old` and `new`
pub(crate) fn changed_alias_names(old: &GlobalAliases, new: &GlobalAliases) -> HashSet<String> {
    fn normalize(aliases: &GlobalAliases) -> HashMap<&str, Vec<&str>> {
        let mut map = aliases.targets_by_name();
        for targets in map.values_mut() {
            targets.sort_unstable();
            targets.dedup();
        }
        map
    }

    let old = normalize(old);
    let new = normalize(new);

    let mut changed = HashSet::new();
    for (name, targets) in old.iter() {
        if new.get(name) != Some(targets) {
            changed.insert((*name).to_owned());
        }
    }
    for name in new.keys() {
        if !old.contains_key(name) {
            changed.insert((*name).to_owned());
        }
    }
    changed
}

//! Parsed query model.
//!
//! Query strings take the form `<subset>/<seq>/<seq>/.../<leaf>`: a subset
//! selector followed by the mnemonics of every replication group enclosing
//! the leaf, outermost first. Parsing happens upstream; this module only
//! models the parsed records consumed by the engine.

use std::fmt;

use metbuf_common::{verify_arg, Result};

/// One path element: a mnemonic plus an optional 1-based occurrence
/// selector (`MNEM[2]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryComponent {
    pub name: String,
    pub index: Option<usize>,
}

impl QueryComponent {
    pub fn new(name: impl Into<String>) -> QueryComponent {
        QueryComponent {
            name: name.into(),
            index: None,
        }
    }

    pub fn with_index(name: impl Into<String>, index: usize) -> QueryComponent {
        QueryComponent {
            name: name.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for QueryComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.name, index),
            None => f.write_str(&self.name),
        }
    }
}

/// Subset selector of a query: a specific subset name or the wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsetFilter {
    Any,
    Named(String),
}

impl SubsetFilter {
    pub fn matches(&self, subset: &str) -> bool {
        match self {
            SubsetFilter::Any => true,
            SubsetFilter::Named(name) => name == subset,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            SubsetFilter::Any => "*",
            SubsetFilter::Named(name) => name,
        }
    }
}

/// One parsed query: subset selector plus the component path down to a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub subset: SubsetFilter,
    pub path: Vec<QueryComponent>,
    /// The original query string, carried for diagnostics.
    pub query_str: String,
}

impl Query {
    pub fn new(
        subset: SubsetFilter,
        path: Vec<QueryComponent>,
        query_str: impl Into<String>,
    ) -> Query {
        Query {
            subset,
            path,
            query_str: query_str.into(),
        }
    }
}

/// Ordered mapping from an output name to its query alternatives.
///
/// The order of names fixes the field positions used by frames and result
/// materialization. For each name, the first alternative that resolves
/// against the current subset wins.
#[derive(Debug, Clone, Default)]
pub struct QuerySet {
    entries: Vec<(String, Vec<Query>)>,
}

impl QuerySet {
    pub fn new() -> QuerySet {
        QuerySet::default()
    }

    /// Registers `name` with its list of query alternatives.
    ///
    /// # Errors
    ///
    /// Fails when `queries` is empty or `name` is already registered.
    pub fn add(&mut self, name: impl Into<String>, queries: Vec<Query>) -> Result<()> {
        let name = name.into();
        verify_arg!(queries, !queries.is_empty());
        verify_arg!(name, self.position(&name).is_none());
        self.entries.push((name, queries));
        Ok(())
    }

    /// Registers `name` with a single query.
    pub fn add_query(&mut self, name: impl Into<String>, query: Query) -> Result<()> {
        self.add(name, vec![query])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[Query])> {
        self.entries
            .iter()
            .map(|(name, queries)| (name.as_str(), queries.as_slice()))
    }

    pub fn queries_for(&self, name: &str) -> Option<&[Query]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, queries)| queries.as_slice())
    }

    /// Field position of `name`, stable across frames.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(entry, _)| entry == name)
    }
}

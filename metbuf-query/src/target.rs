//! Resolved query descriptions.

use std::sync::Arc;

use metbuf_format::{query::QueryComponent, TypeInfo};

/// Role a component plays on a resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetComponentKind {
    /// The leading subset selector.
    Subset,
    /// A replication group (fixed, delayed or stacked).
    Repeat,
    /// A delayed-binary presence group.
    Binary,
    /// The leaf itself.
    Value,
}

/// One element of a resolved path: the query component it satisfied, the
/// template node id it landed on and the role it plays.
#[derive(Debug, Clone)]
pub struct TargetComponent {
    pub query_component: QueryComponent,
    /// Template node id; the replication node for groups, the leaf id for
    /// values, 0 for the subset component.
    pub branch: usize,
    pub kind: TargetComponentKind,
}

/// Immutable description of one query resolved against one subset template.
///
/// Targets are built once per subset name, cached by the runner, and shared
/// read-only with every frame harvested for that subset.
#[derive(Debug, Clone)]
pub struct Target {
    /// Caller-chosen output name.
    pub name: String,
    /// The query string that resolved (or the first alternative on a miss).
    pub query_str: String,
    /// Leaf node id; 0 when the query does not apply to this subset.
    pub node_idx: usize,
    /// Resolved components: subset, one per replication ancestor, leaf.
    pub path: Vec<TargetComponent>,
    /// Replication-node ids along the path, outermost first.
    pub seq_path: Vec<usize>,
    /// Human-readable label per exported dimension, starting with `"*"`.
    pub dim_paths: Vec<String>,
    /// Positions of the exported dimensions within the full
    /// `[subset, rep1, rep2, ...]` dimension list.
    pub export_dim_idxs: Vec<usize>,
    pub type_info: TypeInfo,
}

impl Target {
    /// Builds a resolved target; the sequence path is derived from the
    /// replication components of `path`.
    pub fn new(
        name: impl Into<String>,
        query_str: impl Into<String>,
        node_idx: usize,
        path: Vec<TargetComponent>,
        dim_paths: Vec<String>,
        export_dim_idxs: Vec<usize>,
        type_info: TypeInfo,
    ) -> Target {
        let seq_path = path
            .iter()
            .filter(|component| {
                matches!(
                    component.kind,
                    TargetComponentKind::Repeat | TargetComponentKind::Binary
                )
            })
            .map(|component| component.branch)
            .collect();
        Target {
            name: name.into(),
            query_str: query_str.into(),
            node_idx,
            path,
            seq_path,
            dim_paths,
            export_dim_idxs,
            type_info,
        }
    }

    /// The trivial target emitted when no query alternative applies to the
    /// current subset: one missing reading on the subset axis.
    pub fn not_found(name: impl Into<String>, query_str: impl Into<String>) -> Target {
        let path = vec![
            TargetComponent {
                query_component: QueryComponent::new("*"),
                branch: 0,
                kind: TargetComponentKind::Subset,
            },
            TargetComponent {
                query_component: QueryComponent::new(""),
                branch: 0,
                kind: TargetComponentKind::Value,
            },
        ];
        Target {
            name: name.into(),
            query_str: query_str.into(),
            node_idx: 0,
            path,
            seq_path: Vec::new(),
            dim_paths: vec!["*".to_string()],
            export_dim_idxs: vec![0],
            type_info: TypeInfo::default(),
        }
    }

    /// Whether the query resolved against the subset this target was built
    /// for.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.node_idx != 0
    }
}

/// Resolved targets for one subset, in query-set order.
pub type Targets = Vec<Arc<Target>>;

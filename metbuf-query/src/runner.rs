//! Per-subset query execution: target resolution and the value-stream walk.

use std::fmt::Write as _;
use std::sync::Arc;

use ahash::AHashMap;
use log::warn;
use metbuf_common::Result;
use metbuf_format::{
    query::{Query, QueryComponent, QuerySet},
    DataProvider, NodeType, MISSING_VALUE,
};

use crate::result_set::ResultSet;
use crate::subset_table::SubsetTable;
use crate::target::{Target, TargetComponent, TargetComponentKind, Targets};

/// Lookup masks over the subset's template id range, derived from the
/// resolved targets. They short-circuit all per-node work during the stream
/// walk: only value-masked nodes are harvested and only path-masked
/// replication nodes are traced.
pub(crate) struct ProcessingMasks {
    origin: usize,
    value_node: Vec<bool>,
    path_node: Vec<bool>,
}

impl ProcessingMasks {
    fn new(origin: usize, last: usize) -> ProcessingMasks {
        let len = last - origin + 1;
        ProcessingMasks {
            origin,
            value_node: vec![false; len],
            path_node: vec![false; len],
        }
    }

    fn mark_value(&mut self, node: usize) {
        self.value_node[node - self.origin] = true;
    }

    fn mark_path(&mut self, node: usize) {
        self.path_node[node - self.origin] = true;
    }

    #[inline]
    fn is_value(&self, node: usize) -> bool {
        node.checked_sub(self.origin)
            .and_then(|index| self.value_node.get(index).copied())
            .unwrap_or(false)
    }

    #[inline]
    fn is_path(&self, node: usize) -> bool {
        node.checked_sub(self.origin)
            .and_then(|index| self.path_node.get(index).copied())
            .unwrap_or(false)
    }
}

/// Scratch accumulators per template node: harvested values for value-masked
/// leaves, per-activation child counts for path-masked replication nodes.
/// Dense over the template id range rather than keyed, since the walk
/// touches it on every cursor step.
struct NodeTable {
    origin: usize,
    entries: Vec<NodeEntry>,
}

#[derive(Default)]
struct NodeEntry {
    values: Vec<f64>,
    counts: Vec<usize>,
}

impl NodeTable {
    fn new(origin: usize, last: usize) -> NodeTable {
        let mut entries = Vec::new();
        entries.resize_with(last - origin + 1, NodeEntry::default);
        NodeTable { origin, entries }
    }

    #[inline]
    fn slot(&self, node: usize) -> Option<&NodeEntry> {
        self.entries.get(node.checked_sub(self.origin)?)
    }

    #[inline]
    fn slot_mut(&mut self, node: usize) -> Option<&mut NodeEntry> {
        self.entries.get_mut(node.checked_sub(self.origin)?)
    }
}

/// Resolves a query set against decoded subsets and harvests one frame per
/// subset into a [`ResultSet`].
///
/// Resolution is cached by subset name: repeated subsets of the same
/// template never touch the [`SubsetTable`] again.
pub struct QueryRunner {
    query_set: QuerySet,
    target_cache: AHashMap<String, Arc<Targets>>,
    mask_cache: AHashMap<String, Arc<ProcessingMasks>>,
}

impl QueryRunner {
    pub fn new(query_set: QuerySet) -> QueryRunner {
        QueryRunner {
            query_set,
            target_cache: AHashMap::new(),
            mask_cache: AHashMap::new(),
        }
    }

    pub fn query_set(&self) -> &QuerySet {
        &self.query_set
    }

    /// Runs every query against the subset the provider is positioned on and
    /// appends the harvested frame to `result_set`.
    ///
    /// # Errors
    ///
    /// Fails when a query path matches more than one occurrence without an
    /// index selector, or the template data is malformed.
    pub fn accumulate<P: DataProvider + ?Sized>(
        &mut self,
        provider: &P,
        result_set: &mut ResultSet,
    ) -> Result<()> {
        let (targets, masks) = self.find_targets(provider)?;
        self.collect_data(provider, &targets, &masks, result_set);
        Ok(())
    }

    /// Resolves every query-set name to a target for the current subset,
    /// returning the cached resolution when this subset name has been seen
    /// before.
    fn find_targets<P: DataProvider + ?Sized>(
        &mut self,
        provider: &P,
    ) -> Result<(Arc<Targets>, Arc<ProcessingMasks>)> {
        if let (Some(targets), Some(masks)) = (
            self.target_cache.get(provider.subset()),
            self.mask_cache.get(provider.subset()),
        ) {
            return Ok((targets.clone(), masks.clone()));
        }

        let inode = provider.inode();
        let mut masks = ProcessingMasks::new(inode, provider.isc(inode));
        let table = SubsetTable::new(provider)?;

        let mut targets: Targets = Vec::with_capacity(self.query_set.len());
        for (name, queries) in self.query_set.entries() {
            let mut resolved = None;
            for query in queries {
                if !query.subset.matches(provider.subset()) {
                    continue;
                }
                if let Some(node) = table.node_for_path(&query.path)? {
                    resolved = Some((query, node));
                    break;
                }
            }

            let target = match resolved {
                Some((query, node)) => build_target(name, query, &node),
                None => {
                    warn!(
                        "query string {} didn't apply to subset {}",
                        render_queries(queries),
                        provider.subset()
                    );
                    let query_str = queries
                        .first()
                        .map(|query| query.query_str.clone())
                        .unwrap_or_default();
                    Target::not_found(name, query_str)
                }
            };

            if target.is_resolved() {
                masks.mark_value(target.node_idx);
                for &seq in &target.seq_path {
                    masks.mark_path(seq);
                }
            }
            targets.push(Arc::new(target));
        }

        let targets = Arc::new(targets);
        let masks = Arc::new(masks);
        self.target_cache
            .insert(provider.subset().to_string(), targets.clone());
        self.mask_cache
            .insert(provider.subset().to_string(), masks.clone());
        Ok((targets, masks))
    }

    /// Walks the subset's flat value stream once, harvesting leaf values and
    /// replication counts for every target, and emits the frame.
    ///
    /// Fixed replications carry no count in the stream and delayed-binary
    /// nodes only a presence flag, so counts are recovered uniformly by
    /// counting each activation's body markers. Delayed replications close
    /// their marker run with a sentinel; the unwind step compensates its
    /// extra count.
    fn collect_data<P: DataProvider + ?Sized>(
        &self,
        provider: &P,
        targets: &Arc<Targets>,
        masks: &ProcessingMasks,
        result_set: &mut ResultSet,
    ) {
        let inode = provider.inode();
        let mut table = NodeTable::new(inode, provider.isc(inode));

        // Replication nodes currently open, with the node each one resumes
        // at. A return of 0 marks a sequence that closes out its parent.
        let mut current_path: Vec<usize> = Vec::with_capacity(10);
        let mut current_returns: Vec<usize> = Vec::with_capacity(10);
        let mut return_node: usize = 0;
        let mut last_nonzero_return: isize = -1;

        let nval = provider.nval();
        for cursor in 1..=nval {
            let node = provider.inv(cursor);

            if masks.is_value(node) {
                if let Some(slot) = table.slot_mut(node) {
                    slot.values.push(provider.val(cursor));
                }
            }

            let container = provider.jmpb(node);
            if container > 0 && masks.is_path(container) {
                let counted = match provider.typ(node) {
                    NodeType::Sequence => matches!(
                        provider.typ(container),
                        NodeType::Sequence | NodeType::DelayedBinary | NodeType::FixedRep
                    ),
                    NodeType::Repeat | NodeType::StackedRepeat => true,
                    _ => false,
                };
                if counted {
                    if let Some(count) = table
                        .slot_mut(node)
                        .and_then(|slot| slot.counts.last_mut())
                    {
                        *count += 1;
                    }
                }
            }

            if let Some(top) = current_path.last().copied() {
                if node == return_node
                    || cursor == nval
                    || (current_path.len() > 1 && node == top + 1)
                {
                    let keep = last_nonzero_return.max(0) as usize;
                    while current_returns.len() > keep {
                        current_returns.pop();
                        if let Some(closed) = current_path.pop() {
                            if provider.typ(closed).is_delayed_rep() {
                                // The closing marker of a delayed replication
                                // was counted as a child in the step above.
                                if let Some(count) = table
                                    .slot_mut(closed + 1)
                                    .and_then(|slot| slot.counts.last_mut())
                                {
                                    *count = count.saturating_sub(1);
                                }
                            }
                        }
                    }
                    last_nonzero_return = current_returns.len() as isize - 1;
                    return_node = if last_nonzero_return >= 0 {
                        current_returns[last_nonzero_return as usize]
                    } else {
                        0
                    };
                }
            }

            if masks.is_path(node) && provider.typ(node).introduces_dimension() {
                let absent = provider.typ(node) == NodeType::DelayedBinary
                    && provider.val(cursor) == 0.0;
                if !absent {
                    current_path.push(node);
                    let resume = provider.link(node);
                    current_returns.push(resume);
                    if resume != 0 {
                        last_nonzero_return = current_returns.len() as isize - 1;
                        return_node = resume;
                    } else {
                        last_nonzero_return = 0;
                        return_node = 0;
                        if cursor != nval {
                            // The open sequence closes out its parent; the
                            // effective resume point is the first enclosing
                            // sequence that has one.
                            for index in (0..current_path.len()).rev() {
                                let owner = provider.jmpb(current_path[index]);
                                return_node =
                                    if owner == 0 { 0 } else { provider.link(owner) };
                                last_nonzero_return =
                                    (current_returns.len() - index) as isize;
                                if return_node != 0 {
                                    break;
                                }
                            }
                        }
                    }
                }
                // A fresh activation opens a count slot even when a
                // delayed-binary group is absent.
                if let Some(slot) = table.slot_mut(node + 1) {
                    slot.counts.push(0);
                }
            }
        }

        let frame = result_set.next_data_frame(targets.clone());
        for (index, target) in targets.iter().enumerate() {
            let field = frame.field_at_mut(index);
            if !target.is_resolved() {
                field.data = vec![MISSING_VALUE];
                field.seq_counts = vec![vec![1]];
                continue;
            }
            field.data = table
                .slot(target.node_idx)
                .map(|slot| slot.values.clone())
                .unwrap_or_default();
            let mut seq_counts = Vec::with_capacity(target.seq_path.len() + 1);
            seq_counts.push(vec![1]);
            for &seq in &target.seq_path {
                seq_counts.push(
                    table
                        .slot(seq + 1)
                        .map(|slot| slot.counts.clone())
                        .unwrap_or_default(),
                );
            }
            field.seq_counts = seq_counts;
        }
    }
}

fn build_target(name: &str, query: &Query, node: &crate::subset_table::NodeRef<'_>) -> Target {
    let nodes = node.path_nodes();
    let mut path = Vec::with_capacity(nodes.len());
    path.push(TargetComponent {
        query_component: QueryComponent::new(query.subset.label()),
        branch: 0,
        kind: TargetComponentKind::Subset,
    });
    for (position, path_node) in nodes.iter().enumerate().skip(1) {
        let kind = match path_node.node_type() {
            NodeType::DelayedBinary => TargetComponentKind::Binary,
            typ if typ.is_leaf() => TargetComponentKind::Value,
            _ => TargetComponentKind::Repeat,
        };
        path.push(TargetComponent {
            query_component: query.path[position - 1].clone(),
            branch: path_node.node_idx(),
            kind,
        });
    }

    Target::new(
        name,
        query.query_str.clone(),
        node.node_idx(),
        path,
        node.dim_paths(),
        node.dim_idxs(),
        node.type_info(),
    )
}

fn render_queries(queries: &[Query]) -> String {
    match queries {
        [single] => single.query_str.clone(),
        _ => {
            let mut rendered = String::from("[");
            for (index, query) in queries.iter().enumerate() {
                if index > 0 {
                    rendered.push_str(", ");
                }
                let _ = write!(rendered, "{}", query.query_str);
            }
            rendered.push(']');
            rendered
        }
    }
}

//! Per-subset harvest.

use std::sync::Arc;

use crate::target::{Target, Targets};

/// Harvested readings for one query within one subset.
#[derive(Debug, Clone)]
pub struct DataField {
    /// The resolved target this field was harvested for.
    pub target: Arc<Target>,
    /// Leaf values in stream order, one per occurrence.
    pub data: Vec<f64>,
    /// Per-level replication counts: `seq_counts[0]` is always `[1]` (the
    /// subset axis); `seq_counts[k + 1]` holds the child counts observed for
    /// replication ancestor `seq_path[k]`, one entry per activation.
    pub seq_counts: Vec<Vec<usize>>,
}

impl DataField {
    fn new(target: Arc<Target>) -> DataField {
        DataField {
            target,
            data: Vec::new(),
            seq_counts: Vec::new(),
        }
    }
}

/// One subset's harvest: a field per query, in query-set order, plus a
/// shared handle on the targets they resolved to.
#[derive(Debug, Clone)]
pub struct DataFrame {
    targets: Arc<Targets>,
    fields: Vec<DataField>,
}

impl DataFrame {
    pub(crate) fn new(targets: Arc<Targets>) -> DataFrame {
        let fields = targets
            .iter()
            .map(|target| DataField::new(target.clone()))
            .collect();
        DataFrame { targets, fields }
    }

    pub fn targets(&self) -> &Arc<Targets> {
        &self.targets
    }

    pub fn fields(&self) -> &[DataField] {
        &self.fields
    }

    pub fn field_at(&self, index: usize) -> &DataField {
        &self.fields[index]
    }

    pub(crate) fn field_at_mut(&mut self, index: usize) -> &mut DataField {
        &mut self.fields[index]
    }
}

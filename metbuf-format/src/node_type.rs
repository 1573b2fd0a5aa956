//! Template node kinds.

/// Kind of a subset template node.
///
/// Replication nodes (`FixedRep`, `DelayedRep`, `DelayedRepStacked`,
/// `DelayedBinary`) always pair with the *body* node that immediately follows
/// them in the template: `Repeat` under `DelayedRep`, `StackedRepeat` under
/// `DelayedRepStacked`, and a plain `Sequence` under `FixedRep` and
/// `DelayedBinary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Root of a subset template.
    Subset,
    /// Non-replicated container, transparent to query paths.
    Sequence,
    /// Body of a delayed replication.
    Repeat,
    /// Body of a stacked delayed replication.
    StackedRepeat,
    /// Replication with a count fixed by the template.
    FixedRep,
    /// Replication with an in-stream count.
    DelayedRep,
    /// Stacked variant of `DelayedRep`.
    DelayedRepStacked,
    /// One-bit presence flag (replication count 0 or 1).
    DelayedBinary,
    /// Numeric leaf.
    Number,
    /// Character leaf.
    Character,
}

impl NodeType {
    /// Replication nodes introduce one dimension on every leaf below them.
    #[inline]
    pub fn introduces_dimension(self) -> bool {
        matches!(
            self,
            NodeType::FixedRep
                | NodeType::DelayedRep
                | NodeType::DelayedRepStacked
                | NodeType::DelayedBinary
        )
    }

    /// Whether the dimension introduced by this node appears in exported
    /// output shapes. `DelayedBinary` collapses to at most one occurrence and
    /// is tracked internally only.
    #[inline]
    pub fn exports_dimension(self) -> bool {
        matches!(
            self,
            NodeType::FixedRep | NodeType::DelayedRep | NodeType::DelayedRepStacked
        )
    }

    /// Delayed replications close their marker run with a sentinel that the
    /// stream walk corrects for.
    #[inline]
    pub fn is_delayed_rep(self) -> bool {
        matches!(self, NodeType::DelayedRep | NodeType::DelayedRepStacked)
    }

    /// Leaf nodes carry harvestable values.
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeType::Number | NodeType::Character)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_classification() {
        assert!(NodeType::DelayedRep.introduces_dimension());
        assert!(NodeType::DelayedBinary.introduces_dimension());
        assert!(!NodeType::Sequence.introduces_dimension());
        assert!(!NodeType::Number.introduces_dimension());

        assert!(NodeType::FixedRep.exports_dimension());
        assert!(!NodeType::DelayedBinary.exports_dimension());
    }

    #[test]
    fn test_delayed_classification() {
        assert!(NodeType::DelayedRep.is_delayed_rep());
        assert!(NodeType::DelayedRepStacked.is_delayed_rep());
        assert!(!NodeType::FixedRep.is_delayed_rep());
        assert!(!NodeType::DelayedBinary.is_delayed_rep());
    }
}

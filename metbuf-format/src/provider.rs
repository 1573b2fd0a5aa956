//! Interface to a decoded subset.

use crate::{NodeType, TypeInfo};

/// Read-only view of one decoded subset: its template node table and the
/// flat value stream produced for it.
///
/// The caller positions the provider on a subset before handing it to the
/// engine and keeps it stable for the duration of one accumulation; the
/// engine never advances it.
///
/// # Template conventions
///
/// Node ids are 1-origin and dense over `[inode, isc(inode)]`. A replication
/// group occupies two consecutive nodes: the replication node `r` and its
/// body `r + 1` (see [`NodeType`]), with `jmpb(r + 1) == r` and
/// `link(r) == r + 1`. Members carry `jmpb` of their enclosing body or
/// plain-sequence node; `link` is 0 for nodes that close out their parent.
/// The replication node's tag wraps the group mnemonic in one-character
/// delimiters; the body node's tag is the bare mnemonic.
///
/// # Stream conventions
///
/// Cursor positions are 1-origin over `[1, nval]`. Per replication
/// activation the stream holds the replication node once (its value is the
/// instantiation count for delayed replications and the presence flag for
/// delayed-binary nodes), then the body node once per instantiation followed
/// by that instantiation's members. Delayed replications close with one
/// trailing body marker; fixed and binary replications do not.
pub trait DataProvider {
    /// Name of the subset the provider is positioned on.
    fn subset(&self) -> &str;

    /// Root node id of the subset template.
    fn inode(&self) -> usize;

    /// Id of the last descendant of `node`; `isc(inode)` closes the
    /// template's id range.
    fn isc(&self, node: usize) -> usize;

    /// Length of the value stream for the current subset.
    fn nval(&self) -> usize;

    /// Template node id at stream position `cursor`.
    fn inv(&self, cursor: usize) -> usize;

    /// Value at stream position `cursor`.
    fn val(&self, cursor: usize) -> f64;

    fn typ(&self, node: usize) -> NodeType;

    fn tag(&self, node: usize) -> &str;

    /// Id of the node's enclosing container, 0 for the root.
    fn jmpb(&self, node: usize) -> usize;

    /// Id of the node to resume at when leaving this node's subtree, 0 when
    /// it is last in its parent.
    fn link(&self, node: usize) -> usize;

    fn type_info(&self, node: usize) -> TypeInfo;
}

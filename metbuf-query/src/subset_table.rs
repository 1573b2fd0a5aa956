//! In-memory template tree for one subset.

use ahash::AHashMap;
use metbuf_common::{verify_data, Error, Result};
use metbuf_format::{query::QueryComponent, DataProvider, NodeType, TypeInfo};

/// Template tree built from a provider's flat node arrays.
///
/// The tree keeps only what query paths can address: the subset root,
/// replication groups and value leaves. Plain sequences are transparent
/// containers; their members surface as children of the nearest enclosing
/// group. Resolving a query is then a walk of depth `L` over mnemonics,
/// independent of subset size, which is what makes per-subset-name caching
/// of resolutions worthwhile.
pub struct SubsetTable {
    nodes: Vec<TableNode>,
}

struct TableNode {
    /// Template node id: the replication node for groups, the leaf id for
    /// values, the root id for the subset node.
    node_idx: usize,
    mnemonic: String,
    kind: TableNodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
}

enum TableNodeKind {
    Subset,
    Group {
        node_type: NodeType,
        /// Group mnemonic with the delimiter sentinels stripped, used as a
        /// dimension label.
        dim_label: String,
    },
    Leaf {
        node_type: NodeType,
        type_info: TypeInfo,
    },
}

/// Handle to one node of a [`SubsetTable`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    table: &'a SubsetTable,
    index: usize,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("node_idx", &self.node_idx())
            .field("mnemonic", &self.mnemonic())
            .finish()
    }
}

impl SubsetTable {
    /// Builds the template tree for the subset the provider is positioned
    /// on.
    ///
    /// # Errors
    ///
    /// Fails when a replication node is not followed by its body node.
    pub fn new<P: DataProvider + ?Sized>(provider: &P) -> Result<SubsetTable> {
        let inode = provider.inode();
        let last = provider.isc(inode);

        let mut nodes = vec![TableNode {
            node_idx: inode,
            mnemonic: provider.tag(inode).to_string(),
            kind: TableNodeKind::Subset,
            parent: None,
            children: Vec::new(),
        }];
        // Nearest enclosing group (arena index) per container node id.
        let mut enclosing: AHashMap<usize, usize> = AHashMap::new();
        enclosing.insert(inode, 0);

        let parent_of = |enclosing: &AHashMap<usize, usize>, container: usize| {
            let container = if container == 0 { inode } else { container };
            enclosing.get(&container).copied().unwrap_or(0)
        };

        let mut nid = inode + 1;
        while nid <= last {
            let typ = provider.typ(nid);
            if typ.introduces_dimension() {
                let body = nid + 1;
                verify_data!(replication_body, body <= last);
                verify_data!(replication_body, !provider.typ(body).is_leaf());

                let parent = parent_of(&enclosing, provider.jmpb(nid));
                let index = nodes.len();
                nodes.push(TableNode {
                    node_idx: nid,
                    mnemonic: provider.tag(body).to_string(),
                    kind: TableNodeKind::Group {
                        node_type: typ,
                        dim_label: strip_delimiters(provider.tag(nid)).to_string(),
                    },
                    parent: Some(parent),
                    children: Vec::new(),
                });
                nodes[parent].children.push(index);
                enclosing.insert(body, index);
                nid += 2;
            } else if typ.is_leaf() {
                let parent = parent_of(&enclosing, provider.jmpb(nid));
                let index = nodes.len();
                nodes.push(TableNode {
                    node_idx: nid,
                    mnemonic: provider.tag(nid).to_string(),
                    kind: TableNodeKind::Leaf {
                        node_type: typ,
                        type_info: provider.type_info(nid),
                    },
                    parent: Some(parent),
                    children: Vec::new(),
                });
                nodes[parent].children.push(index);
                nid += 1;
            } else {
                // Transparent container: members resolve against the
                // enclosing group.
                let parent = parent_of(&enclosing, provider.jmpb(nid));
                enclosing.insert(nid, parent);
                nid += 1;
            }
        }

        Ok(SubsetTable { nodes })
    }

    /// Resolves a component path to its leaf node.
    ///
    /// Each component except the last must name a replication group, in
    /// nesting order; the last names the leaf. A 1-based index on the last
    /// component selects among multiple occurrences of the full path and is
    /// ignored when out of range.
    ///
    /// Returns `None` when any component goes unmatched.
    ///
    /// # Errors
    ///
    /// Fails with an ambiguous-query error when more than one occurrence
    /// remains after index selection.
    pub fn node_for_path(&self, path: &[QueryComponent]) -> Result<Option<NodeRef<'_>>> {
        let Some((leaf_component, group_components)) = path.split_last() else {
            return Ok(None);
        };

        let mut frontier = vec![0usize];
        for component in group_components {
            let mut next = Vec::new();
            for &index in &frontier {
                next.extend(self.nodes[index].children.iter().copied().filter(|&child| {
                    matches!(self.nodes[child].kind, TableNodeKind::Group { .. })
                        && self.nodes[child].mnemonic == component.name
                }));
            }
            if next.is_empty() {
                return Ok(None);
            }
            frontier = next;
        }

        let mut occurrences = Vec::new();
        for &index in &frontier {
            occurrences.extend(self.nodes[index].children.iter().copied().filter(|&child| {
                matches!(self.nodes[child].kind, TableNodeKind::Leaf { .. })
                    && self.nodes[child].mnemonic == leaf_component.name
            }));
        }

        if let Some(selected) = leaf_component.index {
            if selected >= 1 && selected <= occurrences.len() {
                occurrences = vec![occurrences[selected - 1]];
            }
        }

        match occurrences.as_slice() {
            [] => Ok(None),
            [index] => Ok(Some(NodeRef {
                table: self,
                index: *index,
            })),
            _ => Err(Error::ambiguous_query(path_to_string(path))),
        }
    }
}

impl<'a> NodeRef<'a> {
    /// Template node id of this node.
    pub fn node_idx(&self) -> usize {
        self.table.nodes[self.index].node_idx
    }

    pub fn mnemonic(&self) -> &'a str {
        &self.table.nodes[self.index].mnemonic
    }

    pub fn node_type(&self) -> NodeType {
        match &self.table.nodes[self.index].kind {
            TableNodeKind::Subset => NodeType::Subset,
            TableNodeKind::Group { node_type, .. } => *node_type,
            TableNodeKind::Leaf { node_type, .. } => *node_type,
        }
    }

    /// Type descriptor; the default descriptor for non-leaf nodes.
    pub fn type_info(&self) -> TypeInfo {
        match &self.table.nodes[self.index].kind {
            TableNodeKind::Leaf { type_info, .. } => type_info.clone(),
            _ => TypeInfo::default(),
        }
    }

    /// Chain of nodes from the subset root down to this node.
    pub fn path_nodes(&self) -> Vec<NodeRef<'a>> {
        let mut chain = Vec::new();
        let mut cursor = Some(self.index);
        while let Some(index) = cursor {
            chain.push(NodeRef {
                table: self.table,
                index,
            });
            cursor = self.table.nodes[index].parent;
        }
        chain.reverse();
        chain
    }

    /// Labels of the exported dimensions over this leaf, starting with the
    /// subset axis `"*"`.
    pub fn dim_paths(&self) -> Vec<String> {
        self.dim_info().0
    }

    /// Positions of the exported dimensions within the full dimension list
    /// `[subset, rep1, rep2, ...]`.
    pub fn dim_idxs(&self) -> Vec<usize> {
        self.dim_info().1
    }

    fn dim_info(&self) -> (Vec<String>, Vec<usize>) {
        let mut paths = vec!["*".to_string()];
        let mut idxs = vec![0];
        let mut current = "*".to_string();
        for (position, node) in self
            .path_nodes()
            .iter()
            .filter(|node| matches!(self.table.nodes[node.index].kind, TableNodeKind::Group { .. }))
            .enumerate()
        {
            if let TableNodeKind::Group {
                node_type,
                dim_label,
            } = &self.table.nodes[node.index].kind
            {
                current = format!("{current}/{dim_label}");
                if node_type.exports_dimension() {
                    paths.push(current.clone());
                    idxs.push(position + 1);
                }
            }
        }
        (paths, idxs)
    }
}

fn strip_delimiters(tag: &str) -> &str {
    if tag.len() < 2 {
        return tag;
    }
    let mut chars = tag.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

fn path_to_string(path: &[QueryComponent]) -> String {
    let rendered: Vec<String> = path.iter().map(|component| component.to_string()).collect();
    rendered.join("/")
}

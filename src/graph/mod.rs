//! Authoritative store of topology nodes and links.
//!
//! Nodes and links are kept in insertion order (link order drives interface
//! numbering) and indexed by id for lookup. Node and link ids share a single
//! namespace.

mod error;

pub use error::{TopologyError, TopologyResult};

use std::collections::HashMap;

use crate::models::{Link, Meta, Node, NodeType, Position};
use crate::utils::is_valid_identifier;

/// Prefix of auto-generated link ids
pub const LINK_ID_PREFIX: &str = "l";

/// `prefix` followed by the smallest positive integer for which `in_use` is false
pub fn allocate_id(prefix: &str, in_use: impl Fn(&str) -> bool) -> String {
    (1u64..)
        .map(|i| format!("{}{}", prefix, i))
        .find(|id| !in_use(id))
        .unwrap_or_else(|| format!("{}0", prefix))
}

/// GraphStore owns the node and link collections of one topology
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    region: String,
    nodes: Vec<Node>,
    links: Vec<Link>,
    node_index: HashMap<String, usize>,
    link_index: HashMap<String, usize>,
}

impl GraphStore {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    /// Build a store from already-constructed parts, validating every invariant:
    /// well-formed unique ids, existing endpoints and no self-loops.
    pub fn from_parts(region: impl Into<String>, nodes: Vec<Node>, links: Vec<Link>) -> TopologyResult<Self> {
        let mut store = Self::new(region);
        for node in nodes {
            if !is_valid_identifier(&node.id) {
                return Err(TopologyError::InvalidIdentifier(node.id));
            }
            if store.contains_id(&node.id) {
                return Err(TopologyError::IdentifierCollision(node.id));
            }
            store.node_index.insert(node.id.clone(), store.nodes.len());
            store.nodes.push(node);
        }
        for link in links {
            if !is_valid_identifier(&link.id) {
                return Err(TopologyError::InvalidIdentifier(link.id));
            }
            if store.contains_id(&link.id) {
                return Err(TopologyError::IdentifierCollision(link.id));
            }
            if link.a == link.b {
                return Err(TopologyError::SelfLoop(link.a));
            }
            for endpoint in [&link.a, &link.b] {
                if !store.node_index.contains_key(endpoint) {
                    return Err(TopologyError::UnknownEndpoint(endpoint.clone()));
                }
            }
            store.link_index.insert(link.id.clone(), store.links.len());
            store.links.push(link);
        }
        Ok(store)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn set_region(&mut self, region: impl Into<String>) {
        self.region = region.into();
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Links in insertion order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.link_index.get(id).map(|&i| &self.links[i])
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    /// Whether `id` names any node or link
    pub fn contains_id(&self, id: &str) -> bool {
        self.node_index.contains_key(id) || self.link_index.contains_key(id)
    }

    /// Smallest-positive-integer id with the given prefix not used by any node or link
    pub fn next_id(&self, prefix: &str) -> String {
        allocate_id(prefix, |id| self.contains_id(id))
    }

    /// Add a node of the given type at the default position
    pub fn add_node(&mut self, node_type: NodeType) -> &Node {
        self.add_node_at(node_type, Position::default_added())
    }

    /// Add a node of the given type at `position`
    pub fn add_node_at(&mut self, node_type: NodeType, position: Position) -> &Node {
        let id = self.next_id(node_type.id_prefix());
        let index = self.nodes.len();
        self.node_index.insert(id.clone(), index);
        self.nodes.push(Node {
            name: id.clone(),
            id,
            node_type,
            position,
            meta: Meta::new(),
        });
        &self.nodes[index]
    }

    /// Remove a node together with every incident link.
    /// Returns the removed node and links, or `None` when `id` is absent.
    pub fn remove_node(&mut self, id: &str) -> Option<(Node, Vec<Link>)> {
        let index = self.node_index.get(id).copied()?;
        let node = self.nodes.remove(index);
        let (removed, kept): (Vec<Link>, Vec<Link>) =
            std::mem::take(&mut self.links).into_iter().partition(|l| l.touches(id));
        self.links = kept;
        self.reindex();
        Some((node, removed))
    }

    /// Remove a single link. Returns the removed link, or `None` when absent.
    pub fn remove_link(&mut self, id: &str) -> Option<Link> {
        let index = self.link_index.get(id).copied()?;
        let link = self.links.remove(index);
        self.reindex();
        Some(link)
    }

    /// Rename a node and rewrite every link endpoint referencing it.
    /// Link labels are left untouched. Returns `Ok(false)` when `new_id`
    /// equals the current id.
    pub fn rename_node(&mut self, id: &str, new_id: &str) -> TopologyResult<bool> {
        if !is_valid_identifier(new_id) {
            return Err(TopologyError::InvalidIdentifier(new_id.to_string()));
        }
        let index = self
            .node_index
            .get(id)
            .copied()
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))?;
        if id == new_id {
            return Ok(false);
        }
        if self.contains_id(new_id) {
            return Err(TopologyError::IdentifierCollision(new_id.to_string()));
        }

        self.nodes[index].id = new_id.to_string();
        for link in &mut self.links {
            if link.a == id {
                link.a = new_id.to_string();
            }
            if link.b == id {
                link.b = new_id.to_string();
            }
        }
        self.node_index.remove(id);
        self.node_index.insert(new_id.to_string(), index);
        Ok(true)
    }

    /// Remove every node and link. The region is kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.node_index.clear();
        self.link_index.clear();
    }

    /// Connect two existing nodes with a new link labelled `"{a}-{b}"`.
    /// Parallel links between the same pair are allowed.
    pub fn connect(&mut self, a: &str, b: &str) -> TopologyResult<&Link> {
        if a == b {
            return Err(TopologyError::SelfLoop(a.to_string()));
        }
        for endpoint in [a, b] {
            if !self.node_index.contains_key(endpoint) {
                return Err(TopologyError::UnknownEndpoint(endpoint.to_string()));
            }
        }
        if self.has_link_between(a, b) {
            tracing::debug!("Adding parallel link between {} and {}", a, b);
        }

        let id = self.next_id(LINK_ID_PREFIX);
        let index = self.links.len();
        self.link_index.insert(id.clone(), index);
        self.links.push(Link {
            id,
            a: a.to_string(),
            b: b.to_string(),
            label: Link::default_label(a, b),
            meta: Meta::new(),
        });
        Ok(&self.links[index])
    }

    /// Whether any link joins `a` and `b`, in either direction
    pub fn has_link_between(&self, a: &str, b: &str) -> bool {
        self.links
            .iter()
            .any(|l| (l.a == a && l.b == b) || (l.a == b && l.b == a))
    }

    pub fn set_node_name(&mut self, id: &str, name: impl Into<String>) -> TopologyResult<()> {
        let node = self.node_mut(id)?;
        node.name = name.into();
        Ok(())
    }

    pub fn set_node_position(&mut self, id: &str, position: Position) -> TopologyResult<()> {
        let node = self.node_mut(id)?;
        node.position = position;
        Ok(())
    }

    pub fn set_link_label(&mut self, id: &str, label: impl Into<String>) -> TopologyResult<()> {
        let index = self
            .link_index
            .get(id)
            .copied()
            .ok_or_else(|| TopologyError::UnknownLink(id.to_string()))?;
        self.links[index].label = label.into();
        Ok(())
    }

    /// Ids of host nodes followed by ids of every other node, each in insertion order
    pub fn hosts_then_switches(&self) -> Vec<&str> {
        let hosts = self.nodes.iter().filter(|n| n.node_type.is_host());
        let switches = self.nodes.iter().filter(|n| !n.node_type.is_host());
        hosts.chain(switches).map(|n| n.id.as_str()).collect()
    }

    fn node_mut(&mut self, id: &str) -> TopologyResult<&mut Node> {
        let index = self
            .node_index
            .get(id)
            .copied()
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))?;
        Ok(&mut self.nodes[index])
    }

    fn reindex(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        self.link_index = self
            .links
            .iter()
            .enumerate()
            .map(|(i, l)| (l.id.clone(), i))
            .collect();
    }
}

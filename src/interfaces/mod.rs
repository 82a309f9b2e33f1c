//! Deterministic interface naming.
//!
//! Every node numbers its distinct peers in link insertion order: hosts get
//! `eth0, eth1, ...`, switches get `swp1, swp2, ...`. The plan is recomputed
//! from the graph on every read.

use std::collections::HashMap;

use serde::Serialize;

use crate::graph::GraphStore;
use crate::models::NodeType;

/// Interface name of the `index`-th (0-based) peer of a node
pub fn interface_name(node_type: NodeType, index: usize) -> String {
    match node_type {
        NodeType::Host => format!("eth{}", index),
        NodeType::Switch => format!("swp{}", index + 1),
    }
}

/// One interface on a node, facing `peer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adapter {
    pub peer: String,
    pub iface: String,
}

/// Adapters and port-group labels required on one node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeAdapters {
    pub node: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub interfaces: Vec<Adapter>,
    /// Labels of the links touching this node, first occurrence only
    pub ports: Vec<String>,
}

/// Interfaces resolved on both ends of a link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInterfaces {
    pub link_id: String,
    pub link: String,
    pub a: String,
    pub a_iface: Option<String>,
    pub b: String,
    pub b_iface: Option<String>,
}

/// Full interface plan of a topology
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterPlan {
    /// Port groups to create, one per link, in link order
    pub link_names: Vec<String>,
    pub link_assignments: Vec<LinkInterfaces>,
    pub hosts: Vec<NodeAdapters>,
    pub switches: Vec<NodeAdapters>,
}

impl AdapterPlan {
    /// Compute the plan for the current graph
    pub fn compute(graph: &GraphStore) -> Self {
        let mut peers: HashMap<&str, Vec<&str>> = graph
            .nodes()
            .iter()
            .map(|n| (n.id.as_str(), Vec::new()))
            .collect();
        for link in graph.links() {
            for (end, other) in [(&link.a, &link.b), (&link.b, &link.a)] {
                if let Some(list) = peers.get_mut(end.as_str()) {
                    if !list.contains(&other.as_str()) {
                        list.push(other.as_str());
                    }
                }
            }
        }

        let mut hosts = Vec::new();
        let mut switches = Vec::new();
        for node in graph.nodes() {
            let interfaces = peers
                .get(node.id.as_str())
                .map(|list| {
                    list.iter()
                        .enumerate()
                        .map(|(i, peer)| Adapter {
                            peer: peer.to_string(),
                            iface: interface_name(node.node_type, i),
                        })
                        .collect()
                })
                .unwrap_or_default();

            let mut ports: Vec<String> = Vec::new();
            for link in graph.links().iter().filter(|l| l.touches(&node.id)) {
                if !ports.contains(&link.label) {
                    ports.push(link.label.clone());
                }
            }

            let entry = NodeAdapters {
                node: node.id.clone(),
                node_type: node.node_type,
                interfaces,
                ports,
            };
            if node.node_type.is_host() {
                hosts.push(entry);
            } else {
                switches.push(entry);
            }
        }

        let mut plan = Self {
            link_names: graph.links().iter().map(|l| l.label.clone()).collect(),
            link_assignments: Vec::with_capacity(graph.links().len()),
            hosts,
            switches,
        };
        let link_assignments: Vec<LinkInterfaces> = graph
            .links()
            .iter()
            .map(|l| LinkInterfaces {
                link_id: l.id.clone(),
                link: l.label.clone(),
                a: l.a.clone(),
                a_iface: plan.interface_for(&l.a, &l.b).map(str::to_string),
                b: l.b.clone(),
                b_iface: plan.interface_for(&l.b, &l.a).map(str::to_string),
            })
            .collect();
        plan.link_assignments = link_assignments;

        tracing::debug!(
            "Computed adapter plan: {} links, {} hosts, {} switches",
            plan.link_names.len(),
            plan.hosts.len(),
            plan.switches.len()
        );
        plan
    }

    /// Adapters of one node, hosts or switches
    pub fn node(&self, id: &str) -> Option<&NodeAdapters> {
        self.hosts.iter().chain(self.switches.iter()).find(|n| n.node == id)
    }

    /// Interface on `node` facing `peer`; `None` for dangling or unknown pairs
    pub fn interface_for(&self, node: &str, peer: &str) -> Option<&str> {
        self.node(node)?
            .interfaces
            .iter()
            .find(|a| a.peer == peer)
            .map(|a| a.iface.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Link, Meta, Node, Position};

    fn node(id: &str, node_type: NodeType) -> Node {
        Node {
            id: id.into(),
            node_type,
            name: id.into(),
            position: Position::default_imported(),
            meta: Meta::new(),
        }
    }

    fn link(id: &str, a: &str, b: &str) -> Link {
        Link {
            id: id.into(),
            a: a.into(),
            b: b.into(),
            label: Link::default_label(a, b),
            meta: Meta::new(),
        }
    }

    #[test]
    fn test_interface_name() {
        assert_eq!(interface_name(NodeType::Host, 0), "eth0");
        assert_eq!(interface_name(NodeType::Host, 3), "eth3");
        assert_eq!(interface_name(NodeType::Switch, 0), "swp1");
        assert_eq!(interface_name(NodeType::Switch, 3), "swp4");
    }

    #[test]
    fn test_host_with_two_switches() {
        let mut g = GraphStore::new("r");
        g.add_node(NodeType::Host);
        g.add_node(NodeType::Switch);
        g.add_node(NodeType::Switch);
        g.connect("h1", "sw1").unwrap();
        g.connect("h1", "sw2").unwrap();

        let plan = AdapterPlan::compute(&g);
        assert_eq!(plan.interface_for("h1", "sw1"), Some("eth0"));
        assert_eq!(plan.interface_for("h1", "sw2"), Some("eth1"));
        assert_eq!(plan.interface_for("sw1", "h1"), Some("swp1"));
        assert_eq!(plan.interface_for("sw2", "h1"), Some("swp1"));
        assert_eq!(plan.link_names, vec!["h1-sw1", "h1-sw2"]);
        assert_eq!(
            plan.link_assignments[1],
            LinkInterfaces {
                link_id: "l2".into(),
                link: "h1-sw2".into(),
                a: "h1".into(),
                a_iface: Some("eth1".into()),
                b: "sw2".into(),
                b_iface: Some("swp1".into()),
            }
        );
        // Stable under re-evaluation
        assert_eq!(plan, AdapterPlan::compute(&g));
    }

    #[test]
    fn test_numbering_follows_link_order_not_node_order() {
        let g = GraphStore::from_parts(
            "r",
            vec![
                node("sw1", NodeType::Switch),
                node("sw2", NodeType::Switch),
                node("sw3", NodeType::Switch),
            ],
            vec![link("l1", "sw3", "sw1"), link("l2", "sw2", "sw1")],
        )
        .unwrap();
        let plan = AdapterPlan::compute(&g);
        assert_eq!(plan.interface_for("sw1", "sw3"), Some("swp1"));
        assert_eq!(plan.interface_for("sw1", "sw2"), Some("swp2"));
    }

    #[test]
    fn test_parallel_links_share_one_interface() {
        let g = GraphStore::from_parts(
            "r",
            vec![node("h1", NodeType::Host), node("sw1", NodeType::Switch), node("sw2", NodeType::Switch)],
            vec![link("l1", "h1", "sw1"), link("l2", "sw1", "h1"), link("l3", "h1", "sw2")],
        )
        .unwrap();
        let plan = AdapterPlan::compute(&g);
        let h1 = plan.node("h1").unwrap();
        assert_eq!(h1.interfaces.len(), 2);
        assert_eq!(plan.interface_for("h1", "sw2"), Some("eth1"));
        assert_eq!(plan.link_assignments.len(), 3);
        assert_eq!(plan.link_assignments[1].a_iface.as_deref(), Some("swp1"));
        assert_eq!(plan.link_assignments[1].b_iface.as_deref(), Some("eth0"));
        assert_eq!(h1.ports, vec!["h1-sw1", "sw1-h1", "h1-sw2"]);
    }

    #[test]
    fn test_grouping_by_type_and_isolated_nodes() {
        let mut g = GraphStore::new("r");
        g.add_node(NodeType::Switch);
        g.add_node(NodeType::Host);
        g.add_node(NodeType::Host);
        g.connect("h1", "sw1").unwrap();
        g.set_link_label("l1", "uplink").unwrap();

        let plan = AdapterPlan::compute(&g);
        let hosts: Vec<&str> = plan.hosts.iter().map(|n| n.node.as_str()).collect();
        let switches: Vec<&str> = plan.switches.iter().map(|n| n.node.as_str()).collect();
        assert_eq!(hosts, vec!["h1", "h2"]);
        assert_eq!(switches, vec!["sw1"]);
        assert!(plan.node("h2").unwrap().interfaces.is_empty());
        assert_eq!(plan.node("sw1").unwrap().ports, vec!["uplink"]);
        assert_eq!(plan.link_names, vec!["uplink"]);
    }

    #[test]
    fn test_unknown_pairs_are_absent() {
        let mut g = GraphStore::new("r");
        g.add_node(NodeType::Host);
        let plan = AdapterPlan::compute(&g);
        assert_eq!(plan.interface_for("h1", "sw1"), None);
        assert_eq!(plan.interface_for("ghost", "h1"), None);
        assert!(plan.link_names.is_empty());
    }
}

//! Binding of topology nodes to inventory VMs.
//!
//! The node → VM mapping is injective over non-empty names: reassigning a VM
//! that another node holds swaps that node onto the reassigned node's previous
//! VM. Host nodes additionally carry a free-form IP string.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::graph::GraphStore;
use crate::models::Candidate;

/// Name and primary IP of the VM bound to a node, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmDisplay {
    pub name: String,
    pub ip: String,
}

/// Result of an `assign` call
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AssignOutcome {
    /// VM previously held by the assigned node
    pub previous: String,
    /// Node that held the requested VM and received `previous` in exchange
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swapped_with: Option<String>,
}

/// Per-node assignment row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeAssignment {
    pub node: String,
    pub vm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// VM is assigned but not in the current candidate list
    pub stale: bool,
}

/// VmResolver maintains the node → VM and host → IP mappings
#[derive(Debug, Clone, Default)]
pub struct VmResolver {
    candidates: Vec<Candidate>,
    vms: BTreeMap<String, String>,
    ips: BTreeMap<String, String>,
}

impl VmResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn is_candidate(&self, vm: &str) -> bool {
        self.candidates.iter().any(|c| c.name == vm)
    }

    /// VM assigned to `node`, empty when unassigned
    pub fn vm_for(&self, node: &str) -> &str {
        self.vms.get(node).map(String::as_str).unwrap_or_default()
    }

    /// IP entered for a host node, empty when unset
    pub fn ip_for(&self, node: &str) -> &str {
        self.ips.get(node).map(String::as_str).unwrap_or_default()
    }

    /// Whether a node has an IP entry at all (possibly empty)
    pub fn has_ip_entry(&self, node: &str) -> bool {
        self.ips.contains_key(node)
    }

    /// Node currently holding `vm`
    pub fn holder_of(&self, vm: &str) -> Option<&str> {
        if vm.is_empty() {
            return None;
        }
        self.vms
            .iter()
            .find(|(_, v)| v.as_str() == vm)
            .map(|(k, _)| k.as_str())
    }

    /// Replace the candidate list and default-fill unassigned nodes.
    ///
    /// Existing non-empty assignments are kept even when their VM is no longer
    /// a candidate. Unassigned nodes, hosts first, take the first unclaimed
    /// candidate in list order; nodes left over get an empty assignment.
    /// Every host gets an IP entry without overwriting existing values.
    pub fn load_candidates(&mut self, candidates: Vec<Candidate>, graph: &GraphStore) {
        self.candidates = candidates;

        let mut claimed: HashSet<String> = self
            .vms
            .values()
            .filter(|v| !v.is_empty())
            .cloned()
            .collect();
        let mut filled = 0usize;

        for node in graph.hosts_then_switches() {
            if !self.vm_for(node).is_empty() {
                continue;
            }
            let next = self
                .candidates
                .iter()
                .find(|c| !claimed.contains(&c.name))
                .map(|c| c.name.clone());
            match next {
                Some(vm) => {
                    claimed.insert(vm.clone());
                    self.vms.insert(node.to_string(), vm);
                    filled += 1;
                }
                None => {
                    self.vms.insert(node.to_string(), String::new());
                }
            }
        }

        for host in graph.nodes().iter().filter(|n| n.node_type.is_host()) {
            self.ips.entry(host.id.clone()).or_default();
        }

        tracing::info!(
            "Loaded {} candidate VMs, default-assigned {} nodes",
            self.candidates.len(),
            filled
        );
    }

    /// Drop the candidate list, keeping every assignment
    pub fn clear_candidates(&mut self) {
        self.candidates.clear();
    }

    /// Candidates not claimed by other nodes, plus the node's own VM
    pub fn options_for(&self, node: &str) -> Vec<String> {
        let own = self.vm_for(node);
        let mut options: Vec<String> = Vec::new();
        if !own.is_empty() && !self.is_candidate(own) {
            options.push(own.to_string());
        }
        options.extend(
            self.candidates
                .iter()
                .filter(|c| c.name == own || self.holder_of(&c.name).is_none())
                .map(|c| c.name.clone()),
        );
        options
    }

    /// Assign `vm` to `node`, or clear the node when `vm` is empty.
    /// A node already holding `vm` receives `node`'s previous VM.
    pub fn assign(&mut self, node: &str, vm: &str) -> AssignOutcome {
        let previous = self.vm_for(node).to_string();
        if vm.is_empty() {
            self.vms.insert(node.to_string(), String::new());
            return AssignOutcome {
                previous,
                swapped_with: None,
            };
        }

        let other = self
            .vms
            .iter()
            .find(|(k, v)| k.as_str() != node && v.as_str() == vm)
            .map(|(k, _)| k.clone());
        if let Some(other) = &other {
            tracing::debug!("Swapping {} onto {} (was {})", previous, other, vm);
            self.vms.insert(other.clone(), previous.clone());
        }
        self.vms.insert(node.to_string(), vm.to_string());
        AssignOutcome {
            previous,
            swapped_with: other,
        }
    }

    pub fn set_ip(&mut self, node: &str, ip: impl Into<String>) {
        self.ips.insert(node.to_string(), ip.into());
    }

    /// Forget every mapping of a removed node
    pub fn remove_node(&mut self, node: &str) {
        self.vms.remove(node);
        self.ips.remove(node);
    }

    /// Move mappings from `old` to `new` after a node rename
    pub fn rename_node(&mut self, old: &str, new: &str) {
        if let Some(vm) = self.vms.remove(old) {
            self.vms.insert(new.to_string(), vm);
        }
        if let Some(ip) = self.ips.remove(old) {
            self.ips.insert(new.to_string(), ip);
        }
    }

    /// Forget every assignment; the candidate list is kept
    pub fn clear_assignments(&mut self) {
        self.vms.clear();
        self.ips.clear();
    }

    /// VM name and its primary IP from the candidate list
    pub fn display_for(&self, node: &str) -> Option<VmDisplay> {
        let vm = self.vm_for(node);
        if vm.is_empty() {
            return None;
        }
        let ip = self
            .candidates
            .iter()
            .find(|c| c.name == vm)
            .map(|c| c.primary_ip.clone())
            .unwrap_or_default();
        Some(VmDisplay {
            name: vm.to_string(),
            ip,
        })
    }

    /// Assignment rows for every node in the graph, hosts first
    pub fn rows(&self, graph: &GraphStore) -> Vec<NodeAssignment> {
        graph
            .hosts_then_switches()
            .into_iter()
            .map(|id| {
                let vm = self.vm_for(id).to_string();
                let is_host = graph.node(id).map(|n| n.node_type.is_host()).unwrap_or(false);
                NodeAssignment {
                    node: id.to_string(),
                    stale: !vm.is_empty() && !self.is_candidate(&vm),
                    ip: is_host.then(|| self.ip_for(id).to_string()),
                    vm,
                }
            })
            .collect()
    }

    /// Whether no two nodes share a non-empty VM
    pub fn is_injective(&self) -> bool {
        let mut seen = HashSet::new();
        self.vms
            .values()
            .filter(|v| !v.is_empty())
            .all(|v| seen.insert(v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;

    fn candidates(names: &[&str]) -> Vec<Candidate> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Candidate::new(*n, format!("10.0.0.{}", i + 1)))
            .collect()
    }

    /// Graph with switches added before hosts to exercise host-first filling
    fn graph() -> GraphStore {
        let mut g = GraphStore::new("s05");
        g.add_node(NodeType::Switch);
        g.add_node(NodeType::Host);
        g.add_node(NodeType::Switch);
        g.add_node(NodeType::Host);
        g
    }

    #[test]
    fn test_default_fill_hosts_first() {
        let g = graph();
        let mut r = VmResolver::new();
        r.load_candidates(candidates(&["vm-a", "vm-b", "vm-c"]), &g);

        assert_eq!(r.vm_for("h1"), "vm-a");
        assert_eq!(r.vm_for("h2"), "vm-b");
        assert_eq!(r.vm_for("sw1"), "vm-c");
        assert_eq!(r.vm_for("sw2"), "");
        assert!(r.rows(&g).iter().any(|row| row.node == "sw2" && row.vm.is_empty()));
        assert_eq!(r.ip_for("h1"), "");
        assert!(r.has_ip_entry("h2"));
        assert!(!r.has_ip_entry("sw1"));
        assert!(r.is_injective());
    }

    #[test]
    fn test_default_fill_preserves_existing_and_stale() {
        let g = graph();
        let mut r = VmResolver::new();
        r.assign("sw1", "vm-b");
        r.assign("h2", "retired-vm");
        r.set_ip("h1", "2001:db8::1");

        r.load_candidates(candidates(&["vm-a", "vm-b", "vm-c"]), &g);
        assert_eq!(r.vm_for("h1"), "vm-a");
        assert_eq!(r.vm_for("h2"), "retired-vm");
        assert_eq!(r.vm_for("sw1"), "vm-b");
        assert_eq!(r.vm_for("sw2"), "vm-c");
        assert_eq!(r.ip_for("h1"), "2001:db8::1");

        let stale: Vec<String> = r.rows(&g).into_iter().filter(|row| row.stale).map(|row| row.node).collect();
        assert_eq!(stale, vec!["h2"]);
    }

    #[test]
    fn test_assign_swaps_with_holder() {
        let g = graph();
        let mut r = VmResolver::new();
        r.load_candidates(candidates(&["vm-a", "vm-b", "vm-c", "vm-d"]), &g);
        assert_eq!(r.vm_for("h1"), "vm-a");
        assert_eq!(r.vm_for("sw1"), "vm-c");

        let outcome = r.assign("h1", "vm-c");
        assert_eq!(outcome.previous, "vm-a");
        assert_eq!(outcome.swapped_with.as_deref(), Some("sw1"));
        assert_eq!(r.vm_for("h1"), "vm-c");
        assert_eq!(r.vm_for("sw1"), "vm-a");
        assert!(r.is_injective());
    }

    #[test]
    fn test_assign_from_empty_leaves_holder_empty() {
        let mut r = VmResolver::new();
        r.assign("h1", "vm-a");
        let outcome = r.assign("h2", "vm-a");
        assert_eq!(outcome.swapped_with.as_deref(), Some("h1"));
        assert_eq!(r.vm_for("h1"), "");
        assert_eq!(r.vm_for("h2"), "vm-a");
        assert_eq!(r.holder_of("vm-a"), Some("h2"));
    }

    #[test]
    fn test_assign_empty_clears() {
        let mut r = VmResolver::new();
        r.assign("h1", "vm-a");
        let outcome = r.assign("h1", "");
        assert_eq!(outcome.previous, "vm-a");
        assert_eq!(r.vm_for("h1"), "");
        assert_eq!(r.holder_of("vm-a"), None);
    }

    #[test]
    fn test_assign_sequence_stays_injective() {
        let nodes = ["h1", "h2", "sw1", "sw2", "sw3"];
        let vms = ["a", "b", "c", "", "a", "c"];
        let mut r = VmResolver::new();
        for step in 0..60 {
            let node = nodes[(step * 7) % nodes.len()];
            let vm = vms[(step * 5 + step / 3) % vms.len()];
            r.assign(node, vm);
            assert!(r.is_injective(), "step {} broke injectivity", step);
        }
    }

    #[test]
    fn test_options_for_excludes_other_claims() {
        let g = graph();
        let mut r = VmResolver::new();
        r.load_candidates(candidates(&["vm-a", "vm-b", "vm-c", "vm-d", "vm-e"]), &g);
        // h1=a h2=b sw1=c sw2=d
        assert_eq!(r.options_for("h1"), vec!["vm-a", "vm-e"]);
        r.assign("sw2", "");
        assert_eq!(r.options_for("sw2"), vec!["vm-d", "vm-e"]);
    }

    #[test]
    fn test_options_for_keeps_stale_own_value() {
        let mut r = VmResolver::new();
        r.assign("h1", "retired-vm");
        let g = GraphStore::new("r");
        r.load_candidates(candidates(&["vm-a"]), &g);
        assert_eq!(r.options_for("h1"), vec!["retired-vm", "vm-a"]);
    }

    #[test]
    fn test_rename_and_remove_rekey_maps() {
        let mut r = VmResolver::new();
        r.assign("h1", "vm-a");
        r.set_ip("h1", "10.1.1.1");
        r.rename_node("h1", "web");
        assert_eq!(r.vm_for("web"), "vm-a");
        assert_eq!(r.ip_for("web"), "10.1.1.1");
        assert_eq!(r.vm_for("h1"), "");
        assert!(!r.has_ip_entry("h1"));

        r.remove_node("web");
        assert_eq!(r.holder_of("vm-a"), None);
        assert!(!r.has_ip_entry("web"));
    }

    #[test]
    fn test_display_for_uses_candidate_ip() {
        let mut r = VmResolver::new();
        let g = GraphStore::new("r");
        r.load_candidates(candidates(&["vm-a"]), &g);
        r.assign("h1", "vm-a");
        r.assign("h2", "gone");
        assert_eq!(
            r.display_for("h1"),
            Some(VmDisplay { name: "vm-a".into(), ip: "10.0.0.1".into() })
        );
        assert_eq!(r.display_for("h2").unwrap().ip, "");
        assert_eq!(r.display_for("h3"), None);
    }
}

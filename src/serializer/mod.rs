//! Conversion between the in-memory topology and its portable JSON document.

use std::collections::HashSet;

use crate::assignment::VmResolver;
use crate::graph::{allocate_id, GraphStore, TopologyError, TopologyResult, LINK_ID_PREFIX};
use crate::models::*;
use crate::utils::now_millis;

/// Value recorded as `meta.created_by` on export
pub const CREATED_BY: &str = "ui";

/// Export the graph and its VM/IP bindings as a document
pub fn export(graph: &GraphStore, resolver: &VmResolver) -> TopologyDocument {
    TopologyDocument {
        region: graph.region().to_string(),
        meta: DocumentMeta {
            created_by: CREATED_BY.to_string(),
            timestamp: now_millis(),
        },
        nodes: graph
            .nodes()
            .iter()
            .map(|n| DocumentNode {
                id: n.id.clone(),
                node_type: n.node_type,
                name: n.name.clone(),
                x: n.position.x,
                y: n.position.y,
                meta: n.meta.clone(),
                vm: resolver.vm_for(&n.id).to_string(),
                ip: n
                    .node_type
                    .is_host()
                    .then(|| resolver.ip_for(&n.id).to_string()),
            })
            .collect(),
        links: graph
            .links()
            .iter()
            .map(|l| DocumentLink {
                id: l.id.clone(),
                a: l.a.clone(),
                b: l.b.clone(),
                label: l.label.clone(),
                meta: l.meta.clone(),
            })
            .collect(),
    }
}

/// Export rendered as pretty JSON text
pub fn export_json(graph: &GraphStore, resolver: &VmResolver) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&export(graph, resolver))?)
}

/// Suggested download name for an exported document
pub fn export_filename(region: &str, suffix: &str) -> String {
    if region.is_empty() {
        suffix.to_string()
    } else {
        format!("{}-{}", region, suffix)
    }
}

/// VM and IP binding read from an imported node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub node: String,
    pub vm: String,
    /// Present for host nodes only
    pub ip: Option<String>,
}

/// A validated document, ready to replace the current topology
#[derive(Debug, Clone)]
pub struct PreparedImport {
    pub graph: GraphStore,
    pub bindings: Vec<ImportBinding>,
}

/// Parse document text
pub fn parse(text: &str) -> TopologyResult<ImportDocument> {
    serde_json::from_str(text).map_err(|e| TopologyError::MalformedDocument(e.to_string()))
}

/// Validate a document and build the graph it describes.
/// Nothing is mutated here; a failure leaves the caller's state untouched.
pub fn prepare(doc: ImportDocument, current_region: &str) -> TopologyResult<PreparedImport> {
    let nodes = doc
        .nodes
        .ok_or_else(|| TopologyError::MalformedDocument("missing nodes".to_string()))?;
    let links = doc
        .links
        .ok_or_else(|| TopologyError::MalformedDocument("missing links".to_string()))?;
    let region = doc
        .region
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| current_region.to_string());

    let mut bindings = Vec::with_capacity(nodes.len());
    let graph_nodes: Vec<Node> = nodes
        .into_iter()
        .map(|n| {
            let default_position = Position::default_imported();
            bindings.push(ImportBinding {
                node: n.id.clone(),
                vm: n.vm.unwrap_or_default(),
                ip: n.node_type.is_host().then(|| n.ip.unwrap_or_default()),
            });
            Node {
                name: n.name.filter(|s| !s.is_empty()).unwrap_or_else(|| n.id.clone()),
                id: n.id,
                node_type: n.node_type,
                position: Position::new(
                    n.x.unwrap_or(default_position.x),
                    n.y.unwrap_or(default_position.y),
                ),
                meta: n.meta.unwrap_or_default(),
            }
        })
        .collect();

    // Explicit ids are reserved before any fresh id is handed out
    let mut taken: HashSet<String> = graph_nodes.iter().map(|n| n.id.clone()).collect();
    taken.extend(links.iter().filter_map(|l| l.id.clone()).filter(|id| !id.is_empty()));

    let graph_links: Vec<Link> = links
        .into_iter()
        .map(|l| {
            let id = l.id.filter(|id| !id.is_empty()).unwrap_or_else(|| {
                let fresh = allocate_id(LINK_ID_PREFIX, |id| taken.contains(id));
                taken.insert(fresh.clone());
                fresh
            });
            Link {
                label: l
                    .label
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| Link::default_label(&l.a, &l.b)),
                id,
                a: l.a,
                b: l.b,
                meta: l.meta.unwrap_or_default(),
            }
        })
        .collect();

    let graph = GraphStore::from_parts(region, graph_nodes, graph_links)
        .map_err(|e| TopologyError::MalformedDocument(e.to_string()))?;
    Ok(PreparedImport { graph, bindings })
}

/// Parse and validate document text in one step
pub fn prepare_text(text: &str, current_region: &str) -> TopologyResult<PreparedImport> {
    prepare(parse(text)?, current_region)
}

/// Apply imported bindings through the swap-safe `assign`.
/// Returns the distinct imported VM names absent from the candidate list.
pub fn apply_bindings(resolver: &mut VmResolver, bindings: &[ImportBinding]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for binding in bindings {
        if !binding.vm.is_empty() && !resolver.is_candidate(&binding.vm) && !missing.contains(&binding.vm) {
            missing.push(binding.vm.clone());
        }
        resolver.assign(&binding.node, &binding.vm);
        if let Some(ip) = &binding.ip {
            resolver.set_ip(&binding.node, ip.clone());
        }
    }
    missing
}

/// Plain-text node to VM report: region header, hosts with IPs, then switches
pub fn mapping_report(graph: &GraphStore, resolver: &VmResolver) -> String {
    let mut lines = vec![format!("Area {}", graph.region())];
    for id in graph.hosts_then_switches() {
        let vm = resolver.vm_for(id);
        let is_host = graph.node(id).map(|n| n.node_type.is_host()).unwrap_or(false);
        let ip = resolver.ip_for(id);
        if is_host && !ip.is_empty() {
            lines.push(format!("{} {} {}", id, vm, ip));
        } else {
            lines.push(format!("{} {}", id, vm));
        }
    }
    lines.join("\n")
}

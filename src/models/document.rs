use serde::{Deserialize, Serialize};

use super::topology::{Meta, NodeType};

/// TopologyDocument is the portable, file-based representation of a topology
#[derive(Debug, Clone, Serialize)]
pub struct TopologyDocument {
    pub region: String,
    pub meta: DocumentMeta,
    pub nodes: Vec<DocumentNode>,
    pub links: Vec<DocumentLink>,
}

/// Provenance recorded on export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub created_by: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Serialized node including its VM binding and, for hosts, its IP
#[derive(Debug, Clone, Serialize)]
pub struct DocumentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub meta: Meta,
    pub vm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentLink {
    pub id: String,
    pub a: String,
    pub b: String,
    pub label: String,
    pub meta: Meta,
}

/// Lenient import shape: everything but ids and endpoints may be omitted.
/// `nodes` and `links` are optional here so their absence can be reported
/// as a malformed document rather than a parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<ImportNode>>,
    #[serde(default)]
    pub links: Option<Vec<ImportLink>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportNode {
    pub id: String,
    #[serde(rename = "type", default = "default_import_type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub meta: Option<Meta>,
    #[serde(default)]
    pub vm: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportLink {
    #[serde(default)]
    pub id: Option<String>,
    pub a: String,
    pub b: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

fn default_import_type() -> NodeType {
    NodeType::Switch
}

/// Outcome of a successful import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub nodes: usize,
    pub links: usize,
    /// VM names assigned by the document but absent from the candidate list
    pub missing_vms: Vec<String>,
}

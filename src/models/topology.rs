use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque metadata carried on nodes, links and documents
pub type Meta = Map<String, Value>;

/// Canonical node type values
pub mod node_type {
    pub const HOST: &str = "host";
    pub const SWITCH: &str = "switch";
}

/// NodeType distinguishes hosts from switches.
/// Anything that is not a host is treated as a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum NodeType {
    Host,
    Switch,
}

impl NodeType {
    /// Prefix used by the id allocator (`h1`, `sw1`, ...)
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeType::Host => "h",
            NodeType::Switch => "sw",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Host => node_type::HOST,
            NodeType::Switch => node_type::SWITCH,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, NodeType::Host)
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        if value == node_type::HOST {
            NodeType::Host
        } else {
            NodeType::Switch
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas position of a node. No semantic constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Position assigned to freshly added nodes
    pub fn default_added() -> Self {
        Self::new(300.0, 160.0)
    }

    /// Position assigned to imported nodes missing x/y
    pub fn default_imported() -> Self {
        Self::new(100.0, 100.0)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Node represents a host or switch endpoint in the topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub meta: Meta,
}

/// Link represents an undirected connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub a: String,
    pub b: String,
    pub label: String,
    #[serde(default)]
    pub meta: Meta,
}

impl Link {
    /// Default label for a link between `a` and `b`
    pub fn default_label(a: &str, b: &str) -> String {
        format!("{}-{}", a, b)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.a == node_id || self.b == node_id
    }
}

/// Currently selected entity on the canvas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Selection {
    Node(String),
    Link(String),
}

/// AddNodeRequest for creating a node of the given type
#[derive(Debug, Clone, Deserialize)]
pub struct AddNodeRequest {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

/// UpdateNodeRequest edits display attributes and optionally renames the id
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNodeRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

/// ConnectRequest links two existing nodes
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectRequest {
    pub a: String,
    pub b: String,
}

/// UpdateLinkRequest edits a link label
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLinkRequest {
    pub label: String,
}

/// SetRegionRequest changes the inventory region of the topology
#[derive(Debug, Clone, Deserialize)]
pub struct SetRegionRequest {
    pub region: String,
}

/// AssignVmRequest binds a VM to a node; empty clears the binding
#[derive(Debug, Clone, Deserialize)]
pub struct AssignVmRequest {
    #[serde(default)]
    pub vm: String,
}

/// SetIpRequest sets the operator-entered IP of a host node
#[derive(Debug, Clone, Deserialize)]
pub struct SetIpRequest {
    #[serde(default)]
    pub ip: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::topology::NodeType;

/// Canonical remote action kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreatePorts,
    InstallPorts,
    ConfigureSw,
    ConfigureHost,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::CreatePorts,
        ActionKind::InstallPorts,
        ActionKind::ConfigureSw,
        ActionKind::ConfigureHost,
    ];

    /// Endpoint path on the command collaborator
    pub fn endpoint(&self) -> &'static str {
        match self {
            ActionKind::CreatePorts => "/api/topology/create_ports",
            ActionKind::InstallPorts => "/api/topology/install_ports",
            ActionKind::ConfigureSw => "/api/topology/configure_sw",
            ActionKind::ConfigureHost => "/api/topology/configure_host",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreatePorts => "create_ports",
            ActionKind::InstallPorts => "install_ports",
            ActionKind::ConfigureSw => "configure_sw",
            ActionKind::ConfigureHost => "configure_host",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ActionKind::CreatePorts => 0,
            ActionKind::InstallPorts => 1,
            ActionKind::ConfigureSw => 2,
            ActionKind::ConfigureHost => 3,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Port-creation request: region plus ordered link labels
#[derive(Debug, Clone, Serialize)]
pub struct CreatePortsRequest {
    pub region: String,
    pub links: Vec<String>,
}

/// Node entry of install/configure payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionNode {
    pub id: String,
    pub vm: String,
    pub ip: String,
    /// Only sent for configure payloads
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
}

/// Link entry of install/configure payloads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionLink {
    pub id: String,
    pub a: String,
    pub b: String,
    pub label: String,
}

/// Install/configure request: region plus enriched nodes and links
#[derive(Debug, Clone, Serialize)]
pub struct NodeActionRequest {
    pub region: String,
    pub nodes: Vec<ActionNode>,
    pub links: Vec<ActionLink>,
}

/// Captured output of the port-creation script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandLogs {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// One executed remote command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub cmd: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Raw response of the command collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<CommandLogs>,
    #[serde(default)]
    pub results: Vec<CommandResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl CommandResponse {
    /// Combined stdout/stderr text, or the error and trace on failure
    pub fn log_text(&self) -> String {
        if self.ok {
            let logs = self.logs.clone().unwrap_or_default();
            format!("{}\n{}", logs.stdout, logs.stderr)
        } else {
            format!(
                "ERROR: {}\n{}",
                self.error.as_deref().unwrap_or("unknown error"),
                self.trace.as_deref().unwrap_or_default()
            )
        }
    }
}

/// Last recorded outcome of one action kind
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub ok: bool,
    /// Advisory message shown to the operator
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    pub results: Vec<CommandResult>,
    pub finished_at: DateTime<Utc>,
}

/// Status of one action kind
#[derive(Debug, Clone, Serialize)]
pub struct ActionStatus {
    pub kind: ActionKind,
    pub in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<ActionRecord>,
}

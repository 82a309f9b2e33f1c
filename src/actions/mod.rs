//! Remote port creation, installation and configuration.
//!
//! Payloads are built from the workspace under its lock; the call itself
//! runs without the lock. Each action kind has its own in-progress flag so
//! different kinds may overlap but one kind never runs twice at once.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::inventory::build_client;
use crate::models::{ActionKind, ActionRecord, ActionStatus, CommandResponse};
use crate::workspace::Workspace;
use crate::ws::{Event, EventCallback, EventType};

/// Reasons an action is refused before any remote call is made
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("select a region first")]
    MissingRegion,

    #[error("confirm the topology first")]
    NotConfirmed,

    #[error("topology has no links, no ports to create")]
    NoPorts,

    #[error("{0} is already running")]
    InProgress(ActionKind),

    #[error("failed to encode {0} payload: {1}")]
    Payload(ActionKind, String),
}

/// Executes remote commands on the hypervisor side
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, kind: ActionKind, payload: &serde_json::Value) -> Result<CommandResponse>;
}

/// Command collaborator reached over HTTP
pub struct HttpCommandRunner {
    base_url: String,
    client: Client,
}

impl HttpCommandRunner {
    /// A zero `timeout_secs` disables the request timeout
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            client: build_client(timeout_secs)?,
        })
    }

    fn endpoint_url(&self, kind: ActionKind) -> String {
        format!("{}{}", self.base_url, kind.endpoint())
    }
}

#[async_trait]
impl CommandRunner for HttpCommandRunner {
    async fn run(&self, kind: ActionKind, payload: &serde_json::Value) -> Result<CommandResponse> {
        let resp = self
            .client
            .post(self.endpoint_url(kind))
            .json(payload)
            .send()
            .await?;

        // Failures still carry {ok: false, error, trace} bodies
        let status = resp.status();
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            anyhow::anyhow!("Command API error {} ({}): {}", status, e, body)
        })
    }
}

/// Validate preconditions and build the request body of `kind`
pub fn build_payload(workspace: &Workspace, kind: ActionKind) -> Result<serde_json::Value, ActionError> {
    if workspace.region().is_empty() {
        return Err(ActionError::MissingRegion);
    }
    if !workspace.is_confirmed() {
        return Err(ActionError::NotConfirmed);
    }
    let encoded = match kind {
        ActionKind::CreatePorts => {
            let request = workspace.create_ports_request();
            if request.links.is_empty() {
                return Err(ActionError::NoPorts);
            }
            serde_json::to_value(&request)
        }
        _ => serde_json::to_value(workspace.node_action_request(kind)),
    };
    encoded.map_err(|e| ActionError::Payload(kind, e.to_string()))
}

/// Per-kind in-progress flags and last results
pub struct ActionGate {
    in_progress: [AtomicBool; 4],
    last: Mutex<[Option<ActionRecord>; 4]>,
    callback: Option<EventCallback>,
}

/// Clears the in-progress flag of its kind when dropped
pub struct ActionGuard<'a> {
    gate: &'a ActionGate,
    kind: ActionKind,
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.gate.in_progress[self.kind.index()].store(false, Ordering::SeqCst);
    }
}

impl Default for ActionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionGate {
    pub fn new() -> Self {
        Self {
            in_progress: Default::default(),
            last: Mutex::new(Default::default()),
            callback: None,
        }
    }

    /// Gate that reports start and finish of every action
    pub fn with_callback(callback: EventCallback) -> Self {
        Self {
            callback: Some(callback),
            ..Self::new()
        }
    }

    fn notify(&self, event_type: EventType, payload: serde_json::Value) {
        if let Some(callback) = &self.callback {
            callback(&Event::new(event_type, payload));
        }
    }

    pub fn is_running(&self, kind: ActionKind) -> bool {
        self.in_progress[kind.index()].load(Ordering::SeqCst)
    }

    /// Claim the in-progress flag of `kind`
    pub fn try_begin(&self, kind: ActionKind) -> Result<ActionGuard<'_>, ActionError> {
        self.in_progress[kind.index()]
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ActionError::InProgress(kind))?;
        self.notify(EventType::ActionStarted, json!({ "kind": kind }));
        Ok(ActionGuard { gate: self, kind })
    }

    fn record(&self, record: ActionRecord) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let index = record.kind.index();
        last[index] = Some(record);
    }

    pub fn last(&self, kind: ActionKind) -> Option<ActionRecord> {
        let last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        last[kind.index()].clone()
    }

    pub fn status(&self) -> Vec<ActionStatus> {
        ActionKind::ALL
            .iter()
            .map(|kind| ActionStatus {
                kind: *kind,
                in_progress: self.is_running(*kind),
                last: self.last(*kind),
            })
            .collect()
    }

    /// Run `kind` through `runner`, holding its in-progress flag for the
    /// duration of the call. Remote failures become a failed record.
    pub async fn execute(
        &self,
        runner: &dyn CommandRunner,
        kind: ActionKind,
        payload: serde_json::Value,
    ) -> Result<ActionRecord, ActionError> {
        let guard = self.try_begin(kind)?;
        tracing::info!("Starting {}", kind);

        let record = match runner.run(kind, &payload).await {
            Ok(resp) => to_record(kind, resp),
            Err(e) => {
                tracing::warn!("{} request failed: {}", kind, e);
                ActionRecord {
                    kind,
                    ok: false,
                    message: format!("{} error: {}", kind, e),
                    logs: None,
                    results: Vec::new(),
                    finished_at: chrono::Utc::now(),
                }
            }
        };

        self.record(record.clone());
        drop(guard);
        tracing::info!("Finished {}: ok={}", kind, record.ok);
        self.notify(EventType::ActionFinished, json!({ "kind": kind, "ok": record.ok }));
        Ok(record)
    }
}

fn to_record(kind: ActionKind, resp: CommandResponse) -> ActionRecord {
    // Port creation reports captured script output, the others per-command results
    let logs = (kind == ActionKind::CreatePorts).then(|| resp.log_text());
    let message = if resp.ok {
        format!("{} completed", kind)
    } else {
        let error = resp.error.clone().unwrap_or_else(|| "unknown error".to_string());
        tracing::warn!("{} failed: {}", kind, error);
        format!("{} failed: {}", kind, error)
    };
    ActionRecord {
        kind,
        ok: resp.ok,
        message,
        logs,
        results: resp.results,
        finished_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommandLogs, CommandResult, NodeType};
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Runner that answers from a canned response, optionally waiting first
    struct FakeRunner {
        response: Option<CommandResponse>,
        release: Option<Arc<Notify>>,
        calls: Mutex<Vec<(ActionKind, serde_json::Value)>>,
    }

    impl FakeRunner {
        fn answering(response: CommandResponse) -> Self {
            Self {
                response: Some(response),
                release: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                release: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, kind: ActionKind, payload: &serde_json::Value) -> Result<CommandResponse> {
            self.calls.lock().unwrap().push((kind, payload.clone()));
            if let Some(release) = &self.release {
                release.notified().await;
            }
            self.response
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn confirmed_workspace() -> Workspace {
        let mut ws = Workspace::new("s05");
        ws.add_node(NodeType::Host, None);
        ws.add_node(NodeType::Switch, None);
        ws.connect("h1", "sw1").unwrap();
        ws.confirm();
        ws
    }

    #[test]
    fn test_build_payload_preconditions() {
        let mut ws = Workspace::new("");
        assert_eq!(build_payload(&ws, ActionKind::InstallPorts), Err(ActionError::MissingRegion));

        ws.set_region("s05");
        assert_eq!(build_payload(&ws, ActionKind::InstallPorts), Err(ActionError::NotConfirmed));

        ws.confirm();
        assert_eq!(build_payload(&ws, ActionKind::CreatePorts), Err(ActionError::NoPorts));
        // Node payloads are allowed on a linkless topology
        assert!(build_payload(&ws, ActionKind::ConfigureHost).is_ok());

        let ws = confirmed_workspace();
        let payload = build_payload(&ws, ActionKind::CreatePorts).unwrap();
        assert_eq!(payload, json!({ "region": "s05", "links": ["h1-sw1"] }));
    }

    #[tokio::test]
    async fn test_execute_records_create_ports_logs() {
        let ws = confirmed_workspace();
        let runner = FakeRunner::answering(CommandResponse {
            ok: true,
            logs: Some(CommandLogs {
                stdout: "created h1-sw1".into(),
                stderr: String::new(),
            }),
            ..Default::default()
        });
        let gate = ActionGate::new();

        let payload = build_payload(&ws, ActionKind::CreatePorts).unwrap();
        let record = gate.execute(&runner, ActionKind::CreatePorts, payload).await.unwrap();
        assert!(record.ok);
        assert_eq!(record.logs.as_deref(), Some("created h1-sw1\n"));
        assert!(!gate.is_running(ActionKind::CreatePorts));
        assert!(gate.last(ActionKind::CreatePorts).is_some());
        assert!(gate.last(ActionKind::InstallPorts).is_none());

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].0, ActionKind::CreatePorts);
        assert_eq!(calls[0].1["links"][0], "h1-sw1");
    }

    #[tokio::test]
    async fn test_execute_failures_become_records() {
        let ws = confirmed_workspace();
        let gate = ActionGate::new();

        let payload = build_payload(&ws, ActionKind::ConfigureSw).unwrap();
        let record = gate
            .execute(&FakeRunner::failing(), ActionKind::ConfigureSw, payload.clone())
            .await
            .unwrap();
        assert!(!record.ok);
        assert!(record.message.contains("connection refused"));
        assert!(!gate.is_running(ActionKind::ConfigureSw));

        let remote_error = FakeRunner::answering(CommandResponse {
            ok: false,
            error: Some("vm not found".into()),
            results: vec![CommandResult {
                cmd: "nmcli".into(),
                stdout: String::new(),
                stderr: "boom".into(),
            }],
            ..Default::default()
        });
        let record = gate.execute(&remote_error, ActionKind::ConfigureSw, payload).await.unwrap();
        assert_eq!(record.message, "configure_sw failed: vm not found");
        assert_eq!(record.results.len(), 1);
        assert!(record.logs.is_none());
    }

    #[tokio::test]
    async fn test_same_kind_is_refused_while_running() {
        let ws = confirmed_workspace();
        let release = Arc::new(Notify::new());
        let runner = Arc::new(FakeRunner {
            response: Some(CommandResponse {
                ok: true,
                ..Default::default()
            }),
            release: Some(release.clone()),
            calls: Mutex::new(Vec::new()),
        });
        let gate = Arc::new(ActionGate::new());
        let payload = build_payload(&ws, ActionKind::InstallPorts).unwrap();

        let running = {
            let gate = gate.clone();
            let runner = runner.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                gate.execute(runner.as_ref(), ActionKind::InstallPorts, payload).await
            })
        };
        while !gate.is_running(ActionKind::InstallPorts) {
            tokio::task::yield_now().await;
        }

        let second = gate.execute(runner.as_ref(), ActionKind::InstallPorts, payload).await;
        assert_eq!(second.unwrap_err(), ActionError::InProgress(ActionKind::InstallPorts));
        // Other kinds are independent
        let other = gate.try_begin(ActionKind::ConfigureHost);
        assert!(other.is_ok());
        drop(other);

        release.notify_one();
        let record = running.await.unwrap().unwrap();
        assert!(record.ok);
        assert!(gate.status().iter().all(|s| !s.in_progress));
    }

    #[test]
    fn test_last_record_is_kept_per_kind() {
        let gate = ActionGate::new();
        let ok = FakeRunner::answering(CommandResponse {
            ok: true,
            ..Default::default()
        });
        let broken = FakeRunner::failing();

        tokio_test::block_on(gate.execute(&ok, ActionKind::InstallPorts, json!({}))).unwrap();
        tokio_test::block_on(gate.execute(&broken, ActionKind::ConfigureSw, json!({}))).unwrap();
        assert!(gate.last(ActionKind::InstallPorts).unwrap().ok);
        assert!(!gate.last(ActionKind::ConfigureSw).unwrap().ok);

        tokio_test::block_on(gate.execute(&broken, ActionKind::InstallPorts, json!({}))).unwrap();
        assert!(!gate.last(ActionKind::InstallPorts).unwrap().ok);
        assert!(gate.last(ActionKind::CreatePorts).is_none());
    }

    #[test]
    fn test_gate_reports_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let gate = ActionGate::with_callback(Arc::new(move |event: &Event| {
            sink.lock().unwrap().push(event.event_type)
        }));
        let runner = FakeRunner::answering(CommandResponse::default());

        tokio_test::block_on(gate.execute(&runner, ActionKind::ConfigureHost, json!({}))).unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventType::ActionStarted, EventType::ActionFinished]
        );
    }

    #[test]
    fn test_command_response_wire_format() {
        let resp: CommandResponse = serde_json::from_str(
            r#"{"ok":false,"error":"ssh timeout","trace":"Traceback..."}"#,
        )
        .unwrap();
        assert_eq!(resp.log_text(), "ERROR: ssh timeout\nTraceback...");

        let resp: CommandResponse = serde_json::from_str(
            r#"{"ok":true,"results":[{"cmd":"ip link","stdout":"ok","stderr":""}]}"#,
        )
        .unwrap();
        assert_eq!(resp.results[0].cmd, "ip link");
    }

    #[test]
    fn test_endpoint_url() {
        let runner = HttpCommandRunner::new("http://esxi-api:5000/", 0).unwrap();
        assert_eq!(
            runner.endpoint_url(ActionKind::ConfigureHost),
            "http://esxi-api:5000/api/topology/configure_host"
        );
    }
}

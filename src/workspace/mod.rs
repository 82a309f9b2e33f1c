//! The editor context: topology, VM bindings, interaction state and the
//! confirmation gate, with change notification to registered observers.
//!
//! Every accepted structural mutation (add, remove, connect, rename, clear,
//! import) revokes confirmation. Renames and removals fix up the assignment
//! maps and the interaction state in the same call.

use serde::Serialize;
use serde_json::json;

use crate::assignment::{AssignOutcome, NodeAssignment, VmDisplay, VmResolver};
use crate::graph::{GraphStore, TopologyError, TopologyResult};
use crate::interaction::{Effect, InputEvent, InteractionState, Mode};
use crate::interfaces::AdapterPlan;
use crate::models::*;
use crate::serializer::{self, PreparedImport};
use crate::ws::{Event, EventCallback, EventType};

/// Snapshot of the whole editor state
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceView {
    pub region: String,
    pub confirmed: bool,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub mode: Mode,
    pub selection: Option<Selection>,
    pub assignments: Vec<NodeAssignment>,
    pub candidates: Vec<Candidate>,
}

pub struct Workspace {
    graph: GraphStore,
    resolver: VmResolver,
    interaction: InteractionState,
    confirmed: bool,
    observers: Vec<EventCallback>,
}

impl Workspace {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            graph: GraphStore::new(region),
            resolver: VmResolver::new(),
            interaction: InteractionState::new(),
            confirmed: false,
            observers: Vec::new(),
        }
    }

    /// Register an observer for every accepted change
    pub fn subscribe(&mut self, callback: EventCallback) {
        self.observers.push(callback);
    }

    fn emit(&self, event_type: EventType, payload: serde_json::Value) {
        if self.observers.is_empty() {
            return;
        }
        let event = Event::new(event_type, payload);
        for observer in &self.observers {
            observer(&event);
        }
    }

    fn revoke_confirmation(&mut self) {
        if self.confirmed {
            self.confirmed = false;
            tracing::info!("Topology changed, confirmation revoked");
            self.emit(EventType::ConfirmationChanged, json!({ "confirmed": false }));
        }
    }

    fn emit_selection(&self) {
        self.emit(
            EventType::SelectionChanged,
            json!({ "selection": self.interaction.selection() }),
        );
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn resolver(&self) -> &VmResolver {
        &self.resolver
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn region(&self) -> &str {
        self.graph.region()
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn view(&self) -> WorkspaceView {
        WorkspaceView {
            region: self.graph.region().to_string(),
            confirmed: self.confirmed,
            nodes: self.graph.nodes().to_vec(),
            links: self.graph.links().to_vec(),
            mode: self.interaction.mode().clone(),
            selection: self.interaction.selection().cloned(),
            assignments: self.resolver.rows(&self.graph),
            candidates: self.resolver.candidates().to_vec(),
        }
    }

    // ---- graph edits ----

    /// Add a node and select it
    pub fn add_node(&mut self, node_type: NodeType, position: Option<Position>) -> Node {
        let position = position.unwrap_or_else(Position::default_added);
        let node = self.graph.add_node_at(node_type, position).clone();
        self.interaction.select(Some(Selection::Node(node.id.clone())));
        tracing::info!("Added {} node {}", node.node_type, node.id);

        self.emit(EventType::NodeAdded, json!({ "node": node }));
        self.emit_selection();
        self.revoke_confirmation();
        node
    }

    /// Remove a node with its links. Returns false when absent.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let Some((node, links)) = self.graph.remove_node(id) else {
            return false;
        };
        self.after_node_removed(&node, &links);
        true
    }

    fn after_node_removed(&mut self, node: &Node, links: &[Link]) {
        self.resolver.remove_node(&node.id);
        self.interaction.forget_node(&node.id);
        for link in links {
            self.interaction.forget_link(&link.id);
        }
        tracing::info!("Removed node {} and {} links", node.id, links.len());

        let link_ids: Vec<&str> = links.iter().map(|l| l.id.as_str()).collect();
        self.emit(EventType::NodeRemoved, json!({ "id": node.id, "links": link_ids }));
        self.revoke_confirmation();
    }

    /// Remove a link. Returns false when absent.
    pub fn remove_link(&mut self, id: &str) -> bool {
        let Some(link) = self.graph.remove_link(id) else {
            return false;
        };
        self.after_link_removed(&link);
        true
    }

    fn after_link_removed(&mut self, link: &Link) {
        self.interaction.forget_link(&link.id);
        tracing::info!("Removed link {} ({} - {})", link.id, link.a, link.b);
        self.emit(EventType::LinkRemoved, json!({ "id": link.id }));
        self.revoke_confirmation();
    }

    /// Rename a node id, rekeying links, bindings and interaction state.
    /// Returns false for a rename to the current id.
    pub fn rename_node(&mut self, id: &str, new_id: &str) -> TopologyResult<bool> {
        if !self.graph.rename_node(id, new_id)? {
            return Ok(false);
        }
        self.resolver.rename_node(id, new_id);
        self.interaction.rename_node(id, new_id);
        tracing::info!("Renamed node {} to {}", id, new_id);

        self.emit(EventType::NodeRenamed, json!({ "old": id, "new": new_id }));
        self.revoke_confirmation();
        Ok(true)
    }

    /// Connect two nodes; the label defaults to `a-b`
    pub fn connect(&mut self, a: &str, b: &str) -> TopologyResult<Link> {
        let link = self.graph.connect(a, b)?.clone();
        tracing::info!("Connected {} and {} as {}", a, b, link.id);
        self.emit(EventType::LinkAdded, json!({ "link": link }));
        self.revoke_confirmation();
        Ok(link)
    }

    /// Drop every node, link and binding. The region and candidates are kept.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.resolver.clear_assignments();
        self.interaction.reset();
        tracing::info!("Cleared topology");
        self.emit(EventType::TopologyCleared, json!({ "region": self.graph.region() }));
        self.revoke_confirmation();
    }

    pub fn set_node_name(&mut self, id: &str, name: &str) -> TopologyResult<()> {
        self.graph.set_node_name(id, name)?;
        self.emit(EventType::NodeUpdated, json!({ "id": id, "name": name }));
        Ok(())
    }

    pub fn set_node_position(&mut self, id: &str, position: Position) -> TopologyResult<()> {
        self.graph.set_node_position(id, position)?;
        self.emit(EventType::NodeMoved, json!({ "id": id, "position": position }));
        Ok(())
    }

    pub fn set_link_label(&mut self, id: &str, label: &str) -> TopologyResult<()> {
        self.graph.set_link_label(id, label)?;
        self.emit(EventType::LinkUpdated, json!({ "id": id, "label": label }));
        Ok(())
    }

    /// Change the inventory region. Candidates are region scoped and dropped.
    pub fn set_region(&mut self, region: &str) {
        if self.graph.region() == region {
            return;
        }
        tracing::info!("Region changed from '{}' to '{}'", self.graph.region(), region);
        self.graph.set_region(region);
        self.resolver.clear_candidates();
        self.emit(EventType::RegionChanged, json!({ "region": region }));
    }

    // ---- interaction ----

    /// Apply one canvas input event
    pub fn handle_event(&mut self, event: InputEvent) -> TopologyResult<Effect> {
        let selection_before = self.interaction.selection().cloned();
        let effect = self.interaction.handle(event, &mut self.graph)?;

        match &effect {
            Effect::Unchanged | Effect::SelectionChanged => {}
            Effect::ModeChanged => {
                self.emit(EventType::ModeChanged, json!({ "mode": self.interaction.mode() }));
            }
            Effect::Moved { node, position } => {
                self.emit(EventType::NodeMoved, json!({ "id": node, "position": position }));
            }
            Effect::Connected(link) => {
                tracing::info!("Connected {} and {} as {}", link.a, link.b, link.id);
                self.emit(EventType::LinkAdded, json!({ "link": link }));
                self.emit(EventType::ModeChanged, json!({ "mode": self.interaction.mode() }));
                self.revoke_confirmation();
            }
            Effect::NodeRemoved { node, links } => self.after_node_removed(node, links),
            Effect::LinkRemoved(link) => self.after_link_removed(link),
        }

        if self.interaction.selection() != selection_before.as_ref() {
            self.emit_selection();
        }
        Ok(effect)
    }

    // ---- confirmation and candidates ----

    /// Set the confirmation gate. Returns false when already confirmed.
    pub fn confirm(&mut self) -> bool {
        if self.confirmed {
            return false;
        }
        self.confirmed = true;
        tracing::info!(
            "Topology confirmed: {} nodes, {} links in region '{}'",
            self.graph.nodes().len(),
            self.graph.links().len(),
            self.graph.region()
        );
        self.emit(EventType::ConfirmationChanged, json!({ "confirmed": true }));
        true
    }

    /// Replace the candidate list and default-fill unassigned nodes
    pub fn load_candidates(&mut self, candidates: Vec<Candidate>) {
        self.resolver.load_candidates(candidates, &self.graph);
        self.emit(
            EventType::CandidatesLoaded,
            json!({ "region": self.graph.region(), "count": self.resolver.candidates().len() }),
        );
        self.emit(
            EventType::AssignmentChanged,
            json!({ "assignments": self.resolver.rows(&self.graph) }),
        );
    }

    // ---- VM and IP bindings ----

    fn require_node(&self, id: &str) -> TopologyResult<&Node> {
        self.graph
            .node(id)
            .ok_or_else(|| TopologyError::UnknownNode(id.to_string()))
    }

    /// Bind `vm` to a node with swap semantics; empty clears the binding
    pub fn assign(&mut self, node: &str, vm: &str) -> TopologyResult<AssignOutcome> {
        self.require_node(node)?;
        let outcome = self.resolver.assign(node, vm);
        tracing::debug!("Assigned '{}' to {} (was '{}')", vm, node, outcome.previous);
        self.emit(
            EventType::AssignmentChanged,
            json!({ "node": node, "vm": vm, "swapped_with": outcome.swapped_with }),
        );
        Ok(outcome)
    }

    /// Set the operator-entered IP of a host node
    pub fn set_host_ip(&mut self, node: &str, ip: &str) -> TopologyResult<()> {
        if !self.require_node(node)?.node_type.is_host() {
            return Err(TopologyError::NotAHost(node.to_string()));
        }
        self.resolver.set_ip(node, ip);
        self.emit(EventType::AssignmentChanged, json!({ "node": node, "ip": ip }));
        Ok(())
    }

    pub fn options_for(&self, node: &str) -> TopologyResult<Vec<String>> {
        self.require_node(node)?;
        Ok(self.resolver.options_for(node))
    }

    pub fn display_for(&self, node: &str) -> TopologyResult<Option<VmDisplay>> {
        self.require_node(node)?;
        Ok(self.resolver.display_for(node))
    }

    pub fn assignments(&self) -> Vec<NodeAssignment> {
        self.resolver.rows(&self.graph)
    }

    // ---- derived views and documents ----

    pub fn plan(&self) -> AdapterPlan {
        AdapterPlan::compute(&self.graph)
    }

    /// Exported document as pretty JSON text
    pub fn export_json(&self) -> anyhow::Result<String> {
        serializer::export_json(&self.graph, &self.resolver)
    }

    pub fn mapping_report(&self) -> String {
        serializer::mapping_report(&self.graph, &self.resolver)
    }

    /// Replace the topology with a validated document.
    ///
    /// `candidates` is the freshly fetched list for the document's region; it
    /// is loaded before the imported bindings are applied so swaps resolve
    /// against the auto-filled defaults.
    pub fn apply_import(&mut self, prepared: PreparedImport, candidates: Vec<Candidate>) -> ImportReport {
        let PreparedImport { graph, bindings } = prepared;
        self.graph = graph;
        self.interaction.reset();
        self.resolver.clear_assignments();
        self.resolver.load_candidates(candidates, &self.graph);
        let missing_vms = serializer::apply_bindings(&mut self.resolver, &bindings);

        let report = ImportReport {
            nodes: self.graph.nodes().len(),
            links: self.graph.links().len(),
            missing_vms,
        };
        if !report.missing_vms.is_empty() {
            tracing::warn!(
                "Imported VMs not found in region '{}': {}",
                self.graph.region(),
                report.missing_vms.join(", ")
            );
        }
        tracing::info!(
            "Imported topology: {} nodes, {} links, region '{}'",
            report.nodes,
            report.links,
            self.graph.region()
        );

        self.emit(EventType::TopologyImported, json!({ "report": report, "region": self.graph.region() }));
        self.emit_selection();
        self.revoke_confirmation();
        report
    }

    // ---- action payloads ----

    /// Region plus the ordered list of link labels
    pub fn create_ports_request(&self) -> CreatePortsRequest {
        CreatePortsRequest {
            region: self.graph.region().to_string(),
            links: self.plan().link_names,
        }
    }

    /// Region plus nodes enriched with bindings, and links.
    /// Configure payloads also carry each node's type.
    pub fn node_action_request(&self, kind: ActionKind) -> NodeActionRequest {
        let with_type = matches!(kind, ActionKind::ConfigureSw | ActionKind::ConfigureHost);
        NodeActionRequest {
            region: self.graph.region().to_string(),
            nodes: self
                .graph
                .nodes()
                .iter()
                .map(|n| ActionNode {
                    id: n.id.clone(),
                    vm: self.resolver.vm_for(&n.id).to_string(),
                    ip: self.resolver.ip_for(&n.id).to_string(),
                    node_type: with_type.then_some(n.node_type),
                })
                .collect(),
            links: self
                .graph
                .links()
                .iter()
                .map(|l| ActionLink {
                    id: l.id.clone(),
                    a: l.a.clone(),
                    b: l.b.clone(),
                    label: l.label.clone(),
                })
                .collect(),
        }
    }
}

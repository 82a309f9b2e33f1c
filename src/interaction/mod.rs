//! Pointer/keyboard interaction state machine for the topology canvas.
//!
//! Modes are `Idle`, `Dragging` and `Connecting`; selection is tracked
//! independently of the mode. Events are applied one at a time against the
//! graph store and report what changed as an [`Effect`].

use serde::{Deserialize, Serialize};

use crate::graph::{GraphStore, TopologyError, TopologyResult};
use crate::models::{Link, Node, Position, Selection};

/// Keys that trigger deletion of the selected entity
const DELETE_KEYS: &[&str] = &["Delete", "Backspace"];

/// Interaction mode of the canvas
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Mode {
    Idle,
    Dragging {
        node: String,
        /// Pointer position at drag start
        pointer_origin: Position,
        /// Node position at drag start
        node_origin: Position,
    },
    Connecting {
        source: Option<String>,
    },
}

/// Input events delivered by the canvas
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown { node: String, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    NodeClick { node: String },
    LinkClick { link: String },
    CanvasClick,
    StartConnect,
    CancelConnect,
    Key {
        key: String,
        /// Focus is inside an input, textarea, select or editable element
        #[serde(default)]
        text_entry_focused: bool,
    },
    DeleteSelected,
}

/// What an event changed
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Unchanged,
    ModeChanged,
    SelectionChanged,
    Moved { node: String, position: Position },
    Connected(Link),
    NodeRemoved { node: Node, links: Vec<Link> },
    LinkRemoved(Link),
}

impl Effect {
    /// Whether the effect changed graph structure
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Effect::Connected(_) | Effect::NodeRemoved { .. } | Effect::LinkRemoved(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Unchanged => "unchanged",
            Effect::ModeChanged => "mode_changed",
            Effect::SelectionChanged => "selection_changed",
            Effect::Moved { .. } => "moved",
            Effect::Connected(_) => "connected",
            Effect::NodeRemoved { .. } => "node_removed",
            Effect::LinkRemoved(_) => "link_removed",
        }
    }
}

/// Transient interaction state: mode plus selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionState {
    mode: Mode,
    selection: Option<Selection>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionState {
    pub fn new() -> Self {
        Self {
            mode: Mode::Idle,
            selection: None,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self.mode, Mode::Connecting { .. })
    }

    pub fn select(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    /// Apply one input event
    pub fn handle(&mut self, event: InputEvent, graph: &mut GraphStore) -> TopologyResult<Effect> {
        tracing::debug!("Interaction event {:?} in mode {:?}", event, self.mode);
        match event {
            InputEvent::PointerDown { node, x, y } => self.pointer_down(node, Position::new(x, y), graph),
            InputEvent::PointerMove { x, y } => self.pointer_move(Position::new(x, y), graph),
            InputEvent::PointerUp => Ok(self.pointer_up()),
            InputEvent::NodeClick { node } => self.node_click(node, graph),
            InputEvent::LinkClick { link } => self.link_click(link, graph),
            InputEvent::CanvasClick => Ok(self.canvas_click()),
            InputEvent::StartConnect => Ok(self.start_connect()),
            InputEvent::CancelConnect => Ok(self.cancel_connect()),
            InputEvent::Key { key, text_entry_focused } => {
                if text_entry_focused || !DELETE_KEYS.contains(&key.as_str()) {
                    return Ok(Effect::Unchanged);
                }
                Ok(self.delete_selected(graph))
            }
            InputEvent::DeleteSelected => Ok(self.delete_selected(graph)),
        }
    }

    fn pointer_down(&mut self, node: String, pointer: Position, graph: &GraphStore) -> TopologyResult<Effect> {
        let node_origin = graph
            .node(&node)
            .map(|n| n.position)
            .ok_or_else(|| TopologyError::UnknownNode(node.clone()))?;
        if self.is_connecting() {
            return Ok(Effect::Unchanged);
        }
        self.mode = Mode::Dragging {
            node,
            pointer_origin: pointer,
            node_origin,
        };
        Ok(Effect::ModeChanged)
    }

    fn pointer_move(&mut self, pointer: Position, graph: &mut GraphStore) -> TopologyResult<Effect> {
        let Mode::Dragging {
            node,
            pointer_origin,
            node_origin,
        } = &self.mode
        else {
            return Ok(Effect::Unchanged);
        };
        let position = node_origin.offset(pointer.x - pointer_origin.x, pointer.y - pointer_origin.y);
        let node = node.clone();
        graph.set_node_position(&node, position)?;
        Ok(Effect::Moved { node, position })
    }

    fn pointer_up(&mut self) -> Effect {
        if matches!(self.mode, Mode::Dragging { .. }) {
            self.mode = Mode::Idle;
            Effect::ModeChanged
        } else {
            Effect::Unchanged
        }
    }

    fn node_click(&mut self, node: String, graph: &mut GraphStore) -> TopologyResult<Effect> {
        if graph.node(&node).is_none() {
            return Err(TopologyError::UnknownNode(node));
        }
        let source = match &self.mode {
            Mode::Connecting { source } => source.clone(),
            _ => {
                self.selection = Some(Selection::Node(node));
                return Ok(Effect::SelectionChanged);
            }
        };

        match source {
            None => {
                self.mode = Mode::Connecting { source: Some(node) };
                Ok(Effect::ModeChanged)
            }
            Some(source) if source == node => {
                // Second click on the source abandons the pick but stays in connect mode
                self.mode = Mode::Connecting { source: None };
                Ok(Effect::ModeChanged)
            }
            Some(source) => {
                let link = graph.connect(&source, &node)?.clone();
                self.mode = Mode::Idle;
                self.selection = Some(Selection::Link(link.id.clone()));
                Ok(Effect::Connected(link))
            }
        }
    }

    fn link_click(&mut self, link: String, graph: &GraphStore) -> TopologyResult<Effect> {
        if graph.link(&link).is_none() {
            return Err(TopologyError::UnknownLink(link));
        }
        if self.is_connecting() {
            return Ok(Effect::Unchanged);
        }
        self.selection = Some(Selection::Link(link));
        Ok(Effect::SelectionChanged)
    }

    fn canvas_click(&mut self) -> Effect {
        match &mut self.mode {
            Mode::Connecting { source } => {
                if source.take().is_some() {
                    Effect::ModeChanged
                } else {
                    Effect::Unchanged
                }
            }
            _ => {
                if self.selection.take().is_some() {
                    Effect::SelectionChanged
                } else {
                    Effect::Unchanged
                }
            }
        }
    }

    fn start_connect(&mut self) -> Effect {
        self.mode = Mode::Connecting { source: None };
        Effect::ModeChanged
    }

    fn cancel_connect(&mut self) -> Effect {
        if self.is_connecting() {
            self.mode = Mode::Idle;
            Effect::ModeChanged
        } else {
            Effect::Unchanged
        }
    }

    fn delete_selected(&mut self, graph: &mut GraphStore) -> Effect {
        let Some(selection) = self.selection.take() else {
            return Effect::Unchanged;
        };
        let effect = match selection {
            Selection::Node(id) => graph
                .remove_node(&id)
                .map(|(node, links)| Effect::NodeRemoved { node, links }),
            Selection::Link(id) => graph.remove_link(&id).map(Effect::LinkRemoved),
        };
        if let Some(Effect::NodeRemoved { node, .. }) = &effect {
            self.forget_node(&node.id);
        }
        effect.unwrap_or(Effect::SelectionChanged)
    }

    /// Drop every reference to a node that no longer exists
    pub fn forget_node(&mut self, id: &str) {
        if matches!(&self.selection, Some(Selection::Node(n)) if n == id) {
            self.selection = None;
        }
        if matches!(&self.mode, Mode::Dragging { node, .. } if node == id) {
            self.mode = Mode::Idle;
        }
        if let Mode::Connecting { source } = &mut self.mode {
            if source.as_deref() == Some(id) {
                *source = None;
            }
        }
    }

    /// Drop the selection if it points at a link that no longer exists
    pub fn forget_link(&mut self, id: &str) {
        if matches!(&self.selection, Some(Selection::Link(l)) if l == id) {
            self.selection = None;
        }
    }

    /// Follow a node rename in selection, drag and connect state
    pub fn rename_node(&mut self, old: &str, new: &str) {
        if let Some(Selection::Node(n)) = &mut self.selection {
            if n == old {
                *n = new.to_string();
            }
        }
        match &mut self.mode {
            Mode::Dragging { node, .. } if node == old => *node = new.to_string(),
            Mode::Connecting { source: Some(source) } if source == old => *source = new.to_string(),
            _ => {}
        }
    }

    /// Return to idle with nothing selected
    pub fn reset(&mut self) {
        self.mode = Mode::Idle;
        self.selection = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeType;

    fn graph() -> GraphStore {
        let mut graph = GraphStore::new("s05");
        graph.add_node(NodeType::Host);
        graph.add_node(NodeType::Switch);
        graph.add_node(NodeType::Switch);
        graph
    }

    fn click(node: &str) -> InputEvent {
        InputEvent::NodeClick { node: node.into() }
    }

    #[test]
    fn test_drag_moves_by_cumulative_delta() {
        let mut g = graph();
        let mut s = InteractionState::new();
        s.select(Some(Selection::Node("sw2".into())));

        s.handle(InputEvent::PointerDown { node: "h1".into(), x: 10.0, y: 10.0 }, &mut g).unwrap();
        assert!(matches!(s.mode(), Mode::Dragging { node, .. } if node == "h1"));

        s.handle(InputEvent::PointerMove { x: 15.0, y: 30.0 }, &mut g).unwrap();
        let effect = s.handle(InputEvent::PointerMove { x: 20.0, y: 40.0 }, &mut g).unwrap();
        assert_eq!(
            effect,
            Effect::Moved { node: "h1".into(), position: Position::new(310.0, 190.0) }
        );
        assert_eq!(g.node("h1").unwrap().position, Position::new(310.0, 190.0));

        s.handle(InputEvent::PointerUp, &mut g).unwrap();
        assert_eq!(s.mode(), &Mode::Idle);
        // Dragging never touches the selection
        assert_eq!(s.selection(), Some(&Selection::Node("sw2".into())));

        let effect = s.handle(InputEvent::PointerMove { x: 99.0, y: 99.0 }, &mut g).unwrap();
        assert_eq!(effect, Effect::Unchanged);
        assert_eq!(g.node("h1").unwrap().position, Position::new(310.0, 190.0));
    }

    #[test]
    fn test_connect_mode_is_single_shot() {
        let mut g = graph();
        let mut s = InteractionState::new();
        s.select(Some(Selection::Node("h1".into())));

        s.handle(InputEvent::StartConnect, &mut g).unwrap();
        assert_eq!(s.mode(), &Mode::Connecting { source: None });

        s.handle(click("h1"), &mut g).unwrap();
        assert_eq!(s.mode(), &Mode::Connecting { source: Some("h1".into()) });

        let effect = s.handle(click("sw1"), &mut g).unwrap();
        assert!(effect.is_structural());
        match effect {
            Effect::Connected(link) => {
                assert_eq!(link.label, "h1-sw1");
                assert_eq!(s.selection(), Some(&Selection::Link(link.id)));
            }
            other => panic!("unexpected effect {:?}", other),
        }
        assert_eq!(s.mode(), &Mode::Idle);
        assert_eq!(g.links().len(), 1);
    }

    #[test]
    fn test_same_node_twice_cancels_pick_only() {
        let mut g = graph();
        let mut s = InteractionState::new();
        s.handle(InputEvent::StartConnect, &mut g).unwrap();
        s.handle(click("sw1"), &mut g).unwrap();
        s.handle(click("sw1"), &mut g).unwrap();
        assert_eq!(s.mode(), &Mode::Connecting { source: None });
        assert!(g.links().is_empty());
    }

    #[test]
    fn test_cancel_connect_clears_source() {
        let mut g = graph();
        let mut s = InteractionState::new();
        s.handle(InputEvent::StartConnect, &mut g).unwrap();
        s.handle(click("sw1"), &mut g).unwrap();
        s.handle(InputEvent::CancelConnect, &mut g).unwrap();
        assert_eq!(s.mode(), &Mode::Idle);
        assert_eq!(s.handle(InputEvent::CancelConnect, &mut g).unwrap(), Effect::Unchanged);
    }

    #[test]
    fn test_canvas_click_semantics() {
        let mut g = graph();
        let mut s = InteractionState::new();

        s.handle(click("h1"), &mut g).unwrap();
        assert_eq!(s.selection(), Some(&Selection::Node("h1".into())));
        s.handle(InputEvent::CanvasClick, &mut g).unwrap();
        assert_eq!(s.selection(), None);

        s.handle(click("h1"), &mut g).unwrap();
        s.handle(InputEvent::StartConnect, &mut g).unwrap();
        s.handle(click("sw1"), &mut g).unwrap();
        s.handle(InputEvent::CanvasClick, &mut g).unwrap();
        assert_eq!(s.mode(), &Mode::Connecting { source: None });
        assert_eq!(s.selection(), Some(&Selection::Node("h1".into())));
    }

    #[test]
    fn test_link_click_selects_unless_connecting() {
        let mut g = graph();
        g.connect("h1", "sw1").unwrap();
        let mut s = InteractionState::new();

        s.handle(InputEvent::LinkClick { link: "l1".into() }, &mut g).unwrap();
        assert_eq!(s.selection(), Some(&Selection::Link("l1".into())));

        s.handle(InputEvent::CanvasClick, &mut g).unwrap();
        s.handle(InputEvent::StartConnect, &mut g).unwrap();
        let effect = s.handle(InputEvent::LinkClick { link: "l1".into() }, &mut g).unwrap();
        assert_eq!(effect, Effect::Unchanged);
        assert_eq!(s.selection(), None);
    }

    #[test]
    fn test_pointer_down_ignored_while_connecting() {
        let mut g = graph();
        let mut s = InteractionState::new();
        s.handle(InputEvent::StartConnect, &mut g).unwrap();
        s.handle(InputEvent::PointerDown { node: "h1".into(), x: 0.0, y: 0.0 }, &mut g).unwrap();
        assert_eq!(s.mode(), &Mode::Connecting { source: None });
    }

    #[test]
    fn test_delete_key_suppressed_in_text_entry() {
        let mut g = graph();
        let mut s = InteractionState::new();
        s.handle(click("sw1"), &mut g).unwrap();

        let typed = InputEvent::Key { key: "Backspace".into(), text_entry_focused: true };
        assert_eq!(s.handle(typed, &mut g).unwrap(), Effect::Unchanged);
        assert!(g.node("sw1").is_some());

        let other = InputEvent::Key { key: "a".into(), text_entry_focused: false };
        assert_eq!(s.handle(other, &mut g).unwrap(), Effect::Unchanged);

        let delete = InputEvent::Key { key: "Delete".into(), text_entry_focused: false };
        assert!(s.handle(delete, &mut g).unwrap().is_structural());
        assert!(g.node("sw1").is_none());
        assert_eq!(s.selection(), None);
    }

    #[test]
    fn test_delete_selected_node_cascades() {
        let mut g = graph();
        g.connect("h1", "sw1").unwrap();
        g.connect("sw1", "sw2").unwrap();
        g.connect("h1", "sw2").unwrap();
        let mut s = InteractionState::new();
        s.handle(click("sw1"), &mut g).unwrap();

        match s.handle(InputEvent::DeleteSelected, &mut g).unwrap() {
            Effect::NodeRemoved { node, links } => {
                assert_eq!(node.id, "sw1");
                assert_eq!(links.len(), 2);
            }
            other => panic!("unexpected effect {:?}", other),
        }
        assert_eq!(g.links().len(), 1);
        assert_eq!(s.handle(InputEvent::DeleteSelected, &mut g).unwrap(), Effect::Unchanged);
    }

    #[test]
    fn test_delete_selected_link() {
        let mut g = graph();
        g.connect("h1", "sw1").unwrap();
        let mut s = InteractionState::new();
        s.handle(InputEvent::LinkClick { link: "l1".into() }, &mut g).unwrap();
        assert!(matches!(s.handle(InputEvent::DeleteSelected, &mut g).unwrap(), Effect::LinkRemoved(_)));
        assert!(g.links().is_empty());
        assert_eq!(g.nodes().len(), 3);
    }

    #[test]
    fn test_unknown_entities_are_rejected() {
        let mut g = graph();
        let mut s = InteractionState::new();
        assert_eq!(
            s.handle(click("ghost"), &mut g).unwrap_err(),
            TopologyError::UnknownNode("ghost".into())
        );
        assert_eq!(
            s.handle(InputEvent::LinkClick { link: "l9".into() }, &mut g).unwrap_err(),
            TopologyError::UnknownLink("l9".into())
        );
    }

    #[test]
    fn test_rename_and_forget_follow_references() {
        let mut s = InteractionState::new();
        s.select(Some(Selection::Node("h1".into())));
        s.mode = Mode::Connecting { source: Some("h1".into()) };
        s.rename_node("h1", "web");
        assert_eq!(s.selection(), Some(&Selection::Node("web".into())));
        assert_eq!(s.mode(), &Mode::Connecting { source: Some("web".into()) });

        s.forget_node("web");
        assert_eq!(s.selection(), None);
        assert_eq!(s.mode(), &Mode::Connecting { source: None });
    }

    #[test]
    fn test_input_event_wire_format() {
        let event: InputEvent =
            serde_json::from_str(r#"{"event":"pointer_down","node":"h1","x":1.5,"y":2}"#).unwrap();
        assert_eq!(event, InputEvent::PointerDown { node: "h1".into(), x: 1.5, y: 2.0 });
        let event: InputEvent = serde_json::from_str(r#"{"event":"key","key":"Delete"}"#).unwrap();
        assert_eq!(event, InputEvent::Key { key: "Delete".into(), text_entry_focused: false });
    }
}

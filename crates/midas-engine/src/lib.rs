//! Midas dispatch engine.
//!
//! An [`Engine`] routes each incoming [`MidiEvent`] through a shared
//! [`NodeGraph`]: `midi.input` nodes start a flow, `logic.mapper` nodes
//! rewrite the value, and `action.*` nodes perform side effects through a
//! [`SystemOps`] seam. Traversal is depth-first, guarded against cycles by a
//! per-call visited set, and every hop re-checks the node's device and
//! profile filter.
//!
//! The engine is single-threaded; [`Dispatcher`] runs one on a dedicated
//! thread and feeds it through a channel.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
    time::Duration,
};

use midas_graph::{ACTION_PREFIX, LOGIC_MAPPER, MIDI_INPUT, Node, NodeConfig, NodeGraph};
use midas_midi::{ControlProfile, ControlProfileStore, MidiEvent};
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

pub mod actions;
pub mod audio;
mod dispatcher;
mod display;
mod error;
mod mapper;
mod script_cache;
pub mod system;

pub use actions::{Action, ActionContext, ActionRegistry, default_actions};
pub use dispatcher::Dispatcher;
pub use display::{DisplayState, DisplayUpdate};
pub use error::{Error, Result};
pub use mapper::{apply_mapper, map_value};
pub use script_cache::ScriptCache;
pub use system::{ProcessSpec, RealSystem, SystemOps};

use display::DisplayTracker;

/// Graph shared between the editor side and the engine. The engine only
/// holds the lock long enough to copy it.
pub type SharedGraph = Arc<RwLock<NodeGraph>>;
/// Profile store shared between the editor side and the engine.
pub type SharedProfiles = Arc<RwLock<ControlProfileStore>>;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Id exposed to actions (e.g. `MIDAS_WORKSPACE_ID`).
    pub workspace_id: String,
    /// Limit for blocking external calls (volume, shortcuts).
    pub external_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_id: "default".to_string(),
            external_timeout: Duration::from_secs(2),
        }
    }
}

/// Routes events through the graph.
pub struct Engine {
    graph: SharedGraph,
    profiles: SharedProfiles,
    config: EngineConfig,
    actions: ActionRegistry,
    display: DisplayTracker,
}

impl Engine {
    /// Engine over `graph` and `profiles` with the built-in actions.
    pub fn new(
        graph: SharedGraph,
        profiles: SharedProfiles,
        config: EngineConfig,
        system: Arc<dyn SystemOps>,
    ) -> Self {
        let actions = default_actions(system, config.external_timeout);
        Self {
            graph,
            profiles,
            config,
            actions,
            display: DisplayTracker::default(),
        }
    }

    /// Install `action` for nodes of `node_type`, replacing any existing one.
    pub fn register_action(&mut self, node_type: impl Into<String>, action: Box<dyn Action>) {
        self.actions.insert(node_type.into(), action);
    }

    /// Send display changes of triggered roots to `sender`; `None` stops them.
    pub fn set_display_sender(&mut self, sender: Option<UnboundedSender<DisplayUpdate>>) {
        self.display.set_sender(sender);
    }

    /// Graph this engine reads.
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Profile store this engine reads.
    pub fn profiles(&self) -> &SharedProfiles {
        &self.profiles
    }

    /// Engine settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatch one event and return the ids of the root nodes it triggered,
    /// in graph order.
    ///
    /// Accepting `midi.input` nodes are the roots. When none accepts, every
    /// accepting node without incoming connections is tried instead. Action
    /// failures are logged and never abort the dispatch.
    ///
    /// The graph and profiles are copied under their read locks, which are
    /// released before any action runs, so editors are never blocked by a
    /// slow mixer or shortcut call.
    pub fn handle_event(&mut self, event: &MidiEvent) -> Vec<String> {
        let graph = {
            let shared = self.graph.read();
            if shared.is_empty() {
                return Vec::new();
            }
            shared.clone()
        };
        let profiles = self.profiles.read().clone();

        let mut dispatch = Dispatch {
            graph: &graph,
            profiles: &profiles,
            matching: profiles.matching(event),
            actions: &mut self.actions,
            workspace_id: &self.config.workspace_id,
            visited: HashSet::new(),
        };

        let mut roots = Vec::new();
        for node in graph.nodes().iter().filter(|n| n.node_type == MIDI_INPUT) {
            if dispatch.accepts(node, event) {
                roots.push(node.id.clone());
                dispatch.traverse(node, event);
            }
        }

        if roots.is_empty() {
            for node in graph.nodes() {
                if graph.has_no_incoming(&node.id) && dispatch.accepts(node, event) {
                    roots.push(node.id.clone());
                    dispatch.traverse(node, event);
                }
            }
        }

        if roots.is_empty() {
            debug!(message_type = %event.message_type, "no node accepted the event");
        }
        for id in &roots {
            self.display.observe(id, event);
        }
        roots
    }
}

/// (node id, channel, control, note, value): one visit per node and payload.
type Signature = (String, Option<i32>, Option<i32>, Option<i32>, Option<i32>);

/// State of a single `handle_event` call.
struct Dispatch<'a> {
    graph: &'a NodeGraph,
    profiles: &'a ControlProfileStore,
    /// Profiles matching the event being dispatched, computed once.
    matching: BTreeMap<&'a str, &'a ControlProfile>,
    actions: &'a mut ActionRegistry,
    workspace_id: &'a str,
    visited: HashSet<Signature>,
}

impl<'a> Dispatch<'a> {
    /// True when `event` passes `node`'s device and profile filter.
    fn accepts(&self, node: &Node, event: &MidiEvent) -> bool {
        let filter = node.filter();
        if !filter.device_ports.is_empty()
            && !filter.device_ports.iter().any(|port| event.comes_from(port))
        {
            trace!(node = %node.id, "event source not in device ports");
            return false;
        }
        if let Some(profile_id) = &filter.profile_id {
            let profile = self
                .matching
                .get(profile_id.as_str())
                .copied()
                .or_else(|| self.profiles.get(profile_id));
            if !profile.is_some_and(|p| p.matches(event)) {
                trace!(node = %node.id, profile = %profile_id, "event does not match profile");
                return false;
            }
        }
        true
    }

    /// Depth-first walk from `root`. Children are pushed in reverse so they
    /// are visited in connection order.
    fn traverse(&mut self, root: &'a Node, event: &MidiEvent) {
        let mut stack = vec![(root, event.clone())];
        while let Some((node, event)) = stack.pop() {
            let signature = (
                node.id.clone(),
                event.channel,
                event.control,
                event.note,
                event.value,
            );
            if !self.visited.insert(signature) {
                trace!(node = %node.id, "already visited with this payload");
                continue;
            }
            trace!(node = %node.id, node_type = %node.node_type, "visiting");

            let output = match node.node_type.as_str() {
                MIDI_INPUT => Some(("message", event)),
                LOGIC_MAPPER => {
                    let mapped = match node.config() {
                        NodeConfig::Mapper(config) => apply_mapper(config, &event),
                        _ => event,
                    };
                    Some(("out", mapped))
                }
                t if t.starts_with(ACTION_PREFIX) => {
                    self.run_action(node, &event);
                    None
                }
                other => {
                    debug!(node = %node.id, node_type = other, "no processor for node type");
                    None
                }
            };

            let Some((port, out)) = output else {
                continue;
            };
            let graph = self.graph;
            let targets: Vec<&'a Node> = graph
                .connections_from(&node.id, Some(port))
                .filter_map(move |c| graph.node(&c.target_node))
                .filter(|target| self.accepts(target, &out))
                .collect();
            for target in targets.into_iter().rev() {
                stack.push((target, out.clone()));
            }
        }
    }

    fn run_action(&mut self, node: &Node, event: &MidiEvent) {
        let Some(action) = self.actions.get_mut(node.node_type.as_str()) else {
            debug!(node = %node.id, node_type = %node.node_type, "no action registered");
            return;
        };
        let ctx = ActionContext {
            workspace_id: self.workspace_id,
            graph: self.graph,
        };
        if let Err(err) = action.handle(event, node, &ctx) {
            warn!(node = %node.id, node_type = %node.node_type, error = %err, "action failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use midas_graph::{ACTION_COMMAND, ConfigMap, NodePort, template};
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::system::MockSystem;

    /// Records (node id, event value) for each call.
    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(String, Option<i32>)>>>);

    impl Action for Recorder {
        fn handle(&mut self, event: &MidiEvent, node: &Node, _: &ActionContext<'_>) -> Result<()> {
            self.0.lock().push((node.id.clone(), event.value));
            Ok(())
        }
    }

    fn engine(graph: NodeGraph) -> (Engine, Recorder) {
        let mut engine = Engine::new(
            Arc::new(RwLock::new(graph)),
            Arc::new(RwLock::new(ControlProfileStore::new())),
            EngineConfig::default(),
            Arc::new(MockSystem::new()),
        );
        let rec = Recorder::default();
        engine.register_action(ACTION_COMMAND, Box::new(rec.clone()));
        (engine, rec)
    }

    fn add(graph: &mut NodeGraph, node_type: &str, id: &str) {
        graph.add_node(template(node_type).unwrap().instantiate(id));
    }

    #[test]
    fn empty_graph_does_nothing() {
        let (mut e, rec) = engine(NodeGraph::new());
        assert!(e.handle_event(&MidiEvent::note_on(0, 1, 1)).is_empty());
        assert!(rec.0.lock().is_empty());
    }

    #[test]
    fn children_run_in_connection_order() {
        let mut g = NodeGraph::new();
        add(&mut g, MIDI_INPUT, "in");
        add(&mut g, LOGIC_MAPPER, "map");
        add(&mut g, ACTION_COMMAND, "a");
        add(&mut g, ACTION_COMMAND, "b");
        g.node_mut("map")
            .unwrap()
            .set_config_value("output_max", json!(10));
        assert!(g.connect("in", "message", "a", "trigger"));
        assert!(g.connect("in", "message", "map", "in"));
        assert!(g.connect("map", "out", "b", "trigger"));

        let (mut e, rec) = engine(g);
        let roots = e.handle_event(&MidiEvent::control_change(0, 1, 127));
        assert_eq!(roots, vec!["in"]);
        assert_eq!(
            *rec.0.lock(),
            vec![("a".to_string(), Some(127)), ("b".to_string(), Some(10))]
        );
    }

    #[test]
    fn unknown_types_are_inert() {
        let mut g = NodeGraph::new();
        g.add_node(Node::new(
            "odd",
            "logic.gate",
            "Gate",
            vec![NodePort::input("in", "midi")],
            vec![NodePort::output("out", "midi")],
            ConfigMap::new(),
        ));
        add(&mut g, ACTION_COMMAND, "a");
        assert!(g.connect("odd", "out", "a", "trigger"));
        let (mut e, rec) = engine(g);
        // The gate is a fallback root but forwards nothing.
        assert_eq!(e.handle_event(&MidiEvent::note_on(0, 1, 1)), vec!["odd"]);
        assert!(rec.0.lock().is_empty());
    }

    /// Tries to edit the shared graph while running.
    struct Editor {
        graph: SharedGraph,
        wrote: Arc<Mutex<bool>>,
    }

    impl Action for Editor {
        fn handle(&mut self, _: &MidiEvent, _: &Node, _: &ActionContext<'_>) -> Result<()> {
            let mut graph = self
                .graph
                .try_write()
                .ok_or_else(|| Error::Msg("graph locked during dispatch".into()))?;
            graph.remove_node("a");
            *self.wrote.lock() = true;
            Ok(())
        }
    }

    #[test]
    fn actions_run_without_holding_the_graph_lock() {
        let mut g = NodeGraph::new();
        add(&mut g, MIDI_INPUT, "in");
        add(&mut g, ACTION_COMMAND, "a");
        assert!(g.connect("in", "message", "a", "trigger"));
        let (mut e, _) = engine(g);
        let wrote = Arc::new(Mutex::new(false));
        e.register_action(
            ACTION_COMMAND,
            Box::new(Editor {
                graph: Arc::clone(e.graph()),
                wrote: Arc::clone(&wrote),
            }),
        );
        assert_eq!(e.handle_event(&MidiEvent::note_on(0, 1, 1)), vec!["in"]);
        assert!(*wrote.lock());
        assert!(e.graph().read().node("a").is_none());
    }
}

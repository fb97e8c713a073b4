use std::{sync::Arc, time::Duration};

use midas_graph::{Node, NodeConfig};
use midas_midi::{MessageType, MidiEvent};
use tracing::{info, warn};

use super::{Action, ActionContext, WarnOnce};
use crate::{
    Result,
    system::{ProcessSpec, SystemOps},
};

/// Key simulator.
const XDOTOOL: &str = "xdotool";

/// `action.shortcut`: presses a key sequence through xdotool.
pub struct ShortcutAction {
    system: Arc<dyn SystemOps>,
    timeout: Duration,
    /// Probed on first use.
    available: Option<bool>,
    warned: WarnOnce,
}

impl ShortcutAction {
    /// New action running xdotool through `system`.
    pub fn new(system: Arc<dyn SystemOps>, timeout: Duration) -> Self {
        Self {
            system,
            timeout,
            available: None,
            warned: WarnOnce::default(),
        }
    }
}

/// Button releases and zero-velocity presses do not fire.
fn should_fire(event: &MidiEvent, on_note_off: bool) -> bool {
    match event.message_type {
        MessageType::NoteOff if !on_note_off => return false,
        MessageType::NoteOn => {
            if event.velocity.or(event.value).is_some_and(|v| v <= 0) {
                return false;
            }
        }
        _ => {}
    }
    event.value != Some(0)
}

impl Action for ShortcutAction {
    fn handle(&mut self, event: &MidiEvent, node: &Node, _ctx: &ActionContext<'_>) -> Result<()> {
        let NodeConfig::Shortcut(config) = node.config() else {
            return Ok(());
        };
        if !should_fire(event, config.trigger_on_note_off) {
            return Ok(());
        }

        let empty_key = format!("empty:{}", node.id);
        if config.sequence.is_empty() {
            if self.warned.first(&empty_key) {
                warn!(node = %node.id, title = %node.title, "shortcut node has no sequence configured");
            }
            return Ok(());
        }
        self.warned.clear(&empty_key);

        let system = &self.system;
        if !*self.available.get_or_insert_with(|| system.which(XDOTOOL)) {
            if self.warned.first(XDOTOOL) {
                warn!("xdotool is not installed; keyboard shortcuts cannot be sent");
            }
            return Ok(());
        }

        info!(node = %node.id, sequence = %config.sequence, "sending shortcut");
        let spec = ProcessSpec::new(XDOTOOL).arg("key").arg(config.sequence.as_str());
        self.system.run(&spec, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use midas_graph::{ACTION_SHORTCUT, NodeGraph, template};
    use serde_json::json;

    use super::*;
    use crate::system::MockSystem;

    fn node(sequence: &str, on_off: bool) -> Node {
        let mut n = template(ACTION_SHORTCUT).unwrap().instantiate("keys");
        n.set_config_value("sequence", json!(sequence));
        n.set_config_value("trigger_on_note_off", json!(on_off));
        n
    }

    fn fire(action: &mut ShortcutAction, node: &Node, event: &MidiEvent) {
        let graph = NodeGraph::new();
        let ctx = ActionContext {
            workspace_id: "ws",
            graph: &graph,
        };
        action.handle(event, node, &ctx).unwrap();
    }

    #[test]
    fn fires_on_press_only() {
        let mock = MockSystem::with_programs(&[XDOTOOL]);
        let mut action = ShortcutAction::new(Arc::new(mock.clone()), Duration::from_secs(1));
        let n = node("  ctrl+z ", false);
        fire(&mut action, &n, &MidiEvent::note_on(0, 60, 100));
        fire(&mut action, &n, &MidiEvent::note_on(0, 60, 0));
        fire(&mut action, &n, &MidiEvent::note_off(0, 60, 64));
        fire(&mut action, &n, &MidiEvent::control_change(0, 1, 0));
        fire(&mut action, &n, &MidiEvent::control_change(0, 1, 127));
        assert_eq!(
            mock.command_lines(),
            vec!["xdotool key ctrl+z", "xdotool key ctrl+z"]
        );
    }

    #[test]
    fn note_off_opt_in() {
        let mock = MockSystem::with_programs(&[XDOTOOL]);
        let mut action = ShortcutAction::new(Arc::new(mock.clone()), Duration::from_secs(1));
        fire(&mut action, &node("space", true), &MidiEvent::note_off(0, 60, 64));
        assert_eq!(mock.command_lines(), vec!["xdotool key space"]);
    }

    #[test]
    fn missing_tool_or_sequence_is_noop() {
        let mock = MockSystem::new();
        let mut action = ShortcutAction::new(Arc::new(mock.clone()), Duration::from_secs(1));
        fire(&mut action, &node("", false), &MidiEvent::note_on(0, 60, 100));
        fire(&mut action, &node("a", false), &MidiEvent::note_on(0, 60, 100));
        fire(&mut action, &node("a", false), &MidiEvent::note_on(0, 60, 100));
        assert!(mock.calls().is_empty());
        assert_eq!(mock.which_queries(), vec![XDOTOOL]);
    }
}

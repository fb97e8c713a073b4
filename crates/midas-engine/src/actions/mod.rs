//! Side-effecting behaviour of `action.*` nodes.
//!
//! Each action type is one [`Action`] instance per engine, shared by every node
//! of that type; per-instance state (debounce, warnings) therefore spans nodes.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use midas_graph::{
    ACTION_COMMAND, ACTION_SCRIPT, ACTION_SHORTCUT, ACTION_SOUND, ACTION_VOLUME, Node, NodeGraph,
};
use midas_midi::MidiEvent;

use crate::{Result, system::SystemOps};

mod command;
mod script;
mod shortcut;
mod sound;
mod volume;

pub use command::{CommandAction, split_command_line};
pub use script::ScriptAction;
pub use shortcut::ShortcutAction;
pub use sound::SoundAction;
pub use volume::{VolumeAction, VolumeBackend};

/// What an action can see besides the event and its own node.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    /// Id of the running workspace.
    pub workspace_id: &'a str,
    /// Graph being dispatched.
    pub graph: &'a NodeGraph,
}

/// Behaviour of one action node type.
pub trait Action: Send {
    /// React to `event` arriving at `node`. Errors are logged by the engine
    /// against the node and never stop a dispatch.
    fn handle(&mut self, event: &MidiEvent, node: &Node, ctx: &ActionContext<'_>) -> Result<()>;
}

/// Action registry keyed by node type.
pub type ActionRegistry = HashMap<String, Box<dyn Action>>;

/// The built-in actions, all talking to `system`. Blocking calls give up after
/// `timeout`.
pub fn default_actions(system: Arc<dyn SystemOps>, timeout: Duration) -> ActionRegistry {
    let mut registry: ActionRegistry = HashMap::new();
    registry.insert(
        ACTION_VOLUME.to_string(),
        Box::new(VolumeAction::new(system.clone(), timeout)),
    );
    registry.insert(ACTION_SCRIPT.to_string(), Box::new(ScriptAction::new()));
    registry.insert(
        ACTION_COMMAND.to_string(),
        Box::new(CommandAction::new(system.clone())),
    );
    registry.insert(
        ACTION_SHORTCUT.to_string(),
        Box::new(ShortcutAction::new(system.clone(), timeout)),
    );
    registry.insert(ACTION_SOUND.to_string(), Box::new(SoundAction::new(system)));
    registry
}

/// Suppresses control changes whose value repeats the last one seen for the
/// same controller.
#[derive(Debug, Default)]
pub struct ValueDebounce {
    last: HashMap<i32, i32>,
}

impl ValueDebounce {
    /// Controller key used when an event carries no controller number.
    const NO_CONTROL: i32 = -1;

    /// True when `event` carries news. An event without a value counts as a
    /// repeat of a controller never seen before.
    pub fn changed(&mut self, event: &MidiEvent) -> bool {
        let key = event.control.unwrap_or(Self::NO_CONTROL);
        if self.last.get(&key).copied() == event.value {
            return false;
        }
        if let Some(v) = event.value {
            self.last.insert(key, v);
        }
        true
    }
}

/// Tracks which warnings were already logged.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: HashSet<String>,
}

impl WarnOnce {
    /// True the first time `key` is seen (until it is cleared).
    pub fn first(&mut self, key: &str) -> bool {
        self.seen.insert(key.to_string())
    }

    /// Allow `key` to warn again.
    pub fn clear(&mut self, key: &str) {
        self.seen.remove(key);
    }
}

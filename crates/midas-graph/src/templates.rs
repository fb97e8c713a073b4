//! Built-in node templates: one per node type the engine knows how to run.

use std::sync::LazyLock;

use serde_json::{Value, json};

use crate::{
    config::ConfigMap,
    node::{
        ACTION_COMMAND, ACTION_SCRIPT, ACTION_SHORTCUT, ACTION_SOUND, ACTION_VOLUME, LOGIC_MAPPER,
        MIDI_INPUT, Node, NodePort,
    },
};

/// Data type carried between MIDI-aware ports.
const MIDI: &str = "midi";

/// Describes how to instantiate a node of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTemplate {
    /// Type tag.
    pub node_type: &'static str,
    /// Default title.
    pub title: &'static str,
    /// Palette category.
    pub category: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Input ports as (name, data type).
    pub inputs: &'static [(&'static str, &'static str)],
    /// Output ports as (name, data type).
    pub outputs: &'static [(&'static str, &'static str)],
    /// Initial configuration.
    pub default_config: ConfigMap,
}

impl NodeTemplate {
    /// A fresh node of this type.
    pub fn instantiate(&self, id: impl Into<String>) -> Node {
        Node::new(
            id,
            self.node_type,
            self.title,
            self.inputs
                .iter()
                .map(|(name, ty)| NodePort::input(name, ty))
                .collect(),
            self.outputs
                .iter()
                .map(|(name, ty)| NodePort::output(name, ty))
                .collect(),
            self.default_config.clone(),
        )
    }
}

/// Unwrap a `json!` object literal.
fn object(v: Value) -> ConfigMap {
    match v {
        Value::Object(map) => map,
        _ => ConfigMap::new(),
    }
}

/// Registry, in palette order.
static TEMPLATES: LazyLock<Vec<NodeTemplate>> = LazyLock::new(|| {
    vec![
        NodeTemplate {
            node_type: MIDI_INPUT,
            title: "MIDI Input",
            category: "Input",
            description: "Starts a flow when MIDI messages arrive from a selected device.",
            inputs: &[],
            outputs: &[("message", MIDI)],
            default_config: ConfigMap::new(),
        },
        NodeTemplate {
            node_type: LOGIC_MAPPER,
            title: "Value Mapper",
            category: "Processing",
            description: "Transforms MIDI values (map CC ranges, scale velocities).",
            inputs: &[("in", MIDI)],
            outputs: &[("out", MIDI)],
            default_config: object(json!({
                "input_min": 0,
                "input_max": 127,
                "output_min": 0,
                "output_max": 127,
                "curve": "linear",
            })),
        },
        NodeTemplate {
            node_type: ACTION_VOLUME,
            title: "Volume Control",
            category: "Action",
            description: "Adjusts the PipeWire or PulseAudio volume from MIDI values.",
            inputs: &[("in", MIDI)],
            outputs: &[],
            default_config: object(json!({
                "input_min": 0,
                "input_max": 127,
                "output_min": 0.0,
                "output_max": 1.0,
                "sink": "",
            })),
        },
        NodeTemplate {
            node_type: ACTION_SCRIPT,
            title: "Script Action",
            category: "Action",
            description: "Runs a Rhai snippet when triggered.",
            inputs: &[("trigger", MIDI)],
            outputs: &[],
            default_config: object(json!({"script": "// write a Rhai script here\n"})),
        },
        NodeTemplate {
            node_type: ACTION_COMMAND,
            title: "Command Runner",
            category: "Action",
            description: "Executes shell commands or external applications.",
            inputs: &[("trigger", MIDI)],
            outputs: &[],
            default_config: object(json!({"command": "", "shell": false, "cwd": ""})),
        },
        NodeTemplate {
            node_type: ACTION_SHORTCUT,
            title: "Keyboard Shortcut",
            category: "Action",
            description: "Sends a key sequence through xdotool.",
            inputs: &[("trigger", MIDI)],
            outputs: &[],
            default_config: object(json!({"sequence": ""})),
        },
        NodeTemplate {
            node_type: ACTION_SOUND,
            title: "Play Sound",
            category: "Action",
            description: "Plays an audio file through a command-line player.",
            inputs: &[("trigger", MIDI)],
            outputs: &[],
            default_config: object(json!({"file": "", "volume": 1.0})),
        },
    ]
});

/// All templates, in palette order.
pub fn templates() -> &'static [NodeTemplate] {
    &TEMPLATES
}

/// Template for `node_type`.
pub fn template(node_type: &str) -> Option<&'static NodeTemplate> {
    TEMPLATES.iter().find(|t| t.node_type == node_type)
}

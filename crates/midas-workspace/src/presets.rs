//! Built-in starter workspaces.

use midas_graph::{
    ACTION_COMMAND, ACTION_VOLUME, LOGIC_MAPPER, MIDI_INPUT, Node, NodeGraph, template,
};
use serde_json::{Value, json};
use tracing::warn;

use crate::{WorkspaceDocument, export_graph};

/// A named starter workspace.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    /// Stable id (`default-mixer`).
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-line summary.
    pub description: &'static str,
    build: fn() -> NodeGraph,
}

impl Preset {
    /// The preset's graph.
    pub fn graph(&self) -> NodeGraph {
        (self.build)()
    }

    /// The preset as a document ready to save or import.
    pub fn document(&self) -> WorkspaceDocument {
        export_graph(&self.graph())
    }
}

static PRESETS: [Preset; 1] = [Preset {
    id: "default-mixer",
    name: "Mixer Controller",
    description: "Map a MIDI fader to system volume and trigger a brush-size command.",
    build: mixer_controller,
}];

/// All built-in presets.
pub fn presets() -> &'static [Preset] {
    &PRESETS
}

/// Preset with `id`.
pub fn preset(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

fn place(
    node_type: &str,
    id: &str,
    title: &str,
    position: (f64, f64),
    config: Value,
) -> Option<Node> {
    let mut node = template(node_type)?.instantiate(id);
    node.title = title.to_string();
    node.position = position;
    if let Value::Object(map) = config {
        node.merge_config(&map);
    }
    Some(node)
}

fn mixer_controller() -> NodeGraph {
    let mut graph = NodeGraph::new();
    let nodes = [
        place(MIDI_INPUT, "input_1", "MIDI Input", (-300.0, -60.0), json!({})),
        place(
            LOGIC_MAPPER,
            "mapper_1",
            "Brush Mapper",
            (-20.0, -60.0),
            json!({
                "input_min": 0,
                "input_max": 127,
                "output_min": 0,
                "output_max": 100,
                "curve": "linear",
            }),
        ),
        place(
            ACTION_VOLUME,
            "volume_action",
            "System Volume",
            (280.0, -140.0),
            json!({"input_min": 0, "input_max": 127, "output_min": 0.0, "output_max": 1.0}),
        ),
        place(
            ACTION_COMMAND,
            "command_action",
            "Brush Size Script",
            (280.0, 40.0),
            json!({"command": "xdotool key shift+bracketright", "shell": false}),
        ),
    ];
    for node in nodes.into_iter().flatten() {
        graph.add_node(node);
    }
    let edges = [
        ("input_1", "message", "mapper_1", "in"),
        ("mapper_1", "out", "volume_action", "in"),
        ("mapper_1", "out", "command_action", "trigger"),
    ];
    for (source, source_port, target, target_port) in edges {
        if !graph.connect(source, source_port, target, target_port) {
            warn!(source, target, "preset edge rejected");
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixer_preset_shape() {
        let preset = preset("default-mixer").unwrap();
        assert_eq!(preset.name, "Mixer Controller");
        let doc = preset.document();
        let ids: Vec<_> = doc.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["input_1", "mapper_1", "volume_action", "command_action"]
        );
        assert_eq!(doc.connections.len(), 3);
        assert_eq!(doc.nodes[2].position, Some((280.0, -140.0)));
        assert_eq!(doc.nodes[1].config["output_max"], json!(100));
    }

    #[test]
    fn unknown_preset() {
        assert!(preset("nope").is_none());
        assert_eq!(presets().len(), 1);
    }
}

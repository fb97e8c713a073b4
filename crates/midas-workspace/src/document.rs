//! The JSON workspace document and its conversion to and from live state.

use std::{fs, path::Path};

use midas_graph::{ConfigMap, NodeGraph, NodeGroup, template};
use midas_midi::{ControlProfileStore, DeviceRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{Error, Result};

/// Document version written by this crate.
pub const VERSION: u32 = 1;

fn default_version() -> u32 {
    VERSION
}

/// A workspace as stored on disk.
///
/// Reading is lenient: records missing required fields are skipped during
/// import rather than failing the whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDocument {
    /// Format version. Older or newer values are read as-is.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Nodes in graph order.
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges.
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
    /// Visual groups; omitted when there are none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRecord>,
    /// Control profile records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Vec<Value>>,
    /// Virtual device records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_devices: Option<Vec<Value>>,
    /// Device ids selected for input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_devices: Option<Vec<String>>,
}

/// One node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node id.
    #[serde(default)]
    pub id: String,
    /// Node type tag (`midi.input`, `action.volume`, ...).
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Display title; the template title when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Configuration overlaid on the template defaults.
    #[serde(default)]
    pub config: ConfigMap,
    /// Canvas position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
}

/// One edge, from an output port to an input port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Source node id.
    #[serde(default)]
    pub source_node: String,
    /// Source output port.
    #[serde(default)]
    pub source_port: String,
    /// Target node id.
    #[serde(default)]
    pub target_node: String,
    /// Target input port.
    #[serde(default)]
    pub target_port: String,
}

impl ConnectionRecord {
    fn is_complete(&self) -> bool {
        [
            &self.source_node,
            &self.source_port,
            &self.target_node,
            &self.target_port,
        ]
        .iter()
        .all(|s| !s.is_empty())
    }
}

/// One visual group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Group id.
    #[serde(default)]
    pub id: String,
    /// Title.
    #[serde(default = "default_group_title")]
    pub title: String,
    /// Member node ids.
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Top-left corner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
    /// Width and height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<(f64, f64)>,
    /// Whether members are hidden.
    #[serde(default)]
    pub collapsed: bool,
}

fn default_group_title() -> String {
    "Group".to_string()
}

/// Snapshot `graph` as a document without profiles or devices.
pub fn export_graph(graph: &NodeGraph) -> WorkspaceDocument {
    let nodes = graph
        .nodes()
        .iter()
        .map(|n| NodeRecord {
            id: n.id.clone(),
            node_type: n.node_type.clone(),
            title: Some(n.title.clone()),
            config: n.config_map().clone(),
            position: Some(n.position),
        })
        .collect();
    let connections = graph
        .connections()
        .iter()
        .map(|c| ConnectionRecord {
            source_node: c.source_node.clone(),
            source_port: c.source_port.clone(),
            target_node: c.target_node.clone(),
            target_port: c.target_port.clone(),
        })
        .collect();
    let groups = graph
        .groups()
        .iter()
        .map(|g| GroupRecord {
            id: g.id.clone(),
            title: g.title.clone(),
            nodes: g.node_ids.clone(),
            position: Some(g.position),
            size: Some(g.size),
            collapsed: g.collapsed,
        })
        .collect();
    WorkspaceDocument {
        version: VERSION,
        nodes,
        connections,
        groups,
        ..WorkspaceDocument::default()
    }
}

/// Snapshot the whole workspace.
pub fn export_workspace<I, S>(
    graph: &NodeGraph,
    profiles: &ControlProfileStore,
    devices: &DeviceRegistry,
    active_devices: I,
) -> WorkspaceDocument
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    WorkspaceDocument {
        profiles: Some(profiles.serialize()),
        virtual_devices: Some(devices.export()),
        active_devices: Some(active_devices.into_iter().map(Into::into).collect()),
        ..export_graph(graph)
    }
}

/// Replace the contents of `graph` with the nodes, connections and groups of
/// `doc`.
///
/// Nodes without an id or of an unknown type are skipped, as are connections
/// the graph rejects. Node config is overlaid on the template defaults.
pub fn import_graph(graph: &mut NodeGraph, doc: &WorkspaceDocument) {
    graph.clear();

    for record in &doc.nodes {
        if record.id.is_empty() || record.node_type.is_empty() {
            debug!("skipping node record without id or type");
            continue;
        }
        let Some(template) = template(&record.node_type) else {
            debug!(node = %record.id, node_type = %record.node_type, "skipping node of unknown type");
            continue;
        };
        let mut node = template.instantiate(record.id.as_str());
        if let Some(title) = &record.title {
            node.title.clone_from(title);
        }
        node.merge_config(&record.config);
        if let Some(position) = record.position {
            node.position = position;
        }
        graph.add_node(node);
    }

    for record in doc.connections.iter().filter(|c| c.is_complete()) {
        let connected = graph.connect(
            &record.source_node,
            &record.source_port,
            &record.target_node,
            &record.target_port,
        );
        if !connected {
            debug!(
                source = %record.source_node,
                target = %record.target_node,
                "skipping connection rejected by the graph"
            );
        }
    }

    for record in doc.groups.iter().filter(|g| !g.id.is_empty()) {
        let mut group = NodeGroup::new(record.id.as_str());
        group.title.clone_from(&record.title);
        group.node_ids.clone_from(&record.nodes);
        group.collapsed = record.collapsed;
        if let Some(position) = record.position {
            group.position = position;
        }
        if let Some(size) = record.size {
            group.size = size;
        }
        graph.add_group(group);
    }
}

/// Load `doc` into the graph, profile store and device registry. Returns the
/// active device ids it names.
pub fn import_workspace(
    graph: &mut NodeGraph,
    profiles: &mut ControlProfileStore,
    devices: &mut DeviceRegistry,
    doc: &WorkspaceDocument,
) -> Vec<String> {
    import_graph(graph, doc);
    profiles.load(doc.profiles.iter().flatten());
    devices.import(doc.virtual_devices.iter().flatten());
    doc.active_devices.clone().unwrap_or_default()
}

/// Write `doc` to `path` as pretty-printed JSON.
pub fn save(path: &Path, doc: &WorkspaceDocument) -> Result<()> {
    let text = serde_json::to_string_pretty(doc)?;
    fs::write(path, text).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), nodes = doc.nodes.len(), "saved workspace");
    Ok(())
}

/// Read a document from `path`.
pub fn load(path: &Path) -> Result<WorkspaceDocument> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: WorkspaceDocument = serde_json::from_str(&text).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })?;
    debug!(path = %path.display(), version = doc.version, "loaded workspace");
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use midas_graph::{ACTION_COMMAND, LOGIC_MAPPER, MIDI_INPUT};
    use serde_json::json;

    use super::*;

    #[test]
    fn lenient_records() {
        let doc: WorkspaceDocument = serde_json::from_value(json!({
            "nodes": [
                {"id": "in", "type": MIDI_INPUT},
                {"type": LOGIC_MAPPER},
                {"id": "gate", "type": "logic.gate"},
                {"id": "cmd", "type": ACTION_COMMAND, "title": "Run", "config": {"command": "ls"}}
            ],
            "connections": [
                {"source_node": "in", "source_port": "message", "target_node": "cmd", "target_port": "trigger"},
                {"source_node": "in", "source_port": "message", "target_node": "cmd"},
                {"source_node": "gate", "source_port": "out", "target_node": "cmd", "target_port": "trigger"}
            ],
            "groups": [{"nodes": ["in"]}, {"id": "g", "nodes": ["in", "ghost"]}]
        }))
        .unwrap();
        assert_eq!(doc.version, VERSION);

        let mut graph = NodeGraph::new();
        import_graph(&mut graph, &doc);
        let ids: Vec<_> = graph.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["in", "cmd"]);
        assert_eq!(graph.connections().len(), 1);
        assert_eq!(graph.groups().len(), 1);
        let group = graph.group("g").unwrap();
        assert_eq!(group.title, "Group");
        assert_eq!(group.node_ids, vec!["in"]);

        let cmd = graph.node("cmd").unwrap();
        assert_eq!(cmd.title, "Run");
        // Template defaults survive under the overlay.
        assert_eq!(cmd.config_map().get("shell"), Some(&json!(false)));
        assert_eq!(cmd.config_map().get("command"), Some(&json!("ls")));
    }

    #[test]
    fn import_replaces_existing_graph() {
        let mut graph = NodeGraph::new();
        graph.add_node(template(MIDI_INPUT).unwrap().instantiate("old"));
        import_graph(&mut graph, &WorkspaceDocument::default());
        assert!(graph.is_empty());
    }

    #[test]
    fn graph_export_omits_workspace_fields() {
        let mut graph = NodeGraph::new();
        graph.add_node(template(MIDI_INPUT).unwrap().instantiate("in"));
        let value = serde_json::to_value(export_graph(&graph)).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert!(["version", "nodes", "connections"].iter().all(|k| object.contains_key(*k)));
        assert_eq!(value["nodes"][0]["type"], json!(MIDI_INPUT));
        assert_eq!(value["nodes"][0]["position"], json!([0.0, 0.0]));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn malformed_file_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\n  \"nodes\": [\n    oops\n  ]\n}").unwrap();
        match load(&path).unwrap_err() {
            Error::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Save a workspace, load it back, and compare.

use std::fs;

use midas_graph::{ACTION_SCRIPT, MIDI_INPUT, NodeGraph, NodeGroup, template};
use midas_midi::{ControlProfileStore, DeviceRegistry, MidiEvent};
use midas_workspace::{export_workspace, import_workspace, load, preset, save};
use serde_json::json;

fn sample() -> (NodeGraph, ControlProfileStore, DeviceRegistry) {
    let mut graph = NodeGraph::new();
    let mut input = template(MIDI_INPUT).unwrap().instantiate("in");
    input.position = (10.0, 20.0);
    input.set_config_value("device_ports", json!(["virtual::pads"]));
    graph.add_node(input);
    let mut script = template(ACTION_SCRIPT).unwrap().instantiate("js");
    script.set_config_value("script", json!("print(event.value)"));
    script.set_config_value("_display_value", json!(0.5));
    graph.add_node(script);
    assert!(graph.connect("in", "message", "js", "trigger"));
    let mut group = NodeGroup::new("g1");
    group.title = "Pads".into();
    group.node_ids = vec!["in".into(), "js".into()];
    group.collapsed = true;
    graph.add_group(group);
    graph.set_group_rect("g1", 0.0, 0.0, 300.0, 200.0);

    let mut profiles = ControlProfileStore::new();
    profiles.add_from_event(
        &MidiEvent::control_change(0, 7, 0).with_source("Pad A"),
        Some("Volume"),
        None,
    );

    let mut devices = DeviceRegistry::new();
    devices.add_virtual("Pads", ["Pad A", "Pad B"], Some("virtual::pads"));

    (graph, profiles, devices)
}

#[test]
fn workspace_survives_save_and_load() {
    let (graph, profiles, devices) = sample();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studio.json");
    let doc = export_workspace(&graph, &profiles, &devices, ["virtual::pads"]);
    save(&path, &doc).unwrap();

    let loaded = load(&path).unwrap();
    assert_eq!(loaded, doc);

    let mut graph2 = NodeGraph::new();
    let mut profiles2 = ControlProfileStore::new();
    let mut devices2 = DeviceRegistry::new();
    let active = import_workspace(&mut graph2, &mut profiles2, &mut devices2, &loaded);

    assert_eq!(active, vec!["virtual::pads"]);
    assert_eq!(graph2.nodes().len(), 2);
    assert_eq!(graph2.connections(), graph.connections());
    assert_eq!(graph2.groups(), graph.groups());
    assert_eq!(graph2.node("in").unwrap().position, (10.0, 20.0));
    assert_eq!(
        graph2.node("in").unwrap().filter().device_ports,
        vec!["virtual::pads"]
    );
    assert_eq!(profiles2.len(), 1);
    assert_eq!(profiles2.all()[0].name, "Volume");
    assert_eq!(devices2.aliases_for("Pad B"), vec!["virtual::pads"]);
}

#[test]
fn display_keys_never_reach_the_file() {
    let (graph, profiles, devices) = sample();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("w.json");
    save(
        &path,
        &export_workspace(&graph, &profiles, &devices, Vec::<String>::new()),
    )
    .unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("_display_"));
    assert!(text.contains("print(event.value)"));
}

#[test]
fn preset_imports_cleanly() {
    let doc = preset("default-mixer").unwrap().document();
    let mut graph = NodeGraph::new();
    let mut profiles = ControlProfileStore::new();
    let mut devices = DeviceRegistry::new();
    let active = import_workspace(&mut graph, &mut profiles, &mut devices, &doc);
    assert!(active.is_empty());
    assert_eq!(graph.len(), 4);
    assert_eq!(graph.connections().len(), 3);
    assert_eq!(graph.node("volume_action").unwrap().title, "System Volume");
}

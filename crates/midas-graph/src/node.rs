use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ConfigMap, EventFilter, NodeConfig, strip_display_keys};

/// Entry point: emits incoming events on `message`.
pub const MIDI_INPUT: &str = "midi.input";
/// Value transform: `in` to `out`.
pub const LOGIC_MAPPER: &str = "logic.mapper";
/// System volume action.
pub const ACTION_VOLUME: &str = "action.volume";
/// Scripted action.
pub const ACTION_SCRIPT: &str = "action.script";
/// External command action.
pub const ACTION_COMMAND: &str = "action.command";
/// Keyboard shortcut action.
pub const ACTION_SHORTCUT: &str = "action.shortcut";
/// Sound playback action.
pub const ACTION_SOUND: &str = "action.sound";
/// Common prefix of action node types.
pub const ACTION_PREFIX: &str = "action.";

/// Data type tag compatible with every other tag.
pub const ANY_DATA_TYPE: &str = "any";

/// Config key that belongs to the node itself rather than its behaviour.
const POSITION_KEY: &str = "position";

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// Receives connections.
    Input,
    /// Sends connections.
    Output,
}

/// A named, typed attachment point on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePort {
    /// Port name, unique per node.
    pub name: String,
    /// Input or output.
    pub direction: PortDirection,
    /// Data type tag; [`ANY_DATA_TYPE`] matches everything.
    pub data_type: String,
}

impl NodePort {
    /// An input port.
    pub fn input(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Input,
            data_type: data_type.to_string(),
        }
    }

    /// An output port.
    pub fn output(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: PortDirection::Output,
            data_type: data_type.to_string(),
        }
    }

    /// True when a connection between `self` and `other` carries compatible data.
    pub fn compatible_with(&self, other: &Self) -> bool {
        self.data_type == ANY_DATA_TYPE
            || other.data_type == ANY_DATA_TYPE
            || self.data_type == other.data_type
    }
}

/// A typed unit of the graph.
///
/// The JSON config map is the persisted form; the typed [`NodeConfig`] and
/// [`EventFilter`] views are re-derived whenever the map changes, so reads never
/// see a stale or invalid value.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique id within a graph.
    pub id: String,
    /// Type tag selecting behaviour.
    pub node_type: String,
    /// Display title.
    pub title: String,
    /// Canvas position.
    pub position: (f64, f64),
    /// Input ports, fixed at creation.
    inputs: Vec<NodePort>,
    /// Output ports, fixed at creation.
    outputs: Vec<NodePort>,
    /// Persisted configuration.
    config_map: ConfigMap,
    /// Typed view of `config_map`.
    config: NodeConfig,
    /// Device/profile constraints read from `config_map`.
    filter: EventFilter,
}

impl Node {
    /// Build a node. Display-only and position keys are dropped from `config`.
    pub fn new(
        id: impl Into<String>,
        node_type: impl Into<String>,
        title: impl Into<String>,
        inputs: Vec<NodePort>,
        outputs: Vec<NodePort>,
        config: ConfigMap,
    ) -> Self {
        let node_type = node_type.into();
        let mut node = Self {
            id: id.into(),
            config: NodeConfig::Other,
            node_type,
            title: title.into(),
            position: (0.0, 0.0),
            inputs,
            outputs,
            config_map: ConfigMap::new(),
            filter: EventFilter::default(),
        };
        node.set_config(config);
        node
    }

    /// Input ports.
    pub fn inputs(&self) -> &[NodePort] {
        &self.inputs
    }

    /// Output ports.
    pub fn outputs(&self) -> &[NodePort] {
        &self.outputs
    }

    /// Port named `name`, searching inputs then outputs.
    pub fn port(&self, name: &str) -> Option<&NodePort> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .find(|p| p.name == name)
    }

    /// Typed behaviour parameters.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Device/profile constraints.
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Persisted configuration map.
    pub fn config_map(&self) -> &ConfigMap {
        &self.config_map
    }

    /// True for `action.*` nodes.
    pub fn is_action(&self) -> bool {
        self.node_type.starts_with(ACTION_PREFIX)
    }

    /// Replace the whole configuration.
    pub fn set_config(&mut self, mut config: ConfigMap) {
        strip_display_keys(&mut config);
        config.remove(POSITION_KEY);
        self.config_map = config;
        self.reparse();
    }

    /// Overlay `config` onto the current configuration.
    pub fn merge_config(&mut self, config: &ConfigMap) {
        let mut merged = self.config_map.clone();
        merged.extend(config.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.set_config(merged);
    }

    /// Set one configuration key.
    pub fn set_config_value(&mut self, key: &str, value: Value) {
        let mut one = ConfigMap::new();
        one.insert(key.to_string(), value);
        self.merge_config(&one);
    }

    /// Rebuild the typed views from the map.
    fn reparse(&mut self) {
        self.config = NodeConfig::parse(&self.node_type, &self.config_map);
        self.filter = EventFilter::from_map(&self.config_map);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::MapperConfig;

    #[test]
    fn config_views_follow_the_map() {
        let mut node = Node::new(
            "m",
            LOGIC_MAPPER,
            "Mapper",
            vec![NodePort::input("in", "midi")],
            vec![NodePort::output("out", "midi")],
            ConfigMap::new(),
        );
        assert_eq!(node.config(), &NodeConfig::Mapper(MapperConfig::default()));
        node.set_config_value("output_max", json!(100));
        node.set_config_value("device_ports", json!(["a"]));
        node.set_config_value("_display_value", json!(0.4));
        node.set_config_value("position", json!([1, 2]));
        let NodeConfig::Mapper(m) = node.config() else {
            panic!("expected mapper config");
        };
        assert_eq!(m.output_max, 100.0);
        assert_eq!(node.filter().device_ports, vec!["a".to_string()]);
        assert!(!node.config_map().contains_key("_display_value"));
        assert!(!node.config_map().contains_key("position"));
    }

    #[test]
    fn port_lookup_and_compatibility() {
        let node = Node::new(
            "x",
            "custom.thing",
            "Thing",
            vec![NodePort::input("in", "any")],
            vec![NodePort::output("out", "midi")],
            ConfigMap::new(),
        );
        assert!(node.port("in").is_some());
        assert!(node.port("missing").is_none());
        let midi = NodePort::output("o", "midi");
        let audio = NodePort::input("i", "audio");
        assert!(!midi.compatible_with(&audio));
        assert!(midi.compatible_with(&node.inputs()[0]));
        assert!(!node.is_action());
        assert_eq!(node.config(), &NodeConfig::Other);
    }
}

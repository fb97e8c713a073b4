//! Node graph model for Midas.
//!
//! A graph holds typed [`Node`]s joined by directed [`NodeConnection`]s from
//! output ports to input ports, plus purely visual [`NodeGroup`]s. Node
//! behaviour is configured through an open JSON map read leniently into a
//! typed [`NodeConfig`]; see [`config`] for the reading rules.
//!
//! The graph is edited by the host (editor, workspace loader) and only read by
//! the dispatch engine.

pub mod config;
mod error;
mod graph;
mod node;
mod templates;

pub use config::{
    CommandConfig, CommandLine, ConfigMap, Curve, EventFilter, MapperConfig, NodeConfig,
    ScriptConfig, ShortcutConfig, SoundConfig, VolumeConfig,
};
pub use error::ConnectError;
pub use graph::{NodeConnection, NodeGraph, NodeGroup};
pub use node::{
    ACTION_COMMAND, ACTION_PREFIX, ACTION_SCRIPT, ACTION_SHORTCUT, ACTION_SOUND, ACTION_VOLUME,
    ANY_DATA_TYPE, LOGIC_MAPPER, MIDI_INPUT, Node, NodePort, PortDirection,
};
pub use templates::{NodeTemplate, template, templates};

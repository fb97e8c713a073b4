//! Workspace persistence for Midas.
//!
//! A workspace file is a JSON [`WorkspaceDocument`] holding the node graph,
//! learned control profiles, virtual devices and the selected input devices.
//! Import is forgiving so documents written by other versions still load.

mod document;
mod error;
mod presets;

pub use document::{
    ConnectionRecord, GroupRecord, NodeRecord, VERSION, WorkspaceDocument, export_graph,
    export_workspace, import_graph, import_workspace, load, save,
};
pub use error::{Error, Result};
pub use presets::{Preset, preset, presets};

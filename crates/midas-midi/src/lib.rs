//! MIDI-side data model for Midas.
//!
//! - [`MidiEvent`]: one normalized channel-voice message, immutable once built
//! - [`ControlProfile`] and [`ControlProfileStore`]: learned control matchers
//! - [`DeviceRegistry`]: virtual devices that aggregate several physical ports
//!
//! Nothing here touches a MIDI port. A transport decodes raw bytes with
//! [`MidiEvent::from_bytes`] and hands the events to the dispatch engine.

mod devices;
mod event;
mod profiles;

pub use devices::{DeviceRegistry, VirtualDevice};
pub use event::{MessageType, MidiEvent};
pub use profiles::{ControlProfile, ControlProfileStore, ControlType, classify};

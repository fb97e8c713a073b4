//! Live activity feedback for editors.
//!
//! The engine never writes display data into node configuration. Instead, each
//! triggered root whose state changed is announced as a [`DisplayUpdate`] on
//! an optional channel owned by the host.

use std::collections::HashMap;

use midas_midi::{MessageType, MidiEvent};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// Smallest normalized change worth reporting.
const VALUE_EPSILON: f64 = 1e-3;

/// Normalized activity of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayState {
    /// Level in [0, 1].
    pub value: f64,
    /// Whether the control is currently "on".
    pub active: bool,
    /// Unnormalized value the level was derived from.
    pub raw: i32,
}

impl DisplayState {
    /// Derive the display state for `event`. Events without a usable value
    /// yield `None`.
    pub fn from_event(event: &MidiEvent) -> Option<Self> {
        match event.message_type {
            MessageType::NoteOn | MessageType::NoteOff => {
                let on = event.message_type == MessageType::NoteOn;
                let raw = event
                    .velocity
                    .or(event.value)
                    .unwrap_or(if on { 127 } else { 0 })
                    .clamp(0, 127);
                Some(Self {
                    value: f64::from(raw) / 127.0,
                    active: on && raw > 0,
                    raw,
                })
            }
            _ => {
                let raw = event.value?;
                let value = if event.message_type == MessageType::Pitchwheel {
                    (f64::from(raw) + 8192.0) / 16383.0
                } else {
                    f64::from(raw) / 127.0
                }
                .clamp(0.0, 1.0);
                Some(Self {
                    value,
                    active: value > VALUE_EPSILON,
                    raw,
                })
            }
        }
    }

    /// True when `self` differs enough from `previous` to be worth sending.
    fn differs_from(&self, previous: &Self) -> bool {
        (self.value - previous.value).abs() > VALUE_EPSILON
            || self.active != previous.active
            || self.raw != previous.raw
    }
}

/// One display change.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayUpdate {
    /// Node the state belongs to.
    pub node_id: String,
    /// New state.
    pub state: DisplayState,
}

/// Remembers the last state sent per node and forwards changes.
#[derive(Debug, Default)]
pub(crate) struct DisplayTracker {
    sender: Option<UnboundedSender<DisplayUpdate>>,
    last: HashMap<String, DisplayState>,
}

impl DisplayTracker {
    /// Install or remove the output channel. Clears remembered state.
    pub(crate) fn set_sender(&mut self, sender: Option<UnboundedSender<DisplayUpdate>>) {
        self.sender = sender;
        self.last.clear();
    }

    /// Report `event` for `node_id` if the display changed.
    pub(crate) fn observe(&mut self, node_id: &str, event: &MidiEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        let Some(state) = DisplayState::from_event(event) else {
            return;
        };
        if self
            .last
            .get(node_id)
            .is_some_and(|prev| !state.differs_from(prev))
        {
            return;
        }
        self.last.insert(node_id.to_string(), state);
        let update = DisplayUpdate {
            node_id: node_id.to_string(),
            state,
        };
        if sender.send(update).is_err() {
            trace!("display receiver dropped; disabling updates");
            self.sender = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::iter;

    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn note_states() {
        let on = DisplayState::from_event(&MidiEvent::note_on(0, 60, 127)).unwrap();
        assert_eq!(on.raw, 127);
        assert!(on.active);
        assert!((on.value - 1.0).abs() < 1e-9);

        let silent = DisplayState::from_event(&MidiEvent::note_on(0, 60, 0)).unwrap();
        assert!(!silent.active);

        let off = DisplayState::from_event(&MidiEvent::note_off(0, 60, 64)).unwrap();
        assert!(!off.active);
        assert_eq!(off.raw, 64);

        let mut bare = MidiEvent::new(MessageType::NoteOn);
        bare.note = Some(1);
        assert_eq!(DisplayState::from_event(&bare).unwrap().raw, 127);
    }

    #[test]
    fn valued_states() {
        let center = DisplayState::from_event(&MidiEvent::pitchwheel(0, 0)).unwrap();
        assert!((center.value - 8192.0 / 16383.0).abs() < 1e-9);
        let low = DisplayState::from_event(&MidiEvent::pitchwheel(0, -8192)).unwrap();
        assert!(!low.active);

        let cc = DisplayState::from_event(&MidiEvent::control_change(0, 1, 200)).unwrap();
        assert_eq!(cc.value, 1.0);
        assert_eq!(cc.raw, 200);

        assert!(DisplayState::from_event(&MidiEvent::new(MessageType::ControlChange)).is_none());
    }

    #[test]
    fn tracker_sends_only_changes() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tracker = DisplayTracker::default();
        tracker.observe("a", &MidiEvent::control_change(0, 1, 10));
        tracker.set_sender(Some(tx));

        tracker.observe("a", &MidiEvent::control_change(0, 1, 10));
        tracker.observe("a", &MidiEvent::control_change(0, 1, 10));
        tracker.observe("a", &MidiEvent::control_change(0, 1, 11));
        tracker.observe("b", &MidiEvent::control_change(0, 1, 11));

        let got: Vec<_> = iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].node_id, "a");
        assert_eq!(got[0].state.raw, 10);
        assert_eq!(got[1].state.raw, 11);
        assert_eq!(got[2].node_id, "b");
    }
}

//! Control profiles: named matchers binding a device and message pattern to a
//! logical control.

use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

use crate::{MessageType, MidiEvent};

/// Classification of a control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ControlType {
    /// Knobs and faders (`control_change`).
    Continuous,
    /// Pads and keys (`note_on`/`note_off`).
    Button,
    /// Anything else, carrying the raw type string.
    Other(String),
}

impl ControlType {
    /// Wire name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Continuous => "continuous",
            Self::Button => "button",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ControlType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "continuous" => Self::Continuous,
            "button" => Self::Button,
            _ => Self::Other(s),
        }
    }
}

impl From<ControlType> for String {
    fn from(t: ControlType) -> Self {
        t.as_str().to_string()
    }
}

/// Classify the control that produced `event`.
pub fn classify(event: &MidiEvent) -> ControlType {
    match &event.message_type {
        MessageType::ControlChange => ControlType::Continuous,
        MessageType::NoteOn | MessageType::NoteOff => ControlType::Button,
        other => ControlType::Other(other.as_str().to_string()),
    }
}

/// A learned pattern recognizing one physical control's messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlProfile {
    /// Unique id within a store.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Port or virtual device id the control lives on.
    pub device_port: String,
    /// Message type the control emits.
    pub message_type: MessageType,
    /// Classification.
    pub control_type: ControlType,
    /// Channel filter; `None` matches any.
    pub channel: Option<i32>,
    /// Controller filter; `None` matches any.
    pub control: Option<i32>,
    /// Note filter; `None` matches any.
    pub note: Option<i32>,
    /// Alternate device identifiers recorded at learn time.
    pub aliases: Vec<String>,
}

impl ControlProfile {
    /// True iff the event comes from this profile's device, has the same message
    /// type, and agrees on every channel/control/note the profile pins down.
    pub fn matches(&self, event: &MidiEvent) -> bool {
        if !event.comes_from(&self.device_port) {
            return false;
        }
        if event.message_type != self.message_type {
            return false;
        }
        pinned(self.channel, event.channel)
            && pinned(self.control, event.control)
            && pinned(self.note, event.note)
    }

    /// Plain JSON record for persistence.
    pub fn to_record(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "device_port": self.device_port,
            "message_type": self.message_type.as_str(),
            "control_type": self.control_type.as_str(),
            "channel": self.channel,
            "control": self.control,
            "note": self.note,
            "aliases": self.aliases,
        })
    }

    /// Parse a persisted record. Returns `None` when a required field is absent.
    pub fn from_record(record: &Value) -> Option<Self> {
        let required = |key: &str| record.get(key).filter(|v| !v.is_null()).map(value_text);
        let id = required("id")?;
        let name = required("name")?;
        let device_port = required("device_port")?;
        let message_type = MessageType::parse(&required("message_type")?);
        let control_type = ControlType::from(required("control_type").unwrap_or_default());
        let aliases = record
            .get("aliases")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(value_text).collect())
            .unwrap_or_default();
        Some(Self {
            id,
            name,
            device_port,
            message_type,
            control_type,
            channel: optional_int(record.get("channel")),
            control: optional_int(record.get("control")),
            note: optional_int(record.get("note")),
            aliases,
        })
    }
}

/// A `None` filter is a wildcard; otherwise the event must carry the same value.
fn pinned(filter: Option<i32>, actual: Option<i32>) -> bool {
    filter.is_none() || filter == actual
}

/// Render a scalar JSON value as text (strings unquoted).
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lenient integer read: numbers, numeric strings; empty, null and garbage are `None`.
fn optional_int(v: Option<&Value>) -> Option<i32> {
    match v? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i32::from(*b)),
        _ => None,
    }
}

/// Owns all control profiles, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ControlProfileStore {
    /// Profiles by id.
    profiles: BTreeMap<String, ControlProfile>,
}

impl ControlProfileStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile.
    pub fn add(&mut self, profile: ControlProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Derive a profile from a live event and store it.
    ///
    /// `name` defaults to the source plus `CC<n>`, `NOTE<n>` or the message type;
    /// `device_port` defaults to the event source, then `"unknown"`.
    pub fn add_from_event(
        &mut self,
        event: &MidiEvent,
        name: Option<&str>,
        device_port: Option<&str>,
    ) -> ControlProfile {
        let control_type = classify(event);
        let name = name
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_name(event, &control_type));
        let device_port = device_port
            .filter(|p| !p.is_empty())
            .or(event.source.as_deref())
            .unwrap_or("unknown")
            .to_string();
        let profile = ControlProfile {
            id: Uuid::new_v4().simple().to_string(),
            name,
            device_port,
            message_type: event.message_type.clone(),
            control_type,
            channel: event.channel,
            control: event.control,
            note: event.note,
            aliases: event.aliases.clone(),
        };
        debug!(id = %profile.id, name = %profile.name, "learned control profile");
        self.add(profile.clone());
        profile
    }

    /// Look up a profile by id.
    pub fn get(&self, id: &str) -> Option<&ControlProfile> {
        self.profiles.get(id)
    }

    /// Remove a profile. Absent ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<ControlProfile> {
        self.profiles.remove(id)
    }

    /// All profiles, ordered by id.
    pub fn all(&self) -> Vec<&ControlProfile> {
        self.profiles.values().collect()
    }

    /// Profiles bound to `device_port`.
    pub fn for_device(&self, device_port: &str) -> Vec<&ControlProfile> {
        self.profiles
            .values()
            .filter(|p| p.device_port == device_port)
            .collect()
    }

    /// Profiles matching `event`, keyed by id.
    pub fn matching(&self, event: &MidiEvent) -> BTreeMap<&str, &ControlProfile> {
        self.profiles
            .iter()
            .filter(|(_, p)| p.matches(event))
            .map(|(id, p)| (id.as_str(), p))
            .collect()
    }

    /// Iterate profiles.
    pub fn iter(&self) -> btree_map::Values<'_, String, ControlProfile> {
        self.profiles.values()
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// True when no profiles are stored.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Drop every profile.
    pub fn clear(&mut self) {
        self.profiles.clear();
    }

    /// Plain records for persistence.
    pub fn serialize(&self) -> Vec<Value> {
        self.profiles.values().map(ControlProfile::to_record).collect()
    }

    /// Replace the contents with `records`, skipping malformed entries.
    pub fn load<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.clear();
        for record in records {
            match ControlProfile::from_record(record) {
                Some(profile) => self.add(profile),
                None => debug!("skipping malformed control profile record"),
            }
        }
    }
}

impl<'a> IntoIterator for &'a ControlProfileStore {
    type Item = &'a ControlProfile;
    type IntoIter = btree_map::Values<'a, String, ControlProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Default display name for a profile learned from `event`.
fn default_name(event: &MidiEvent, control_type: &ControlType) -> String {
    let mut parts = Vec::new();
    if let Some(source) = event.source.as_deref().filter(|s| !s.is_empty()) {
        parts.push(source.to_string());
    }
    match (control_type, event.control, event.note) {
        (ControlType::Continuous, Some(cc), _) => parts.push(format!("CC{cc}")),
        (_, _, Some(note)) => parts.push(format!("NOTE{note}")),
        _ => parts.push(event.message_type.as_str().to_string()),
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn knob(device_port: &str) -> ControlProfile {
        ControlProfile {
            id: "p1".into(),
            name: "Knob".into(),
            device_port: device_port.into(),
            message_type: MessageType::ControlChange,
            control_type: ControlType::Continuous,
            channel: None,
            control: None,
            note: None,
            aliases: Vec::new(),
        }
    }

    #[test]
    fn wildcard_profile_matches_any_control() {
        let p = knob("port-a");
        for cc in [0, 7, 127] {
            let ev = MidiEvent::control_change(3, cc, 10).with_source("port-a");
            assert!(p.matches(&ev));
        }
        let other_port = MidiEvent::control_change(3, 7, 10).with_source("port-b");
        assert!(!p.matches(&other_port));
        let other_type = MidiEvent::note_on(3, 7, 10).with_source("port-a");
        assert!(!p.matches(&other_type));
    }

    #[test]
    fn pinned_fields_must_match() {
        let p = ControlProfile {
            channel: Some(0),
            control: Some(7),
            ..knob("port-a")
        };
        assert!(p.matches(&MidiEvent::control_change(0, 7, 1).with_source("port-a")));
        assert!(!p.matches(&MidiEvent::control_change(1, 7, 1).with_source("port-a")));
        assert!(!p.matches(&MidiEvent::control_change(0, 8, 1).with_source("port-a")));
    }

    #[test]
    fn alias_matches_device_port() {
        let p = knob("virtual::mix");
        let ev = MidiEvent::control_change(0, 1, 1)
            .with_source("port-a")
            .with_aliases(["virtual::mix"]);
        assert!(p.matches(&ev));
    }

    #[test]
    fn classify_by_type() {
        assert_eq!(
            classify(&MidiEvent::control_change(0, 1, 1)),
            ControlType::Continuous
        );
        assert_eq!(classify(&MidiEvent::note_off(0, 1, 1)), ControlType::Button);
        assert_eq!(
            classify(&MidiEvent::pitchwheel(0, 0)),
            ControlType::Other("pitchwheel".into())
        );
    }

    #[test]
    fn load_skips_records_missing_required_fields() {
        let records = vec![
            json!({"name": "no id", "device_port": "a", "message_type": "note_on"}),
            json!({"id": "ok", "name": "Pad", "device_port": "a", "message_type": "note_on",
                   "note": "36", "channel": "", "control": "x"}),
            json!({"id": "nodev", "name": "Pad", "message_type": "note_on"}),
        ];
        let mut store = ControlProfileStore::new();
        store.add(knob("stale"));
        store.load(&records);
        assert_eq!(store.len(), 1);
        let p = store.get("ok").unwrap();
        assert_eq!(p.note, Some(36));
        assert_eq!(p.channel, None);
        assert_eq!(p.control, None);
        assert_eq!(p.control_type, ControlType::Other(String::new()));
    }

    #[test]
    fn load_skips_null_ids() {
        let records = vec![
            json!({"id": null, "name": "Pad", "device_port": "a", "message_type": "note_on"}),
            json!({"id": 7, "name": "Pad", "device_port": "a", "message_type": "note_on"}),
        ];
        let mut store = ControlProfileStore::new();
        store.load(&records);
        assert_eq!(store.len(), 1);
        assert!(store.get("7").is_some());
        assert!(store.get("null").is_none());
    }

    #[test]
    fn load_last_duplicate_wins() {
        let records = vec![
            json!({"id": "d", "name": "first", "device_port": "a", "message_type": "note_on"}),
            json!({"id": "d", "name": "second", "device_port": "a", "message_type": "note_on"}),
        ];
        let mut store = ControlProfileStore::new();
        store.load(&records);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("d").unwrap().name, "second");
    }

    #[test]
    fn serialize_then_load_preserves_profiles() {
        let mut store = ControlProfileStore::new();
        store.add(ControlProfile {
            note: Some(40),
            aliases: vec!["virtual::x".into()],
            ..knob("port-a")
        });
        let records = store.serialize();
        assert_eq!(records[0]["message_type"], "control_change");
        assert_eq!(records[0]["control_type"], "continuous");
        let mut restored = ControlProfileStore::new();
        restored.load(&records);
        assert_eq!(restored.all(), store.all());
    }

    #[test]
    fn learn_names_and_ports() {
        let mut store = ControlProfileStore::new();
        let cc = store.add_from_event(
            &MidiEvent::control_change(0, 21, 5).with_source("nanoKONTROL"),
            None,
            None,
        );
        assert_eq!(cc.name, "nanoKONTROL CC21");
        assert_eq!(cc.device_port, "nanoKONTROL");
        assert_eq!(cc.id.len(), 32);

        let pad = store.add_from_event(&MidiEvent::note_on(9, 36, 90), None, None);
        assert_eq!(pad.name, "NOTE36");
        assert_eq!(pad.device_port, "unknown");
        assert_eq!(pad.control_type, ControlType::Button);

        let bend = store.add_from_event(&MidiEvent::pitchwheel(0, 0), Some("Bend"), Some("dev"));
        assert_eq!(bend.name, "Bend");
        assert_eq!(bend.device_port, "dev");
        assert_eq!(store.len(), 3);
        assert_eq!(store.for_device("dev").len(), 1);
    }

    #[test]
    fn matching_collects_ids() {
        let mut store = ControlProfileStore::new();
        store.add(knob("port-a"));
        store.add(ControlProfile {
            id: "p2".into(),
            ..knob("port-b")
        });
        let ev = MidiEvent::control_change(0, 1, 1).with_source("port-a");
        let hits = store.matching(&ev);
        assert_eq!(hits.keys().copied().collect::<Vec<_>>(), vec!["p1"]);
    }

    proptest! {
        #[test]
        fn unpinned_profile_matches_any_event_from_its_port(
            channel in 0..16i32,
            control in 0..128i32,
            note in 0..128i32,
            value in 0..128i32,
        ) {
            let p = knob("port-a");
            let cc = MidiEvent::control_change(channel, control, value).with_source("port-a");
            prop_assert!(p.matches(&cc));
            prop_assert!(!p.matches(&cc.with_source("port-b")));

            let pad = ControlProfile {
                message_type: MessageType::NoteOn,
                control_type: ControlType::Button,
                ..knob("port-a")
            };
            let hit = MidiEvent::note_on(channel, note, value).with_source("port-a");
            prop_assert!(pad.matches(&hit));
            prop_assert!(!p.matches(&hit));
        }
    }
}

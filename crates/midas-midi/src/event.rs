use std::fmt;

use midly::{MidiMessage, live::LiveEvent};
use serde::{Deserialize, Serialize};

/// Kind of a MIDI channel-voice message.
///
/// Serialized as the lowercase wire names used in workspace documents
/// (`"note_on"`, `"control_change"`, ...). Names this crate does not know are
/// kept verbatim in [`MessageType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Key pressed.
    NoteOn,
    /// Key released.
    NoteOff,
    /// Continuous controller (knob, fader).
    ControlChange,
    /// Pitch bend wheel.
    Pitchwheel,
    /// Channel pressure.
    Aftertouch,
    /// Polyphonic key pressure.
    Polytouch,
    /// Program change.
    ProgramChange,
    /// Any other message type name.
    Other(String),
}

impl MessageType {
    /// Wire name of this message type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoteOn => "note_on",
            Self::NoteOff => "note_off",
            Self::ControlChange => "control_change",
            Self::Pitchwheel => "pitchwheel",
            Self::Aftertouch => "aftertouch",
            Self::Polytouch => "polytouch",
            Self::ProgramChange => "program_change",
            Self::Other(name) => name,
        }
    }

    /// Parse a wire name. Unknown names become [`MessageType::Other`].
    pub fn parse(name: &str) -> Self {
        match name {
            "note_on" => Self::NoteOn,
            "note_off" => Self::NoteOff,
            "control_change" => Self::ControlChange,
            "pitchwheel" => Self::Pitchwheel,
            "aftertouch" => Self::Aftertouch,
            "polytouch" => Self::Polytouch,
            "program_change" => Self::ProgramChange,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MessageType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        kind.as_str().to_string()
    }
}

/// One normalized MIDI message.
///
/// Fields that do not apply to `message_type` are `None`. Events are passed by
/// reference through a dispatch; transforms produce a new event via
/// [`MidiEvent::with_value`] instead of mutating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiEvent {
    /// Message kind.
    pub message_type: MessageType,
    /// MIDI channel (0-15).
    #[serde(default)]
    pub channel: Option<i32>,
    /// Controller number for control changes.
    #[serde(default)]
    pub control: Option<i32>,
    /// Controller value, pressure, program or pitch.
    #[serde(default)]
    pub value: Option<i32>,
    /// Note number.
    #[serde(default)]
    pub note: Option<i32>,
    /// Note velocity.
    #[serde(default)]
    pub velocity: Option<i32>,
    /// Port the message arrived on.
    #[serde(default)]
    pub source: Option<String>,
    /// Additional identifiers the source is known by (virtual devices).
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl MidiEvent {
    /// Event of `message_type` with every optional field empty.
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            channel: None,
            control: None,
            value: None,
            note: None,
            velocity: None,
            source: None,
            aliases: Vec::new(),
        }
    }

    /// A `note_on` message.
    pub fn note_on(channel: i32, note: i32, velocity: i32) -> Self {
        Self {
            channel: Some(channel),
            note: Some(note),
            velocity: Some(velocity),
            ..Self::new(MessageType::NoteOn)
        }
    }

    /// A `note_off` message.
    pub fn note_off(channel: i32, note: i32, velocity: i32) -> Self {
        Self {
            channel: Some(channel),
            note: Some(note),
            velocity: Some(velocity),
            ..Self::new(MessageType::NoteOff)
        }
    }

    /// A `control_change` message.
    pub fn control_change(channel: i32, control: i32, value: i32) -> Self {
        Self {
            channel: Some(channel),
            control: Some(control),
            value: Some(value),
            ..Self::new(MessageType::ControlChange)
        }
    }

    /// A `pitchwheel` message. `value` is centered on zero (-8192..=8191).
    pub fn pitchwheel(channel: i32, value: i32) -> Self {
        Self {
            channel: Some(channel),
            value: Some(value),
            ..Self::new(MessageType::Pitchwheel)
        }
    }

    /// Set the originating port.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the alias list.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Copy of this event with only `value` replaced.
    pub fn with_value(&self, value: Option<i32>) -> Self {
        Self {
            value,
            ..self.clone()
        }
    }

    /// True when `id` is the event's source or one of its aliases.
    pub fn comes_from(&self, id: &str) -> bool {
        self.source.as_deref() == Some(id) || self.aliases.iter().any(|a| a == id)
    }

    /// Decode one raw channel-voice message.
    ///
    /// System, realtime and malformed messages yield `None`.
    pub fn from_bytes(bytes: &[u8], source: Option<&str>, aliases: &[String]) -> Option<Self> {
        let LiveEvent::Midi { channel, message } = LiveEvent::parse(bytes).ok()? else {
            return None;
        };
        let channel = i32::from(channel.as_int());
        let mut event = match message {
            MidiMessage::NoteOn { key, vel } => {
                Self::note_on(channel, i32::from(key.as_int()), i32::from(vel.as_int()))
            }
            MidiMessage::NoteOff { key, vel } => {
                Self::note_off(channel, i32::from(key.as_int()), i32::from(vel.as_int()))
            }
            MidiMessage::Controller { controller, value } => Self::control_change(
                channel,
                i32::from(controller.as_int()),
                i32::from(value.as_int()),
            ),
            MidiMessage::PitchBend { bend } => Self::pitchwheel(channel, i32::from(bend.as_int())),
            MidiMessage::ChannelAftertouch { vel } => Self {
                channel: Some(channel),
                value: Some(i32::from(vel.as_int())),
                ..Self::new(MessageType::Aftertouch)
            },
            MidiMessage::Aftertouch { key, vel } => Self {
                channel: Some(channel),
                note: Some(i32::from(key.as_int())),
                value: Some(i32::from(vel.as_int())),
                ..Self::new(MessageType::Polytouch)
            },
            MidiMessage::ProgramChange { program } => Self {
                channel: Some(channel),
                value: Some(i32::from(program.as_int())),
                ..Self::new(MessageType::ProgramChange)
            },
        };
        event.source = source.map(str::to_string);
        event.aliases = aliases.to_vec();
        Some(event)
    }
}

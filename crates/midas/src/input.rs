//! Decoding of event lines read by `midas run`.

use midas_midi::{DeviceRegistry, MidiEvent};
use thiserror::Error;

/// Why a line did not yield an event.
#[derive(Debug, Error)]
pub enum LineError {
    /// A token was not a hex byte.
    #[error("invalid hex byte '{0}'")]
    Hex(String),
    /// The bytes are not a channel-voice message.
    #[error("not a channel message")]
    Undecodable,
    /// The line is not a JSON event.
    #[error("invalid event: {0}")]
    Json(#[from] serde_json::Error),
}

/// Turns input lines into events tagged with their source and aliases.
pub struct LineDecoder<'a> {
    /// Lines are hex bytes rather than JSON.
    pub raw: bool,
    /// Port attached to raw events.
    pub source: Option<&'a str>,
    /// Virtual devices used to resolve aliases.
    pub devices: &'a DeviceRegistry,
}

impl LineDecoder<'_> {
    /// Decode one line. Blank lines and `#` comments yield `None`.
    pub fn decode(&self, line: &str) -> Result<Option<MidiEvent>, LineError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        if self.raw {
            let bytes = hex_bytes(line)?;
            let aliases = self
                .source
                .map(|s| self.devices.aliases_for(s))
                .unwrap_or_default();
            return MidiEvent::from_bytes(&bytes, self.source, &aliases)
                .map(Some)
                .ok_or(LineError::Undecodable);
        }
        let mut event: MidiEvent = serde_json::from_str(line)?;
        if event.aliases.is_empty()
            && let Some(source) = &event.source
        {
            event.aliases = self.devices.aliases_for(source);
        }
        Ok(Some(event))
    }
}

/// Parse `b0 07 7f`, `0xb0 0x07 0x7f` or `b0077f`.
fn hex_bytes(text: &str) -> Result<Vec<u8>, LineError> {
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.trim_start_matches("0x"))
        .collect();
    let mut pairs = Vec::new();
    for token in tokens {
        if token.len() > 2 && token.len() % 2 == 0 && token.is_ascii() {
            pairs.extend((0..token.len()).step_by(2).map(|i| &token[i..i + 2]));
        } else {
            pairs.push(token);
        }
    }
    pairs
        .into_iter()
        .map(|p| u8::from_str_radix(p, 16).map_err(|_| LineError::Hex(p.to_string())))
        .collect()
}

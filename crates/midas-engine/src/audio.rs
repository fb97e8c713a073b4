//! Discovery of adjustable audio outputs for `action.volume` targets.

use std::{collections::HashSet, sync::LazyLock, time::Duration};

use regex::Regex;
use tracing::debug;

use crate::system::{ProcessSpec, SystemOps};

/// `wpctl status` entry: `  48. Built-in Audio Analog Stereo  [vol: 0.40]`.
static WPCTL_ENTRY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s*(\d+)\.\s+([^\[]+)").ok());

/// Tree glyph prefixing every `wpctl status` entry line.
const TREE_BAR: char = '│';

/// An adjustable audio endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTarget {
    /// Identifier passed to the mixer (`@DEFAULT_SINK@`, `48`, ...).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// `default`, `sink` or `sink_input`.
    pub kind: String,
}

impl AudioTarget {
    fn new(id: impl Into<String>, name: impl Into<String>, kind: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.to_string(),
        }
    }
}

fn capture(system: &dyn SystemOps, spec: &ProcessSpec, timeout: Duration) -> String {
    system.capture(spec, timeout).unwrap_or_else(|e| {
        debug!(command = %spec, error = %e, "audio listing failed");
        String::new()
    })
}

fn parse_wpctl_status(output: &str) -> Vec<AudioTarget> {
    let Some(entry) = WPCTL_ENTRY.as_ref() else {
        return Vec::new();
    };
    let mut targets = vec![
        AudioTarget::new("@DEFAULT_AUDIO_SINK@", "System Default Output", "default"),
        AudioTarget::new("@DEFAULT_AUDIO_SOURCE@", "System Default Input", "default"),
    ];
    let mut section: Option<&str> = None;
    for line in output.lines().map(str::trim_end) {
        if line.contains("Sinks:") {
            section = Some("sink");
            continue;
        }
        if line.contains("Sink inputs:") {
            section = Some("sink_input");
            continue;
        }
        // Any other header (`Sources:`, `Video`, ...) ends the current section.
        if line.ends_with(':') || (!line.is_empty() && !line.starts_with(char::is_whitespace)) {
            section = None;
            continue;
        }
        if !line.trim_start().starts_with(TREE_BAR) {
            continue;
        }
        let (Some(kind), Some(caps)) = (section, entry.captures(line)) else {
            continue;
        };
        targets.push(AudioTarget::new(&caps[1], caps[2].trim(), kind));
    }
    targets
}

fn parse_pactl(sinks: &str, sink_inputs: &str) -> Vec<AudioTarget> {
    let mut targets = vec![
        AudioTarget::new("@DEFAULT_SINK@", "System Default Output", "default"),
        AudioTarget::new("@DEFAULT_SOURCE@", "System Default Input", "default"),
    ];
    for line in sinks.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if let [id, name, ..] = parts.as_slice() {
            targets.push(AudioTarget::new(*id, *name, "sink"));
        }
    }
    for line in sink_inputs.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if let [id, name, owner, ..] = parts.as_slice() {
            targets.push(AudioTarget::new(*id, format!("{owner} ({name})"), "sink_input"));
        }
    }
    targets
}

/// Volume targets known to the installed mixer (`wpctl`, else `pactl`),
/// defaults first, unique by id. Listing failures yield fewer targets, never an
/// error.
pub fn list_audio_targets(system: &dyn SystemOps, timeout: Duration) -> Vec<AudioTarget> {
    let targets = if system.which("wpctl") {
        let status = capture(system, &ProcessSpec::new("wpctl").arg("status"), timeout);
        if status.is_empty() {
            Vec::new()
        } else {
            parse_wpctl_status(&status)
        }
    } else if system.which("pactl") {
        let sinks = capture(
            system,
            &ProcessSpec::new("pactl").args(["list", "short", "sinks"]),
            timeout,
        );
        let inputs = capture(
            system,
            &ProcessSpec::new("pactl").args(["list", "short", "sink-inputs"]),
            timeout,
        );
        parse_pactl(&sinks, &inputs)
    } else {
        Vec::new()
    };

    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

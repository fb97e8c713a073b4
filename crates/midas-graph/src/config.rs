//! Typed node configuration.
//!
//! Nodes persist an open JSON object. Every read goes through [`Reader`], which
//! never fails: missing or ill-typed keys fall back to the documented default.
//! [`NodeConfig::parse`] turns the object into the variant for the node's type.

use serde_json::{Map, Value};

use crate::node::{
    ACTION_COMMAND, ACTION_SCRIPT, ACTION_SHORTCUT, ACTION_SOUND, ACTION_VOLUME, LOGIC_MAPPER,
    MIDI_INPUT,
};

/// Open key/value configuration as stored in workspace documents.
pub type ConfigMap = Map<String, Value>;

/// Prefix of renderer-only keys. These never survive into a node's config.
pub const DISPLAY_KEY_PREFIX: &str = "_display_";

/// Remove renderer-only keys from `map`.
pub fn strip_display_keys(map: &mut ConfigMap) {
    map.retain(|k, _| !k.starts_with(DISPLAY_KEY_PREFIX));
}

/// Render a scalar as text; strings are returned unquoted, null is `None`.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Lenient accessor over a [`ConfigMap`].
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a>(pub &'a ConfigMap);

impl<'a> Reader<'a> {
    /// Raw value, treating JSON null as absent.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Float, or `default` when missing or not numeric.
    pub fn f64(&self, key: &str, default: f64) -> f64 {
        self.opt_f64(key).unwrap_or(default)
    }

    /// Float when present and numeric.
    pub fn opt_f64(&self, key: &str) -> Option<f64> {
        let parsed = match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };
        parsed.filter(|f| f.is_finite())
    }

    /// Integer (floats truncate) when present and numeric.
    pub fn opt_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// 32-bit integer when present, numeric and in range.
    pub fn opt_i32(&self, key: &str) -> Option<i32> {
        self.opt_i64(key).and_then(|n| i32::try_from(n).ok())
    }

    /// Truthiness: numbers are true when non-zero, strings unless empty or a
    /// spelled-out false (`false`, `no`, `off`, `0`).
    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => {
                let s = s.trim().to_ascii_lowercase();
                !(s.is_empty() || matches!(s.as_str(), "false" | "no" | "off" | "0"))
            }
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::Null) => false,
        }
    }

    /// Scalar as text.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Array(_) | Value::Object(_) => None,
            v => value_text(v),
        }
    }

    /// Scalar as text, dropping empty strings.
    pub fn non_empty_text(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.is_empty())
    }

    /// List of strings. A lone non-empty string is a one-element list.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Device and profile constraints shared by every node type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// When non-empty, the event's source or one of its aliases must be listed.
    pub device_ports: Vec<String>,
    /// When set, the named profile must match the event.
    pub profile_id: Option<String>,
}

impl EventFilter {
    /// Read `device_ports` and `profile_id`.
    pub fn from_map(map: &ConfigMap) -> Self {
        let r = Reader(map);
        Self {
            device_ports: r.string_list("device_ports"),
            profile_id: r.non_empty_text("profile_id"),
        }
    }

    /// True when the filter constrains nothing.
    pub fn is_open(&self) -> bool {
        self.device_ports.is_empty() && self.profile_id.is_none()
    }
}

/// Response curve of a mapper node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Curve {
    /// Straight line.
    Linear,
    /// Logarithmic; compresses the high end.
    Log,
    /// Exponential; expands the high end.
    Exp,
    /// Quantized into `steps` buckets.
    Step,
    /// Unrecognized curve name, mapped as linear.
    Other(String),
}

impl Curve {
    /// Parse a curve name, case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Self::Linear,
            "log" => Self::Log,
            "exp" => Self::Exp,
            "step" => Self::Step,
            other => Self::Other(other.to_string()),
        }
    }
}

/// `logic.mapper` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    /// Lower input bound (default 0).
    pub input_min: f64,
    /// Upper input bound (default 127).
    pub input_max: f64,
    /// Lower output bound (default 0).
    pub output_min: f64,
    /// Upper output bound (default 127).
    pub output_max: f64,
    /// Response curve (default linear).
    pub curve: Curve,
    /// Bucket count for the step curve (default 8, floor 1).
    pub steps: i64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            input_min: 0.0,
            input_max: 127.0,
            output_min: 0.0,
            output_max: 127.0,
            curve: Curve::Linear,
            steps: 8,
        }
    }
}

impl MapperConfig {
    /// Read mapper keys leniently.
    pub fn from_map(map: &ConfigMap) -> Self {
        let r = Reader(map);
        let d = Self::default();
        Self {
            input_min: r.f64("input_min", d.input_min),
            input_max: r.f64("input_max", d.input_max),
            output_min: r.f64("output_min", d.output_min),
            output_max: r.f64("output_max", d.output_max),
            curve: r.text("curve").map_or(d.curve, |c| Curve::parse(&c)),
            steps: r.opt_i64("steps").unwrap_or(d.steps).max(1),
        }
    }
}

/// `action.volume` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeConfig {
    /// Lower input bound (default 0).
    pub input_min: f64,
    /// Upper input bound (default 127).
    pub input_max: f64,
    /// Level at `input_min` (default 0.0).
    pub output_min: f64,
    /// Level at `input_max` (default 1.0).
    pub output_max: f64,
    /// Sink or stream id; the backend default when unset.
    pub target_id: Option<String>,
    /// `default`, `sink` or `sink_input`.
    pub target_kind: String,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            input_min: 0.0,
            input_max: 127.0,
            output_min: 0.0,
            output_max: 1.0,
            target_id: None,
            target_kind: "default".to_string(),
        }
    }
}

impl VolumeConfig {
    /// Read volume keys leniently.
    pub fn from_map(map: &ConfigMap) -> Self {
        let r = Reader(map);
        let d = Self::default();
        Self {
            input_min: r.f64("input_min", d.input_min).trunc(),
            input_max: r.f64("input_max", d.input_max).trunc(),
            output_min: r.f64("output_min", d.output_min),
            output_max: r.f64("output_max", d.output_max),
            target_id: r.non_empty_text("target_id"),
            target_kind: r.non_empty_text("target_kind").unwrap_or(d.target_kind),
        }
    }
}

/// A command given either as one string or as an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Shell-style string.
    Text(String),
    /// Pre-split argv.
    Argv(Vec<String>),
}

impl CommandLine {
    /// Interpret a config value. Null and nested objects yield `None`.
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Null | Value::Object(_) => None,
            Value::Array(items) => Some(Self::Argv(items.iter().filter_map(value_text).collect())),
            other => value_text(other).map(Self::Text),
        }
    }
}

/// `action.command` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandConfig {
    /// Program (string or argv).
    pub command: Option<CommandLine>,
    /// Explicit argv; takes precedence over `command` outside shell mode.
    pub args: Option<CommandLine>,
    /// Working directory; empty means inherit.
    pub cwd: Option<String>,
    /// Run `command` through `sh -c`.
    pub shell: bool,
}

impl CommandConfig {
    /// Read command keys leniently.
    pub fn from_map(map: &ConfigMap) -> Self {
        let r = Reader(map);
        Self {
            command: r.get("command").and_then(CommandLine::from_value),
            args: r.get("args").and_then(CommandLine::from_value),
            cwd: r.non_empty_text("cwd"),
            shell: r.bool("shell", false),
        }
    }
}

/// `action.script` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptConfig {
    /// Script source; only string values count.
    pub script: Option<String>,
}

impl ScriptConfig {
    /// Read script keys leniently.
    pub fn from_map(map: &ConfigMap) -> Self {
        Self {
            script: Reader(map)
                .get("script")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

/// `action.shortcut` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutConfig {
    /// Key sequence in xdotool syntax, trimmed.
    pub sequence: String,
    /// Fire on `note_off` too.
    pub trigger_on_note_off: bool,
}

impl ShortcutConfig {
    /// Read shortcut keys leniently.
    pub fn from_map(map: &ConfigMap) -> Self {
        let r = Reader(map);
        Self {
            sequence: r.text("sequence").unwrap_or_default().trim().to_string(),
            trigger_on_note_off: r.bool("trigger_on_note_off", false),
        }
    }
}

/// `action.sound` parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundConfig {
    /// Audio file (`file`, falling back to `path`).
    pub file: Option<String>,
    /// Playback volume in [0, 1].
    pub volume: Option<f64>,
    /// Fire only on this exact value or velocity.
    pub trigger_value: Option<i32>,
    /// Fire only at or above this value or velocity.
    pub min_value: Option<i32>,
    /// Fire on `note_off` too.
    pub trigger_on_note_off: bool,
}

impl SoundConfig {
    /// Read sound keys leniently.
    pub fn from_map(map: &ConfigMap) -> Self {
        let r = Reader(map);
        Self {
            file: r.non_empty_text("file").or_else(|| r.non_empty_text("path")),
            volume: r.opt_f64("volume"),
            trigger_value: r.opt_i32("trigger_value"),
            min_value: r.opt_i32("min_value"),
            trigger_on_note_off: r.bool("trigger_on_note_off", false),
        }
    }
}

/// Behaviour parameters of a node, one variant per node type.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    /// `midi.input`: no parameters beyond the event filter.
    Input,
    /// `logic.mapper`.
    Mapper(MapperConfig),
    /// `action.volume`.
    Volume(VolumeConfig),
    /// `action.command`.
    Command(CommandConfig),
    /// `action.script`.
    Script(ScriptConfig),
    /// `action.shortcut`.
    Shortcut(ShortcutConfig),
    /// `action.sound`.
    Sound(SoundConfig),
    /// A type this build does not know.
    Other,
}

impl NodeConfig {
    /// Typed view of `map` for a node of `node_type`.
    pub fn parse(node_type: &str, map: &ConfigMap) -> Self {
        match node_type {
            MIDI_INPUT => Self::Input,
            LOGIC_MAPPER => Self::Mapper(MapperConfig::from_map(map)),
            ACTION_VOLUME => Self::Volume(VolumeConfig::from_map(map)),
            ACTION_COMMAND => Self::Command(CommandConfig::from_map(map)),
            ACTION_SCRIPT => Self::Script(ScriptConfig::from_map(map)),
            ACTION_SHORTCUT => Self::Shortcut(ShortcutConfig::from_map(map)),
            ACTION_SOUND => Self::Sound(SoundConfig::from_map(map)),
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(v: Value) -> ConfigMap {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn mapper_defaults_and_garbage() {
        let m = MapperConfig::from_map(&map(json!({
            "input_min": "10",
            "input_max": "abc",
            "output_max": 100,
            "curve": "LOG",
            "steps": 0
        })));
        assert_eq!(m.input_min, 10.0);
        assert_eq!(m.input_max, 127.0);
        assert_eq!(m.output_min, 0.0);
        assert_eq!(m.output_max, 100.0);
        assert_eq!(m.curve, Curve::Log);
        assert_eq!(m.steps, 1);
        assert_eq!(MapperConfig::from_map(&ConfigMap::new()), MapperConfig::default());
    }

    #[test]
    fn command_forms() {
        let c = CommandConfig::from_map(&map(json!({
            "command": ["echo", 1, "two"],
            "cwd": "",
            "shell": "false"
        })));
        assert_eq!(
            c.command,
            Some(CommandLine::Argv(vec!["echo".into(), "1".into(), "two".into()]))
        );
        assert_eq!(c.args, None);
        assert_eq!(c.cwd, None);
        assert!(!c.shell);

        let c = CommandConfig::from_map(&map(json!({"command": "ls -l", "shell": 1})));
        assert_eq!(c.command, Some(CommandLine::Text("ls -l".into())));
        assert!(c.shell);
    }

    #[test]
    fn filter_reads_ports_and_profile() {
        let f = EventFilter::from_map(&map(json!({
            "device_ports": ["a", "b"],
            "profile_id": ""
        })));
        assert_eq!(f.device_ports, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(f.profile_id, None);
        assert!(!f.is_open());
        assert!(EventFilter::from_map(&ConfigMap::new()).is_open());
    }

    #[test]
    fn sound_path_fallback() {
        let s = SoundConfig::from_map(&map(json!({
            "file": "",
            "path": "~/click.wav",
            "volume": "0.5",
            "trigger_value": "x",
            "min_value": 3.9
        })));
        assert_eq!(s.file.as_deref(), Some("~/click.wav"));
        assert_eq!(s.volume, Some(0.5));
        assert_eq!(s.trigger_value, None);
        assert_eq!(s.min_value, Some(3));
    }

    #[test]
    fn display_keys_are_stripped() {
        let mut m = map(json!({"_display_value": 0.5, "_display_active": true, "curve": "exp"}));
        strip_display_keys(&mut m);
        assert_eq!(m.len(), 1);
        assert!(m.contains_key("curve"));
    }

    #[test]
    fn unknown_type_is_other() {
        assert_eq!(NodeConfig::parse("logic.gate", &ConfigMap::new()), NodeConfig::Other);
        assert_eq!(NodeConfig::parse("midi.input", &ConfigMap::new()), NodeConfig::Input);
    }
}

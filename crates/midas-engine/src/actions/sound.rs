use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use midas_graph::{Node, NodeConfig, SoundConfig};
use midas_midi::{MessageType, MidiEvent};
use tracing::{debug, info, warn};

use super::{Action, ActionContext, ValueDebounce, WarnOnce};
use crate::{
    Result,
    system::{ProcessSpec, SystemOps},
};

/// Command-line audio players, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Player {
    Ffplay,
    Paplay,
    Cvlc,
    Play,
    Aplay,
}

impl Player {
    const ALL: [Self; 5] = [Self::Ffplay, Self::Paplay, Self::Cvlc, Self::Play, Self::Aplay];

    fn program(self) -> &'static str {
        match self {
            Self::Ffplay => "ffplay",
            Self::Paplay => "paplay",
            Self::Cvlc => "cvlc",
            Self::Play => "play",
            Self::Aplay => "aplay",
        }
    }

    fn supports_volume(self) -> bool {
        !matches!(self, Self::Aplay)
    }
}

/// Picks a player once and builds its command lines.
struct SoundPlayer {
    system: Arc<dyn SystemOps>,
    /// Installed players, found on first use.
    installed: Option<Vec<Player>>,
    current: Option<Player>,
    warned: WarnOnce,
}

impl SoundPlayer {
    fn new(system: Arc<dyn SystemOps>) -> Self {
        Self {
            system,
            installed: None,
            current: None,
            warned: WarnOnce::default(),
        }
    }

    fn detect_players(&mut self) {
        if self.installed.is_some() {
            return;
        }
        let found: Vec<Player> = Player::ALL
            .into_iter()
            .filter(|p| self.system.which(p.program()))
            .collect();
        self.current = found.first().copied();
        self.installed = Some(found);
    }

    fn warn_volume_unsupported(&mut self, player: Player) {
        if self.warned.first(&format!("volume:{}", player.program())) {
            warn!(
                backend = player.program(),
                "volume control is not supported by this player; ignoring configured volume"
            );
        }
    }

    /// Start playing `path`. `volume` is in [0, 1]; `None` plays at full level.
    fn play(&mut self, path: &Path, volume: Option<f64>) -> Result<()> {
        self.detect_players();
        let Some(mut player) = self.current else {
            if self.warned.first("no-backend") {
                warn!("no audio player found; install ffplay, paplay, cvlc, play or aplay");
            }
            return Ok(());
        };

        if volume.is_some() && !player.supports_volume() {
            let fallback = self
                .installed
                .iter()
                .flatten()
                .copied()
                .find(|p| p.supports_volume());
            if let Some(fallback) = fallback {
                debug!(
                    from = player.program(),
                    to = fallback.program(),
                    "switching player for volume control"
                );
                player = fallback;
                self.current = Some(fallback);
            }
        }

        let file = path.to_string_lossy().into_owned();
        info!(file = %file, backend = player.program(), "playing sound");
        let spec = match (player, volume) {
            (Player::Paplay, Some(v)) => {
                let pulse = ((v * 65536.0).round_ties_even() as i64).clamp(0, 65536);
                ProcessSpec::new("paplay").arg(format!("--volume={pulse}"))
            }
            (Player::Ffplay, v) => {
                let spec = ProcessSpec::new("ffplay").args(["-nodisp", "-autoexit", "-loglevel", "error"]);
                match v {
                    Some(v) => spec.arg("-af").arg(format!("volume={v:.4}")),
                    None => spec,
                }
            }
            (Player::Cvlc, v) => {
                let spec = ProcessSpec::new("cvlc").args(["--play-and-exit", "--intf", "dummy"]);
                match v {
                    Some(v) => spec.arg("--gain").arg(format!("{:.3}", v.clamp(0.0, 8.0))),
                    None => spec,
                }
            }
            (Player::Play, v) => {
                let spec = ProcessSpec::new("play").arg("-q");
                match v {
                    Some(v) => spec.arg("-v").arg(format!("{v:.3}")),
                    None => spec,
                }
            }
            (Player::Aplay, Some(v)) => {
                if let Some(producer) = self.volume_producer(&file, v) {
                    let consumer = ProcessSpec::new("aplay").args(["-q", "-"]).quiet();
                    return self.system.spawn_pipeline(&producer.quiet(), &consumer);
                }
                self.warn_volume_unsupported(Player::Aplay);
                ProcessSpec::new("aplay")
            }
            (p, None) => ProcessSpec::new(p.program()),
        };
        self.system.spawn(&spec.arg(file).quiet())
    }

    /// Decoder that writes `file` as WAV on stdout with `volume` applied.
    fn volume_producer(&self, file: &str, volume: f64) -> Option<ProcessSpec> {
        if self.system.which("ffmpeg") {
            Some(ProcessSpec::new("ffmpeg").args([
                "-hide_banner".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-i".to_string(),
                file.to_string(),
                "-filter:a".to_string(),
                format!("volume={volume:.4}"),
                "-f".to_string(),
                "wav".to_string(),
                "pipe:1".to_string(),
            ]))
        } else if self.system.which("sox") {
            Some(ProcessSpec::new("sox").args([
                "-q".to_string(),
                file.to_string(),
                "-t".to_string(),
                "wav".to_string(),
                "-".to_string(),
                "vol".to_string(),
                format!("{volume:.3}"),
            ]))
        } else {
            None
        }
    }
}

/// Expand a leading `~` against `home`. Other forms are returned as-is.
fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    if let (Some(rest), Some(home)) = (path.strip_prefix('~'), home) {
        if rest.is_empty() {
            return home.to_path_buf();
        }
        if let Some(tail) = rest.strip_prefix('/') {
            return home.join(tail);
        }
    }
    PathBuf::from(path)
}

/// Absolute location of a configured sound file.
fn resolve_path(configured: &str) -> Option<PathBuf> {
    let home = dirs::home_dir();
    let path = expand_home(configured, home.as_deref());
    if path.is_absolute() {
        return Some(path);
    }
    env::current_dir().ok().map(|cwd| cwd.join(path))
}

/// `action.sound`: plays an audio file when triggered.
pub struct SoundAction {
    player: SoundPlayer,
    debounce: ValueDebounce,
    warned: WarnOnce,
}

impl SoundAction {
    /// New action playing through `system`.
    pub fn new(system: Arc<dyn SystemOps>) -> Self {
        Self {
            player: SoundPlayer::new(system),
            debounce: ValueDebounce::default(),
            warned: WarnOnce::default(),
        }
    }

    fn should_trigger(&mut self, event: &MidiEvent, config: &SoundConfig) -> bool {
        let passes = |v: i32| {
            config.trigger_value.is_none_or(|t| v == t) && config.min_value.is_none_or(|m| v >= m)
        };
        match event.message_type {
            MessageType::ControlChange => {
                self.debounce.changed(event) && passes(event.value.unwrap_or(0))
            }
            MessageType::NoteOn => {
                let velocity = event.velocity.unwrap_or(0);
                velocity > 0 && passes(velocity)
            }
            MessageType::NoteOff => config.trigger_on_note_off,
            _ => false,
        }
    }
}

impl Action for SoundAction {
    fn handle(&mut self, event: &MidiEvent, node: &Node, _ctx: &ActionContext<'_>) -> Result<()> {
        let NodeConfig::Sound(config) = node.config() else {
            return Ok(());
        };
        let Some(configured) = config.file.as_deref() else {
            debug!(node = %node.id, "sound node has no file configured");
            return Ok(());
        };
        let Some(path) = resolve_path(configured) else {
            if self.warned.first(configured) {
                warn!(node = %node.id, path = configured, "could not resolve sound path");
            }
            return Ok(());
        };
        if !path.exists() {
            if self.warned.first(configured) {
                warn!(node = %node.id, path = %path.display(), "sound file does not exist");
            }
            return Ok(());
        }
        self.warned.clear(configured);

        if !self.should_trigger(event, config) {
            return Ok(());
        }

        let volume = config
            .volume
            .map(|v| v.clamp(0.0, 1.0))
            .filter(|v| (v - 1.0).abs() > 1e-6);
        self.player.play(&path, volume)
    }
}

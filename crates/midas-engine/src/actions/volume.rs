use std::{fmt, sync::Arc, time::Duration};

use midas_graph::{Node, NodeConfig, VolumeConfig};
use midas_midi::MidiEvent;
use tracing::{debug, info, warn};

use super::{Action, ActionContext};
use crate::{
    Result,
    system::{ProcessSpec, SystemOps},
};

/// Mixer command line used to change volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeBackend {
    /// PipeWire's `wpctl`.
    Wpctl,
    /// PulseAudio's `pactl`.
    Pactl,
}

impl VolumeBackend {
    /// First backend installed on the system.
    pub fn detect(system: &dyn SystemOps) -> Option<Self> {
        if system.which("wpctl") {
            Some(Self::Wpctl)
        } else if system.which("pactl") {
            Some(Self::Pactl)
        } else {
            None
        }
    }

    /// Command setting `level` (0..=1) on `target`, or on the default sink.
    pub fn command(self, level: f64, target_id: Option<&str>, target_kind: &str) -> ProcessSpec {
        let level = level.clamp(0.0, 1.0);
        match self {
            Self::Wpctl => ProcessSpec::new("wpctl").args([
                "set-volume".to_string(),
                target_id.unwrap_or("@DEFAULT_AUDIO_SINK@").to_string(),
                format!("{level:.3}"),
            ]),
            Self::Pactl => {
                let verb = if target_kind == "sink_input" {
                    "set-sink-input-volume"
                } else {
                    "set-sink-volume"
                };
                let percent = (level * 100.0).round_ties_even() as i64;
                ProcessSpec::new("pactl").args([
                    verb.to_string(),
                    target_id.unwrap_or("@DEFAULT_SINK@").to_string(),
                    format!("{percent}%"),
                ])
            }
        }
    }
}

impl fmt::Display for VolumeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wpctl => "wpctl",
            Self::Pactl => "pactl",
        })
    }
}

/// Level in [0, 1] for `value` under `config`.
pub(crate) fn volume_level(config: &VolumeConfig, value: i32) -> f64 {
    let span = (config.input_max - config.input_min).max(1.0);
    let normalized = ((f64::from(value) - config.input_min) / span).clamp(0.0, 1.0);
    (config.output_min + normalized * (config.output_max - config.output_min)).clamp(0.0, 1.0)
}

/// `action.volume`: drives the system mixer from a controller value.
pub struct VolumeAction {
    system: Arc<dyn SystemOps>,
    timeout: Duration,
    /// Detected on first use.
    backend: Option<Option<VolumeBackend>>,
    last_value: Option<i32>,
    warned_missing: bool,
}

impl VolumeAction {
    /// New action running mixer commands through `system`.
    pub fn new(system: Arc<dyn SystemOps>, timeout: Duration) -> Self {
        Self {
            system,
            timeout,
            backend: None,
            last_value: None,
            warned_missing: false,
        }
    }

    fn backend(&mut self) -> Option<VolumeBackend> {
        *self
            .backend
            .get_or_insert_with(|| VolumeBackend::detect(self.system.as_ref()))
    }
}

impl Action for VolumeAction {
    fn handle(&mut self, event: &MidiEvent, node: &Node, _ctx: &ActionContext<'_>) -> Result<()> {
        let Some(value) = event.value else {
            return Ok(());
        };
        if self.last_value == Some(value) {
            return Ok(());
        }
        self.last_value = Some(value);

        let NodeConfig::Volume(config) = node.config() else {
            debug!(node = %node.id, "volume action on a node without volume config");
            return Ok(());
        };
        let level = volume_level(config, value);

        let Some(backend) = self.backend() else {
            if !self.warned_missing {
                warn!("no volume backend found; install PipeWire (wpctl) or PulseAudio (pactl)");
                self.warned_missing = true;
            }
            return Ok(());
        };

        let spec = backend.command(level, config.target_id.as_deref(), &config.target_kind);
        info!(node = %node.id, %backend, level, "setting volume");
        self.system.run(&spec, self.timeout)
    }
}

//! Subcommand implementations.

use std::{
    io::{self, BufRead},
    path::Path,
    sync::Arc,
};

use midas_engine::{Dispatcher, DisplayUpdate, Engine, EngineConfig, RealSystem, audio};
use midas_graph::{NodeGraph, templates};
use midas_midi::{ControlProfileStore, DeviceRegistry};
use midas_workspace::{import_workspace, load, preset, save};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

use crate::{
    cli::{AudioArgs, PresetArgs, RunArgs, WorkspaceArgs},
    error::{Error, Result},
    input::LineDecoder,
};

/// A workspace loaded into live state.
struct Loaded {
    graph: NodeGraph,
    profiles: ControlProfileStore,
    devices: DeviceRegistry,
    active_devices: Vec<String>,
}

fn load_workspace(path: &Path) -> Result<Loaded> {
    let doc = load(path)?;
    let mut loaded = Loaded {
        graph: NodeGraph::new(),
        profiles: ControlProfileStore::new(),
        devices: DeviceRegistry::new(),
        active_devices: Vec::new(),
    };
    loaded.active_devices = import_workspace(
        &mut loaded.graph,
        &mut loaded.profiles,
        &mut loaded.devices,
        &doc,
    );
    if loaded.graph.len() < doc.nodes.len() {
        warn!(
            skipped = doc.nodes.len() - loaded.graph.len(),
            "some nodes could not be loaded"
        );
    }
    Ok(loaded)
}

/// `midas run`: dispatch stdin events until EOF.
pub fn run(args: &RunArgs) -> Result<()> {
    let path = &args.workspace.workspace;
    let Loaded {
        graph,
        profiles,
        devices,
        active_devices,
    } = load_workspace(path)?;

    let workspace_id = args.workspace_id.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| EngineConfig::default().workspace_id)
    });
    info!(
        workspace = %path.display(),
        %workspace_id,
        nodes = graph.len(),
        ports = ?devices.expand_ports(active_devices.iter().map(String::as_str)),
        "running workspace"
    );

    let mut engine = Engine::new(
        Arc::new(RwLock::new(graph)),
        Arc::new(RwLock::new(profiles)),
        EngineConfig {
            workspace_id,
            external_timeout: args.timeout,
        },
        Arc::new(RealSystem::new()),
    );
    let mut display = None;
    if args.show_display {
        let (tx, rx) = mpsc::unbounded_channel();
        engine.set_display_sender(Some(tx));
        display = Some(rx);
    }
    let dispatcher = Dispatcher::spawn(engine)?;

    let decoder = LineDecoder {
        raw: args.raw,
        source: args.source.as_deref(),
        devices: &devices,
    };
    for (index, line) in io::stdin().lock().lines().enumerate() {
        let line = line?;
        let event = match decoder.decode(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                warn!(line = index + 1, error = %err, "skipping input line");
                continue;
            }
        };
        match dispatcher.dispatch(event) {
            Some(roots) if roots.is_empty() => debug!(line = index + 1, "no node triggered"),
            Some(roots) => info!(line = index + 1, ?roots, "dispatched"),
            None => {
                warn!("dispatch thread stopped");
                break;
            }
        }
        if let Some(rx) = display.as_mut() {
            print_display(rx);
        }
    }

    dispatcher.shutdown();
    Ok(())
}

fn print_display(rx: &mut UnboundedReceiver<DisplayUpdate>) {
    while let Ok(DisplayUpdate { node_id, state }) = rx.try_recv() {
        println!(
            "{node_id}\tvalue={:.3}\tactive={}\traw={}",
            state.value, state.active, state.raw
        );
    }
}

/// `midas check`: load a workspace and summarize it.
pub fn check(args: &WorkspaceArgs) -> Result<()> {
    let loaded = load_workspace(&args.workspace)?;
    println!("nodes: {}", loaded.graph.len());
    println!("connections: {}", loaded.graph.connections().len());
    println!("groups: {}", loaded.graph.groups().len());
    println!("profiles: {}", loaded.profiles.len());
    println!("virtual devices: {}", loaded.devices.virtual_devices().len());
    println!("active devices: {}", loaded.active_devices.join(", "));
    Ok(())
}

/// `midas templates`: list node types.
pub fn templates_list() {
    for t in templates() {
        let inputs: Vec<_> = t.inputs.iter().map(|(name, _)| *name).collect();
        let outputs: Vec<_> = t.outputs.iter().map(|(name, _)| *name).collect();
        println!(
            "{:<16} {:<8} {:<18} in=[{}] out=[{}]  {}",
            t.node_type,
            t.category,
            t.title,
            inputs.join(","),
            outputs.join(","),
            t.description
        );
    }
}

/// `midas preset`: write a built-in preset.
pub fn write_preset(args: &PresetArgs) -> Result<()> {
    let preset = preset(&args.id).ok_or_else(|| Error::UnknownPreset(args.id.clone()))?;
    save(&args.out, &preset.document())?;
    println!("wrote {} ({}) to {}", preset.name, preset.id, args.out.display());
    Ok(())
}

/// `midas audio-targets`: list mixer targets.
pub fn audio_targets(args: &AudioArgs) {
    let targets = audio::list_audio_targets(&RealSystem::new(), args.timeout);
    if targets.is_empty() {
        warn!("no mixer found (wpctl or pactl)");
    }
    for t in targets {
        println!("{}\t{}\t{}", t.id, t.kind, t.name);
    }
}

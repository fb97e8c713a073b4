use std::thread;

use crossbeam_channel::{self as chan, Sender};
use midas_midi::MidiEvent;
use tracing::{debug, trace};

use crate::{Engine, Error, Result};

/// Thread name of the dispatch worker.
const THREAD_NAME: &str = "midas-dispatch";

enum Job {
    /// Dispatch an event, optionally replying with the triggered roots.
    Event {
        event: MidiEvent,
        reply: Option<Sender<Vec<String>>>,
    },
    Shutdown,
}

/// Runs an [`Engine`] on its own thread.
///
/// Events are handled strictly in submission order by a single consumer, so
/// action state never sees concurrent calls.
pub struct Dispatcher {
    tx: Sender<Job>,
    handle: Option<thread::JoinHandle<Engine>>,
}

impl Dispatcher {
    /// Move `engine` onto a new dispatch thread.
    pub fn spawn(mut engine: Engine) -> Result<Self> {
        let (tx, rx) = chan::unbounded::<Job>();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Event { event, reply } => {
                            let roots = engine.handle_event(&event);
                            if let Some(reply) = reply {
                                reply.send(roots).ok();
                            }
                        }
                        Job::Shutdown => break,
                    }
                }
                debug!("dispatch thread exiting");
                engine
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue `event` without waiting.
    pub fn submit(&self, event: MidiEvent) -> Result<()> {
        self.tx
            .send(Job::Event { event, reply: None })
            .map_err(|_| Error::ChannelClosed)
    }

    /// Dispatch `event` and wait for the triggered roots. `None` once the
    /// thread has stopped.
    pub fn dispatch(&self, event: MidiEvent) -> Option<Vec<String>> {
        let (reply, rx) = chan::bounded(1);
        self.tx
            .send(Job::Event {
                event,
                reply: Some(reply),
            })
            .ok()?;
        rx.recv().ok()
    }

    /// Finish queued events, stop the thread and hand the engine back.
    pub fn shutdown(mut self) -> Option<Engine> {
        self.stop()
    }

    fn stop(&mut self) -> Option<Engine> {
        let handle = self.handle.take()?;
        self.tx.send(Job::Shutdown).ok();
        match handle.join() {
            Ok(engine) => Some(engine),
            Err(_) => {
                trace!("dispatch thread panicked");
                None
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use midas_graph::{ACTION_COMMAND, MIDI_INPUT, NodeGraph, template};
    use midas_midi::ControlProfileStore;
    use parking_lot::RwLock;

    use super::*;
    use crate::{EngineConfig, system::MockSystem};

    #[test]
    fn dispatches_in_order_and_returns_engine() {
        let mut graph = NodeGraph::new();
        graph.add_node(template(MIDI_INPUT).unwrap().instantiate("in"));
        let mut cmd = template(ACTION_COMMAND).unwrap().instantiate("cmd");
        cmd.set_config_value("command", serde_json::json!("true"));
        graph.add_node(cmd);
        assert!(graph.connect("in", "message", "cmd", "trigger"));

        let mock = MockSystem::new();
        let engine = Engine::new(
            Arc::new(RwLock::new(graph)),
            Arc::new(RwLock::new(ControlProfileStore::new())),
            EngineConfig::default(),
            Arc::new(mock.clone()),
        );
        let dispatcher = Dispatcher::spawn(engine).unwrap();
        dispatcher.submit(MidiEvent::note_on(0, 60, 10)).unwrap();
        dispatcher.submit(MidiEvent::note_on(0, 61, 10)).unwrap();
        let roots = dispatcher.dispatch(MidiEvent::note_on(0, 62, 10)).unwrap();
        assert_eq!(roots, vec!["in"]);

        let notes: Vec<_> = mock
            .calls()
            .iter()
            .map(|c| c.spec().env_var("MIDI_NOTE").unwrap_or_default().to_string())
            .collect();
        assert_eq!(notes, vec!["60", "61", "62"]);

        let engine = dispatcher.shutdown().unwrap();
        assert_eq!(engine.config().workspace_id, "default");
    }
}

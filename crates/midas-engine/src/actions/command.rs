use std::{mem, sync::Arc};

use midas_graph::{CommandLine, Node, NodeConfig};
use midas_midi::{MessageType, MidiEvent};
use tracing::debug;

use super::{Action, ActionContext, ValueDebounce};
use crate::{
    Error, Result,
    system::{ProcessSpec, SystemOps},
};

/// Split `line` into words the way a POSIX shell would, without expansion.
///
/// Single quotes are literal; inside double quotes a backslash only escapes
/// `"` and `\`; elsewhere a backslash escapes any character. Empty quotes
/// produce an empty word.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => word.push(ch),
                        None => return Err(Error::Msg("no closing quotation".into())),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => word.push(ch),
                            Some(ch) => {
                                word.push('\\');
                                word.push(ch);
                            }
                            None => return Err(Error::Msg("no closing quotation".into())),
                        },
                        Some(ch) => word.push(ch),
                        None => return Err(Error::Msg("no closing quotation".into())),
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(ch) => word.push(ch),
                    None => return Err(Error::Msg("no escaped character".into())),
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}

/// Argument vector for a configured command line.
fn argv(line: Option<&CommandLine>) -> Result<Vec<String>> {
    match line {
        None => Ok(Vec::new()),
        Some(CommandLine::Argv(words)) => Ok(words.clone()),
        Some(CommandLine::Text(text)) => split_command_line(text),
    }
}

fn env_text(v: Option<i32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

/// `action.command`: starts an external program per trigger.
pub struct CommandAction {
    system: Arc<dyn SystemOps>,
    debounce: ValueDebounce,
}

impl CommandAction {
    /// New action spawning through `system`.
    pub fn new(system: Arc<dyn SystemOps>) -> Self {
        Self {
            system,
            debounce: ValueDebounce::default(),
        }
    }
}

impl Action for CommandAction {
    fn handle(&mut self, event: &MidiEvent, node: &Node, ctx: &ActionContext<'_>) -> Result<()> {
        let NodeConfig::Command(config) = node.config() else {
            return Ok(());
        };
        if config.command.is_none() && config.args.is_none() {
            return Ok(());
        }

        match event.message_type {
            MessageType::ControlChange if !self.debounce.changed(event) => return Ok(()),
            MessageType::NoteOn if event.velocity.unwrap_or(0) == 0 => return Ok(()),
            _ => {}
        }

        let spec = if config.shell {
            let text = match &config.command {
                Some(CommandLine::Text(s)) => s.clone(),
                Some(CommandLine::Argv(words)) => words.join(" "),
                None => String::new(),
            };
            if text.is_empty() {
                return Ok(());
            }
            ProcessSpec::new("sh").arg("-c").arg(text)
        } else {
            let mut words = argv(config.args.as_ref())?;
            if words.is_empty() {
                words = argv(config.command.as_ref())?;
            }
            let Some((program, rest)) = words.split_first() else {
                debug!(node = %node.id, "command resolved to an empty argument list");
                return Ok(());
            };
            ProcessSpec::new(program.as_str()).args(rest.iter().cloned())
        };

        let mut spec = spec
            .env("MIDI_VALUE", env_text(event.value))
            .env("MIDI_CONTROL", env_text(event.control))
            .env("MIDI_NOTE", env_text(event.note))
            .env("MIDI_CHANNEL", env_text(event.channel))
            .env("MIDI_TYPE", event.message_type.as_str())
            .env("MIDAS_WORKSPACE_ID", ctx.workspace_id);
        if let Some(dir) = &config.cwd {
            spec = spec.cwd(dir);
        }
        self.system.spawn(&spec)
    }
}

use std::result;

use midas_graph::{Node, NodeConfig};
use midas_midi::MidiEvent;
use rhai::{
    Dynamic, Engine, EvalAltResult, FLOAT, Scope, module_resolvers::DummyModuleResolver,
    serde::to_dynamic,
};
use serde_json::json;
use tracing::{debug, info};

use super::{Action, ActionContext};
use crate::{Result, script_cache::ScriptCache};

/// Largest string a script may build.
const MAX_STRING_SIZE: usize = 64 * 1024;
/// Largest array or object map a script may build.
const MAX_COLLECTION_SIZE: usize = 10_000;

/// Return type of native helpers registered with rhai.
type NativeResult<T> = result::Result<T, Box<EvalAltResult>>;

/// Read a rhai number (int or float) as a float.
fn number(value: &Dynamic) -> NativeResult<FLOAT> {
    if let Ok(f) = value.as_float() {
        return Ok(f);
    }
    value
        .as_int()
        .map(|i| i as FLOAT)
        .map_err(|ty| format!("expected a number, got {ty}").into())
}

/// `scale(v, in_lo, in_hi, out_lo, out_hi)`: linear rescale, unclamped.
fn scale(
    v: Dynamic,
    in_lo: Dynamic,
    in_hi: Dynamic,
    out_lo: Dynamic,
    out_hi: Dynamic,
) -> NativeResult<FLOAT> {
    let (v, in_lo, in_hi) = (number(&v)?, number(&in_lo)?, number(&in_hi)?);
    let (out_lo, out_hi) = (number(&out_lo)?, number(&out_hi)?);
    let span = in_hi - in_lo;
    if span == 0.0 {
        return Ok(out_lo);
    }
    Ok(out_lo + (v - in_lo) / span * (out_hi - out_lo))
}

/// `clamp(v, lo, hi)`.
fn clamp(v: Dynamic, lo: Dynamic, hi: Dynamic) -> NativeResult<FLOAT> {
    let (v, lo, hi) = (number(&v)?, number(&lo)?, number(&hi)?);
    Ok(v.max(lo.min(hi)).min(lo.max(hi)))
}

/// Engine with the sandbox limits applied and no access outside the script.
fn sandboxed_engine() -> Engine {
    let mut engine = Engine::new();
    engine.on_print(|s| info!(target: "midas::script", "{}", s));
    engine.on_debug(|s, src, pos| {
        debug!(target: "midas::script", "{} @ {:?}:{:?}", s, src, pos);
    });

    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");

    engine.set_max_operations(200_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(128, 64);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_COLLECTION_SIZE);
    engine.set_max_map_size(MAX_COLLECTION_SIZE);

    engine.register_fn("scale", scale);
    engine.register_fn("clamp", clamp);
    engine
}

/// `action.script`: runs a Rhai snippet per event.
///
/// The script sees three constants: `event` (the MIDI fields), `node` (`id`,
/// `type`, `title`, `config`) and `context` (`workspace_id`, `node_count`).
pub struct ScriptAction {
    engine: Engine,
    cache: ScriptCache,
}

impl Default for ScriptAction {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptAction {
    /// New action with an empty compile cache.
    pub fn new() -> Self {
        Self {
            engine: sandboxed_engine(),
            cache: ScriptCache::new(),
        }
    }
}

impl Action for ScriptAction {
    fn handle(&mut self, event: &MidiEvent, node: &Node, ctx: &ActionContext<'_>) -> Result<()> {
        let NodeConfig::Script(config) = node.config() else {
            return Ok(());
        };
        let Some(source) = config.script.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(());
        };

        let ast = self.cache.get_or_compile(&self.engine, source)?;

        let mut scope = Scope::new();
        scope.push_constant("event", to_dynamic(event)?);
        scope.push_constant(
            "node",
            to_dynamic(json!({
                "id": node.id,
                "type": node.node_type,
                "title": node.title,
                "config": node.config_map(),
            }))?,
        );
        scope.push_constant(
            "context",
            to_dynamic(json!({
                "workspace_id": ctx.workspace_id,
                "node_count": ctx.graph.len(),
            }))?,
        );

        self.engine.run_ast_with_scope(&mut scope, &ast)?;
        Ok(())
    }
}

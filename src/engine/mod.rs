//! Scripting Engine (C5): one QuickJS interpreter per [`ScriptEngine`]
//! instance, a `ctxforge:*` host module loader, and the global host
//! surface (`ctx`, `output`, `tui`, `context`, `system`, `splitDiff`)
//! scripts call into.
//!
//! `rquickjs` was picked over `v8`/`deno_core` for this host: the
//! scripting model here is single-threaded and cooperative (one script
//! runs to completion per command dispatch, never concurrently with
//! another), which matches QuickJS's embedding story directly rather than
//! paying for an Isolate/snapshot model built for concurrent, long-lived
//! JS heaps.

mod host;
mod loader;
mod template;

pub use host::HostEnvironment;
pub use template::{render_template, TemplateError};

use rquickjs::{CatchResultExt, Context, Module, Runtime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("script load error in {name}: {message}")]
    Load { name: String, message: String },

    #[error("uncaught script error: {0}")]
    Runtime(String),

    #[error("unknown host module: {0}")]
    UnknownModule(String),

    #[error("interpreter setup failed: {0}")]
    Setup(String),
}

/// A loaded-but-not-yet-executed script: `{name, path, content,
/// description}`. May be executed more than once (a script can be loaded
/// again as a nested sub-script).
#[derive(Debug, Clone)]
pub struct Script {
    pub name: String,
    pub path: String,
    pub content: String,
    pub description: String,
}

impl Script {
    pub fn from_string(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            content: content.into(),
            description: String::new(),
        }
    }
}

/// One interpreter instance. Not shared across concurrent callers — the
/// host is expected to construct a fresh `ScriptEngine` per invocation
/// that needs one.
pub struct ScriptEngine {
    runtime: Runtime,
    context: Context,
    test_mode: bool,
}

impl ScriptEngine {
    pub fn new(host: HostEnvironment) -> Result<Self, EngineError> {
        let runtime = Runtime::new().map_err(|e| EngineError::Setup(e.to_string()))?;
        let context = Context::full(&runtime).map_err(|e| EngineError::Setup(e.to_string()))?;
        runtime.set_loader(loader::CtxforgeResolver, loader::CtxforgeLoader::new());

        let test_mode = host.test_mode;
        let engine_context = context.clone();
        context
            .with(|ctx| -> rquickjs::Result<()> {
                host::install(&ctx, host, engine_context)?;
                Ok(())
            })
            .map_err(|e| EngineError::Setup(e.to_string()))?;

        Ok(Self { runtime, context, test_mode })
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    /// Parses `script.content` as a module. Syntax errors are reported
    /// with source location via QuickJS's own diagnostic formatting.
    pub fn load_script(&self, script: &Script) -> Result<(), EngineError> {
        self.context
            .with(|ctx| -> Result<(), EngineError> {
                Module::declare(ctx.clone(), script.path.clone(), script.content.clone())
                    .catch(&ctx)
                    .map_err(|e| EngineError::Load {
                        name: script.name.clone(),
                        message: e.to_string(),
                    })?;
                Ok(())
            })
    }

    /// Runs `script` to completion (registering modes/commands as a side
    /// effect via the host globals). Uncaught exceptions surface as
    /// [`EngineError::Runtime`]; the caller is responsible for mapping
    /// that to a non-zero process exit code.
    pub fn execute_script(&self, script: &Script) -> Result<(), EngineError> {
        self.context
            .with(|ctx| -> Result<(), EngineError> {
                let (decl, _) = Module::declare(ctx.clone(), script.path.clone(), script.content.clone())
                    .catch(&ctx)
                    .map_err(|e| EngineError::Load {
                        name: script.name.clone(),
                        message: e.to_string(),
                    })?
                    .eval()
                    .catch(&ctx)
                    .map_err(|e| EngineError::Runtime(e.to_string()))?;
                let _ = decl;
                Ok(())
            })?;
        // Drain any pending microtasks/jobs the module's top-level code
        // scheduled (promise continuations, timers are not offered here).
        while self.runtime.is_job_pending() {
            self.runtime
                .execute_pending_job()
                .map_err(|e| EngineError::Runtime(format!("{e:?}")))?;
        }
        Ok(())
    }

    pub fn set_global(&self, name: &str, value: serde_json::Value) -> Result<(), EngineError> {
        self.context
            .with(|ctx| -> rquickjs::Result<()> {
                let js_value = host::json_to_js(&ctx, &value)?;
                ctx.globals().set(name, js_value)?;
                Ok(())
            })
            .map_err(|e| EngineError::Runtime(e.to_string()))
    }

    pub fn get_global(&self, name: &str) -> Result<serde_json::Value, EngineError> {
        self.context
            .with(|ctx| -> rquickjs::Result<serde_json::Value> {
                let value: rquickjs::Value = ctx.globals().get(name)?;
                host::js_to_json(&value)
            })
            .map_err(|e| EngineError::Runtime(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn executes_a_trivial_script_and_prints_via_host_output() {
        let printed = Arc::new(Mutex::new(Vec::new()));
        let printed_clone = printed.clone();
        let host = HostEnvironment::minimal_for_test(Box::new(move |line| {
            printed_clone.lock().unwrap().push(line.to_string());
        }));

        let engine = ScriptEngine::new(host).unwrap();
        let script = Script::from_string("inline", "output.print('hello from script');");
        engine.execute_script(&script).unwrap();

        assert_eq!(printed.lock().unwrap().as_slice(), &["hello from script".to_string()]);
    }

    #[test]
    fn uncaught_exception_surfaces_as_runtime_error() {
        let host = HostEnvironment::minimal_for_test(Box::new(|_| {}));
        let engine = ScriptEngine::new(host).unwrap();
        let script = Script::from_string("inline", "throw new Error('boom');");
        assert!(matches!(engine.execute_script(&script), Err(EngineError::Runtime(_))));
    }

    #[test]
    fn split_diff_global_is_reachable_from_script() {
        let host = HostEnvironment::minimal_for_test(Box::new(|_| {}));
        let engine = ScriptEngine::new(host).unwrap();
        let script = Script::from_string(
            "inline",
            "const chunks = splitDiff('', 500); output.print(String(chunks.length));",
        );
        engine.execute_script(&script).unwrap();
    }
}

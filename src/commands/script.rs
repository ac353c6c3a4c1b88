use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::context::ContextManager;
use crate::engine::{HostEnvironment, Script, ScriptEngine};
use crate::logger::Logger;
use crate::modes::ModeRegistry;
use crate::store::Store;

pub fn run_script_file(
    path: &Path,
    _interactive: bool,
    session_id: &str,
    store: &Arc<dyn Store>,
    logger: &Arc<Logger>,
    test_mode: bool,
) -> Result<(), crate::CtxForgeError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| crate::CtxForgeError::Config(format!("could not read {}: {e}", path.display())))?;

    logger.info(format!("loading script {} for session {session_id}", path.display()));

    let print = Box::new(|line: &str| println!("{line}"));
    let registry = Arc::new(Mutex::new(ModeRegistry::new(store.clone(), session_id.to_string())));
    let context = Arc::new(Mutex::new(ContextManager::new()));
    let mut host = HostEnvironment::wired(print, registry, context);
    host.test_mode = test_mode;
    host.config = serde_json::json!({ "name": path.file_stem().and_then(|s| s.to_str()).unwrap_or("script") });

    let engine = ScriptEngine::new(host).map_err(crate::CtxForgeError::Engine)?;
    let name = path.display().to_string();
    let script = Script::from_string(name, content);
    engine.execute_script(&script).map_err(crate::CtxForgeError::Engine)
}

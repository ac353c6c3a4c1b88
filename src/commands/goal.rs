//! Pre-written goals: named, categorized JS scripts a user can list or
//! run directly without first entering a mode.

use std::sync::{Arc, Mutex};

use crate::context::ContextManager;
use crate::engine::{HostEnvironment, Script, ScriptEngine};
use crate::logger::Logger;
use crate::modes::ModeRegistry;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct Goal {
    pub name: String,
    pub category: String,
    pub description: String,
    pub script_path: String,
}

/// Built-in goal registry. Looked up by name; `category` narrows listing.
/// Scripts ship under `demos/goals/<name>.js` relative to the install.
fn registry() -> Vec<Goal> {
    vec![
        Goal {
            name: "summarize-diff".to_string(),
            category: "review".to_string(),
            description: "Summarize the working tree diff against HEAD~1".to_string(),
            script_path: "demos/goals/summarize-diff.js".to_string(),
        },
        Goal {
            name: "release-notes".to_string(),
            category: "writing".to_string(),
            description: "Draft release notes from recent commits".to_string(),
            script_path: "demos/goals/release-notes.js".to_string(),
        },
    ]
}

pub fn list_goals(category: Option<&str>) -> Vec<Goal> {
    registry()
        .into_iter()
        .filter(|g| category.map(|c| c == g.category).unwrap_or(true))
        .collect()
}

pub fn run_goal(
    name: &str,
    session_id: &str,
    store: &Arc<dyn Store>,
    logger: &Arc<Logger>,
    test_mode: bool,
) -> Result<(), crate::CtxForgeError> {
    let goal = registry()
        .into_iter()
        .find(|g| g.name == name)
        .ok_or_else(|| crate::CtxForgeError::Config(format!("unknown goal: {name}")))?;

    let content = std::fs::read_to_string(&goal.script_path).map_err(|e| {
        crate::CtxForgeError::Config(format!("could not read goal script {}: {e}", goal.script_path))
    })?;

    logger.info(format!("running goal {name} for session {session_id}"));

    let print = Box::new(|line: &str| println!("{line}"));
    let registry_handle = Arc::new(Mutex::new(ModeRegistry::new(store.clone(), session_id.to_string())));
    let context = Arc::new(Mutex::new(ContextManager::new()));
    let mut host = HostEnvironment::wired(print, registry_handle, context);
    host.test_mode = test_mode;
    host.config = serde_json::json!({ "name": goal.name });

    let engine = ScriptEngine::new(host).map_err(crate::CtxForgeError::Engine)?;
    let script = Script::from_string(goal.name.clone(), content);
    engine.execute_script(&script).map_err(crate::CtxForgeError::Engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_filter_narrows_the_list() {
        let all = list_goals(None);
        let review_only = list_goals(Some("review"));
        assert!(review_only.len() < all.len());
        assert!(review_only.iter().all(|g| g.category == "review"));
    }

    #[test]
    fn unknown_category_yields_empty_list() {
        assert!(list_goals(Some("not-a-real-category")).is_empty());
    }
}

//! Mode & State Manager (C6): mode registration, state contracts addressed
//! through opaque slot tokens, and the switch/execute lifecycle.

mod state;

pub use state::{StateAccessor, StateContract, StateSlot};

use std::collections::HashMap;

use thiserror::Error;

use crate::store::Store;

#[derive(Debug, Error)]
pub enum ModeError {
    #[error("mode '{0}' is already registered")]
    DuplicateMode(String),

    #[error("no such mode: {0}")]
    UnknownMode(String),

    #[error("no such command: {0}")]
    UnknownCommand(String),

    #[error("command '{0}' failed: {1}")]
    HandlerFailed(String, String),

    #[error("onEnter for mode '{0}' failed: {1}")]
    EnterFailed(String, String),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

pub type CommandHandler = Box<dyn Fn(&[String]) -> Result<(), String> + Send + Sync>;

pub struct Command {
    pub name: String,
    pub description: String,
    pub handler: CommandHandler,
}

pub type CommandTable = HashMap<String, Command>;

/// Builds a fresh command table each time the owning mode is activated,
/// closing over a state accessor bound to *that* activation.
pub type CommandsBuilder = Box<dyn Fn(StateAccessor) -> CommandTable + Send + Sync>;

pub struct ModeConfig {
    pub name: String,
    pub title: String,
    pub prompt: String,
    pub enable_history: bool,
    pub history_file: Option<String>,
    pub contract: StateContract,
    pub on_enter: Option<Box<dyn Fn(&StateAccessor) -> Result<(), String> + Send + Sync>>,
    pub on_exit: Option<Box<dyn Fn(&StateAccessor) + Send + Sync>>,
    pub commands: CommandsBuilder,
}

struct RegisteredMode {
    config: ModeConfig,
}

/// Runtime registry of modes, global commands, and the currently active
/// mode. One instance per session/engine pairing.
pub struct ModeRegistry {
    store: std::sync::Arc<dyn Store>,
    session_id: String,
    modes: HashMap<String, RegisteredMode>,
    global_commands: CommandTable,
    current: Option<String>,
    current_table: CommandTable,
}

impl ModeRegistry {
    pub fn new(store: std::sync::Arc<dyn Store>, session_id: String) -> Self {
        Self {
            store,
            session_id,
            modes: HashMap::new(),
            global_commands: HashMap::new(),
            current: None,
            current_table: HashMap::new(),
        }
    }

    pub fn register_mode(&mut self, config: ModeConfig) -> Result<(), ModeError> {
        if self.modes.contains_key(&config.name) {
            return Err(ModeError::DuplicateMode(config.name));
        }
        self.modes.insert(config.name.clone(), RegisteredMode { config });
        Ok(())
    }

    pub fn register_command(&mut self, command: Command) {
        self.global_commands.insert(command.name.clone(), command);
    }

    pub fn current_mode_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The active mode's REPL prompt string, if a mode is active.
    pub fn current_prompt(&self) -> Option<&str> {
        self.current
            .as_deref()
            .and_then(|name| self.modes.get(name))
            .map(|m| m.config.prompt.as_str())
    }

    fn accessor_for(&self, mode_name: &str) -> StateAccessor {
        StateAccessor::new(self.store.clone(), self.session_id.clone(), mode_name.to_string())
    }

    /// Runs the previous mode's `onExit`, then the target's `onEnter`. A
    /// failing `onEnter` reverts `current` to the previous mode rather
    /// than leaving the registry in the half-switched target state.
    pub fn switch_mode(&mut self, name: &str) -> Result<(), ModeError> {
        if !self.modes.contains_key(name) {
            return Err(ModeError::UnknownMode(name.to_string()));
        }

        let previous = self.current.clone();
        if let Some(prev_name) = &previous {
            if let Some(prev) = self.modes.get(prev_name) {
                if let Some(on_exit) = &prev.config.on_exit {
                    on_exit(&self.accessor_for(prev_name));
                }
            }
        }

        let accessor = self.accessor_for(name);
        let table = {
            let mode = self.modes.get(name).expect("checked above");
            (mode.config.commands)(self.accessor_for(name))
        };

        if let Some(on_enter) = &self.modes.get(name).unwrap().config.on_enter {
            if let Err(e) = on_enter(&accessor) {
                // Transition failed: revert to the previous mode so the
                // registry never reports a half-entered target.
                self.current = previous;
                return Err(ModeError::EnterFailed(name.to_string(), e));
            }
        }

        self.current = Some(name.to_string());
        self.current_table = table;
        Ok(())
    }

    /// Resolves `name` against the current mode's command table first,
    /// then global commands.
    pub fn execute_command(&self, name: &str, args: &[String]) -> Result<(), ModeError> {
        if let Some(cmd) = self.current_table.get(name) {
            return (cmd.handler)(args).map_err(|msg| ModeError::HandlerFailed(name.to_string(), msg));
        }
        if let Some(cmd) = self.global_commands.get(name) {
            return (cmd.handler)(args).map_err(|msg| ModeError::HandlerFailed(name.to_string(), msg));
        }
        Err(ModeError::UnknownCommand(name.to_string()))
    }

    /// Lists the current mode's command names and descriptions, backing
    /// the built-in `help` behavior.
    pub fn help(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .current_table
            .values()
            .map(|c| (c.name.clone(), c.description.clone()))
            .collect();
        entries.sort();
        entries
    }

    pub fn contract_for(&self, mode_name: &str) -> Option<&StateContract> {
        self.modes.get(mode_name).map(|m| &m.config.contract)
    }

    /// Runs the current mode's `onExit` without actually switching away —
    /// used to flush state on a clean shutdown (quit, EOF, interrupt)
    /// rather than only ever on a mode-to-mode transition.
    pub fn flush_current(&self) {
        if let Some(name) = &self.current {
            if let Some(mode) = self.modes.get(name) {
                if let Some(on_exit) = &mode.config.on_exit {
                    on_exit(&self.accessor_for(name));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn minimal_config(name: &str) -> ModeConfig {
        ModeConfig {
            name: name.to_string(),
            title: name.to_string(),
            prompt: "> ".to_string(),
            enable_history: false,
            history_file: None,
            contract: StateContract::new(),
            on_enter: None,
            on_exit: None,
            commands: Box::new(|_| HashMap::new()),
        }
    }

    #[test]
    fn duplicate_mode_registration_errors() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = ModeRegistry::new(store, "s1".to_string());
        reg.register_mode(minimal_config("a")).unwrap();
        assert!(matches!(reg.register_mode(minimal_config("a")), Err(ModeError::DuplicateMode(_))));
    }

    #[test]
    fn switch_mode_runs_on_exit_then_on_enter_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = ModeRegistry::new(store, "s1".to_string());

        let exit_count = Arc::new(AtomicUsize::new(0));
        let enter_count = Arc::new(AtomicUsize::new(0));

        let mut a = minimal_config("a");
        let a_exit = exit_count.clone();
        a.on_exit = Some(Box::new(move |_| {
            a_exit.fetch_add(1, Ordering::SeqCst);
        }));

        let mut b = minimal_config("b");
        let b_enter = enter_count.clone();
        b.on_enter = Some(Box::new(move |_| {
            b_enter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        reg.register_mode(a).unwrap();
        reg.register_mode(b).unwrap();

        reg.switch_mode("a").unwrap();
        reg.switch_mode("b").unwrap();

        assert_eq!(exit_count.load(Ordering::SeqCst), 1);
        assert_eq!(enter_count.load(Ordering::SeqCst), 1);
        assert_eq!(reg.current_mode_name(), Some("b"));
    }

    #[test]
    fn failing_on_enter_reverts_to_previous_mode() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = ModeRegistry::new(store, "s1".to_string());

        let a = minimal_config("a");
        let mut b = minimal_config("b");
        b.on_enter = Some(Box::new(|_| Err("boom".to_string())));

        reg.register_mode(a).unwrap();
        reg.register_mode(b).unwrap();

        reg.switch_mode("a").unwrap();
        let result = reg.switch_mode("b");
        assert!(result.is_err());
        assert_eq!(reg.current_mode_name(), Some("a"));
    }

    #[test]
    fn unknown_command_errors() {
        let store = Arc::new(MemoryStore::new());
        let mut reg = ModeRegistry::new(store, "s1".to_string());
        reg.register_mode(minimal_config("a")).unwrap();
        reg.switch_mode("a").unwrap();
        assert!(matches!(reg.execute_command("nope", &[]), Err(ModeError::UnknownCommand(_))));
    }
}

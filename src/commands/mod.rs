//! Top-level Shell (C9): wires the CLI surface to the rest of the host —
//! store, logger, engine, mode registry — per subcommand.

mod goal;
mod log;
mod modes;
mod script;

pub use goal::{list_goals, run_goal, Goal};

use std::sync::{Arc, Mutex};

use crate::cli::{Cli, Commands, ConfigAction, LogAction};
use crate::config::AppConfig;
use crate::context::ContextManager;
use crate::logger::Logger;
use crate::modes::ModeRegistry;
use crate::store::{resolve_session_id, FsStore, MemoryStore, Store};

pub fn dispatch(cli: Cli, config: AppConfig, logger: Arc<Logger>) -> Result<(), crate::CtxForgeError> {
    let cwd = std::env::current_dir().map_err(|e| crate::CtxForgeError::Other(e.into()))?;
    let session_id = resolve_session_id(
        cli.common.session.as_deref().or(config.session_id.as_deref()),
        &cwd,
    );

    let backend = cli
        .common
        .store
        .as_deref()
        .map(str::parse::<crate::config::StoreBackend>)
        .transpose()
        .map_err(crate::CtxForgeError::Config)?
        .unwrap_or_else(|| config.store_backend.clone());

    let store: Arc<dyn Store> = match backend {
        crate::config::StoreBackend::Fs => Arc::new(FsStore::new(FsStore::default_root())),
        crate::config::StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };

    logger.info(format!("session resolved: {session_id}"));

    match cli.command {
        Commands::CodeReview => run_mode_repl("code-review", &session_id, &store, &logger, cli.common.test),
        Commands::PromptFlow => run_mode_repl("prompt-flow", &session_id, &store, &logger, cli.common.test),
        Commands::Goal { name, list, category, run } => {
            if list {
                for g in list_goals(category.as_deref()) {
                    println!("{}\t{}\t{}", g.name, g.category, g.description);
                }
                return Ok(());
            }
            let target = run.or(name).ok_or_else(|| {
                crate::CtxForgeError::Config("goal: specify a NAME or --run NAME".to_string())
            })?;
            run_goal(&target, &session_id, &store, &logger, cli.common.test)
        }
        Commands::Script { interactive, path } => script::run_script_file(&path, interactive, &session_id, &store, &logger, cli.common.test),
        Commands::Log { action } => log::run_log(action.unwrap_or(LogAction::Tail {
            file: cli.common.log_file.clone(),
            lines: 10,
            follow: false,
        })),
        Commands::Config { action } => run_config(action, &config),
        Commands::Completion { shell } => run_completion(shell),
    }
}

/// Registers both built-in modes against a fresh [`ModeRegistry`], switches
/// into `mode`, then drives a line-oriented REPL over stdin: each line is
/// tokenized (respecting quoting, via [`crate::argv::parse_argv`]) and
/// dispatched through [`ModeRegistry::execute_command`]. `help`/`quit`/
/// `exit` are handled directly since they act on the registry itself
/// rather than on one mode's command table.
///
/// In `--test` mode (no real terminal to drive interactively) a short,
/// deterministic smoke sequence runs instead of reading stdin, so `ctxforge
/// code-review --test` exercises the same wiring non-interactively.
fn run_mode_repl(
    mode: &str,
    session_id: &str,
    store: &Arc<dyn Store>,
    logger: &Arc<Logger>,
    test_mode: bool,
) -> Result<(), crate::CtxForgeError> {
    logger.info(format!("entering mode {mode} for session {session_id}"));

    let mut registry = ModeRegistry::new(store.clone(), session_id.to_string());
    registry
        .register_mode(modes::build_mode(
            "code-review",
            "Code Review",
            "review> ",
            Arc::new(Mutex::new(ContextManager::new())),
        ))
        .map_err(crate::CtxForgeError::Mode)?;
    registry
        .register_mode(modes::build_mode(
            "prompt-flow",
            "Prompt Flow",
            "flow> ",
            Arc::new(Mutex::new(ContextManager::new())),
        ))
        .map_err(crate::CtxForgeError::Mode)?;

    registry.switch_mode(mode).map_err(crate::CtxForgeError::Mode)?;

    if test_mode {
        for line in ["note smoke-test note", "list", "help"] {
            run_repl_line(&mut registry, line);
        }
        registry.flush_current();
        return Ok(());
    }

    let interrupted = install_interrupt_flag();

    println!("entered {mode} mode for session {session_id}. Type `help` for commands, `quit` to exit.");
    let stdin = std::io::stdin();
    loop {
        if interrupted.load(std::sync::atomic::Ordering::Relaxed) {
            println!("\ninterrupted, saving context before exit");
            break;
        }
        print!("{}", registry.current_prompt().unwrap_or("> "));
        use std::io::Write;
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        run_repl_line(&mut registry, line);
    }
    registry.flush_current();
    Ok(())
}

/// Flags `true` on SIGINT so the REPL loop can exit its blocking-read loop
/// between lines and flush state, instead of the process dying mid-write.
/// On non-unix targets (where `signal-hook`'s unix backend isn't built) the
/// flag simply never flips; Ctrl-C falls back to default process teardown.
#[cfg(unix)]
fn install_interrupt_flag() -> Arc<std::sync::atomic::AtomicBool> {
    let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, flag.clone());
    flag
}

#[cfg(not(unix))]
fn install_interrupt_flag() -> Arc<std::sync::atomic::AtomicBool> {
    Arc::new(std::sync::atomic::AtomicBool::new(false))
}

fn run_repl_line(registry: &mut ModeRegistry, line: &str) {
    if line == "help" {
        for (name, description) in registry.help() {
            println!("{name}\t{description}");
        }
        return;
    }
    let tokens = crate::argv::parse_argv(line);
    let Some((cmd, args)) = tokens.split_first() else {
        return;
    };
    if let Err(e) = registry.execute_command(cmd, args) {
        eprintln!("{}", crate::error_format::format_error(&e.to_string()));
    }
}

fn run_config(action: ConfigAction, config: &AppConfig) -> Result<(), crate::CtxForgeError> {
    match action {
        ConfigAction::Show => {
            let text = toml::to_string_pretty(config).map_err(|e| crate::CtxForgeError::Other(e.into()))?;
            println!("{text}");
        }
        ConfigAction::Path => println!("{}", AppConfig::default_path().display()),
        ConfigAction::Edit => {
            let path = AppConfig::default_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| crate::CtxForgeError::Other(e.into()))?;
            }
            if !path.exists() {
                let text = toml::to_string_pretty(config).map_err(|e| crate::CtxForgeError::Other(e.into()))?;
                std::fs::write(&path, text).map_err(|e| crate::CtxForgeError::Other(e.into()))?;
            }
            let editor = crate::procs::resolve_editor().ok_or_else(|| {
                crate::CtxForgeError::Config("no editor configured: set $VISUAL or $EDITOR".to_string())
            })?;
            let argv = crate::argv::parse_argv(&editor);
            let (program, args) = argv.split_first().ok_or_else(|| {
                crate::CtxForgeError::Config("empty $EDITOR/$VISUAL".to_string())
            })?;
            std::process::Command::new(program)
                .args(args)
                .arg(&path)
                .status()
                .map_err(|e| crate::CtxForgeError::Other(e.into()))?;
        }
    }
    Ok(())
}

fn run_completion(shell: clap_complete::Shell) -> Result<(), crate::CtxForgeError> {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ctxforge")]
#[command(version = env!("VERGEN_GIT_DESCRIBE"))]
#[command(about = "Scriptable command-line workbench for building structured LLM prompts", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Start interactive REPL (mode-dependent default).
    #[arg(short, long, global = true)]
    pub interactive: bool,

    /// Override session id.
    #[arg(long, global = true)]
    pub session: Option<String>,

    /// Pick storage backend.
    #[arg(long, global = true, value_parser = ["fs", "memory"])]
    pub store: Option<String>,

    /// Minimum log level.
    #[arg(long = "log-level", global = true, value_parser = ["debug", "info", "warn", "error"])]
    pub log_level: Option<String>,

    /// Log file path.
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<std::path::PathBuf>,

    /// In-memory ring buffer size.
    #[arg(long = "log-buffer", global = true)]
    pub log_buffer: Option<usize>,

    /// Test mode: no REPL, announce sub-tests.
    #[arg(long, global = true)]
    pub test: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enter code-review mode.
    CodeReview,

    /// Enter prompt-flow mode.
    #[command(alias = "flow")]
    PromptFlow,

    /// List or run pre-written goals.
    Goal {
        /// Goal name to run directly.
        name: Option<String>,

        #[arg(short, long)]
        list: bool,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        run: Option<String>,
    },

    /// Load and execute a JS file.
    Script {
        #[arg(short, long)]
        interactive: bool,

        path: std::path::PathBuf,
    },

    /// Read or follow the log.
    Log {
        #[command(subcommand)]
        action: Option<LogAction>,
    },

    /// Inspect or edit the layered configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts.
    Completion {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum LogAction {
    /// Read (optionally follow) the log file.
    Tail {
        #[arg(long)]
        file: Option<std::path::PathBuf>,

        #[arg(long, default_value_t = 10)]
        lines: usize,

        #[arg(long)]
        follow: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Path,
    Edit,
}

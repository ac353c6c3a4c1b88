//! Crate-wide error taxonomy.
//!
//! Each component returns its own typed error (`StoreError`, `EngineError`,
//! `ModeError`, `ProcError`). `CtxForgeError` composes them at the CLI
//! boundary, the only place that collapses typed errors into an exit code.

use thiserror::Error;

use crate::{engine::EngineError, modes::ModeError, procs::ProcError, store::StoreError};

#[derive(Debug, Error)]
pub enum CtxForgeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Proc(#[from] ProcError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown subcommand: {0}")]
    UnknownCommand(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CtxForgeError {
    /// The process exit code this error should map to. `0` is never
    /// returned here; success paths never construct an error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

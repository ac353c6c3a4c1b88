//! `ctxforge` — a scriptable workbench for building structured LLM prompts
//! from files, git diffs, and freeform notes.
//!
//! The crate is organized around the nine components described in the
//! design: a session store (`store`), a structured logger (`logger`), a
//! pure diff splitter (`diffsplit`), a context manager (`context`) built on
//! an argv tokenizer (`argv`) and a txtar writer (`txtar`), an embedded JS
//! scripting engine (`engine`), a mode/state manager (`modes`), a TUI host
//! bridge (`tui`), external process helpers (`procs`), and the top-level
//! CLI (`cli`, `commands`).

#![deny(unsafe_code)]

pub mod argv;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod diffsplit;
pub mod engine;
pub mod error_format;
pub mod errors;
pub mod logger;
pub mod modes;
pub mod procs;
pub mod store;
pub mod styling;
pub mod tui;
pub mod txtar;

pub use errors::CtxForgeError;

use std::sync::Arc;

use clap::Parser;
use ctxforge::cli::Cli;
use ctxforge::config::AppConfig;
use ctxforge::logger::{Logger, RotationPolicy};

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let config = match AppConfig::load(None) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", ctxforge::error_format::format_error(&format!("invalid configuration: {e}")));
            std::process::exit(1);
        }
    };

    let min_level = cli
        .common
        .log_level
        .as_deref()
        .map(str::parse)
        .transpose()
        .unwrap_or(None)
        .unwrap_or_else(|| config.log_level_enum().unwrap_or(ctxforge::logger::Level::Info));

    let buffer = cli.common.log_buffer.unwrap_or(config.log_buffer);
    let log_file = cli.common.log_file.clone().or_else(|| config.log_file.clone());

    let logger = Arc::new(match log_file {
        Some(path) => match Logger::with_file(min_level, buffer, path, RotationPolicy::default()) {
            Ok(logger) => logger,
            Err(e) => {
                eprintln!("{}", ctxforge::error_format::format_error(&format!("could not open log file: {e}")));
                std::process::exit(1);
            }
        },
        None => Logger::new(min_level, buffer),
    });

    match ctxforge::commands::dispatch(cli, config, logger) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{}", ctxforge::error_format::format_error(&e.to_string()));
            std::process::exit(e.exit_code());
        }
    }
}

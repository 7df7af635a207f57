//! CLI entry point for the scattershot search (§6).
#![warn(rust_2018_idioms)]

use std::{env, process::ExitCode, sync::Arc};

use scatter_dll_resource::DllResource;
use scatter_explorer::ExplorerError;
use scatter_inputs::InputTrack;
use tracing::{error, info};

mod config;
mod policy;

use config::CliConfig;
use policy::RawMemoryPolicy;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let config_path = env::args().nth(1).map(Into::into).unwrap_or_else(default_config_path);

    match run(&config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

/// `config.json` next to the executable, matching the teacher's `getPathToSelf`
/// fallback in `main.cpp` (reimplemented with `std::env::current_exe`).
fn default_config_path() -> std::path::PathBuf {
    let mut path = env::current_exe().expect("failed to locate executable");
    path.pop();
    path.push("config.json");
    path
}

fn run(config_path: &std::path::Path) -> Result<(), String> {
    info!(path = %config_path.display(), "loading configuration");
    let config = CliConfig::load(config_path).map_err(|e| e.to_string())?;

    let base_track = InputTrack::load(&config.explorer.m64_path).map_err(|e| e.to_string())?;

    let policy = Arc::new(RawMemoryPolicy::new(
        config.projection_symbol.clone(),
        config.projection_offset,
        config.fitness_symbol.clone(),
        config.fitness_offset,
        config.allowed_buttons,
    ));

    let result = scatter_explorer::run(&config.explorer, policy, base_track, |path| {
        DllResource::load(path)
    })
    .map_err(format_explorer_error)?;

    match result.best() {
        Some(best) => info!(fitness = best.fitness, blocks = result.blocks.len(), "run complete"),
        None => info!("run complete with no discovered blocks"),
    }

    Ok(())
}

fn format_explorer_error<E: std::fmt::Display>(error: ExplorerError<E>) -> String {
    error.to_string()
}

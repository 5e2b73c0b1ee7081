//! Myriad API - Embedding orchestration layer
//!
//! Provides the unified embedder-facing interface, including:
//! - Library assembly from script sources (ScriptSource / Manifest)
//! - Tick-loop orchestration helpers
//! - Configuration abstraction (RunConfig)
//! - Unified error handling (MyriadError)
//!
//! For CLI convenience, this crate provides a global singleton config.
//! For library use, prefer passing `RunConfig` explicitly.

use tracing::info;

// Re-export config
pub mod config;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};

pub mod error;
pub mod provider;
pub mod types;
pub use error::MyriadError;
pub use provider::{Manifest, ManifestScript, ManifestString, ScriptSource};
pub use types::{snapshot, InstanceReport};

// Re-export core types
pub use myriad_config;
pub use myriad_core::{
    Host, Library, LibraryError, Opcode, Pid, ScriptDefinition, ScriptInstance, ScriptState,
    SpecialTable,
};

/// Build a fresh library from a script source
pub fn build_library(source: &impl ScriptSource) -> Result<Library, MyriadError> {
    let mut library = Library::new();
    source.populate(&mut library)?;
    Ok(library)
}

/// Build a library from a source and mount it on a host
///
/// Returns the library index within the host.
pub fn install(host: &mut Host, source: &impl ScriptSource) -> Result<usize, MyriadError> {
    let library = build_library(source)?;
    Ok(host.add_library(library))
}

/// Drive the host for up to `ticks` ticks
///
/// Stops early once every registered instance has halted.
/// Returns the number of ticks actually executed.
pub fn run_ticks(host: &mut Host, ticks: u32, single_step: bool) -> u32 {
    info!(target: "myriad::host", ticks, single_step, "run starting");
    for executed in 0..ticks {
        host.run(single_step);
        let any_live = host.libraries().iter().any(|library| {
            library.running_pids().into_iter().any(|pid| {
                library
                    .running_script(pid)
                    .map(|script| !script.state().is_halted())
                    .unwrap_or(false)
            })
        });
        if !any_live {
            info!(target: "myriad::host", executed = executed + 1, "all scripts halted");
            return executed + 1;
        }
    }
    ticks
}

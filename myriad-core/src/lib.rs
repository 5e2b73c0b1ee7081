//! Myriad Core - Embeddable byte-code VM (pure logic, no IO)
//!
//! A sandboxed, stack-based instruction set executed against private
//! per-script memory, built to run many short-lived scripted behaviors
//! concurrently under a deterministic per-tick budget.
//!
//! Configuration is passed explicitly via parameters, not via global state.

pub mod core;
pub mod kit;
pub mod runtime;

// Re-export common types
pub use crate::core::error::{LibraryError, MemoryError};
pub use crate::core::opcode::Opcode;
pub use crate::core::script::{ScriptDefinition, ScriptState};
pub use crate::kit::stack::{ByteStack, StackError};
pub use crate::runtime::{
    Host, Library, Pid, ScriptInstance, SpecialFn, SpecialTable, FLAG_FALSE, FLAG_TRUE,
    RUNAWAY_LIMIT,
};

// Re-export config types from myriad-config
pub use myriad_config::{ScriptDefaults, Subsystem};

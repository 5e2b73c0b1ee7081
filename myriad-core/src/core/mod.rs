//! 核心类型定义 (Core 层)
//!
//! 纯类型定义，执行逻辑在 runtime/ 中。

pub mod error;
pub mod opcode;
pub mod script;

pub use error::{LibraryError, MemoryError};
pub use opcode::Opcode;
pub use script::{ScriptDefinition, ScriptState};

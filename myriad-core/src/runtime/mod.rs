//! 运行时 (执行层)
//!
//! 解释器循环、脚本实例生命周期、Library 调度与宿主。

pub mod execution;
pub mod fixed;
pub mod host;
pub mod instance;
pub mod library;

pub use execution::{FLAG_FALSE, FLAG_TRUE, RUNAWAY_LIMIT};
pub use host::{Host, SpecialFn, SpecialTable};
pub use instance::ScriptInstance;
pub use library::{Library, Pid};

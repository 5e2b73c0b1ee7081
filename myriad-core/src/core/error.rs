//! 错误类型 (Core 层)
//!
//! 使用方错误（未知 id、几何越界等）同步返回给注册 API 的调用者；
//! 脚本自身的故障从不以 `Err` 形式传播，而是表现为实例的终止态
//! （见 `ScriptState`）。栈故障 `StackError` 定义在 kit 层。

use thiserror::Error;

/// 实例内存访问越界
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("memory range {pointer}+{count} is outside script memory of {size} bytes")]
    OutOfRange { pointer: u32, count: u32, size: u32 },
}

/// 注册与启动 API 的使用方错误
///
/// 这些错误不得破坏注册表状态：失败的调用不产生任何可见变更。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    /// 启动时脚本 id 未注册
    #[error("unknown script id {0}")]
    UnknownScriptId(u32),

    /// 启动时脚本名未注册
    #[error("unknown script name '{0}'")]
    UnknownScriptName(String),

    /// 模板代码装不进实例内存
    #[error("script code ({code_len} bytes at offset {code_offset}) does not fit in {memory_size} bytes of memory")]
    CodeOutOfRange {
        code_offset: u32,
        code_len: usize,
        memory_size: u32,
    },

    /// 入口地址不在实例内存内
    #[error("entry point {entry_point} is outside script memory of {memory_size} bytes")]
    EntryPointOutOfRange { entry_point: u32, memory_size: u32 },

    /// 启动参数超出操作数栈容量
    #[error("{0} argument bytes exceed the operand stack capacity")]
    ArgumentOverflow(usize),
}

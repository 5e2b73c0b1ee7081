//! Myriad Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Myriad crates.

use serde::{Deserialize, Serialize};

/// Default values for newly registered script definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDefaults {
    /// Private memory size in bytes for each spawned instance
    pub memory_size: u32,
    /// Operand stack capacity in bytes
    pub stack_size: usize,
}

/// Log level, decoupled from any concrete logging backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Per-subsystem log level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 全局默认日志级别
    pub global: LogLevel,
    /// ByteStack 日志级别（None 表示使用 global）
    pub stack: Option<LogLevel>,
    /// 解释器日志级别
    pub vm: Option<LogLevel>,
    /// Library 调度器日志级别
    pub library: Option<LogLevel>,
    /// Host 日志级别
    pub host: Option<LogLevel>,
}

/// Execution subsystem enum for subsystem-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subsystem {
    Stack,
    Vm,
    Library,
    Host,
}

impl Subsystem {
    /// Get the string name of the subsystem
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Stack => "stack",
            Subsystem::Vm => "vm",
            Subsystem::Library => "library",
            Subsystem::Host => "host",
        }
    }

    /// Get the log target name for this subsystem
    pub fn target(&self) -> String {
        format!("myriad::{}", self.as_str())
    }
}

impl LogLevel {
    /// Get the lowercase name, matching `tracing` level names
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl LogConfig {
    /// 获取指定子系统的实际日志级别
    ///
    /// 如果该子系统有特定配置则返回特定级别，否则返回全局级别
    pub fn level_for(&self, subsystem: Subsystem) -> LogLevel {
        let specific = match subsystem {
            Subsystem::Stack => self.stack,
            Subsystem::Vm => self.vm,
            Subsystem::Library => self.library,
            Subsystem::Host => self.host,
        };
        specific.unwrap_or(self.global)
    }
}

impl Default for ScriptDefaults {
    fn default() -> Self {
        Self {
            memory_size: 64 * 1024,
            stack_size: 2500,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: LogLevel::Info,
            stack: None,
            vm: None,
            library: None,
            host: None,
        }
    }
}

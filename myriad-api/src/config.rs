//! API 层配置
//!
//! 包含执行配置 RunConfig 和全局单例（供 CLI 使用）

use myriad_config::{LogConfig, ScriptDefaults};
use once_cell::sync::OnceCell;

/// Execution configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Execute one opcode per scheduling pass (debugger mode)
    pub single_step: bool,
    /// Log configuration, applied by the embedding front end
    pub log: LogConfig,
    /// Default geometry for definitions created at runtime
    pub defaults: ScriptDefaults,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            single_step: false,
            log: LogConfig::default(),
            defaults: ScriptDefaults::default(),
        }
    }
}

// Global config singleton for CLI convenience
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize global configuration (must be called once before any operation)
///
/// # Panics
/// If config is already initialized
pub fn init(config: RunConfig) {
    GLOBAL_CONFIG
        .set(config)
        .expect("Config already initialized");
}

/// Get global config reference
///
/// # Panics
/// If config is not initialized
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get().expect("Config not initialized")
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_config() {
        let cfg = RunConfig::default();
        assert!(!cfg.single_step);
        assert_eq!(cfg.defaults.memory_size, 65536);
        assert_eq!(cfg.defaults.stack_size, 2500);
    }

    #[test]
    fn test_global_config_init_and_get() {
        // 注意：全局状态，完整测试套件下可能已被其他测试初始化
        if !is_initialized() {
            init(RunConfig::default());
        }
        assert!(is_initialized());
        let _ = config();
    }
}

//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分子系统日志控制。

use std::io;

use myriad_config::{LogConfig, LogLevel, Subsystem};
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

fn to_level(level: LogLevel) -> tracing::Level {
    match level {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

/// 使用指定格式和日志配置初始化日志系统
pub fn init(log_config: &LogConfig, format: LogFormat) {
    // Build filter targets
    let targets = Targets::new()
        .with_default(to_level(log_config.global))
        .with_target(
            Subsystem::Stack.target(),
            to_level(log_config.level_for(Subsystem::Stack)),
        )
        .with_target(
            Subsystem::Vm.target(),
            to_level(log_config.level_for(Subsystem::Vm)),
        )
        .with_target(
            Subsystem::Library.target(),
            to_level(log_config.level_for(Subsystem::Library)),
        )
        .with_target(
            Subsystem::Host.target(),
            to_level(log_config.level_for(Subsystem::Host)),
        );

    let stdout_layer = create_format_layer(format, io::stdout).with_filter(targets);
    tracing_subscriber::registry().with(stdout_layer).init();
}

/// Create formatter layer based on format
fn create_format_layer<W, F>(
    format: LogFormat,
    make_writer: F,
) -> impl Layer<tracing_subscriber::Registry>
where
    W: io::Write + Send + Sync + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

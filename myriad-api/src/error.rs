//! API 错误类型
//!
//! 统一封装使用方可见的错误；脚本自身的故障是实例状态，不在此列。

use thiserror::Error;

pub use myriad_core::LibraryError;

/// Myriad 错误类型
#[derive(Error, Debug)]
pub enum MyriadError {
    /// 注册表/启动 API 使用方错误
    #[error("{0}")]
    Library(#[from] LibraryError),

    /// Manifest JSON 解析失败
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Manifest 语义错误（重复 id、缺少 id/name 等）
    #[error("manifest error: {0}")]
    Manifest(String),
}

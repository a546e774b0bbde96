//! relay 层错误类型定义

use crate::relay::RelayState;
use aqua_serial::SerialError;
use thiserror::Error;

/// relay 层错误类型
///
/// 帧解码、解析和 HTTP 失败都在周期内部按各自的错误类型处理，不会离开 `run_cycle`；
/// 这里只包含会终止一个周期或整个 relay 的错误。
#[derive(Error, Debug)]
pub enum RelayError {
    /// 串口错误（打开失败对进程而言是致命错误）
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 在错误的状态下调用
    #[error("Invalid relay state: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: RelayState,
        actual: RelayState,
    },
}

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

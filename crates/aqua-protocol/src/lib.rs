//! # Aqua Protocol
//!
//! 控制器串口文本协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `frame`: 上行传感器帧解析（`{WA:..,AI:..,HU:..,SP:..,PWR:..}`）
//! - `downlink`: 下行设定值指令编码（`SET:<value>\n`）
//!
//! ## 行格式
//!
//! 协议以行为单位，每行以 `\n` 结尾。行的拆分由串口层（`aqua-serial`）负责，
//! 本模块只处理单行文本。

pub mod downlink;
pub mod frame;

// 重新导出常用类型
pub use downlink::*;
pub use frame::*;

use thiserror::Error;

/// 一次完整的传感器采样
///
/// # 不变量
///
/// 只有五个字段全部解析成功后才会构造 `SensorSample`，
/// 部分解析的数据永远不会成为 `SensorSample`。
///
/// # 序列化
///
/// 启用 `serde` feature 后，字段按上行 HTTP 接口的键名序列化：
///
/// ```text
/// {"WA":24.5,"AI":26.2,"HU":60.5,"SP":25.0,"PWR":120}
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSample {
    /// 水温（°C）
    #[cfg_attr(feature = "serde", serde(rename = "WA"))]
    pub water_temp: f64,

    /// 气温（°C）
    #[cfg_attr(feature = "serde", serde(rename = "AI"))]
    pub air_temp: f64,

    /// 湿度（%）
    #[cfg_attr(feature = "serde", serde(rename = "HU"))]
    pub humidity: f64,

    /// 控制器上报的当前设定值（°C）
    #[cfg_attr(feature = "serde", serde(rename = "SP"))]
    pub setpoint: f64,

    /// 执行器输出（PID 输出，约 -255..=255）
    #[cfg_attr(feature = "serde", serde(rename = "PWR"))]
    pub output: i32,
}

/// 帧解析错误类型
///
/// 任何一种错误都会使整行被丢弃，不存在部分结果。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Empty frame")]
    Empty,

    #[error("Malformed pair: {pair:?} (expected exactly one ':')")]
    MalformedPair { pair: String },

    #[error("Non-numeric value for {tag}: {value:?}")]
    InvalidNumber { tag: String, value: String },

    #[error("Missing field: {tag}")]
    MissingField { tag: &'static str },

    #[error("Output out of range: {value}")]
    OutputOutOfRange { value: f64 },
}

//! # Aqua Uplink
//!
//! relay → 远端服务 方向的 HTTP/JSON 客户端。
//!
//! 只依赖远端服务的两个接口：
//!
//! ```text
//! POST <base>/sensor-data/   {"WA":f,"AI":f,"HU":f,"SP":f,"PWR":i}  → 200
//! GET  <base>/setpoint/      → 200 {"setpoint":f,"min_setpoint":f,"max_setpoint":f}
//! ```
//!
//! 每个操作都是一次独立的请求，带有限超时，内部**不重试**：
//! 发布失败的样本直接丢弃（至多一次语义），设定值在下一个检查周期自然重新获取。

pub mod http;

pub use http::HttpUplink;

use aqua_protocol::SensorSample;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// 上行错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UplinkError {
    /// 连接被拒绝 / 主机不可达 / DNS 失败
    #[error("Connection error: cannot reach {url}: {message}")]
    Connection { url: String, message: String },

    /// 请求超时
    #[error("Request timeout: {url} not responding")]
    Timeout { url: String },

    /// 非 200 状态码
    #[error("Server error ({code}): {body}")]
    Status { code: u16, body: String },

    /// 响应体无法解析
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// 其他请求错误
    #[error("Request failed: {0}")]
    Other(String),
}

impl UplinkError {
    /// 是否为传输层错误（连接失败或超时）
    ///
    /// 网络抖动时设定值获取失败是常态，relay 对这类错误降低日志级别。
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// `GET /setpoint/` 的响应
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SetpointReading {
    /// 目标设定值（°C）
    pub setpoint: f64,

    /// 服务端允许的下限（仅供参考）
    #[serde(default)]
    pub min_setpoint: Option<f64>,

    /// 服务端允许的上限（仅供参考）
    #[serde(default)]
    pub max_setpoint: Option<f64>,
}

impl SetpointReading {
    pub fn new(setpoint: f64) -> Self {
        Self {
            setpoint,
            min_setpoint: None,
            max_setpoint: None,
        }
    }

    /// 设定值是否落在服务端声明的范围内（未声明的边界视为满足）
    pub fn is_within_bounds(&self) -> bool {
        self.min_setpoint.is_none_or(|min| self.setpoint >= min)
            && self.max_setpoint.is_none_or(|max| self.setpoint <= max)
    }
}

/// 上行客户端接口
///
/// relay 只通过此 trait 访问远端服务，测试中可替换为脚本化实现。
pub trait Uplink {
    /// 发布一条传感器样本（仅 HTTP 200 视为成功）
    fn publish_sample(&mut self, sample: &SensorSample) -> Result<(), UplinkError>;

    /// 获取当前设定值
    fn fetch_setpoint(&mut self) -> Result<SetpointReading, UplinkError>;
}

impl<U: Uplink + ?Sized> Uplink for Box<U> {
    fn publish_sample(&mut self, sample: &SensorSample) -> Result<(), UplinkError> {
        (**self).publish_sample(sample)
    }

    fn fetch_setpoint(&mut self) -> Result<SetpointReading, UplinkError> {
        (**self).fetch_setpoint()
    }
}

/// 上行客户端配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkConfig {
    /// 服务根地址（如 `http://localhost:8000/api`）
    pub base_url: String,
    /// 单次请求超时
    pub timeout: Duration,
    /// 传感器数据接口（相对 `base_url`）
    pub sensor_data_path: String,
    /// 设定值接口（相对 `base_url`）
    pub setpoint_path: String,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout: Duration::from_secs(5),
            sensor_data_path: "sensor-data/".to_string(),
            setpoint_path: "setpoint/".to_string(),
        }
    }
}

impl UplinkConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// 拼接接口完整 URL（两侧多余的 `/` 会被合并）
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn sensor_data_url(&self) -> String {
        self.endpoint(&self.sensor_data_path)
    }

    pub fn setpoint_url(&self) -> String {
        self.endpoint(&self.setpoint_path)
    }
}

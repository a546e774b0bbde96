//! relay 配置
//!
//! 配置在启动时确定，进程生命周期内不可变。可从 TOML 文件加载：
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//!
//! [uplink]
//! base_url = "http://192.168.1.100:8000/api"
//! timeout_ms = 5000
//!
//! [timing]
//! poll_interval_ms = 100
//! setpoint_interval_ms = 500
//! ```
//!
//! 未出现的字段使用默认值。

use crate::error::ConfigError;
use aqua_serial::SerialPortConfig;
use aqua_uplink::UplinkConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// relay 完整配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub serial: SerialSection,
    pub uplink: UplinkSection,
    pub timing: LoopTiming,
}

/// `[serial]` 配置段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSection {
    /// 设备路径（Linux: `/dev/ttyUSB0`，Windows: `COM3`）
    pub port: String,
    pub baud_rate: u32,
    /// 打开串口后等待控制器复位的时间（毫秒）
    pub settle_delay_ms: u64,
    /// 底层读写超时（毫秒）
    pub read_timeout_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            settle_delay_ms: 2000,
            read_timeout_ms: 1000,
        }
    }
}

impl SerialSection {
    pub fn to_port_config(&self) -> SerialPortConfig {
        SerialPortConfig {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

/// `[uplink]` 配置段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UplinkSection {
    /// 服务根地址
    pub base_url: String,
    /// 单次 HTTP 请求超时（毫秒）
    pub timeout_ms: u64,
    pub sensor_data_path: String,
    pub setpoint_path: String,
}

impl Default for UplinkSection {
    fn default() -> Self {
        let defaults = UplinkConfig::default();
        Self {
            base_url: defaults.base_url,
            timeout_ms: defaults.timeout.as_millis() as u64,
            sensor_data_path: defaults.sensor_data_path,
            setpoint_path: defaults.setpoint_path,
        }
    }
}

impl UplinkSection {
    pub fn to_uplink_config(&self) -> UplinkConfig {
        UplinkConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_millis(self.timeout_ms),
            sensor_data_path: self.sensor_data_path.clone(),
            setpoint_path: self.setpoint_path.clone(),
        }
    }
}

/// `[timing]` 配置段：relay 循环节奏
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopTiming {
    /// 每个周期结束后的休眠（毫秒），避免空转
    pub poll_interval_ms: u64,
    /// 设定值检查间隔（毫秒）
    pub setpoint_interval_ms: u64,
    /// 周期出错后的退避时间（毫秒）
    pub error_backoff_ms: u64,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            setpoint_interval_ms: 500,
            error_backoff_ms: 1000,
        }
    }
}

impl LoopTiming {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn setpoint_interval(&self) -> Duration {
        Duration::from_millis(self.setpoint_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl RelayConfig {
    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载并校验
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial.port must not be empty".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate must be > 0".into()));
        }
        let base = self.uplink.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "uplink.base_url must start with http:// or https://, got {:?}",
                base
            )));
        }
        if self.uplink.timeout_ms == 0 {
            return Err(ConfigError::Invalid("uplink.timeout_ms must be > 0".into()));
        }
        if self.timing.poll_interval_ms == 0 || self.timing.setpoint_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing intervals must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.uplink.base_url, "http://localhost:8000/api");
        assert_eq!(config.uplink.timeout_ms, 5000);
        assert_eq!(config.timing.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.timing.setpoint_interval(), Duration::from_millis(500));
        assert_eq!(config.timing.error_backoff(), Duration::from_secs(1));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RelayConfig::from_toml_str(
            r#"
            [serial]
            port = "COM4"

            [uplink]
            base_url = "http://192.168.1.100:8000/api"
            "#,
        )
        .unwrap();
        assert_eq!(config.serial.port, "COM4");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(
            config.uplink.to_uplink_config().setpoint_url(),
            "http://192.168.1.100:8000/api/setpoint/"
        );
        assert_eq!(config.timing, LoopTiming::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RelayConfig::from_toml_str("[serial]\nbaud = 9600\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_validation() {
        let err = RelayConfig::from_toml_str("[serial]\nbaud_rate = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = RelayConfig::from_toml_str("[uplink]\nbase_url = \"localhost:8000\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err =
            RelayConfig::from_toml_str("[timing]\nsetpoint_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_to_port_config() {
        let section = SerialSection {
            settle_delay_ms: 0,
            ..Default::default()
        };
        let port = section.to_port_config();
        assert_eq!(port.settle_delay, Duration::ZERO);
        assert_eq!(port.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timing]\nerror_backoff_ms = 250").unwrap();

        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.timing.error_backoff(), Duration::from_millis(250));

        assert!(matches!(
            RelayConfig::load("/nonexistent/aqua-relay.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}

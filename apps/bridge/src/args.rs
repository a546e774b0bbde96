//! 命令行参数

use aqua_relay::{ConfigError, RelayConfig};
use clap::Parser;
use std::path::PathBuf;

/// 水族箱控制器 ⇄ 远端服务 串口/HTTP 桥
///
/// 读取控制器的传感器帧并上报服务端，同时把服务端的设定值变化下发给控制器
#[derive(Parser, Debug)]
#[command(name = "aqua-bridge")]
#[command(about = "Serial <-> HTTP bridge for the aquarium controller", long_about = None)]
#[command(version)]
pub struct Args {
    /// TOML 配置文件（可选）
    ///
    /// 命令行参数优先于配置文件中的值
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 串口设备（Linux: /dev/ttyUSB0，Windows: COM3）
    #[arg(short, long)]
    pub port: Option<String>,

    /// 串口波特率
    #[arg(short, long)]
    pub baudrate: Option<u32>,

    /// 服务根地址
    ///
    /// 例如: http://192.168.1.100:8000/api
    #[arg(long)]
    pub base_url: Option<String>,

    /// 输出 debug 级别日志（含每一帧原始数据）
    #[arg(short, long)]
    pub verbose: bool,

    /// 日志文件路径
    #[arg(long, default_value = "aqua_bridge.log")]
    pub log_file: PathBuf,

    /// 不写日志文件，只输出到终端
    #[arg(long)]
    pub no_log_file: bool,
}

impl Args {
    /// 合并配置文件与命令行覆盖项，并重新校验
    pub fn resolve_config(&self) -> Result<RelayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::load(path)?,
            None => RelayConfig::default(),
        };

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baudrate) = self.baudrate {
            config.serial.baud_rate = baudrate;
        }
        if let Some(base_url) = &self.base_url {
            config.uplink.base_url = base_url.clone();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn log_file(&self) -> Option<&PathBuf> {
        (!self.no_log_file).then_some(&self.log_file)
    }
}

//! # Aqua Serial Link Layer
//!
//! 串口硬件抽象层，提供统一的行级串口接口。
//!
//! - [`SerialLink`]: 上层（relay）使用的统一 trait
//! - [`SerialPortLink`]: 基于 `serialport` crate 的真实串口实现
//! - [`LineAssembler`]: 字节流 → 行 的拼装器（有长度上限）
//! - `MockSerialLink`: 无硬件依赖的模拟实现（`mock` feature）

use thiserror::Error;

pub mod line;
pub mod port;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use line::{LineAssembler, MAX_LINE_LEN, MAX_PENDING_LINES};
pub use port::{SerialPortConfig, SerialPortLink};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockSerialHandle, MockSerialLink};

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    /// 启动时打开串口失败（对 relay 而言是致命错误）
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Serial port closed")]
    Closed,
}

/// 行级串口链路
///
/// 所有方法都不阻塞等待数据：`read_line()` 只消费已经到达的字节，
/// 没有完整行时返回 `Ok(None)`，不完整的尾部留在内部缓冲区中等待后续字节。
pub trait SerialLink {
    /// 设备标识（如 `/dev/ttyUSB0`），用于日志
    fn name(&self) -> &str;

    /// 是否有待处理的输入（系统缓冲区中有字节，或已拼装出完整行）
    fn has_input(&mut self) -> Result<bool, SerialError>;

    /// 读取一行（不含 `\r\n`）
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError>;

    /// 写入完整字节序列
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 关闭链路；关闭后的读写返回 [`SerialError::Closed`]
    fn close(&mut self) -> Result<(), SerialError>;
}

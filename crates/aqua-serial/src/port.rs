//! 基于 `serialport` 的真实串口实现

use crate::{LineAssembler, SerialError, SerialLink};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{debug, info, trace};

/// 单次读取的最大字节数
const READ_CHUNK: usize = 1024;

/// 串口打开参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialPortConfig {
    /// 设备路径（Linux: `/dev/ttyUSB0`，Windows: `COM3`）
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    /// 底层读写超时
    pub read_timeout: Duration,
    /// 打开后的等待时间
    ///
    /// 多数 Arduino 类控制器在 DTR 翻转（即串口被打开）时会复位，
    /// 复位期间发送的指令会丢失。
    pub settle_delay: Duration,
}

impl Default for SerialPortConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// 真实串口链路（8N1，无流控）
pub struct SerialPortLink {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    assembler: LineAssembler,
    read_buf: Vec<u8>,
}

impl SerialPortLink {
    /// 打开串口并等待控制器复位完成
    ///
    /// 复位期间控制器输出的启动信息会在等待结束后被清空。
    pub fn open(config: &SerialPortConfig) -> Result<Self, SerialError> {
        let mut port = serialport::new(config.port.as_str(), config.baud_rate)
            .timeout(config.read_timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open()
            .map_err(|source| SerialError::Open {
                port: config.port.clone(),
                source,
            })?;

        if !config.settle_delay.is_zero() {
            debug!(
                "Waiting {:?} for controller on {} to reset",
                config.settle_delay, config.port
            );
            std::thread::sleep(config.settle_delay);
        }
        port.clear(ClearBuffer::Input)?;

        info!(
            "Connected to controller on {} at {} baud",
            config.port, config.baud_rate
        );

        Ok(Self {
            name: config.port.clone(),
            port: Some(port),
            assembler: LineAssembler::default(),
            read_buf: vec![0u8; READ_CHUNK],
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, SerialError> {
        self.port.as_mut().ok_or(SerialError::Closed)
    }

    /// 把系统缓冲区中已到达的字节全部搬进拼装器
    fn fill(&mut self) -> Result<(), SerialError> {
        let port = self.port.as_mut().ok_or(SerialError::Closed)?;
        let mut available = port.bytes_to_read()? as usize;

        while available > 0 {
            let want = available.min(self.read_buf.len());
            match port.read(&mut self.read_buf[..want]) {
                Ok(0) => break,
                Ok(n) => {
                    trace!("Serial RX {} bytes", n);
                    self.assembler.push(&self.read_buf[..n]);
                    available = available.saturating_sub(n);
                },
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SerialError::Io(e)),
            }
        }
        Ok(())
    }
}

impl SerialLink for SerialPortLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_input(&mut self) -> Result<bool, SerialError> {
        if self.assembler.has_line() {
            return Ok(true);
        }
        Ok(self.port_mut()?.bytes_to_read()? > 0)
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        self.fill()?;
        Ok(self.assembler.next_line())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SerialError> {
        // Drop 即关闭底层文件描述符/句柄
        match self.port.take() {
            Some(port) => {
                drop(port);
                self.assembler.clear();
                info!("Disconnected from controller on {}", self.name);
                Ok(())
            },
            None => Err(SerialError::Closed),
        }
    }
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field("partial_len", &self.assembler.partial_len())
            .finish()
    }
}

//! Mock 串口链路
//!
//! 用于测试的模拟串口：通过 [`MockSerialHandle`] 注入控制器输出、
//! 检查写入的指令、模拟读写故障，并统计关闭次数。

use crate::{LineAssembler, SerialError, SerialLink};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MockState {
    /// 尚未被链路读取的字节（控制器 -> relay）
    rx: Vec<u8>,
    /// 成功写入的指令（relay -> 控制器）
    written: Vec<Vec<u8>>,
    /// 为 true 时所有写入失败
    fail_writes: bool,
    /// 下一次读取返回的 IO 错误
    fail_next_read: Option<io::ErrorKind>,
    /// `close()` 被调用的次数
    close_count: usize,
}

/// 模拟串口链路
#[derive(Debug)]
pub struct MockSerialLink {
    name: String,
    state: Arc<Mutex<MockState>>,
    assembler: LineAssembler,
    closed: bool,
}

/// 模拟串口的测试端句柄（可克隆）
#[derive(Debug, Clone)]
pub struct MockSerialHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialLink {
    /// 创建模拟链路及其测试句柄
    pub fn new(name: impl Into<String>) -> (Self, MockSerialHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let link = Self {
            name: name.into(),
            state: state.clone(),
            assembler: LineAssembler::default(),
            closed: false,
        };
        (link, MockSerialHandle { state })
    }
}

impl SerialLink for MockSerialLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_input(&mut self) -> Result<bool, SerialError> {
        if self.closed {
            return Err(SerialError::Closed);
        }
        let state = self.state.lock();
        Ok(self.assembler.has_line() || !state.rx.is_empty() || state.fail_next_read.is_some())
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        if self.closed {
            return Err(SerialError::Closed);
        }
        {
            let mut state = self.state.lock();
            if let Some(kind) = state.fail_next_read.take() {
                return Err(SerialError::Io(io::Error::new(kind, "mock read failure")));
            }
            let pending = std::mem::take(&mut state.rx);
            self.assembler.push(&pending);
        }
        Ok(self.assembler.next_line())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        if self.closed {
            return Err(SerialError::Closed);
        }
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(SerialError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        state.written.push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<(), SerialError> {
        self.state.lock().close_count += 1;
        if self.closed {
            return Err(SerialError::Closed);
        }
        self.closed = true;
        Ok(())
    }
}

impl MockSerialHandle {
    /// 注入原始字节
    pub fn feed(&self, bytes: &[u8]) {
        self.state.lock().rx.extend_from_slice(bytes);
    }

    /// 注入一行（自动追加 `\n`）
    pub fn feed_line(&self, line: &str) {
        let mut state = self.state.lock();
        state.rx.extend_from_slice(line.as_bytes());
        state.rx.push(b'\n');
    }

    /// 已写入的指令
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// 已写入的指令（按 UTF-8 解码）
    pub fn written_text(&self) -> Vec<String> {
        self.state
            .lock()
            .written
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.state.lock().fail_next_read = Some(kind);
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }
}

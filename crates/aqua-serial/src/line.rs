//! 字节流行拼装

use std::collections::VecDeque;
use tracing::warn;

/// 单行最大长度（字节，不含换行符）
///
/// 合法帧约 50 字节，超过上限说明是乱码或丢失了换行符。
pub const MAX_LINE_LEN: usize = 512;

/// 等待消费的完整行上限，超出时丢弃最旧的行
pub const MAX_PENDING_LINES: usize = 64;

/// 行拼装器
///
/// 把串口读到的任意切片拼装为以 `\n` 结尾的完整行：
/// - 行尾的 `\r` 会被去掉
/// - 超过 `max_len` 仍未见到 `\n` 的行整体丢弃，直到下一个 `\n` 为止
///   （避免把超长行的尾部当作新帧解析）
#[derive(Debug)]
pub struct LineAssembler {
    current: Vec<u8>,
    lines: VecDeque<Vec<u8>>,
    max_len: usize,
    discarding: bool,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(MAX_LINE_LEN)
    }
}

impl LineAssembler {
    pub fn new(max_len: usize) -> Self {
        Self {
            current: Vec::with_capacity(64),
            lines: VecDeque::new(),
            max_len,
            discarding: false,
        }
    }

    /// 追加收到的字节
    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                let mut line = std::mem::take(&mut self.current);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if self.lines.len() >= MAX_PENDING_LINES {
                    self.lines.pop_front();
                    warn!("Serial line queue full, dropping oldest line");
                }
                self.lines.push_back(line);
            } else if !self.discarding {
                self.current.push(byte);
                if self.current.len() > self.max_len {
                    warn!(
                        "Serial line exceeded {} bytes without terminator, discarding",
                        self.max_len
                    );
                    self.current.clear();
                    self.discarding = true;
                }
            }
        }
    }

    /// 取出下一条完整行
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        self.lines.pop_front()
    }

    pub fn has_line(&self) -> bool {
        !self.lines.is_empty()
    }

    /// 尚未结束的半行字节数
    pub fn partial_len(&self) -> usize {
        self.current.len()
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.lines.clear();
        self.discarding = false;
    }
}

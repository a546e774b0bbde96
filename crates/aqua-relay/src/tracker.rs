//! 设定值跟踪
//!
//! 记录最后一次**成功下发**到控制器的远端设定值，判断新获取的值是否需要下发。
//!
//! - 同一个远端值至多下发一次
//! - 下发失败时不提交，下一次获取到同样的值会再次尝试

use std::time::Instant;

/// 设定值跟踪器（纯决策逻辑，无 IO）
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SetpointTracker {
    /// 最后一次成功下发的远端设定值
    last_known: Option<f64>,
    /// 最后一次成功下发的时间
    last_push_at: Option<Instant>,
}

impl SetpointTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否需要下发
    ///
    /// 当且仅当 `remote` 有值且与最后下发的值不同（从未下发视为不同）时返回 `true`。
    pub fn should_push(&self, remote: Option<f64>) -> bool {
        match remote {
            Some(value) => self.last_known != Some(value),
            None => false,
        }
    }

    /// 下发成功后提交
    pub fn commit(&mut self, value: f64, now: Instant) {
        self.last_known = Some(value);
        self.last_push_at = Some(now);
    }

    pub fn last_known(&self) -> Option<f64> {
        self.last_known
    }

    pub fn last_push_at(&self) -> Option<Instant> {
        self.last_push_at
    }
}

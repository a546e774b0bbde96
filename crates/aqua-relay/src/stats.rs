//! relay 运行统计
//!
//! 单线程循环独占，使用普通计数器即可。

use std::fmt;

/// relay 运行计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// 从串口读到的行数
    pub lines_received: u64,
    /// UTF-8 解码失败的行数
    pub decode_errors: u64,
    /// 帧解析失败的行数
    pub frames_rejected: u64,
    /// 发布成功的样本数
    pub samples_published: u64,
    /// 发布失败（已丢弃）的样本数
    pub publish_failures: u64,
    /// 设定值获取次数
    pub setpoint_fetches: u64,
    /// 设定值获取失败次数
    pub setpoint_fetch_failures: u64,
    /// 成功下发的设定值指令数
    pub setpoint_pushes: u64,
    /// 下发失败次数
    pub push_failures: u64,
    /// 出错的周期数
    pub cycle_errors: u64,
}

impl fmt::Display for RelayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lines={} decode_errors={} rejected={} published={} publish_failures={} \
             fetches={} fetch_failures={} pushes={} push_failures={} cycle_errors={}",
            self.lines_received,
            self.decode_errors,
            self.frames_rejected,
            self.samples_published,
            self.publish_failures,
            self.setpoint_fetches,
            self.setpoint_fetch_failures,
            self.setpoint_pushes,
            self.push_failures,
            self.cycle_errors,
        )
    }
}

//! relay 主循环
//!
//! 单线程轮询：每个周期先处理串口输入（至多一行），
//! 再按固定间隔从远端获取设定值并在变化时下发到控制器。
//!
//! ```text
//! Controller ──Serial──▶ FrameParser ──▶ Uplink::publish_sample ──HTTP──▶ Server
//! Server ──HTTP──▶ Uplink::fetch_setpoint ──▶ SetpointTracker ──▶ SET:<v>\n ──Serial──▶ Controller
//! ```
//!
//! # 状态机
//!
//! ```text
//! Disconnected ──start()──▶ Running ──stop flag──▶ ShuttingDown ──close link──▶ Stopped
//! ```
//!
//! 串口在 `Running → Stopped` 过程中恰好关闭一次，无论退出由信号、
//! 显式 `shutdown()` 还是 `Drop` 触发。

use crate::config::LoopTiming;
use crate::error::RelayError;
use crate::stats::RelayStats;
use crate::tracker::SetpointTracker;
use aqua_protocol::{FrameParser, SensorSample, encode_setpoint, format_setpoint};
use aqua_serial::{SerialError, SerialLink};
use aqua_uplink::{Uplink, UplinkError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// relay 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// 串口尚未打开
    Disconnected,
    /// 正常运行
    Running,
    /// 收到停止信号，正在关闭串口
    ShuttingDown,
    /// 已停止（终态）
    Stopped,
}

/// relay 主循环
///
/// 独占串口链路 `L` 和上行客户端 `U`。所有可变状态只在当前线程访问，不需要锁。
pub struct RelayLoop<L: SerialLink, U: Uplink> {
    state: RelayState,
    link: Option<L>,
    uplink: U,
    parser: FrameParser,
    tracker: SetpointTracker,
    timing: LoopTiming,
    /// 上次设定值检查时间；`None` 表示第一个周期立即检查
    last_setpoint_check: Option<Instant>,
    stats: RelayStats,
}

impl<L: SerialLink, U: Uplink> RelayLoop<L, U> {
    pub fn new(uplink: U, timing: LoopTiming) -> Self {
        Self {
            state: RelayState::Disconnected,
            link: None,
            uplink,
            parser: FrameParser::new(),
            tracker: SetpointTracker::new(),
            timing,
            last_setpoint_check: None,
            stats: RelayStats::default(),
        }
    }

    /// 打开串口，进入 `Running`
    ///
    /// 打开失败是致命错误：状态保持 `Disconnected`，不重试。
    pub fn start<F>(&mut self, open: F) -> Result<(), RelayError>
    where
        F: FnOnce() -> Result<L, SerialError>,
    {
        self.expect_state(RelayState::Disconnected)?;

        let link = match open() {
            Ok(link) => link,
            Err(e) => {
                error!("Failed to connect to controller: {}", e);
                return Err(e.into());
            },
        };

        info!("Relay running on {}", link.name());
        self.link = Some(link);
        self.last_setpoint_check = None;
        self.state = RelayState::Running;
        Ok(())
    }

    /// 运行直到 `running` 被置为 `false`，然后关闭串口
    ///
    /// 停止信号只在周期之间检查，不会中断正在进行的周期。
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), RelayError> {
        self.expect_state(RelayState::Running)?;

        while running.load(Ordering::Acquire) {
            match self.run_cycle(Instant::now()) {
                Ok(()) => spin_sleep::sleep(self.timing.poll_interval()),
                Err(e) => {
                    self.stats.cycle_errors += 1;
                    error!("Error in relay cycle: {}", e);
                    spin_sleep::sleep(self.timing.error_backoff());
                },
            }
        }

        info!("Received stop signal");
        self.shutdown();
        Ok(())
    }

    /// 执行一个周期（不休眠）
    ///
    /// 1. 串口有输入时读取一行 → 解析 → 发布
    /// 2. 距上次检查超过 `setpoint_interval` 时获取设定值，变化则下发
    ///
    /// 可恢复错误（解码、解析、HTTP、下发失败）在内部记录并吞掉；
    /// 返回 `Err` 的只有串口读取本身的故障。
    pub fn run_cycle(&mut self, now: Instant) -> Result<(), RelayError> {
        self.expect_state(RelayState::Running)?;

        self.receive_line()?;

        if self.setpoint_check_due(now) {
            // 无论结果如何都更新检查时间
            self.last_setpoint_check = Some(now);
            self.refresh_setpoint(now);
        }
        Ok(())
    }

    /// 关闭串口并进入 `Stopped`（幂等）
    pub fn shutdown(&mut self) {
        match self.state {
            RelayState::Stopped => return,
            RelayState::Disconnected => {
                self.state = RelayState::Stopped;
                return;
            },
            RelayState::Running | RelayState::ShuttingDown => {},
        }

        self.state = RelayState::ShuttingDown;
        if let Some(mut link) = self.link.take()
            && let Err(e) = link.close()
        {
            warn!("Failed to close serial link {}: {}", link.name(), e);
        }
        self.state = RelayState::Stopped;

        info!("Relay statistics: {}", self.stats);
        info!("Relay stopped");
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn tracker(&self) -> &SetpointTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    pub fn uplink(&self) -> &U {
        &self.uplink
    }

    fn expect_state(&self, expected: RelayState) -> Result<(), RelayError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RelayError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn link_mut(&mut self) -> Result<&mut L, RelayError> {
        self.link
            .as_mut()
            .ok_or(RelayError::Serial(SerialError::Closed))
    }

    fn setpoint_check_due(&self, now: Instant) -> bool {
        match self.last_setpoint_check {
            Some(last) => now.saturating_duration_since(last) >= self.timing.setpoint_interval(),
            None => true,
        }
    }

    // ============================================================
    // 上行：串口 → 解析 → HTTP
    // ============================================================

    fn receive_line(&mut self) -> Result<(), RelayError> {
        let link = self.link_mut()?;
        if !link.has_input()? {
            return Ok(());
        }
        let Some(raw) = link.read_line()? else {
            return Ok(());
        };
        self.stats.lines_received += 1;

        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!("Decode error on serial line: {}", e);
                return Ok(());
            },
        };
        let line = text.trim();
        if line.is_empty() {
            return Ok(());
        }

        debug!("Controller -> {}", line);
        match self.parser.parse_line(line) {
            Some(sample) => self.publish(&sample),
            None => self.stats.frames_rejected += 1,
        }
        Ok(())
    }

    fn publish(&mut self, sample: &SensorSample) {
        match self.uplink.publish_sample(sample) {
            Ok(()) => {
                self.stats.samples_published += 1;
                debug!(
                    "Data -> Server: WA={}°C, AI={}°C, HU={}%",
                    sample.water_temp, sample.air_temp, sample.humidity
                );
            },
            Err(e) => {
                self.stats.publish_failures += 1;
                match &e {
                    UplinkError::Connection { url, .. } => {
                        error!("Connection error: cannot reach {}", url)
                    },
                    UplinkError::Timeout { .. } => error!("Request timeout: server not responding"),
                    UplinkError::Status { code, body } => {
                        warn!("Server error ({}): {}", code, body)
                    },
                    UplinkError::Decode(_) | UplinkError::Other(_) => {
                        error!("Error sending data: {}", e)
                    },
                }
            },
        }
    }

    // ============================================================
    // 下行：HTTP → 设定值跟踪 → 串口
    // ============================================================

    fn refresh_setpoint(&mut self, now: Instant) {
        self.stats.setpoint_fetches += 1;
        let reading = match self.uplink.fetch_setpoint() {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.setpoint_fetch_failures += 1;
                match &e {
                    // 网络抖动时的常态，降低日志级别
                    UplinkError::Connection { .. } | UplinkError::Timeout { .. } => {
                        debug!("Cannot reach server, will retry: {}", e)
                    },
                    UplinkError::Status { code, .. } => {
                        warn!("Failed to get setpoint ({})", code)
                    },
                    UplinkError::Decode(_) | UplinkError::Other(_) => {
                        warn!("Error getting setpoint: {}", e)
                    },
                }
                return;
            },
        };

        let value = reading.setpoint;
        if !self.tracker.should_push(Some(value)) {
            return;
        }

        if !reading.is_within_bounds() {
            warn!(
                "Setpoint {} outside server bounds [{:?}, {:?}], relaying anyway",
                value, reading.min_setpoint, reading.max_setpoint
            );
        }
        match self.tracker.last_known() {
            Some(previous) => info!(
                "Setpoint changed: {} -> {}°C",
                format_setpoint(previous),
                format_setpoint(value)
            ),
            None => info!("Initial setpoint: {}°C", format_setpoint(value)),
        }

        self.push_setpoint(value, now);
    }

    fn push_setpoint(&mut self, value: f64, now: Instant) {
        let command = encode_setpoint(value);
        let result = match self.link_mut() {
            Ok(link) => link.write_all(&command).map_err(RelayError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.tracker.commit(value, now);
                self.stats.setpoint_pushes += 1;
                info!("Controller <- SET:{}", format_setpoint(value));
            },
            Err(e) => {
                // 不提交：下一次获取到同样的值会重试
                self.stats.push_failures += 1;
                error!(
                    "Failed to send setpoint {} to controller: {}",
                    format_setpoint(value),
                    e
                );
            },
        }
    }
}

impl<L: SerialLink, U: Uplink> Drop for RelayLoop<L, U> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_serial::{MockSerialHandle, MockSerialLink};
    use aqua_uplink::SetpointReading;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct StubUplink {
        setpoints: VecDeque<Result<SetpointReading, UplinkError>>,
        published: Vec<SensorSample>,
    }

    impl Uplink for StubUplink {
        fn publish_sample(&mut self, sample: &SensorSample) -> Result<(), UplinkError> {
            self.published.push(*sample);
            Ok(())
        }

        fn fetch_setpoint(&mut self) -> Result<SetpointReading, UplinkError> {
            self.setpoints
                .pop_front()
                .unwrap_or(Err(UplinkError::Other("no scripted response".into())))
        }
    }

    fn running_relay(uplink: StubUplink) -> (RelayLoop<MockSerialLink, StubUplink>, MockSerialHandle) {
        let (link, handle) = MockSerialLink::new("mock0");
        let mut relay = RelayLoop::new(uplink, LoopTiming::default());
        relay.start(|| Ok(link)).unwrap();
        (relay, handle)
    }

    #[test]
    fn test_initial_state() {
        let relay: RelayLoop<MockSerialLink, StubUplink> =
            RelayLoop::new(StubUplink::default(), LoopTiming::default());
        assert_eq!(relay.state(), RelayState::Disconnected);
        assert!(matches!(
            relay.expect_state(RelayState::Running),
            Err(RelayError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_open_failure_is_fatal_and_stays_disconnected() {
        let mut relay: RelayLoop<MockSerialLink, StubUplink> =
            RelayLoop::new(StubUplink::default(), LoopTiming::default());
        let err = relay.start(|| Err(SerialError::Closed)).unwrap_err();
        assert!(matches!(err, RelayError::Serial(SerialError::Closed)));
        assert_eq!(relay.state(), RelayState::Disconnected);
        assert!(relay.run_cycle(Instant::now()).is_err());
    }

    #[test]
    fn test_setpoint_cadence() {
        let mut uplink = StubUplink::default();
        for _ in 0..3 {
            uplink.setpoints.push_back(Ok(SetpointReading::new(25.0)));
        }
        let (mut relay, _handle) = running_relay(uplink);
        let t0 = Instant::now();

        relay.run_cycle(t0).unwrap();
        relay.run_cycle(t0 + Duration::from_millis(100)).unwrap();
        relay.run_cycle(t0 + Duration::from_millis(499)).unwrap();
        assert_eq!(relay.stats().setpoint_fetches, 1);

        relay.run_cycle(t0 + Duration::from_millis(500)).unwrap();
        assert_eq!(relay.stats().setpoint_fetches, 2);
    }

    #[test]
    fn test_failed_fetch_still_advances_check_time() {
        let (mut relay, handle) = running_relay(StubUplink::default());
        let t0 = Instant::now();

        relay.run_cycle(t0).unwrap();
        relay.run_cycle(t0 + Duration::from_millis(200)).unwrap();
        assert_eq!(relay.stats().setpoint_fetches, 1);
        assert_eq!(relay.stats().setpoint_fetch_failures, 1);
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_shutdown_closes_once() {
        let (mut relay, handle) = running_relay(StubUplink::default());
        relay.shutdown();
        relay.shutdown();
        assert_eq!(relay.state(), RelayState::Stopped);
        drop(relay);
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn test_drop_closes_link() {
        let (relay, handle) = running_relay(StubUplink::default());
        drop(relay);
        assert_eq!(handle.close_count(), 1);
    }

    #[test]
    fn test_run_exits_when_stop_flag_cleared() {
        let (mut relay, handle) = running_relay(StubUplink::default());
        let running = AtomicBool::new(false);
        relay.run(&running).unwrap();
        assert_eq!(relay.state(), RelayState::Stopped);
        assert_eq!(handle.close_count(), 1);
        assert!(relay.run(&running).is_err());
    }

    #[test]
    fn test_start_twice_rejected() {
        let (mut relay, _handle) = running_relay(StubUplink::default());
        let (other, _) = MockSerialLink::new("mock1");
        assert!(matches!(
            relay.start(|| Ok(other)),
            Err(RelayError::InvalidState { .. })
        ));
    }
}

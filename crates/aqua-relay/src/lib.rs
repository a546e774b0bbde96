//! # Aqua Relay
//!
//! 串口控制器 ⇄ HTTP 服务 的双向中继：
//!
//! - 上行：控制器周期性输出的传感器帧 → 解析 → `POST /sensor-data/`
//! - 下行：`GET /setpoint/` → 与最后下发值比较 → 变化时写 `SET:<v>\n`
//!
//! [`RelayLoop`] 是单线程轮询循环，通过 [`SerialLink`](aqua_serial::SerialLink)
//! 和 [`Uplink`](aqua_uplink::Uplink) 两个 trait 访问外部世界，测试中可替换为 mock。

pub mod config;
mod error;
pub mod relay;
pub mod stats;
pub mod tracker;

pub use config::{LoopTiming, RelayConfig, SerialSection, UplinkSection};
pub use error::{ConfigError, RelayError};
pub use relay::{RelayLoop, RelayState};
pub use stats::RelayStats;
pub use tracker::SetpointTracker;

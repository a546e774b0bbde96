//! 水族箱串口桥主入口
//!
//! ```bash
//! # 默认配置（/dev/ttyUSB0 @ 9600，http://localhost:8000/api）
//! aqua-bridge
//!
//! # 指定串口与服务地址
//! aqua-bridge --port COM3 --base-url http://192.168.1.100:8000/api
//!
//! # 从配置文件加载，命令行覆盖波特率
//! aqua-bridge --config bridge.toml --baudrate 115200 --verbose
//! ```

mod args;
mod logging;

use anyhow::{Context, Result};
use aqua_relay::RelayLoop;
use aqua_serial::SerialPortLink;
use aqua_uplink::HttpUplink;
use args::Args;
use clap::Parser;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = args
        .resolve_config()
        .context("Failed to load configuration")?;

    let _log_guard = logging::init(args.verbose, args.log_file().map(|p| p.as_path()))?;

    // Ctrl+C：只清除标志，当前周期结束后由主循环退出并关闭串口
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::Release);
    })
    .expect("Failed to set signal handler");

    let port_config = config.serial.to_port_config();
    let uplink_config = config.uplink.to_uplink_config();

    let uplink = HttpUplink::new(&uplink_config);

    info!("==================================================");
    info!("Aquarium bridge starting");
    info!("  Serial: {} @ {} baud", port_config.port, port_config.baud_rate);
    info!("  Sensor data -> {}", uplink.sensor_data_url());
    info!("  Setpoint    <- {}", uplink.setpoint_url());
    info!(
        "  Setpoint check every {} ms",
        config.timing.setpoint_interval_ms
    );
    info!("==================================================");

    let mut relay = RelayLoop::new(uplink, config.timing);

    relay
        .start(|| SerialPortLink::open(&port_config))
        .context("Cannot start without the controller")?;

    info!("Bridge running. Press Ctrl+C to stop.");
    relay.run(&running)?;

    info!("Bridge stopped");
    Ok(())
}

//! 日志初始化
//!
//! 终端（stderr）始终输出；可选的日志文件通过 `tracing-appender` 的非阻塞写入器追加写入。
//! 返回的 [`WorkerGuard`] 必须在 `main` 结束前一直持有，否则缓冲中的日志会丢失。

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const CRATES: [&str; 5] = [
    "aqua_bridge",
    "aqua_relay",
    "aqua_uplink",
    "aqua_serial",
    "aqua_protocol",
];

fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// 初始化全局 subscriber
///
/// 设置了 `RUST_LOG` 时以其为准，否则按 `verbose` 选择本项目各 crate 的级别。
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(verbose)))
        .context("Invalid log filter")?;

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(default_filter(false).contains("aqua_relay=info"));
        assert!(default_filter(true).contains("aqua_protocol=debug"));
        EnvFilter::try_new(default_filter(true)).unwrap();
    }
}

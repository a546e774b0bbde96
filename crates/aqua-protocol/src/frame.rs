//! 上行传感器帧解析
//!
//! 控制器每个采样周期输出一行：
//!
//! ```text
//! {WA:24.50,AI:26.20,HU:60.50,SP:25.00,PWR:120}
//! ```
//!
//! - `WA`: 水温（°C）
//! - `AI`: 气温（°C）
//! - `HU`: 湿度（%）
//! - `SP`: 控制器当前设定值（°C）
//! - `PWR`: PID 输出（-255 ~ +255）

use crate::{FrameError, SensorSample};
use tracing::warn;

pub const TAG_WATER_TEMP: &str = "WA";
pub const TAG_AIR_TEMP: &str = "AI";
pub const TAG_HUMIDITY: &str = "HU";
pub const TAG_SETPOINT: &str = "SP";
pub const TAG_OUTPUT: &str = "PWR";

/// 必需字段（顺序即 `SensorSample` 字段顺序）
pub const REQUIRED_TAGS: [&str; 5] = [
    TAG_WATER_TEMP,
    TAG_AIR_TEMP,
    TAG_HUMIDITY,
    TAG_SETPOINT,
    TAG_OUTPUT,
];

fn tag_slot(tag: &str) -> Option<usize> {
    REQUIRED_TAGS.iter().position(|t| *t == tag)
}

/// 解析一行传感器帧
///
/// 规则：
/// - 去掉首尾空白，以及最多一个前导 `{` 和一个结尾 `}`
/// - 按 `,` 拆分为 `tag:value`，每一项必须恰好包含一个 `:`
/// - 所有值都按浮点数解析（`nan`/`inf` 视为非数值）
/// - 五个必需字段缺一不可；未知字段忽略，重复字段以最后一次为准
///
/// 任何一项失败都会使整行失败。
///
/// # Example
///
/// ```
/// use aqua_protocol::parse_frame;
///
/// let sample = parse_frame("{WA:24.50,AI:26.20,HU:60.50,SP:25.00,PWR:120}").unwrap();
/// assert_eq!(sample.water_temp, 24.5);
/// assert_eq!(sample.output, 120);
/// ```
pub fn parse_frame(line: &str) -> Result<SensorSample, FrameError> {
    let body = line.trim();
    let body = body.strip_prefix('{').unwrap_or(body);
    let body = body.strip_suffix('}').unwrap_or(body).trim();

    if body.is_empty() {
        return Err(FrameError::Empty);
    }

    let mut slots: [Option<f64>; 5] = [None; 5];

    for pair in body.split(',') {
        let mut parts = pair.split(':');
        let (tag, raw) = match (parts.next(), parts.next(), parts.next()) {
            (Some(tag), Some(raw), None) => (tag.trim(), raw.trim()),
            _ => {
                return Err(FrameError::MalformedPair {
                    pair: pair.trim().to_string(),
                });
            },
        };

        let value = match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                return Err(FrameError::InvalidNumber {
                    tag: tag.to_string(),
                    value: raw.to_string(),
                });
            },
        };

        if let Some(slot) = tag_slot(tag) {
            slots[slot] = Some(value);
        }
    }

    let mut values = [0.0f64; 5];
    for (i, tag) in REQUIRED_TAGS.into_iter().enumerate() {
        values[i] = slots[i].ok_or(FrameError::MissingField { tag })?;
    }

    let output = values[4].round();
    if output < i32::MIN as f64 || output > i32::MAX as f64 {
        return Err(FrameError::OutputOutOfRange { value: values[4] });
    }

    Ok(SensorSample {
        water_temp: values[0],
        air_temp: values[1],
        humidity: values[2],
        setpoint: values[3],
        output: output as i32,
    })
}

/// 串口行解析器
///
/// 在 [`parse_frame`] 之上包装日志策略：解析失败时输出一条 `warn` 日志
/// （包含原始行和失败原因），并返回 `None`，不会把错误抛给调用方。
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameParser;

impl FrameParser {
    pub fn new() -> Self {
        Self
    }

    /// 解析一行，失败时记录警告并返回 `None`
    pub fn parse_line(&self, line: &str) -> Option<SensorSample> {
        match parse_frame(line) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Failed to parse sensor frame {:?}: {}", line, e);
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_reference_frame() {
        let sample = parse_frame("{WA:24.50,AI:26.20,HU:60.50,SP:25.00,PWR:120}").unwrap();
        assert_eq!(
            sample,
            SensorSample {
                water_temp: 24.5,
                air_temp: 26.2,
                humidity: 60.5,
                setpoint: 25.0,
                output: 120,
            }
        );
    }

    #[test]
    fn test_parse_without_braces_and_with_whitespace() {
        let sample = parse_frame("  PWR : -80 , SP:22 ,HU: 41.5,AI :19.0, WA:18.25 \r").unwrap();
        assert_eq!(sample.water_temp, 18.25);
        assert_eq!(sample.air_temp, 19.0);
        assert_eq!(sample.humidity, 41.5);
        assert_eq!(sample.setpoint, 22.0);
        assert_eq!(sample.output, -80);
    }

    #[test]
    fn test_parse_whitespace_inside_braces() {
        let sample = parse_frame(" { WA:1,AI:2,HU:3,SP:4,PWR:5 } ").unwrap();
        assert_eq!(sample.output, 5);
    }

    #[test]
    fn test_non_numeric_value_rejects_line() {
        let err = parse_frame("{WA:24.50,AI:bad,HU:60.50,SP:25.00,PWR:120}").unwrap_err();
        assert_eq!(
            err,
            FrameError::InvalidNumber {
                tag: "AI".to_string(),
                value: "bad".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_field_rejects_line() {
        let err = parse_frame("{WA:24.50,AI:26.20,HU:60.50,SP:25.00}").unwrap_err();
        assert_eq!(err, FrameError::MissingField { tag: "PWR" });
    }

    #[test]
    fn test_malformed_pairs() {
        assert!(matches!(
            parse_frame("{WA:24.50,AI26.20,HU:60.50,SP:25.00,PWR:120}"),
            Err(FrameError::MalformedPair { .. })
        ));
        assert!(matches!(
            parse_frame("{WA:24.50:1,AI:26.20,HU:60.50,SP:25.00,PWR:120}"),
            Err(FrameError::MalformedPair { .. })
        ));
        // 结尾多余的逗号产生空项
        assert!(matches!(
            parse_frame("{WA:24.50,AI:26.20,HU:60.50,SP:25.00,PWR:120,}"),
            Err(FrameError::MalformedPair { .. })
        ));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        // 串口中途断开时常见的半行
        assert!(parse_frame("{WA:24.50,AI:26.20,HU:6").is_err());
        assert!(parse_frame("0,SP:25.00,PWR:120}").is_err());
    }

    #[test]
    fn test_empty_frames() {
        assert_eq!(parse_frame(""), Err(FrameError::Empty));
        assert_eq!(parse_frame("   "), Err(FrameError::Empty));
        assert_eq!(parse_frame("{}"), Err(FrameError::Empty));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        assert!(matches!(
            parse_frame("{WA:nan,AI:26.20,HU:60.50,SP:25.00,PWR:120}"),
            Err(FrameError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_frame("{WA:24.5,AI:26.20,HU:inf,SP:25.00,PWR:120}"),
            Err(FrameError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_unknown_tags_ignored_and_duplicates_last_wins() {
        let sample = parse_frame("{WA:1,AI:2,HU:3,SP:4,PWR:5,PH:7.1,WA:9}").unwrap();
        assert_eq!(sample.water_temp, 9.0);
    }

    #[test]
    fn test_output_rounding() {
        let sample = parse_frame("{WA:1,AI:2,HU:3,SP:4,PWR:-127.6}").unwrap();
        assert_eq!(sample.output, -128);
        assert!(matches!(
            parse_frame("{WA:1,AI:2,HU:3,SP:4,PWR:1e12}"),
            Err(FrameError::OutputOutOfRange { .. })
        ));
    }

    #[test]
    fn test_frame_parser_returns_none_on_error() {
        let parser = FrameParser::new();
        assert!(parser.parse_line("{WA:24.50,AI:bad,HU:60.50,SP:25.00,PWR:120}").is_none());
        assert!(parser.parse_line("{WA:24.50,AI:26.2,HU:60.50,SP:25.00,PWR:120}").is_some());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_logs(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_frame_parser_warns_with_raw_line() {
        let raw = "{WA:24.50,AI:bad,HU:60.50,SP:25.00,PWR:120}";
        let parser = FrameParser::new();

        let logs = captured_logs(|| {
            assert!(parser.parse_line(raw).is_none());
        });

        let lines: Vec<&str> = logs.lines().collect();
        assert_eq!(lines.len(), 1, "{}", logs);
        assert!(lines[0].trim_start().starts_with("WARN"), "{}", lines[0]);
        assert!(lines[0].contains(raw), "{}", lines[0]);
        assert!(lines[0].contains("AI"), "{}", lines[0]);
    }

    #[test]
    fn test_frame_parser_silent_on_success() {
        let parser = FrameParser::new();
        let logs = captured_logs(|| {
            assert!(parser.parse_line("{WA:1,AI:2,HU:3,SP:4,PWR:5}").is_some());
        });
        assert!(logs.is_empty(), "{}", logs);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sample_json_shape() {
        let sample = parse_frame("{WA:24.50,AI:26.20,HU:60.50,SP:25.00,PWR:120}").unwrap();
        let json = serde_json::to_value(sample).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"WA": 24.5, "AI": 26.2, "HU": 60.5, "SP": 25.0, "PWR": 120})
        );
    }
}

//! 下行设定值指令编码
//!
//! 控制器固件按如下方式处理串口输入：
//!
//! ```text
//! if (incoming.startsWith("SET:")) {
//!     setPoint = incoming.substring(4).toFloat();
//! }
//! ```

/// 设定值指令前缀
pub const SETPOINT_COMMAND_PREFIX: &str = "SET:";

/// 设定值的规范十进制文本
///
/// 使用最短往返表示，并保证至少一位小数（`25` → `25.0`），
/// 与控制器日志和上位机显示保持一致。
///
/// 调用方负责保证 `value` 是有限值（上行解析已拒绝 NaN/Inf）。
pub fn format_setpoint(value: f64) -> String {
    let mut text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// 编码设定值指令：`SET:<value>\n`
///
/// # Example
///
/// ```
/// use aqua_protocol::encode_setpoint;
///
/// assert_eq!(encode_setpoint(27.5), b"SET:27.5\n".to_vec());
/// ```
pub fn encode_setpoint(value: f64) -> Vec<u8> {
    debug_assert!(value.is_finite(), "setpoint must be finite");
    format!("{}{}\n", SETPOINT_COMMAND_PREFIX, format_setpoint(value)).into_bytes()
}

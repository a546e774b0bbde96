//! 基于 `ureq` 的同步 HTTP 上行客户端
//!
//! relay 是单线程轮询模型，HTTP 调用在超时范围内阻塞当前周期即可，
//! 不需要异步运行时。

use crate::{SetpointReading, Uplink, UplinkConfig, UplinkError};
use aqua_protocol::SensorSample;
use std::io;
use tracing::trace;
use ureq::{Agent, AgentBuilder, ErrorKind, Response, Transport};

/// 错误信息中保留的响应体最大长度
const MAX_ERROR_BODY: usize = 200;

/// HTTP 上行客户端
#[derive(Debug, Clone)]
pub struct HttpUplink {
    agent: Agent,
    sensor_data_url: String,
    setpoint_url: String,
}

impl HttpUplink {
    pub fn new(config: &UplinkConfig) -> Self {
        let agent = AgentBuilder::new().timeout(config.timeout).build();
        Self {
            agent,
            sensor_data_url: config.sensor_data_url(),
            setpoint_url: config.setpoint_url(),
        }
    }

    pub fn sensor_data_url(&self) -> &str {
        &self.sensor_data_url
    }

    pub fn setpoint_url(&self) -> &str {
        &self.setpoint_url
    }
}

impl Uplink for HttpUplink {
    fn publish_sample(&mut self, sample: &SensorSample) -> Result<(), UplinkError> {
        let result = self.agent.post(&self.sensor_data_url).send_json(sample);
        let response = accept_ok(&self.sensor_data_url, result)?;
        trace!("POST {} -> {}", self.sensor_data_url, response.status());
        Ok(())
    }

    fn fetch_setpoint(&mut self) -> Result<SetpointReading, UplinkError> {
        let result = self.agent.get(&self.setpoint_url).call();
        let response = accept_ok(&self.setpoint_url, result)?;
        response
            .into_json::<SetpointReading>()
            .map_err(|e| UplinkError::Decode(e.to_string()))
    }
}

/// 只接受 HTTP 200，其余一律转换为 [`UplinkError`]
fn accept_ok(url: &str, result: Result<Response, ureq::Error>) -> Result<Response, UplinkError> {
    match result {
        Ok(response) if response.status() == 200 => Ok(response),
        Ok(response) | Err(ureq::Error::Status(_, response)) => Err(UplinkError::Status {
            code: response.status(),
            body: truncated_body(response),
        }),
        Err(ureq::Error::Transport(transport)) => Err(classify_transport(url, transport)),
    }
}

fn truncated_body(response: Response) -> String {
    let body = response.into_string().unwrap_or_default();
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body,
    }
}

/// 区分 连接失败 / 超时 / 其他
///
/// 连接阶段超时也会以 `ConnectionFailed` 报告，因此先检查超时。
fn classify_transport(url: &str, transport: Transport) -> UplinkError {
    if is_timeout(&transport) {
        return UplinkError::Timeout {
            url: url.to_string(),
        };
    }
    match transport.kind() {
        ErrorKind::ConnectionFailed | ErrorKind::Dns => UplinkError::Connection {
            url: url.to_string(),
            message: transport.to_string(),
        },
        _ => UplinkError::Other(transport.to_string()),
    }
}

fn is_timeout(transport: &Transport) -> bool {
    let io_timeout = std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .is_some_and(|e| matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock));
    io_timeout || transport.to_string().contains("timed out")
}

//! 流式传输错误类型
//!
//! 解码层面的问题（无法解析的帧负载）不在此处：编解码器完全吸收它们，
//! 只计数、不上抛。这里只定义需要传播到会话层的终态性错误。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 流式传输错误类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum StreamError {
    /// 初始响应被拒绝（请求从未进入流式阶段）
    ///
    /// 携带状态码与服务端返回的错误正文。
    Rejected { status: u16, message: String },

    /// 传输中断（连接失败或流中途断开）
    Transport(String),

    /// 用户取消
    ///
    /// 不是错误，而是正常终态：已到达的部分输出保留并作为最终结果呈现。
    Cancelled,
}

impl StreamError {
    /// 创建传输错误
    pub fn transport(msg: impl Into<String>) -> Self {
        StreamError::Transport(msg.into())
    }

    /// 创建拒绝错误
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        StreamError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// 是否为用户取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Rejected { status, message } => {
                write!(f, "请求被拒绝 (HTTP {}): {}", status, message)
            }
            StreamError::Transport(msg) => write!(f, "传输中断: {}", msg),
            StreamError::Cancelled => write!(f, "已取消"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StreamError::Transport("请求超时".to_string())
        } else if err.is_connect() {
            StreamError::Transport(format!("连接失败: {}", err))
        } else {
            StreamError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StreamError::rejected(401, "invalid api key");
        assert_eq!(err.to_string(), "请求被拒绝 (HTTP 401): invalid api key");

        let err = StreamError::transport("connection reset");
        assert_eq!(err.to_string(), "传输中断: connection reset");
    }

    #[test]
    fn test_is_cancelled() {
        assert!(StreamError::Cancelled.is_cancelled());
        assert!(!StreamError::transport("x").is_cancelled());
        assert!(!StreamError::rejected(500, "x").is_cancelled());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let err = StreamError::rejected(429, "rate limited");
        let json = serde_json::to_string(&err).unwrap();
        let parsed: StreamError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, parsed);
    }
}

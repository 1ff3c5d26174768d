//! 统一的 Provider 错误类型
//!
//! 区分凭证缺失、上游拒绝与传输失败，并提供用户友好的中文错误信息。
//! 上游拒绝携带状态码与上游返回的错误正文，在任何字节被中继之前产生。

use std::error::Error;
use std::fmt;

/// Provider 统一错误类型
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// 凭证缺失：未配置 API Key，请求立即失败，不会尝试上游调用
    MissingCredential(String),

    /// 上游拒绝：初始响应状态非成功
    /// 携带状态码与上游错误正文（截断后）
    UpstreamRejected { status: u16, body: String },

    /// 网络错误：连接失败、超时、DNS 解析失败等
    Network(String),

    /// 解析错误：一次性响应的 JSON 不符合预期
    Parse(String),
}

impl ProviderError {
    /// 从 HTTP 状态码创建上游拒绝错误
    pub fn from_http_status(status: u16, body: &str) -> Self {
        ProviderError::UpstreamRejected {
            status,
            body: truncate_message(body, 500),
        }
    }

    /// 从 reqwest 错误创建
    pub fn from_reqwest_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Network("请求超时".to_string())
        } else if err.is_connect() {
            ProviderError::Network("无法连接到服务器".to_string())
        } else if err.is_decode() {
            ProviderError::Parse("响应解码失败".to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }

    /// 获取对应的 HTTP 状态码
    ///
    /// 上游拒绝透传上游状态码；凭证缺失归为服务端配置问题；
    /// 网络/解析失败归为网关错误。
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::MissingCredential(_) => 500,
            ProviderError::UpstreamRejected { status, .. } => *status,
            ProviderError::Network(_) => 502,
            ProviderError::Parse(_) => 502,
        }
    }

    /// 获取简短的错误描述
    pub fn short_message(&self) -> &'static str {
        match self {
            ProviderError::MissingCredential(_) => "凭证缺失",
            ProviderError::UpstreamRejected { .. } => "上游拒绝请求",
            ProviderError::Network(_) => "网络连接失败",
            ProviderError::Parse(_) => "数据解析失败",
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::MissingCredential(msg) => {
                write!(f, "凭证缺失，请检查环境配置。详情：{}", msg)
            }
            ProviderError::UpstreamRejected { status, body } => {
                write!(f, "上游拒绝请求 (HTTP {}): {}", status, body)
            }
            ProviderError::Network(msg) => write!(f, "网络连接失败: {}", msg),
            ProviderError::Parse(msg) => write!(f, "数据解析失败: {}", msg),
        }
    }
}

impl Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::from_reqwest_error(&err)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

/// 截断消息到指定长度
fn truncate_message(msg: &str, max_len: usize) -> String {
    if msg.len() <= max_len {
        msg.to_string()
    } else {
        let mut end = max_len;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &msg[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        let err = ProviderError::from_http_status(401, "Unauthorized");
        assert!(matches!(
            err,
            ProviderError::UpstreamRejected { status: 401, .. }
        ));
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ProviderError::MissingCredential("test".to_string()).status_code(),
            500
        );
        assert_eq!(ProviderError::Network("test".to_string()).status_code(), 502);
        assert_eq!(ProviderError::from_http_status(429, "rate limited").status_code(), 429);
    }

    #[test]
    fn test_display_includes_status_and_body() {
        let err = ProviderError::from_http_status(503, "service unavailable");
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("service unavailable"));
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(
            truncate_message("this is a long message", 10),
            "this is a ..."
        );
        // 截断点落在多字节字符中间时回退到字符边界
        let truncated = truncate_message("错误信息很长", 4);
        assert!(truncated.ends_with("..."));
    }
}

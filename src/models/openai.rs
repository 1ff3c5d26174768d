//! 上游 API 数据模型（OpenAI 兼容格式）
//!
//! 只建模驱动中继所需的线上形状；流式响应帧用 `serde_json::Value`
//! 做宽容解析，不在此处建模。

use serde::{Deserialize, Serialize};

/// 聊天消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// 创建用户消息
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// 聊天补全请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// 组图模式选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequentialOptions {
    pub max_images: u32,
}

/// 图像生成请求
///
/// `n` 与组图模式二选一，未使用的字段不序列化。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation_options: Option<SequentialOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// 图像描述符
///
/// 上游每帧的 `data` 数组由若干条目组成，`url` 是唯一必需字段，
/// 其余字段宽容处理。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageDescriptor {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revised_prompt: Option<String>,
}

/// 图像生成响应（一次性返回的变体）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    pub data: Vec<ImageDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatCompletionRequest {
            model: "glm-4.5".to_string(),
            messages: vec![ChatMessage::user("你好")],
            stream: true,
            max_tokens: Some(8192),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "glm-4.5");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 8192);
    }

    #[test]
    fn test_image_request_skips_unused_fields() {
        let request = ImageGenerationRequest {
            model: "cogview-3-flash".to_string(),
            prompt: "一只猫".to_string(),
            size: "1024x1024".to_string(),
            n: Some(2),
            sequential_image_generation: None,
            sequential_image_generation_options: None,
            stream: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["n"], 2);
        assert!(json.get("sequential_image_generation").is_none());
        assert!(json.get("stream").is_none());
    }

    #[test]
    fn test_image_descriptor_tolerates_extra_fields() {
        let descriptor: ImageDescriptor = serde_json::from_str(
            r#"{"url":"https://example.com/a.png","b64_json":null,"index":0}"#,
        )
        .unwrap();
        assert_eq!(descriptor.url, "https://example.com/a.png");
        assert!(descriptor.revised_prompt.is_none());
    }
}

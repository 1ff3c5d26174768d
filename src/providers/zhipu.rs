//! 智谱 Provider（OpenAI 兼容 API）
//!
//! 上游连接器：给定请求信封，打开恰好一条到上游的流式连接。
//! 初始响应非成功时立即返回结构化错误（含状态码与上游错误正文），
//! 此时还没有任何字节被中继、也没有任何流式响应头被发出；
//! 初始响应成功时把响应体作为拉取式字节流暴露出去，不做缓冲。

use crate::config::{ImageCountMode, ZhipuConfig};
use crate::models::openai::{
    ChatCompletionRequest, ChatMessage, ImageGenerationRequest, ImageGenerationResponse,
    SequentialOptions,
};
use crate::providers::ProviderError;
use crate::streaming::{response_byte_stream, ByteStream};
use reqwest::Client;
use serde::Serialize;

/// 智谱 Provider
pub struct ZhipuProvider {
    config: ZhipuConfig,
    client: Client,
}

impl ZhipuProvider {
    /// 创建 Provider
    pub fn new(config: ZhipuConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// 是否已配置凭证
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config.api_key.as_deref().ok_or_else(|| {
            ProviderError::MissingCredential("ZHIPUAI_API_KEY 未设置".to_string())
        })
    }

    /// 构建完整的 API URL
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// 发起流式聊天请求，返回上游响应体的原始字节流
    pub async fn chat_stream(&self, message: &str) -> Result<ByteStream, ProviderError> {
        let request = ChatCompletionRequest {
            model: self.config.chat_model.clone(),
            messages: vec![ChatMessage::user(message)],
            stream: true,
            max_tokens: Some(self.config.max_tokens),
        };
        let url = self.build_url("chat/completions");

        tracing::info!(
            "[ZHIPU_STREAM] 发起流式聊天请求: url={} model={}",
            url,
            request.model
        );
        self.open_stream(&url, &request).await
    }

    /// 发起流式图像生成请求
    pub async fn image_stream(&self, prompt: &str) -> Result<ByteStream, ProviderError> {
        let request = self.image_request(prompt, true);
        let url = self.build_url("images/generations");

        tracing::info!(
            "[ZHIPU_STREAM] 发起流式图像请求: url={} model={}",
            url,
            request.model
        );
        self.open_stream(&url, &request).await
    }

    /// 一次性图像生成（非流式变体）
    pub async fn generate_images(
        &self,
        prompt: &str,
    ) -> Result<ImageGenerationResponse, ProviderError> {
        let api_key = self.api_key()?;
        let request = self.image_request(prompt, false);
        let url = self.build_url("images/generations");

        tracing::info!(
            "[ZHIPU] 发起图像生成请求: url={} model={}",
            url,
            request.model
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("[ZHIPU] 图像请求被拒绝: {} - {}", status, body);
            return Err(ProviderError::from_http_status(status.as_u16(), &body));
        }

        let response: ImageGenerationResponse = resp.json().await?;
        Ok(response)
    }

    /// 构建图像生成请求体
    ///
    /// 根据配置选择固定张数或组图模式两种请求形状。
    fn image_request(&self, prompt: &str, stream: bool) -> ImageGenerationRequest {
        let mut request = ImageGenerationRequest {
            model: self.config.image_model.clone(),
            prompt: prompt.to_string(),
            size: self.config.image_size.clone(),
            n: None,
            sequential_image_generation: None,
            sequential_image_generation_options: None,
            stream: stream.then_some(true),
        };
        match self.config.image_count {
            ImageCountMode::Fixed(n) => request.n = Some(n),
            ImageCountMode::Sequential(max_images) => {
                request.sequential_image_generation = Some("auto".to_string());
                request.sequential_image_generation_options =
                    Some(SequentialOptions { max_images });
            }
        }
        request
    }

    /// 打开一条流式连接
    ///
    /// 初始状态检查在消费任何响应体之前完成，失败时快速返回。
    async fn open_stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<ByteStream, ProviderError> {
        let api_key = self.api_key()?;

        let resp = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("[ZHIPU_STREAM] 上游拒绝请求: {} - {}", status, body);
            return Err(ProviderError::from_http_status(status.as_u16(), &body));
        }

        tracing::debug!("[ZHIPU_STREAM] 流式响应开始: status={}", status);
        Ok(response_byte_stream(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageCountMode;

    fn provider_with(config: ZhipuConfig) -> ZhipuProvider {
        ZhipuProvider::new(config)
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let provider = provider_with(ZhipuConfig {
            base_url: "https://open.bigmodel.cn/api/paas/v4/".to_string(),
            ..ZhipuConfig::default()
        });
        assert_eq!(
            provider.build_url("chat/completions"),
            "https://open.bigmodel.cn/api/paas/v4/chat/completions"
        );
    }

    #[test]
    fn test_missing_credential_fails_before_upstream_call() {
        let provider = provider_with(ZhipuConfig::default());
        assert!(!provider.is_configured());
        assert!(matches!(
            provider.api_key(),
            Err(ProviderError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_image_request_fixed_count() {
        let provider = provider_with(ZhipuConfig {
            image_count: ImageCountMode::Fixed(2),
            ..ZhipuConfig::default()
        });
        let request = provider.image_request("一只猫", false);
        assert_eq!(request.n, Some(2));
        assert!(request.sequential_image_generation.is_none());
        assert!(request.stream.is_none());
    }

    #[test]
    fn test_image_request_sequential() {
        let provider = provider_with(ZhipuConfig {
            image_count: ImageCountMode::Sequential(4),
            ..ZhipuConfig::default()
        });
        let request = provider.image_request("一只猫", true);
        assert!(request.n.is_none());
        assert_eq!(
            request.sequential_image_generation.as_deref(),
            Some("auto")
        );
        assert_eq!(
            request
                .sequential_image_generation_options
                .as_ref()
                .map(|o| o.max_images),
            Some(4)
        );
        assert_eq!(request.stream, Some(true));
    }
}

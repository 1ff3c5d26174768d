//! 配置模块
//!
//! 从环境变量加载服务配置，与原有部署方式保持一致（.env 文件 + 环境变量）。
//! 缺少 API Key 不会阻止进程启动：凭证在每次请求时检查，
//! 缺失时该请求立即失败并返回清晰的错误信息。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量的值无法解析
    #[error("环境变量 {name} 的值无效: {value}")]
    InvalidValue { name: String, value: String },
}

/// 图像生成数量策略
///
/// 上游支持两种请求形状：固定张数 `n`，或"组图"模式（最多生成 N 张，
/// 上游按自己的节奏逐张下发）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageCountMode {
    /// 固定张数
    Fixed(u32),
    /// 组图模式：最多生成 N 张
    Sequential(u32),
}

impl Default for ImageCountMode {
    fn default() -> Self {
        ImageCountMode::Fixed(1)
    }
}

/// 上游 Provider 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZhipuConfig {
    /// API Key（Bearer 认证）
    pub api_key: Option<String>,
    /// API 基础地址
    pub base_url: String,
    /// 聊天模型
    pub chat_model: String,
    /// 图像生成模型
    pub image_model: String,
    /// 图像尺寸
    pub image_size: String,
    /// 聊天 token 上限
    pub max_tokens: u32,
    /// 图像生成数量策略
    pub image_count: ImageCountMode,
    /// 图像接口是否走流式中继（否则一次性返回 JSON）
    pub image_stream: bool,
}

impl Default for ZhipuConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            chat_model: "glm-4.5".to_string(),
            image_model: "cogview-3-flash".to_string(),
            image_size: "1024x1024".to_string(),
            max_tokens: 8192,
            image_count: ImageCountMode::default(),
            image_stream: false,
        }
    }
}

/// 服务配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 监听端口
    pub port: u16,
    /// 静态资源目录
    pub static_dir: String,
    /// 上游配置
    pub zhipu: ZhipuConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: "public".to_string(),
            zhipu: ZhipuConfig::default(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ZhipuConfig::default();

        let image_count = match env_parse::<u32>("IMAGE_SEQUENTIAL_MAX")? {
            Some(max) => ImageCountMode::Sequential(max),
            None => ImageCountMode::Fixed(env_parse("IMAGE_COUNT")?.unwrap_or(1)),
        };

        Ok(Self {
            port: env_parse("PORT")?.unwrap_or(3000),
            static_dir: env_string("STATIC_DIR").unwrap_or_else(|| "public".to_string()),
            zhipu: ZhipuConfig {
                api_key: env_string("ZHIPUAI_API_KEY"),
                base_url: env_string("ZHIPU_BASE_URL").unwrap_or(defaults.base_url),
                chat_model: env_string("CHAT_MODEL").unwrap_or(defaults.chat_model),
                image_model: env_string("IMAGE_MODEL").unwrap_or(defaults.image_model),
                image_size: env_string("IMAGE_SIZE").unwrap_or(defaults.image_size),
                max_tokens: env_parse("MAX_TOKENS")?.unwrap_or(defaults.max_tokens),
                image_count,
                image_stream: env_parse("IMAGE_STREAM")?.unwrap_or(false),
            },
        })
    }
}

/// 读取非空环境变量
fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// 读取并解析环境变量
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
    }
}

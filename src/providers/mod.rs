//! 上游 Provider
//!
//! 负责打开到上游的连接并校验初始响应。Provider 不解析帧 ——
//! 按字节透传是有意的设计，分帧复杂度留给唯一需要它的组件（帧编解码器）。

pub mod error;
pub mod zhipu;

pub use error::ProviderError;
pub use zhipu::ZhipuProvider;

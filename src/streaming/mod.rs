//! 流式中继核心模块
//!
//! 提供事件流的端到端增量处理：服务端按字节透传上游响应，
//! 客户端把字节流还原为逻辑帧、折叠为单调增长的结果并渐进渲染。
//!
//! # 主要组件
//!
//! - `error`: 流式错误类型定义
//! - `codec`: 帧编解码器（`data:` 行、`[DONE]` 哨兵、宽容 JSON 解析）
//! - `accumulator`: 增量累积器（文本 / 图像两种变体）
//! - `metrics`: 流式指标
//! - `session`: 流式会话与取消状态机

pub mod accumulator;
pub mod codec;
pub mod error;
pub mod metrics;
pub mod session;

pub use accumulator::{Accumulated, ImageAccumulator, ImageMergePolicy, TextAccumulator};
pub use codec::{Frame, SseFrameCodec};
pub use error::StreamError;
pub use metrics::StreamMetrics;
pub use session::{
    HttpTransport, ProgressSink, RequestEnvelope, RequestMode, SessionOutcome, SessionSlot,
    SessionStatus, StreamSession, Transport,
};

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// 字节流类型别名
///
/// 每个 Item 是传输层交付的一个原始 chunk。chunk 边界与逻辑帧
/// 无关，不可假设其稳定。
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// 将 reqwest 响应体转换为统一的字节流
pub fn response_byte_stream(response: reqwest::Response) -> ByteStream {
    use futures::StreamExt;

    Box::pin(
        response
            .bytes_stream()
            .map(|result| result.map_err(StreamError::from)),
    )
}

//! 流式会话
//!
//! 客户端侧编排器：持有本次逻辑请求的取消令牌，驱动
//! 帧解码 → 增量累积 → 渐进渲染 的循环，并保证忙碌/空闲状态机
//! 无论以哪个终态收场都恰好完成一次。
//!
//! # 状态机
//!
//! `Idle → Sending → Streaming → {Completed, Cancelled, Failed}`
//!
//! - 取消是协作式的：读循环只有一个挂起点（等待下一个 chunk 或取消），
//!   令牌触发后挂起中的读取立即解析为取消终态，不会忙等也不会悬挂；
//! - 取消与完成走同一条终结路径，已到达的部分输出保留并作为最终结果呈现；
//! - 超时不由本模块施加，但挂起点的结构允许日后作为第三个分支加入。
//!
//! # 并发模型
//!
//! 单写入者：累积结果在会话生命周期内只被活动会话写入，挂起点之间的
//! 解码/累积/渲染都是同步且有序的，无需加锁。

use crate::render;
use crate::streaming::accumulator::{
    Accumulated, ImageAccumulator, ImageMergePolicy, TextAccumulator,
};
use crate::streaming::codec::{Frame, SseFrameCodec};
use crate::streaming::error::StreamError;
use crate::streaming::metrics::StreamMetrics;
use crate::streaming::ByteStream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// 请求信封与状态
// ============================================================================

/// 请求模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// 聊天（文本增量）
    Chat,
    /// 图像生成（描述符集合）
    Image,
}

/// 请求信封：提交后不可变，消费一次
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub mode: RequestMode,
    pub payload: String,
}

impl RequestEnvelope {
    /// 创建聊天请求
    pub fn chat(message: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Chat,
            payload: message.into(),
        }
    }

    /// 创建图像请求
    pub fn image(prompt: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Image,
            payload: prompt.into(),
        }
    }
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// 空闲
    Idle,
    /// 已发出请求，等待初始响应
    Sending,
    /// 读循环进行中
    Streaming,
    /// 正常完成
    Completed,
    /// 用户取消（正常终态）
    Cancelled,
    /// 传输失败
    Failed,
}

/// 会话终态
#[derive(Debug)]
pub enum SessionOutcome {
    /// 遇到终止哨兵或自然流结束
    Completed,
    /// 取消令牌被触发
    Cancelled,
    /// 除取消外的传输错误
    Failed(StreamError),
}

// ============================================================================
// 协作接口
// ============================================================================

/// 传输层接口：打开一次请求，返回原始字节流
///
/// 初始响应非成功时返回 `StreamError::Rejected`，此时会话不会进入
/// 流式阶段。真实实现见 [`HttpTransport`]，测试使用内存桩实现。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, envelope: &RequestEnvelope) -> Result<ByteStream, StreamError>;
}

/// UI 接面：会话通过它驱动忙碌指示与渐进渲染
pub trait ProgressSink: Send {
    /// 忙碌状态切换（隐藏提交控件/显示停止控件，反之亦然）
    ///
    /// 每个会话恰好调用一次 `on_busy(true)` 与一次 `on_busy(false)`。
    fn on_busy(&mut self, busy: bool);

    /// 渲染（部分或最终）结果
    fn on_render(&mut self, markup: &str);

    /// 渲染错误占位（部分输出已通过 `on_render` 保留在屏幕上）
    fn on_error(&mut self, error: &StreamError);
}

// ============================================================================
// 会话槽
// ============================================================================

/// 会话槽：一个 UI 表面同一时刻只有一个活动会话
///
/// 开始新请求会取消并整体替换旧令牌，而不是就地修改，因此
/// "当前请求的令牌是哪一个"没有歧义。被替换会话自己的终结路径
/// 仍会执行（其输出随后被新会话覆盖），避免卡死在忙碌状态。
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<CancellationToken>,
}

impl SessionSlot {
    /// 创建空槽
    pub fn new() -> Self {
        Self::default()
    }

    /// 为新请求铸造新令牌；若有活动会话则先取消其令牌
    pub fn begin(&mut self) -> CancellationToken {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        token
    }

    /// 取消当前活动会话（若有）
    pub fn cancel_current(&self) {
        if let Some(token) = &self.current {
            token.cancel();
        }
    }
}

// ============================================================================
// 流式会话
// ============================================================================

/// 流式会话
///
/// 每个逻辑请求一个实例，随请求创建、终结后丢弃，不复用。
pub struct StreamSession {
    id: String,
    status: SessionStatus,
    cancel_token: CancellationToken,
    codec: SseFrameCodec,
    accumulated: Accumulated,
    metrics: StreamMetrics,
    finalized: bool,
}

impl StreamSession {
    /// 创建会话（图像模式使用默认的追加合并策略）
    pub fn new(mode: RequestMode, cancel_token: CancellationToken) -> Self {
        Self::with_image_policy(mode, cancel_token, ImageMergePolicy::default())
    }

    /// 创建会话并指定图像合并策略
    pub fn with_image_policy(
        mode: RequestMode,
        cancel_token: CancellationToken,
        policy: ImageMergePolicy,
    ) -> Self {
        let accumulated = match mode {
            RequestMode::Chat => Accumulated::Text(TextAccumulator::new()),
            RequestMode::Image => Accumulated::Images(ImageAccumulator::new(policy)),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            status: SessionStatus::Idle,
            cancel_token,
            codec: SseFrameCodec::new(),
            accumulated,
            metrics: StreamMetrics::new(),
            finalized: false,
        }
    }

    /// 当前状态
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// 本会话的取消令牌
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// 本会话的指标
    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }

    /// 运行会话直到终态
    ///
    /// 打开阶段与读循环都可被取消；无论以哪个终态收场，
    /// 终结路径（移除进行中标记、保留部分输出、恢复空闲 UI）
    /// 都恰好执行一次。
    pub async fn run(
        &mut self,
        transport: &dyn Transport,
        envelope: RequestEnvelope,
        sink: &mut dyn ProgressSink,
    ) -> SessionStatus {
        debug_assert_eq!(self.status, SessionStatus::Idle, "会话不可复用");

        self.status = SessionStatus::Sending;
        sink.on_busy(true);
        info!("[SESSION] {} 发起 {:?} 请求", self.id, envelope.mode);

        // 打开阶段同样可被取消
        let opened = tokio::select! {
            _ = self.cancel_token.cancelled() => Err(StreamError::Cancelled),
            result = transport.open(&envelope) => result,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                let outcome = if err.is_cancelled() {
                    SessionOutcome::Cancelled
                } else {
                    SessionOutcome::Failed(err)
                };
                self.finalize(outcome, sink);
                return self.status;
            }
        };

        self.status = SessionStatus::Streaming;
        // 首帧到达前先渲染一次（空文本光标 / 图像加载占位）
        sink.on_render(&self.render(true));

        let outcome = self.read_loop(&mut stream, sink).await;
        self.finalize(outcome, sink);
        self.status
    }

    /// 读循环
    ///
    /// 唯一的挂起点是"等待下一个 chunk 或取消"。挂起点之间的
    /// 解码、累积与渲染都是同步的。
    async fn read_loop(
        &mut self,
        stream: &mut ByteStream,
        sink: &mut dyn ProgressSink,
    ) -> SessionOutcome {
        loop {
            let next = tokio::select! {
                _ = self.cancel_token.cancelled() => return SessionOutcome::Cancelled,
                next = stream.next() => next,
            };

            match next {
                // 自然流结束：残行按最后一行处理
                None => {
                    if let Some(Frame::Data(payload)) = self.codec.finish() {
                        self.accumulated.absorb(&payload);
                        self.metrics.record_frame();
                    }
                    return SessionOutcome::Completed;
                }
                Some(Err(err)) if err.is_cancelled() => return SessionOutcome::Cancelled,
                Some(Err(err)) => return SessionOutcome::Failed(err),
                Some(Ok(bytes)) => {
                    self.metrics.record_chunk(bytes.len());
                    for frame in self.codec.feed(&bytes) {
                        match frame {
                            // 终止哨兵不贡献内容，直接进入完成终态
                            Frame::Done => return SessionOutcome::Completed,
                            Frame::Data(payload) => {
                                self.accumulated.absorb(&payload);
                                self.metrics.record_frame();
                            }
                        }
                    }
                    sink.on_render(&self.render(true));
                }
            }
        }
    }

    /// 渲染当前累积结果
    fn render(&self, streaming: bool) -> String {
        match &self.accumulated {
            Accumulated::Text(acc) => render::render_markdown(acc.content(), streaming),
            Accumulated::Images(acc) => render::render_gallery(acc.entries(), streaming),
        }
    }

    /// 终结会话：恰好执行一次
    ///
    /// 重复调用是无害的空操作，这保证忙碌/空闲切换不会被双重触发。
    pub fn finalize(&mut self, outcome: SessionOutcome, sink: &mut dyn ProgressSink) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        self.metrics.set_parse_skips(self.codec.parse_skips());
        self.metrics.finish();

        self.status = match outcome {
            SessionOutcome::Completed => {
                // 最终渲染移除进行中标记
                sink.on_render(&self.render(false));
                debug!("[SESSION] {} 完成", self.id);
                SessionStatus::Completed
            }
            SessionOutcome::Cancelled => {
                // 与完成走同一条路径：部分输出保留并作为最终结果呈现
                if self.accumulated.has_output() {
                    sink.on_render(&self.render(false));
                }
                info!("[SESSION] {} 已被用户取消", self.id);
                SessionStatus::Cancelled
            }
            SessionOutcome::Failed(err) => {
                if self.accumulated.has_output() {
                    sink.on_render(&self.render(false));
                }
                sink.on_error(&err);
                info!("[SESSION] {} 失败: {}", self.id, err);
                SessionStatus::Failed
            }
        };

        self.metrics.log(&self.id);
        // 无论哪个终态，UI 恢复空闲恰好一次
        sink.on_busy(false);
    }
}

// ============================================================================
// HTTP 传输层实现
// ============================================================================

/// 基于 reqwest 的传输层
///
/// 对服务端发起 `POST /chat {message}` 或 `POST /image {prompt}`，
/// 初始状态检查失败时返回 `Rejected`，成功时返回响应体字节流。
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// 创建传输层
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, envelope: &RequestEnvelope) -> Result<ByteStream, StreamError> {
        let (path, body) = match envelope.mode {
            RequestMode::Chat => ("/chat", serde_json::json!({ "message": envelope.payload })),
            RequestMode::Image => ("/image", serde_json::json!({ "prompt": envelope.payload })),
        };
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(StreamError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StreamError::rejected(status.as_u16(), message));
        }

        Ok(crate::streaming::response_byte_stream(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[derive(Default)]
    struct RecordingSink {
        busy: Vec<bool>,
        renders: Vec<String>,
        errors: Vec<String>,
    }

    impl ProgressSink for RecordingSink {
        fn on_busy(&mut self, busy: bool) {
            self.busy.push(busy);
        }
        fn on_render(&mut self, markup: &str) {
            self.renders.push(markup.to_string());
        }
        fn on_error(&mut self, error: &StreamError) {
            self.errors.push(error.to_string());
        }
    }

    struct StaticTransport {
        chunks: Vec<Bytes>,
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn open(&self, _envelope: &RequestEnvelope) -> Result<ByteStream, StreamError> {
            let items: Vec<Result<Bytes, StreamError>> =
                self.chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    #[test]
    fn test_session_slot_cancels_previous_token() {
        let mut slot = SessionSlot::new();
        let first = slot.begin();
        assert!(!first.is_cancelled());

        let second = slot.begin();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_session_slot_cancel_current() {
        let mut slot = SessionSlot::new();
        // 空槽上取消是空操作
        slot.cancel_current();
        let token = slot.begin();
        slot.cancel_current();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_finalize_twice_does_not_double_toggle() {
        let mut sink = RecordingSink::default();
        let transport = StaticTransport {
            chunks: vec![Bytes::from_static(b"data: [DONE]\n")],
        };
        let mut session = StreamSession::new(RequestMode::Chat, CancellationToken::new());
        session.run(&transport, RequestEnvelope::chat("hi"), &mut sink).await;
        assert_eq!(sink.busy, vec![true, false]);

        // run 内部已终结；再次终结必须是无害的空操作
        session.finalize(SessionOutcome::Completed, &mut sink);
        assert_eq!(sink.busy, vec![true, false]);
        assert_eq!(session.status(), SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_parse_skips_reach_metrics() {
        let mut sink = RecordingSink::default();
        let transport = StaticTransport {
            chunks: vec![Bytes::from_static(
                b"data: {broken\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: [DONE]\n",
            )],
        };
        let mut session = StreamSession::new(RequestMode::Chat, CancellationToken::new());
        let status = session
            .run(&transport, RequestEnvelope::chat("hi"), &mut sink)
            .await;
        assert_eq!(status, SessionStatus::Completed);
        assert_eq!(session.metrics().parse_skips, 1);
        assert_eq!(session.metrics().frames, 1);
        assert!(sink.errors.is_empty());
    }
}

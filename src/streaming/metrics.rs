//! 流式指标
//!
//! 每个会话一份，记录 TTFB、chunk/帧计数与被跳过的负载数，
//! 在流结束时汇总输出到日志。

use tokio::time::Instant;

/// 流式指标
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    /// 开始时间
    started_at: Instant,
    /// 首字节时间（毫秒）
    pub ttfb_ms: Option<u64>,
    /// 收到的 chunk 数
    pub chunks: u64,
    /// 收到的字节数
    pub bytes: u64,
    /// 解析出的数据帧数
    pub frames: u64,
    /// 被跳过的无法解析的负载数
    pub parse_skips: u64,
    /// 总时长（毫秒），finish 时填充
    pub duration_ms: Option<u64>,
}

impl StreamMetrics {
    /// 创建指标，记录开始时间
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            ttfb_ms: None,
            chunks: 0,
            bytes: 0,
            frames: 0,
            parse_skips: 0,
            duration_ms: None,
        }
    }

    /// 记录一个收到的 chunk；首个 chunk 记录 TTFB
    pub fn record_chunk(&mut self, len: usize) {
        if self.ttfb_ms.is_none() {
            self.ttfb_ms = Some(self.started_at.elapsed().as_millis() as u64);
        }
        self.chunks += 1;
        self.bytes += len as u64;
    }

    /// 记录一个解析出的数据帧
    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// 设置被跳过的负载数（来自编解码器）
    pub fn set_parse_skips(&mut self, skips: u64) {
        self.parse_skips = skips;
    }

    /// 结束计时
    pub fn finish(&mut self) {
        if self.duration_ms.is_none() {
            self.duration_ms = Some(self.started_at.elapsed().as_millis() as u64);
        }
    }

    /// 汇总字符串（用于日志）
    pub fn summary(&self) -> String {
        format!(
            "chunks={} bytes={} frames={} parse_skips={} ttfb_ms={:?} duration_ms={:?}",
            self.chunks, self.bytes, self.frames, self.parse_skips, self.ttfb_ms, self.duration_ms
        )
    }

    /// 输出指标日志
    pub fn log(&self, session_id: &str) {
        tracing::debug!("[METRICS] session={} {}", session_id, self.summary());
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

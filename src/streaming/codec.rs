//! 帧编解码器
//!
//! 把任意切分的原始字节流还原为逻辑事件帧。chunk 到达边界与逻辑帧无关：
//! 多字节 UTF-8 字符可能在 chunk 中间被切断，一行 `data:` 事件也可能
//! 跨越多个 chunk。编解码器跨调用保留两类状态：
//!
//! - 未完成的 UTF-8 字节序列，等下一个 chunk 补全后再解码，
//!   绝不输出替换字符或乱码；
//! - 未见到行终止符的残行，前缀到下一个 chunk 解码出的文本上，
//!   只有观察到行终止符后该行才成为候选帧。
//!
//! 负载解析是宽容的：`[DONE]` 产生终止哨兵帧；能解析为 JSON 的负载
//! 产生数据帧；解析失败的负载被静默丢弃并计数（上游在负载中间切分
//! 且各自成行时会出现，按尽力而为处理，不视为协议违规）。

use serde_json::Value;

/// 保留前缀：只有以它开头的行才是候选帧
const DATA_PREFIX: &str = "data:";

/// 终止哨兵负载
const DONE_SENTINEL: &str = "[DONE]";

/// 逻辑帧
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// 数据帧：一行 `data:` 的 JSON 负载
    Data(Value),
    /// 终止哨兵 `[DONE]`：只表示流结束，不携带数据
    Done,
}

/// SSE 帧编解码器
///
/// 有状态、按调用推进但不可回放：同一字节只会被消费一次。
#[derive(Debug, Default)]
pub struct SseFrameCodec {
    /// 未完成的 UTF-8 字节（chunk 在多字节字符中间切开时产生）
    utf8_carry: Vec<u8>,
    /// 未见到行终止符的残行
    line_buffer: String,
    /// 被跳过的无法解析的负载计数
    parse_skips: u64,
}

impl SseFrameCodec {
    /// 创建编解码器
    pub fn new() -> Self {
        Self::default()
    }

    /// 送入一个原始 chunk，返回其中完整出现的逻辑帧
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let decoded = self.decode_utf8(chunk);
        self.line_buffer.push_str(&decoded);

        let mut frames = Vec::new();
        while let Some(pos) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=pos).collect();
            if let Some(frame) = self.parse_line(line.trim_end_matches(['\n', '\r'])) {
                frames.push(frame);
            }
        }
        frames
    }

    /// 流结束时处理残余数据
    ///
    /// 上游 EOF 等价于行结束：没有行终止符的残行按最后一行处理。
    pub fn finish(&mut self) -> Option<Frame> {
        if !self.line_buffer.is_empty() {
            let line = std::mem::take(&mut self.line_buffer);
            return self.parse_line(line.trim_end_matches('\r'));
        }
        None
    }

    /// 被跳过的负载数量
    pub fn parse_skips(&self) -> u64 {
        self.parse_skips
    }

    /// 流感知的 UTF-8 解码
    ///
    /// 末尾被截断的多字节字符缓冲到下一次调用；真正非法的字节序列
    /// 被丢弃后继续解码。
    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.utf8_carry);
        bytes.extend_from_slice(chunk);

        let mut decoded = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    decoded.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    // 前缀已验证合法，lossy 在这里不会产生替换字符
                    decoded.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        // 末尾是被截断的多字节字符，留待下一个 chunk 补全
                        None => {
                            self.utf8_carry = tail.to_vec();
                            break;
                        }
                        // 非法字节序列，跳过后继续
                        Some(len) => rest = &tail[len..],
                    }
                }
            }
        }
        decoded
    }

    /// 解析一行，返回其承载的帧（若有）
    fn parse_line(&mut self, line: &str) -> Option<Frame> {
        let payload = line.strip_prefix(DATA_PREFIX)?.trim();
        if payload == DONE_SENTINEL {
            return Some(Frame::Done);
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Some(Frame::Data(value)),
            Err(err) => {
                self.parse_skips += 1;
                tracing::debug!("[CODEC] 跳过无法解析的负载: {}", err);
                None
            }
        }
    }
}

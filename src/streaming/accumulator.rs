//! 增量累积器
//!
//! 把解析出的帧序列折叠为单调增长的结果值。两种变体按请求模式选择：
//! 文本模式严格按到达顺序拼接增量；图像模式按可插拔的合并策略
//! 折叠每帧贡献的描述符集合。
//!
//! 帧与 chunk 都是瞬态的，折叠之后不再保留。

use crate::models::openai::ImageDescriptor;
use serde_json::Value;

// ============================================================================
// 文本增量累积器
// ============================================================================

/// 文本增量累积器
///
/// 不变式：任意时刻的内容等于已消费的所有增量按到达顺序的拼接，
/// 无缺口、无重排。
#[derive(Debug, Default)]
pub struct TextAccumulator {
    content: String,
}

impl TextAccumulator {
    /// 创建累积器
    pub fn new() -> Self {
        Self::default()
    }

    /// 吸收一个数据帧负载
    ///
    /// 提取 `choices[*].delta.content` 并原样追加。字段缺失不是错误，
    /// 只表示"这一帧没有文本"（例如纯元数据帧）。
    pub fn absorb(&mut self, payload: &Value) {
        if let Some(choices) = payload.get("choices").and_then(|c| c.as_array()) {
            for choice in choices {
                if let Some(text) = choice
                    .get("delta")
                    .and_then(|d| d.get("content"))
                    .and_then(|c| c.as_str())
                {
                    self.content.push_str(text);
                }
            }
        }
    }

    /// 当前累积的文本
    pub fn content(&self) -> &str {
        &self.content
    }

    /// 是否尚无内容
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// ============================================================================
// 图像集累积器
// ============================================================================

/// 图像集合并策略
///
/// 观察到的上游行为是每帧发送真正的增量（纯追加即正确）。若上游
/// 实际上每帧重发累计的完整集合，追加会产生重复 —— 因此策略可插拔
/// 而非硬编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageMergePolicy {
    /// 追加：保序、不去重（默认，对应观察到的行为）
    #[default]
    Append,
    /// 整体替换：上游每帧重发累计的完整集合
    ReplaceCumulative,
}

/// 图像集累积器
#[derive(Debug, Default)]
pub struct ImageAccumulator {
    entries: Vec<ImageDescriptor>,
    policy: ImageMergePolicy,
}

impl ImageAccumulator {
    /// 按指定合并策略创建累积器
    pub fn new(policy: ImageMergePolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    /// 吸收一个数据帧负载
    ///
    /// 提取 `data` 数组中的描述符；字段缺失或条目不合形状都不是错误。
    pub fn absorb(&mut self, payload: &Value) {
        let Some(data) = payload.get("data").and_then(|d| d.as_array()) else {
            return;
        };
        let incoming: Vec<ImageDescriptor> = data
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect();

        match self.policy {
            ImageMergePolicy::Append => self.entries.extend(incoming),
            ImageMergePolicy::ReplaceCumulative => {
                if !incoming.is_empty() {
                    self.entries = incoming;
                }
            }
        }
    }

    /// 当前累积的描述符集合（到达顺序）
    pub fn entries(&self) -> &[ImageDescriptor] {
        &self.entries
    }

    /// 是否尚无条目
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// 统一的累积结果
// ============================================================================

/// 按请求模式选择的累积结果
///
/// 生命周期内只有一个写入者（活动会话），见并发模型说明。
#[derive(Debug)]
pub enum Accumulated {
    /// 文本模式
    Text(TextAccumulator),
    /// 图像模式
    Images(ImageAccumulator),
}

impl Accumulated {
    /// 吸收一个数据帧负载
    pub fn absorb(&mut self, payload: &Value) {
        match self {
            Accumulated::Text(acc) => acc.absorb(payload),
            Accumulated::Images(acc) => acc.absorb(payload),
        }
    }

    /// 是否已有任何输出
    pub fn has_output(&self) -> bool {
        match self {
            Accumulated::Text(acc) => !acc.is_empty(),
            Accumulated::Images(acc) => !acc.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn delta_frame(text: &str) -> Value {
        json!({"choices": [{"delta": {"content": text}}]})
    }

    fn image_frame(urls: &[&str]) -> Value {
        json!({"data": urls.iter().map(|u| json!({"url": u})).collect::<Vec<_>>()})
    }

    #[test]
    fn test_text_concatenation_in_order() {
        let mut acc = TextAccumulator::new();
        acc.absorb(&delta_frame("Hel"));
        acc.absorb(&delta_frame("lo"));
        assert_eq!(acc.content(), "Hello");
    }

    #[test]
    fn test_metadata_frame_contributes_nothing() {
        let mut acc = TextAccumulator::new();
        acc.absorb(&delta_frame("a"));
        // 没有 content 字段的帧（如 usage 元数据）不是错误
        acc.absorb(&json!({"choices": [{"delta": {"role": "assistant"}}]}));
        acc.absorb(&json!({"usage": {"total_tokens": 7}}));
        assert_eq!(acc.content(), "a");
    }

    #[test]
    fn test_non_string_content_ignored() {
        let mut acc = TextAccumulator::new();
        acc.absorb(&json!({"choices": [{"delta": {"content": 42}}]}));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_image_append_keeps_arrival_order() {
        let mut acc = ImageAccumulator::new(ImageMergePolicy::Append);
        acc.absorb(&image_frame(&["https://a/1.png"]));
        acc.absorb(&image_frame(&["https://a/2.png"]));
        let urls: Vec<&str> = acc.entries().iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a/1.png", "https://a/2.png"]);
    }

    #[test]
    fn test_image_append_does_not_deduplicate() {
        let mut acc = ImageAccumulator::new(ImageMergePolicy::Append);
        acc.absorb(&image_frame(&["https://a/1.png"]));
        acc.absorb(&image_frame(&["https://a/1.png"]));
        assert_eq!(acc.entries().len(), 2);
    }

    #[test]
    fn test_image_replace_cumulative() {
        let mut acc = ImageAccumulator::new(ImageMergePolicy::ReplaceCumulative);
        acc.absorb(&image_frame(&["https://a/1.png"]));
        acc.absorb(&image_frame(&["https://a/1.png", "https://a/2.png"]));
        assert_eq!(acc.entries().len(), 2);
        // 空的 data 数组不会抹掉已有集合
        acc.absorb(&json!({"data": []}));
        assert_eq!(acc.entries().len(), 2);
    }

    #[test]
    fn test_image_entries_without_url_skipped() {
        let mut acc = ImageAccumulator::new(ImageMergePolicy::Append);
        acc.absorb(&json!({"data": [{"b64_json": "..."}, {"url": "https://a/1.png"}]}));
        assert_eq!(acc.entries().len(), 1);
    }

    proptest! {
        /// 对任意文本增量序列 d1..dn，累积文本 == 按序拼接(d1..dn)
        #[test]
        fn prop_text_accumulation_is_ordered_concatenation(
            deltas in proptest::collection::vec(".*", 0..16)
        ) {
            let mut acc = TextAccumulator::new();
            for delta in &deltas {
                acc.absorb(&delta_frame(delta));
            }
            prop_assert_eq!(acc.content(), deltas.concat());
        }
    }
}

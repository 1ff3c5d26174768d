//! 渲染器
//!
//! 纯函数：累积结果 + "仍在流式"标志 → 展示标记。自身无状态，
//! 对同一累积值重复渲染产生完全相同的输出。
//!
//! 文本模式输出 Markdown 风格的标记，仅在流式进行中追加进行中光标；
//! 图像模式输出画廊标记，仅在首帧到达前显示加载占位。
//! Markdown 方言的渲染保真度不在目标范围内，这里只覆盖常用形状
//! （标题、代码块、行内代码、加粗、段落）。

use crate::models::openai::ImageDescriptor;

/// 进行中光标标记
const STREAMING_CURSOR: &str = r#"<span class="blinking-cursor"></span>"#;

/// 首帧到达前的加载占位
const GALLERY_PLACEHOLDER: &str = r#"<div class="gallery-loading">图像生成中…</div>"#;

/// 渲染累积文本为 Markdown 风格标记
///
/// `streaming` 为真时在末尾追加进行中光标；为假时输出即为最终形态。
pub fn render_markdown(text: &str, streaming: bool) -> String {
    let mut html = String::with_capacity(text.len() + 64);

    // 以 ``` 分段，奇数段是代码块
    for (index, segment) in text.split("```").enumerate() {
        if index % 2 == 1 {
            // 代码块首行可能是语言标注，跳过
            let body = match segment.split_once('\n') {
                Some((_, rest)) => rest,
                None => segment,
            };
            html.push_str("<pre><code>");
            html.push_str(&escape_html(body));
            html.push_str("</code></pre>");
        } else {
            render_blocks(segment, &mut html);
        }
    }

    if streaming {
        html.push_str(STREAMING_CURSOR);
    }
    html
}

/// 渲染累积的图像描述符为画廊标记
///
/// 集合为空且仍在流式时显示加载占位；首帧到达后不再显示。
pub fn render_gallery(entries: &[ImageDescriptor], streaming: bool) -> String {
    if entries.is_empty() {
        return if streaming {
            GALLERY_PLACEHOLDER.to_string()
        } else {
            String::new()
        };
    }

    let mut html = String::from(r#"<div class="image-gallery">"#);
    for entry in entries {
        html.push_str(r#"<img src=""#);
        html.push_str(&escape_html(&entry.url));
        html.push_str(r#"" alt="generated image">"#);
    }
    html.push_str("</div>");
    html
}

/// 渲染非代码段：按空行分段，支持标题与行内标记
fn render_blocks(segment: &str, out: &mut String) {
    for block in segment.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        if let Some(rest) = block.strip_prefix("### ") {
            out.push_str("<h3>");
            out.push_str(&render_inline(rest));
            out.push_str("</h3>");
        } else if let Some(rest) = block.strip_prefix("## ") {
            out.push_str("<h2>");
            out.push_str(&render_inline(rest));
            out.push_str("</h2>");
        } else if let Some(rest) = block.strip_prefix("# ") {
            out.push_str("<h1>");
            out.push_str(&render_inline(rest));
            out.push_str("</h1>");
        } else {
            out.push_str("<p>");
            out.push_str(&render_inline(block).replace('\n', "<br>"));
            out.push_str("</p>");
        }
    }
}

/// 行内标记：加粗与行内代码
fn render_inline(text: &str) -> String {
    let escaped = escape_html(text);
    let bolded = replace_pairs(&escaped, "**", "<strong>", "</strong>");
    replace_pairs(&bolded, "`", "<code>", "</code>")
}

/// 成对替换定界符；不成对的定界符原样保留
fn replace_pairs(text: &str, delim: &str, open: &str, close: &str) -> String {
    let parts: Vec<&str> = text.split(delim).collect();
    if parts.len() == 1 {
        return text.to_string();
    }
    let mut out = String::from(parts[0]);
    let mut i = 1;
    while i < parts.len() {
        if i + 1 < parts.len() {
            out.push_str(open);
            out.push_str(parts[i]);
            out.push_str(close);
            out.push_str(parts[i + 1]);
            i += 2;
        } else {
            out.push_str(delim);
            out.push_str(parts[i]);
            i += 1;
        }
    }
    out
}

/// HTML 转义
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

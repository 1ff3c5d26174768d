//! aicast — 聊天/图像生成的流式中继与消费端
//!
//! 将两类生成式 AI 请求代理到上游 Provider，并把结果增量地流回客户端。
//!
//! # 主要组件
//!
//! - `streaming::codec`: 帧编解码器，把任意切分的字节流还原为逻辑事件帧
//! - `streaming::accumulator`: 增量累积器（文本增量 / 图像集合两种变体）
//! - `streaming::session`: 流式会话，驱动解码-累积-渲染循环与协作式取消
//! - `providers`: 上游连接器（打开流式请求、校验初始响应）
//! - `server`: 入站接口与中继写入器（按字节透传上游事件流）
//! - `render`: 纯函数渲染器（Markdown 标记 / 图像画廊）

pub mod config;
pub mod models;
pub mod providers;
pub mod render;
pub mod server;
pub mod streaming;

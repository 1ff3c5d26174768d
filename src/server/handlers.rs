//! 入站请求处理器
//!
//! `/chat` 与 `/image`：打开上游流并把响应体逐字节转发给客户端
//! （中继写入器）。服务端不解析帧 —— 按字节透传让服务端保持协议
//! 无关，分帧复杂度全部留给唯一需要它的组件（客户端帧编解码器），
//! 避免两跳各解析一遍。

use crate::providers::ProviderError;
use crate::server::AppState;
use crate::streaming::ByteStream;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

/// 聊天入站请求体
#[derive(Debug, Deserialize)]
pub struct ChatInbound {
    pub message: String,
}

/// 图像入站请求体
#[derive(Debug, Deserialize)]
pub struct ImageInbound {
    pub prompt: String,
}

/// `POST /chat`：打开上游流式聊天请求并透传
pub async fn chat(State(state): State<AppState>, Json(inbound): Json<ChatInbound>) -> Response {
    match state.provider.chat_stream(&inbound.message).await {
        Ok(stream) => relay_sse(stream),
        Err(err) => reject(err),
    }
}

/// `POST /image`：流式变体透传上游事件流，非流式变体一次性返回 JSON
pub async fn image(State(state): State<AppState>, Json(inbound): Json<ImageInbound>) -> Response {
    if state.image_stream {
        match state.provider.image_stream(&inbound.prompt).await {
            Ok(stream) => relay_sse(stream),
            Err(err) => reject(err),
        }
    } else {
        match state.provider.generate_images(&inbound.prompt).await {
            Ok(response) => {
                (StatusCode::OK, Json(serde_json::json!({ "data": response.data })))
                    .into_response()
            }
            Err(err) => reject(err),
        }
    }
}

/// 中继写入器：把上游字节流按事件流响应透传给客户端
///
/// `Body::from_stream` 是拉取式的：下游写入压力自然传导为上游读取
/// 节奏，不会快于下游可接受的速度去读上游。上游正常结束时下游连接
/// 干净关闭；上游中途失败时以 IO 错误终止下游连接，不伪造成功结束
/// 标记。
pub fn relay_sse(stream: ByteStream) -> Response {
    use futures::StreamExt;

    let body_stream = stream.map(|result| result.map_err(std::io::Error::other));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": {"message": "Failed to build streaming response"}})),
            )
                .into_response()
        })
}

/// 结构化错误响应
///
/// 在任何流式响应头发出之前产生：上游拒绝透传其状态码与错误正文，
/// 凭证缺失与网络失败映射为相应的网关侧状态码。
fn reject(err: ProviderError) -> Response {
    let status = StatusCode::from_u16(err.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    tracing::error!("[RELAY] 上游请求失败: {}", err);

    (
        status,
        Json(serde_json::json!({
            "error": err.short_message(),
            "details": err.to_string(),
        })),
    )
        .into_response()
}

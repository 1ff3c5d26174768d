//! HTTP 服务
//!
//! 每个入站请求一个轻量并发任务，各自持有自己的上游连接器与
//! 中继写入器，请求之间没有共享可变状态。

pub mod handlers;

use crate::config::Config;
use crate::providers::ZhipuProvider;
use axum::routing::post;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 上游 Provider
    pub provider: Arc<ZhipuProvider>,
    /// 图像接口是否走流式中继
    pub image_stream: bool,
}

/// 构建路由：两个代理端点加静态资源回退
pub fn build_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/image", post(handlers::image))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// 启动服务
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState {
        provider: Arc::new(ZhipuProvider::new(config.zhipu.clone())),
        image_stream: config.zhipu.image_stream,
    };
    let router = build_router(state, &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[SERVER] 服务已启动，监听 http://{}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

//! 服务进程入口
//!
//! 加载 .env 与环境变量配置，初始化日志，启动 HTTP 服务。

use aicast::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件（不存在时忽略）
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    aicast::server::run(config).await
}

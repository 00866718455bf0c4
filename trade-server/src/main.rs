use trade_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 加载 .env 和配置
    dotenv::dotenv().ok();
    let config = Config::from_env();

    // 2. 工作目录和日志
    setup_environment(&config)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Trade server starting...");

    // 3. 初始化服务器状态
    let state = ServerState::initialize(&config)?;

    // 4. 启动服务 (Server::run 会自动启动后台任务)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

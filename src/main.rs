use anyhow::Result;
use kids_progress::utils::logging;
use kids_progress::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(&config.log_directive())?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}

use anyhow::Result;
use dataset_client::{logger, App, Command, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logger::init(config.verbose_logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    // 初始化并运行应用
    let mut app = App::initialize(config).await?;
    app.run(command).await?;

    Ok(())
}

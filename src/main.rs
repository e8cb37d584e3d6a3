use anyhow::{Context, Result};
use lead_scout::utils::logging;
use lead_scout::{App, Config};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env().context("读取环境变量失败")?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化应用
    let app = App::initialize(config)?;

    // Ctrl-C 取消本次运行：重试在下一个检查点停止，已完成的线索仍会出现在报告中
    let cancel = app.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，正在取消剩余调用...");
            cancel.cancel();
        }
    });

    app.run().await?;

    Ok(())
}

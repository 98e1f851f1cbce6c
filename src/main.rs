use anyhow::Result;
use spam_report::{
    app::SpamReportApp,
    config,
    infrastructure::{directories, logging, shutdown},
    input,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let shutdown = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let emails = input::read_emails(config.input_file.as_deref()).await?;
    let app = SpamReportApp::initialize(config, shutdown)?;
    app.run(emails).await
}

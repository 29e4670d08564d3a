use color_eyre::eyre::eyre;
use mptui::{App, AppConfig, ConverterClient};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Run our real async entrypoint
    let result = async_main().await;

    // Restore the terminal state
    ratatui::restore();

    if let Err(err) = result {
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }
}

async fn async_main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config = AppConfig::load_or_create()?;
    init_logging(&AppConfig::log_path())?;

    let client = ConverterClient::new(&config.api_url);

    // Fail fast with a readable message instead of an empty gallery
    client.health().await.map_err(|e| {
        eyre!(
            "Conversion service unreachable at {}: {e}",
            client.base_url()
        )
    })?;

    let mut terminal = ratatui::init();
    let app = App::new(&config);
    app.run(&mut terminal, &client).await?;
    ratatui::restore();

    Ok(())
}

// The TUI owns the terminal, so tracing output goes to a log file
fn init_logging(path: &Path) -> color_eyre::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = Arc::new(File::create(path)?);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    Ok(())
}

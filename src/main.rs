use std::path::PathBuf;
use tracing::info;

use wa_channel_scraper::config::{ConfigManager, FileConfigManager, RunMode};
use wa_channel_scraper::error::Result;
use wa_channel_scraper::report::{write_follower_report, write_posts_report};
use wa_channel_scraper::targets::load_targets;
use wa_channel_scraper::workers::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let manager = FileConfigManager::new(config_path);
    let config = manager.load_config().await?;

    let targets = load_targets(&config.targets_file)?;
    info!("Loaded {} channel targets", targets.len());

    let output_dir = config.output_dir.clone();
    let mode = config.mode;
    let today = chrono::Local::now().date_naive();

    let orchestrator = Orchestrator::new(config, targets);
    let report = match mode {
        RunMode::Followers => {
            let results = orchestrator.run_followers().await?;
            write_follower_report(&output_dir, orchestrator.targets(), &results, today)?
        }
        RunMode::Posts => {
            let records = orchestrator.run_posts().await?;
            write_posts_report(&output_dir, &records, today)?
        }
    };

    info!("Done, report at {:?}", report);
    Ok(())
}

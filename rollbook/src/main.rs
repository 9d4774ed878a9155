use anyhow::Context;
use rollbook::{logging, roster, RollbookConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = RollbookConfig::load().context("failed to load configuration")?;
    logging::init(&config.log)
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    let report = roster::run(&config)
        .await
        .with_context(|| format!("roster walkthrough failed on {}", config.database_url))?;

    for student in &report.all {
        tracing::info!(%student, "stored");
    }
    println!("{:?}", report.name_grades());
    Ok(())
}

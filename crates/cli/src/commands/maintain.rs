//! `engram maintain` — run one background maintenance pass.

use engram_config::AppConfig;
use engram_engine::run_maintenance;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let engine = super::build_engine(&config).await?;

    let report = run_maintenance(&engine.repository(), &config.index).await?;
    println!("Maintenance pass complete");
    println!("  topics created:  {}", report.topics_created);
    println!("  topics replaced: {}", report.topics_removed);
    println!("  orphan chunks:   {}", report.orphan_chunks_removed);
    Ok(())
}

//! `engram stats` — show store statistics.

use engram_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let engine = super::build_engine(&config).await?;
    let repo = engine.repository();

    println!("Engram statistics");
    println!("=================");
    println!("  store:      {}", repo.store_name());
    if config.store.backend == "sqlite" {
        let path = config.db_path();
        if path.exists() {
            let meta = std::fs::metadata(&path)?;
            println!("  db file:    {} ({:.1} KB)", path.display(), meta.len() as f64 / 1024.0);
        } else {
            println!("  db file:    (not created yet)");
        }
    }
    println!("  entities:   {}", repo.count().await?);
    println!("  topics:     {}", repo.topics().await?.len());
    println!("  embeddings: {} ({} dims)", config.embedding.model, config.embedding.dimensions);
    println!(
        "  index:      budget {} tokens, recent window {}",
        config.index.max_index_tokens, config.index.recent_window_size
    );
    Ok(())
}

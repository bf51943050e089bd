//! `engram tools` — list the retrieval tool surface.

use engram_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let engine = super::build_engine(&config).await?;
    let registry = engine.registry();

    println!("Retrieval tools ({}):", registry.len());
    println!();
    for def in registry.definitions() {
        println!("  {}", def.name);
        println!("      {}", def.description);
    }
    Ok(())
}

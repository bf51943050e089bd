//! `engram init` — write a default config file.

use engram_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");

    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", path.display());
    println!("Set ENGRAM_API_KEY (or OPENAI_API_KEY) to enable real embeddings.");
    Ok(())
}

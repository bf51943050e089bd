//! `engram context` — build and print the adaptive context index.

use engram_config::AppConfig;

pub async fn run(query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let engine = super::build_engine(&config).await?;

    let index = engine.prepare_context(query).await?;

    println!("Strategy:  {}", index.strategy);
    println!("Matches:   {}", index.match_count);
    println!(
        "Tokens:    {} / {}",
        index.token_count, config.index.max_index_tokens
    );
    if index.entries_dropped > 0 {
        println!(
            "Truncated: {} historical entries dropped for budget",
            index.entries_dropped
        );
    }
    if index.fallback {
        println!("Note:      degraded (search or assembly deadline hit)");
    }
    println!("────────────────────────────────────────");
    println!("{}", index.text);
    Ok(())
}

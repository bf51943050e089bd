//! `engram search` — semantic search over stored history.

use engram_config::AppConfig;

pub async fn run(query: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let engine = super::build_engine(&config).await?;
    let repo = engine.repository();

    println!("Searching for: \"{query}\"");
    println!();

    let embedding = repo.embed_query(query).await?;
    let hits = repo
        .search(&embedding, limit.clamp(1, 100), config.index.include_tool_calls)
        .await?;

    if hits.is_empty() {
        println!("   No matches.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        let preview = if hit.entity.snippet.is_empty() {
            hit.entity.content.chars().take(80).collect::<String>()
        } else {
            hit.entity.snippet.clone()
        };
        println!("  {:>2}. [score: {:.3}] {} — {}", i + 1, hit.score, hit.entity.id, preview);
    }
    Ok(())
}

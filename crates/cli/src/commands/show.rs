//! `engram show` — print one entity with its chunk set.

use engram_config::AppConfig;

pub async fn run(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let engine = super::build_engine(&config).await?;

    let set = engine.repository().get_with_chunks(id).await?;
    let head = &set[0];

    println!("id:         {}", head.id);
    println!("kind:       {:?}", head.kind);
    if let Some(role) = head.role {
        println!("role:       {role:?}");
    }
    println!("created_at: {}", head.created_at.to_rfc3339());
    if head.edited {
        println!("edited:     yes ({} prior versions)", head.versions.len());
    }
    if let Some(key) = &head.chunk_parent_id {
        println!("chunks:     {} (group {key})", set.len());
    }
    println!();
    for record in &set {
        if set.len() > 1 {
            println!("--- chunk {} ---", record.chunk_index.unwrap_or(0));
        }
        println!("{}", record.content);
    }
    Ok(())
}

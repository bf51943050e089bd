//! `engram record` — store a message.

use engram_config::AppConfig;
use engram_core::{MessageDraft, Role};

pub async fn run(
    message: &str,
    role: &str,
    parent: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let role = match role {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        "system" => Role::System,
        other => return Err(format!("unknown role '{other}'").into()),
    };

    let config = AppConfig::load()?;
    let engine = super::build_engine(&config).await?;

    let mut draft = MessageDraft::new(role, message);
    if let Some(parent_id) = parent {
        draft = draft.with_parent(parent_id);
    }

    let stored = engine.record_message(draft).await?;
    if let Some(key) = &stored.chunk_parent_id {
        let chunks = engine.repository().get_with_chunks(&stored.id).await?;
        println!(
            "Stored {} ({} tokens total, {} chunks under group {})",
            stored.id,
            chunks.iter().map(|c| c.token_count).sum::<usize>(),
            chunks.len(),
            key
        );
    } else {
        println!("Stored {} ({} tokens)", stored.id, stored.token_count);
    }
    Ok(())
}

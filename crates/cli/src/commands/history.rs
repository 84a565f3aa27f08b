//! `docchat history` — Inspect or clear a user's stored chat history.

use docchat_core::user::normalize_username;
use docchat_core::{ChatHistoryStore, UserRepository};

pub async fn run(username: &str, clear: bool) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let store = super::open_store(&config).await?;
    let username = normalize_username(username)?;

    if store.find_user(&username).await?.is_none() {
        anyhow::bail!("No such user: {username}");
    }

    if clear {
        let removed = store.clear(&username).await?;
        println!("🗑️  Removed {removed} turn(s) for {username}");
        return Ok(());
    }

    let turns = store.list(&username).await?;
    if turns.is_empty() {
        println!("No history for {username}.");
        return Ok(());
    }

    println!("Chat history for {username} ({} turn(s))", turns.len());
    println!("==========================================\n");
    for turn in &turns {
        println!("#{} [{}]", turn.id, turn.created_at.to_rfc3339());
        println!("  Q: {}", turn.question);
        println!("  A: {}\n", turn.answer);
    }
    Ok(())
}

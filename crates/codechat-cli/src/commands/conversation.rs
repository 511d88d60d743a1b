use anyhow::{Result, anyhow};
use codechat_core::{MessageRole, NewMessage};

use crate::engine::Engine;

pub async fn create(engine: &Engine, title: Option<String>) -> Result<()> {
    let conversation = engine.usecase.create_conversation(title).await?;
    println!("{}", conversation.id);
    Ok(())
}

pub async fn list(engine: &Engine) -> Result<()> {
    let conversations = engine.usecase.list_conversations().await?;
    if conversations.is_empty() {
        println!("No conversations.");
        return Ok(());
    }

    for conversation in conversations {
        println!(
            "{}  {}  {} ({} messages)",
            conversation.id,
            conversation.updated_at.format("%Y-%m-%d %H:%M:%S"),
            conversation.title.as_deref().unwrap_or("(untitled)"),
            conversation.messages.len()
        );
    }
    Ok(())
}

pub async fn show(engine: &Engine, id: &str) -> Result<()> {
    let conversation = engine
        .usecase
        .load_conversation(id)
        .await?
        .ok_or_else(|| anyhow!("conversation '{}' not found", id))?;
    println!("{}", serde_json::to_string_pretty(&conversation)?);
    Ok(())
}

pub async fn delete(engine: &Engine, id: &str) -> Result<()> {
    engine.usecase.delete_conversation(id).await?;
    Ok(())
}

pub async fn append(engine: &Engine, id: &str, role: MessageRole, content: String) -> Result<()> {
    let message = match role {
        MessageRole::User => NewMessage::user(content),
        MessageRole::Assistant => NewMessage::assistant(content),
    };
    let conversation = engine.usecase.append_message(id, message).await?;
    if let Some(message) = conversation.messages.last() {
        println!("{}", message.id);
    }
    Ok(())
}

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use codechat_core::NewMessage;

use crate::engine::Engine;

/// Starts the backend, runs the file and records the result in a conversation.
pub async fn execute(engine: &Engine, file: &Path, conversation: Option<String>) -> Result<()> {
    let code = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let usecase = &engine.usecase;
    let conversation_id = match conversation {
        Some(id) => {
            if usecase.load_conversation(&id).await?.is_none() {
                return Err(anyhow!("conversation '{}' not found", id));
            }
            id
        }
        None => {
            let title = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            usecase.create_conversation(title).await?.id
        }
    };

    let mut conversation = usecase
        .append_message(&conversation_id, NewMessage::assistant(code.clone()))
        .await?;
    let message_id = conversation
        .messages
        .last()
        .map(|message| message.id)
        .ok_or_else(|| anyhow!("appended message is missing"))?;

    engine.supervisor.start().await?;

    let figures_dir = usecase.get_conversation_images_dir(&conversation_id)?;
    let result = usecase.run_code(&figures_dir, &code, &conversation_id).await?;

    usecase
        .save_execution_result(&mut conversation, message_id, result.clone())
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    eprintln!("conversation: {}", conversation_id);
    Ok(())
}

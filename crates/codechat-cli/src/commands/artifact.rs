use std::path::Path;

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::engine::Engine;

pub async fn show(engine: &Engine, path: &Path) -> Result<()> {
    let payload = load(engine, path).await?;
    println!("{}", payload);
    Ok(())
}

pub async fn export(engine: &Engine, path: &Path, out: &Path) -> Result<()> {
    let payload = load(engine, path).await?;
    let bytes = decode_payload(&payload)
        .with_context(|| format!("{} is not valid base64", path.display()))?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("failed to write {}", out.display()))?;
    eprintln!("wrote {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

async fn load(engine: &Engine, path: &Path) -> Result<String> {
    engine
        .usecase
        .load_artifact(path)
        .await
        .ok_or_else(|| anyhow!("artifact {} could not be read", path.display()))
}

fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(payload.trim())
}

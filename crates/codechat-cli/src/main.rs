use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codechat_core::MessageRole;

mod commands;
mod engine;
mod logging;

#[derive(Parser)]
#[command(name = "codechat")]
#[command(about = "codechat - run code against a local interpreter backend and keep conversations", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/codechat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding conversations
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a code file on the backend and print the result as JSON
    Run {
        file: PathBuf,

        /// Conversation to record the run in; a new one is created otherwise
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Manage conversations
    Conversation {
        #[command(subcommand)]
        action: ConversationAction,
    },
    /// Inspect stored artifacts
    Artifact {
        #[command(subcommand)]
        action: ArtifactAction,
    },
}

#[derive(Subcommand)]
enum ConversationAction {
    /// Create an empty conversation
    New {
        #[arg(long)]
        title: Option<String>,
    },
    /// List conversations, most recent first
    List,
    /// Print a conversation as JSON
    Show { id: String },
    /// Delete a conversation and its files
    Delete { id: String },
    /// Append a message
    Append {
        id: String,
        #[arg(long, default_value = "user")]
        role: MessageRole,
        content: String,
    },
}

#[derive(Subcommand)]
enum ArtifactAction {
    /// Print the stored base64 payload
    Show { path: PathBuf },
    /// Decode an artifact into an image file
    Export { path: PathBuf, out: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init();

    let engine = engine::Engine::build(cli.config, cli.data_dir)?;

    let outcome = match cli.command {
        Commands::Run { file, conversation } => {
            commands::run::execute(&engine, &file, conversation).await
        }
        Commands::Conversation { action } => match action {
            ConversationAction::New { title } => commands::conversation::create(&engine, title).await,
            ConversationAction::List => commands::conversation::list(&engine).await,
            ConversationAction::Show { id } => commands::conversation::show(&engine, &id).await,
            ConversationAction::Delete { id } => {
                commands::conversation::delete(&engine, &id).await
            }
            ConversationAction::Append { id, role, content } => {
                commands::conversation::append(&engine, &id, role, content).await
            }
        },
        Commands::Artifact { action } => match action {
            ArtifactAction::Show { path } => commands::artifact::show(&engine, &path).await,
            ArtifactAction::Export { path, out } => {
                commands::artifact::export(&engine, &path, &out).await
            }
        },
    };

    engine.shutdown().await;
    outcome
}

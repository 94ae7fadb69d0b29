//! Komatachi agent process
//!
//! Protocol frames go to stdout; logs go to stderr. Exit code 0 on EOF,
//! non-zero on fatal startup errors, with a final error frame either way.

use anyhow::Context;
use komatachi_agent::{Agent, AgentConfig};
use komatachi_cli::config::Config;
use komatachi_cli::protocol::{self, AgentFrame};
use komatachi_client::AnthropicClient;
use komatachi_core::ToolRegistry;
use komatachi_store::{ConversationStore, StoreError};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;

const CONVERSATION_DIR: &str = "conversation";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "fatal");
            let frame = AgentFrame::Error {
                message: format!("{err:#}"),
            };
            if let Ok(line) = serde_json::to_string(&frame) {
                println!("{line}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let mut store = ConversationStore::new(&config.data_dir, CONVERSATION_DIR);
    match store.load() {
        Ok(()) => {
            tracing::info!(
                dir = %store.dir().display(),
                messages = store.messages().map(|m| m.len()).unwrap_or(0),
                "conversation loaded"
            );
        }
        Err(StoreError::NotFound { .. }) => {
            store
                .initialize(Some(config.model.clone()))
                .context("initializing conversation")?;
            tracing::info!(dir = %store.dir().display(), "conversation initialized");
        }
        Err(err) => return Err(err).context("loading conversation"),
    }

    let client = AnthropicClient::new(config.api_key.clone())?;
    let agent_config = AgentConfig::new(
        config.model,
        config.max_tokens,
        config.context_window,
        config.home_dir,
    );
    let mut agent = Agent::new(agent_config, Arc::new(client), ToolRegistry::default(), store);

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    protocol::serve(&mut agent, stdin, stdout)
        .await
        .context("serving stdio protocol")?;
    Ok(())
}

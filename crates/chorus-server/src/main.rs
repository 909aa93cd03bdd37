//! Thin CLI front end for the chorus dispatcher (spec §6, "CLI / runtime
//! surface").
//!
//! Mirrors the shape of a real HTTP handler without being one: it reads
//! one line per turn from stdin, does the one thing the spec assigns to
//! the "HTTP layer" (persisting the user's message before the stream
//! call, so it could power an `ack` event), then drives
//! [`chorus_runtime::Manager`] exactly the way a request handler would.

#![deny(unsafe_code)]
#![warn(clippy::all)]

use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use chorus_core::{Role, SessionId, UserId};
use chorus_llm::DefaultProviderFactory;
use chorus_runtime::{
    ChunkFn, InMemoryPersistence, InitRequest, LocalFileLoader, Manager, NewMessage, Persistence,
    RuntimeConfig, StreamEvent, StreamRequest,
};
use chorus_telemetry::LogConfig;

/// Per-user streaming conversation dispatcher.
#[derive(Parser)]
#[command(name = "chorus", author, version, about, long_about = None)]
struct Cli {
    /// LLM provider: `claude`, `openai`, or `gemini`.
    #[arg(long, env = "CHORUS_PROVIDER", default_value = "claude")]
    provider: String,

    /// Model name passed to the provider.
    #[arg(long, env = "CHORUS_MODEL", default_value = "demo-model")]
    model: String,

    /// Provider API token.
    #[arg(long, env = "CHORUS_TOKEN", default_value = "")]
    token: String,

    /// Resume an existing session id instead of starting a new one.
    #[arg(long)]
    session: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RuntimeConfig::from_env();

    let log_config = if config.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    chorus_telemetry::setup_logging(&log_config).context("failed to install logging")?;

    let persistence: Arc<dyn Persistence> = Arc::new(InMemoryPersistence::new());
    let manager = Manager::new(
        config,
        persistence.clone(),
        Arc::new(DefaultProviderFactory),
        Arc::new(LocalFileLoader::new(".")),
        None,
    );

    let user_id = UserId::new(1);
    let session_id = cli.session.map_or(SessionId::create_new(), SessionId::new);

    let session = manager
        .init_session(InitRequest {
            user_id,
            session_id,
            provider: cli.provider.clone(),
            model: cli.model.clone(),
            token: cli.token.clone(),
        })
        .await
        .context("failed to start session")?;

    println!(
        "session {} — \"{}\". Type a message and press enter; Ctrl-D to quit.",
        session.id, session.title
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let content = line.trim();
        if content.is_empty() {
            continue;
        }

        let user_message = persistence
            .add_message(NewMessage {
                user_id,
                session_id: session.id,
                role: Role::User,
                content: content.to_string(),
            })
            .await
            .context("failed to persist user message")?;

        let mut printed = 0usize;
        let chunk_fn: ChunkFn = Box::new(move |event| {
            if let StreamEvent::Stream { text, .. } = event {
                if text.len() > printed {
                    print!("{}", &text[printed..]);
                    std::io::stdout().flush().ok();
                    printed = text.len();
                }
            }
            Ok(())
        });

        let result = manager
            .stream(
                StreamRequest {
                    user_id,
                    session_id: session.id,
                    provider: cli.provider.clone(),
                    model: cli.model.clone(),
                    token: cli.token.clone(),
                    user_message,
                    file_ids: Vec::new(),
                },
                chunk_fn,
            )
            .await;

        match result {
            Ok((_assistant_message, title)) => {
                println!();
                if let Some(title) = title {
                    println!("(session titled: {title})");
                }
            }
            Err(err) => {
                eprintln!("\nerror: {err}");
            }
        }
    }

    Ok(())
}

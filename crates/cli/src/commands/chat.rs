use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use fellah_agent::llm::phraser_from_config;
use fellah_agent::runtime::AgentRuntime;
use fellah_agent::session::{InMemorySessionStore, SessionPolicy};
use fellah_core::config::AppConfig;
use fellah_core::domain::client::ClientId;
use fellah_core::language::Language;
use fellah_db::repositories::{
    ReferenceRepository, SqlInventoryLedger, SqlOrderStore, SqlReferenceRepository,
};
use fellah_db::DbPool;

use crate::commands::{async_runtime, load_config, open_database, CommandResult, StepFailure};

const QUIT_COMMANDS: &[&str] = &["/quit", "/exit"];

pub fn run(client_id: i64, language: &str) -> CommandResult {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    run_with_io(client_id, language, stdin.lock(), stdout.lock())
}

/// Reads one client message per line until end of input or `/quit`, writing each reply.
pub fn run_with_io<R: BufRead, W: Write>(
    client_id: i64,
    language: &str,
    input: R,
    mut output: W,
) -> CommandResult {
    let language = match language.parse::<Language>() {
        Ok(language) => language,
        Err(error) => return CommandResult::failure("chat", "invalid_argument", error.to_string(), 2),
    };
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(result) => return result,
    };
    init_logging(&config);
    let runtime = match async_runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let agent =
            build_agent(&config, &pool).await.map_err(|error| ("agent_init", format!("{error:#}"), 7u8))?;
        let exchanged = converse(&agent, ClientId(client_id), language, input, &mut output)
            .await
            .map_err(|error| ("chat_io", format!("{error:#}"), 8u8))?;
        pool.close().await;
        Ok::<_, StepFailure>(exchanged)
    });

    match result {
        Ok(exchanged) => {
            CommandResult::success("chat", format!("conversation ended after {exchanged} messages"))
        }
        Err(failure) => CommandResult::from_step("chat", failure),
    }
}

async fn build_agent(config: &AppConfig, pool: &DbPool) -> Result<AgentRuntime> {
    let reference = SqlReferenceRepository::new(pool.clone())
        .load_reference_data()
        .await
        .context("loading reference data")?;
    let ledger = Arc::new(SqlInventoryLedger::new(pool.clone()));
    let phraser = phraser_from_config(&config.llm, &reference, ledger.as_ref())
        .await
        .context("configuring phraser")?;

    Ok(AgentRuntime::new(
        Arc::new(reference),
        ledger,
        Arc::new(SqlOrderStore::new(pool.clone())),
        Arc::new(InMemorySessionStore::new(SessionPolicy::from(&config.session))),
        phraser,
    ))
}

async fn converse<R: BufRead, W: Write>(
    agent: &AgentRuntime,
    client_id: ClientId,
    language: Language,
    input: R,
    output: &mut W,
) -> Result<usize> {
    writeln!(output, "client {} ({}), type /quit to leave", client_id.0, language.as_str())?;

    let mut exchanged = 0;
    for line in input.lines() {
        let line = line.context("reading input")?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.contains(&text) {
            break;
        }

        match agent.process_message(client_id, text, language).await {
            Ok(reply) => writeln!(output, "{}", reply.reply)?,
            Err(error) => {
                let interface = error.into_interface("cli-chat");
                tracing::warn!(
                    event_name = "cli.chat.message_failed",
                    client_id = client_id.0,
                    error = %interface,
                    "message could not be processed"
                );
                writeln!(output, "! {}", interface.user_message())?;
            }
        }
        output.flush()?;
        exchanged += 1;
    }

    Ok(exchanged)
}

// Diagnostics go to stderr so stdout carries only the conversation and the outcome.
fn init_logging(config: &AppConfig) {
    use fellah_core::config::LogFormat::*;
    use tracing::Level;

    let level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder =
        tracing_subscriber::fmt().with_writer(std::io::stderr).with_target(false).with_max_level(level);
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

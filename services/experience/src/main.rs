use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use experience_core::Command;
use experience_core::source::ReplaySource;
use experience_core::types::ToolName;
use experience_service::config::Config;
use experience_service::transport_adapter::TransportSource;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Drives the interactive demo experience for one conversation")]
struct Cli {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Join a live conversation through the transport relay
    Connect {
        #[arg(long)]
        conversation_id: Option<String>,
        #[arg(long)]
        demo_id: Option<String>,
    },
    /// Replay a recorded conversation (JSON Lines)
    Replay {
        file: PathBuf,
        #[arg(long)]
        conversation_id: Option<String>,
        #[arg(long)]
        demo_id: Option<String>,
    },
    /// Print the tool definitions a persona should be configured with
    Tools,
}

/// Writes each command to stdout as one JSON line.
fn print_command(command: &Command) {
    match serde_json::to_string(command) {
        Ok(line) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{line}") {
                tracing::error!("Failed to write command: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to serialize command: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so stdout carries nothing but commands.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let cli = Cli::parse();

    let (conversation_id, demo_id) = match &cli.command {
        Mode::Tools => {
            let tools: Vec<_> = ToolName::ALL.iter().map(ToolName::definition).collect();
            println!("{}", serde_json::to_string_pretty(&tools)?);
            return Ok(());
        }
        Mode::Connect {
            conversation_id,
            demo_id,
        }
        | Mode::Replay {
            conversation_id,
            demo_id,
            ..
        } => (conversation_id.as_deref(), demo_id.as_deref()),
    };

    // --- 4. Initialize Collaborators ---
    let session_config = experience_service::session_config(&config, conversation_id, demo_id)?;
    let resolver = Arc::new(
        experience_service::build_resolver(&config, session_config.signed_url_ttl_secs())
            .context("Failed to set up the video resolver")?,
    );
    let forwarder = experience_service::build_forwarder(&config);

    // --- 5. Run the Session ---
    match &cli.command {
        Mode::Connect { .. } => {
            let mut source = TransportSource::connect(session_config.conversation_id()).await?;
            experience_service::run_session(
                &mut source,
                session_config,
                resolver,
                forwarder,
                print_command,
            )
            .await?;
        }
        Mode::Replay { file, .. } => {
            let mut source = ReplaySource::from_file(file)?;
            tracing::info!(messages = source.remaining(), "Replaying {}", file.display());
            experience_service::run_session(
                &mut source,
                session_config,
                resolver,
                forwarder,
                print_command,
            )
            .await?;
        }
        Mode::Tools => {}
    }

    Ok(())
}

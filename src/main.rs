//! threadrelay CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use threadrelay::agent::status::StatusReporter;
use threadrelay::config::Config;
use threadrelay::llm::{self, CompletionClient, UsageAccumulator};
use threadrelay::messaging::RelayHandler;
use threadrelay::messaging::discord::gateway_intents;
use threadrelay::repo::{GitRepo, RepoSync};

#[derive(Parser)]
#[command(name = "threadrelay")]
#[command(about = "Relays Discord threads to Claude and keeps a repository checkout in sync")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Environment file loaded before reading configuration
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_file_loaded = match dotenvy::from_path(&cli.env_file) {
        Ok(()) => true,
        Err(error) if error.not_found() => false,
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read {}", cli.env_file.display()));
        }
    };

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = threadrelay::logging::init_tracing(&config.log, cli.debug)?;

    tracing::info!(
        env_file = %cli.env_file.display(),
        env_file_loaded,
        backend = ?config.llm.backend,
        model = %config.llm.model,
        "starting threadrelay"
    );

    let repo = Arc::new(GitRepo::new(
        config.repo.url.clone(),
        config.repo.github_token.clone(),
        config.repo.path.clone(),
    ));
    repo.initialize()
        .await
        .context("failed to initialize repository")?;

    let transport = llm::build_transport(&config.llm, repo.path())
        .context("failed to build completion transport")?;
    tracing::info!(transport = transport.name(), "completion transport ready");

    let usage = Arc::new(UsageAccumulator::new());
    let completion = CompletionClient::new(transport, usage.clone());
    let status = Arc::new(StatusReporter::new(repo.clone(), usage));

    let handler = RelayHandler::new(
        completion,
        repo,
        status,
        config.max_thread_history,
        config.bot_name.clone(),
    );

    let mut client = serenity::Client::builder(&config.discord_token, gateway_intents())
        .event_handler(handler)
        .await
        .context("failed to create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for shutdown signal");
            return;
        }
        tracing::info!("shutdown signal received");
        shard_manager.shutdown_all().await;
    });

    client
        .start()
        .await
        .context("Discord gateway connection failed")?;

    tracing::info!("threadrelay stopped");
    Ok(())
}

//! `quill` binary: webhook server, standalone worker, and config check.

mod config;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quill_agent::{CodingAgent, HeadlessCliAgent, StubAgent};
use quill_git::GitWorkspace;
use quill_orchestrator::{run_scheduler_loop, run_worker_loop, EventDispatcher};
use quill_platform::{GithubPlatform, HostingPlatform};
use quill_store::EntityStore;

use config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "quill", about = "Issue-to-pull-request automation bot")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, default_value = "quill.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the webhook receiver plus the planning scheduler.
    Serve,
    /// Run the queue worker that turns confirmed issues into pull requests.
    Work {
        /// Process at most one queued issue, then exit.
        #[arg(long)]
        once: bool,
        /// Override the queue poll interval in seconds.
        #[arg(long)]
        poll_interval: Option<u64>,
    },
    /// Load and validate the config, then print the effective settings.
    Check,
}

fn init_tracing(level: &str) {
    // RUST_LOG wins over the config file when set.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn build_agent(config: &AppConfig) -> Arc<dyn CodingAgent> {
    if config.agent.command.trim().is_empty() {
        warn!("no agent command configured, using the stub backend");
        Arc::new(StubAgent::new(Some(config.agent.min_body_length)))
    } else {
        Arc::new(HeadlessCliAgent::new(config.headless_agent_config()))
    }
}

fn build_platform(config: &AppConfig) -> Result<Option<Arc<dyn HostingPlatform>>> {
    match config.resolved_github_token() {
        Some(token) => {
            let platform = GithubPlatform::new(&config.github.api_url, &token)
                .context("failed to construct the GitHub client")?;
            Ok(Some(Arc::new(platform)))
        }
        None => {
            warn!("no GitHub token resolved, running without a platform client");
            Ok(None)
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let store = EntityStore::new(config.working_directory());
    let git = GitWorkspace::new(config.working_directory());
    let profile = config.bot_profile();
    let agent = build_agent(&config);
    let platform = build_platform(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = Arc::new(EventDispatcher::new(
        store.clone(),
        platform.clone(),
        agent.clone(),
        git,
        profile.clone(),
        shutdown_tx,
    ));

    if config.scheduler.enabled {
        match &platform {
            Some(platform) => {
                tokio::spawn(run_scheduler_loop(
                    store,
                    platform.clone(),
                    agent,
                    profile.repository.clone(),
                    profile.username.clone(),
                    config.idle_threshold(),
                    config.scheduler_interval(),
                    shutdown_rx.clone(),
                ));
            }
            None => warn!("scheduler enabled but no platform token, not starting it"),
        }
    }

    let mut shutdown_rx = shutdown_rx;
    if !config.webhook.enabled {
        info!("webhook receiver disabled, waiting for ctrl-c");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = shutdown_rx.changed() => {}
        }
        return Ok(());
    }

    let app = webhook::build_router(dispatcher, &config.github.webhook_path);
    let addr = format!("{}:{}", config.webhook.host, config.webhook.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind webhook listener on {addr}"))?;
    info!(
        addr = %addr,
        path = %config.github.webhook_path,
        repo = %config.bot.repository,
        "webhook receiver listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
                _ = shutdown_rx.changed() => info!("restart requested, shutting down"),
            }
        })
        .await
        .context("webhook server failed")?;
    Ok(())
}

async fn work(config: AppConfig, once: bool, poll_interval: Option<u64>) -> Result<()> {
    let Some(platform) = build_platform(&config)? else {
        bail!("the worker needs a GitHub token; set github.token, GITHUB_TOKEN, or github.token_file");
    };
    let store = EntityStore::new(config.working_directory());
    let git = GitWorkspace::new(config.working_directory());
    let profile = config.bot_profile();
    let agent = build_agent(&config);
    let poll = poll_interval
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.worker_poll_interval());
    run_worker_loop(
        store,
        platform,
        agent,
        git,
        profile,
        config.limits.max_iterations,
        poll,
        once,
    )
    .await;
    Ok(())
}

fn check(config: &AppConfig) {
    let token = if config.resolved_github_token().is_some() { "set" } else { "missing" };
    let agent_token = if config.resolved_agent_token().is_some() { "set" } else { "missing" };
    println!("repository:        {}", config.bot.repository);
    println!("default branch:    {}", config.bot.default_branch);
    println!("bot username:      {}", if config.bot.username.is_empty() { "(none)" } else { &config.bot.username });
    println!("webhook:           {}:{}{} (enabled: {})",
        config.webhook.host, config.webhook.port, config.github.webhook_path, config.webhook.enabled);
    println!("scheduler:         enabled={} interval={}s idle={}min",
        config.scheduler.enabled, config.scheduler.interval_seconds, config.bot.idle_minutes);
    println!("agent command:     {}", config.agent.command);
    println!("working directory: {}", config.agent.working_directory);
    println!("max iterations:    {}", config.limits.max_iterations);
    println!("github token:      {token}");
    println!("agent token:       {agent_token}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    init_tracing(&config.logging.level);
    config.validate()?;
    match cli.command {
        Command::Serve => serve(config).await,
        Command::Work { once, poll_interval } => work(config, once, poll_interval).await,
        Command::Check => {
            check(&config);
            Ok(())
        }
    }
}

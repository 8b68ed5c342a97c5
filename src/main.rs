use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use snipbox_engine::SnippetStatus;
use snipbox_exec::render::{render_diagnostics, render_result};
use snipbox_exec::{AuditLogger, Config, ConfigError, EvalError, Evaluator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Evaluate untrusted snippets under a symbol policy and a deadline.
#[derive(Debug, Parser)]
#[command(name = "snipbox", version)]
struct Cli {
    /// TOML configuration file. Falls back to `SNIPBOX_CONFIG`, then
    /// `config/default.toml`. A file named here or in `SNIPBOX_CONFIG` must
    /// exist.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Evaluate one command and exit instead of reading stdin.
    #[arg(long)]
    command: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config);
    let config = load_config(&config_path).with_context(|| {
        format!("failed to load config from {}", config_path.path().display())
    })?;
    let mut evaluator = build_evaluator(&config).await?;

    if let Some(command) = cli.command {
        let outcome = evaluate(&mut evaluator, &command).await;
        evaluator.close();
        return outcome.map_err(Into::into);
    }

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = shutdown_rx.changed() => break,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        if let Err(e) = evaluate(&mut evaluator, &line).await
            && e.is_terminal()
        {
            tracing::info!("rebuilding evaluator after: {e}");
            evaluator = build_evaluator(&config).await?;
        }
    }

    evaluator.close();
    Ok(())
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Debug, PartialEq, Eq)]
enum ConfigPath {
    /// Named by `--config` or `SNIPBOX_CONFIG`.
    Explicit(PathBuf),
    Default(PathBuf),
}

impl ConfigPath {
    fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::Default(path) => path,
        }
    }
}

fn resolve_config_path(flag: Option<PathBuf>) -> ConfigPath {
    if let Some(path) = flag {
        return ConfigPath::Explicit(path);
    }
    if let Ok(path) = std::env::var("SNIPBOX_CONFIG") {
        return ConfigPath::Explicit(PathBuf::from(path));
    }
    ConfigPath::Default(PathBuf::from("config/default.toml"))
}

fn load_config(path: &ConfigPath) -> Result<Config, ConfigError> {
    match path {
        ConfigPath::Explicit(path) => Config::load_required(path),
        ConfigPath::Default(path) => Config::load(path),
    }
}

async fn build_evaluator(config: &Config) -> anyhow::Result<Evaluator> {
    let evaluator = Evaluator::new(config).context("failed to build evaluator")?;
    if !config.audit.enabled {
        return Ok(evaluator);
    }
    let logger = AuditLogger::from_config(&config.audit)
        .await
        .with_context(|| format!("failed to open audit log {}", config.audit.destination))?;
    Ok(evaluator.with_audit(logger))
}

/// Evaluate one command and print the reply, plus diagnostics for any
/// rejected snippet.
async fn evaluate(evaluator: &mut Evaluator, command: &str) -> Result<(), EvalError> {
    let result = match evaluator.eval(command).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(e);
        }
    };

    let reply = render_result(&result);
    if !reply.is_empty() {
        println!("{reply}");
    }
    for event in result
        .events
        .iter()
        .filter(|e| e.status == SnippetStatus::Rejected)
    {
        let diagnostics = evaluator.diagnostics(event)?;
        if !diagnostics.is_empty() {
            println!("{}", render_diagnostics(event, &diagnostics));
        }
    }
    Ok(())
}

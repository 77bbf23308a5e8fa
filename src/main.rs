mod config;
mod credentials;
mod error;
mod format;
mod host;
mod models;
mod providers;
mod reset;
mod scheduler;
mod service;

use clap::{Parser, Subcommand};
use crate::config::{delete_token, ensure_initialized, load_config, set_token, AppConfig};
use credentials::CredentialLoader;
use error::AppError;
use format::{render_percent, render_quota, PlainTheme, Theme};
use host::{AnsiTheme, TerminalHost};
use models::{ModelRef, ProviderKind, UsageSnapshot};
use scheduler::{RenderOptions, Scheduler, Trigger};
use service::{SnapshotSource, UsageService};
use std::io::{self, IsTerminal};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "usage-footer")]
#[command(about = "Copilot and Codex subscription usage for a status footer")]
struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init,
    /// Fetch usage once and print the footer lines.
    Status {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        json: bool,
    },
    /// Keep the footer current for the given host provider.
    Watch {
        #[arg(long)]
        provider: String,
        #[arg(long, default_value = "default")]
        model: String,
        /// Seconds between simulated end-of-turn events. A line on stdin of
        /// the form `<provider> [model]` switches the active model.
        #[arg(long, default_value_t = 30)]
        turn_seconds: u64,
    },
    SetToken {
        provider: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        account_id: Option<String>,
    },
    ClearToken {
        provider: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("usage_footer=debug,warn")
        } else {
            EnvFilter::new("usage_footer=warn")
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(io::stderr),
        )
        .with(filter)
        .init();
}

/// Accepts the short names as well as host provider ids.
fn parse_provider(input: &str) -> Result<ProviderKind, AppError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "copilot" => Ok(ProviderKind::Copilot),
        "codex" => Ok(ProviderKind::Codex),
        other => ProviderKind::from_provider_id(other).ok_or_else(|| {
            AppError::Config(format!(
                "Unsupported provider '{input}'. Use copilot or codex."
            ))
        }),
    }
}

fn render_lines(
    kind: ProviderKind,
    snapshot: &UsageSnapshot,
    theme: &dyn Theme,
    width: usize,
) -> Vec<String> {
    snapshot
        .windows
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let title = (i == 0).then(|| kind.as_label());
            match kind {
                ProviderKind::Copilot => render_quota(theme, w, title, width),
                ProviderKind::Codex => render_percent(theme, w, title, width),
            }
        })
        .collect()
}

/// Parses a `<provider> [model]` line typed into `watch`.
fn parse_model_line(line: &str) -> Option<ModelRef> {
    let mut words = line.split_whitespace();
    let provider = words.next()?.to_string();
    let id = words.next().unwrap_or("default").to_string();
    Some(ModelRef { provider, id })
}

fn terminal_theme() -> Box<dyn Theme> {
    if io::stdout().is_terminal() {
        Box::new(AnsiTheme)
    } else {
        Box::new(PlainTheme)
    }
}

async fn run_status(cfg: &AppConfig, kind: ProviderKind, json: bool) -> Result<(), AppError> {
    let service = UsageService::new(cfg, CredentialLoader::from_config(cfg))?;
    let snapshot = service.snapshot(kind).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.windows.is_empty() {
        return Err(AppError::Unavailable {
            provider: kind,
            reason: snapshot
                .error
                .unwrap_or_else(|| "no usage windows reported".into()),
        });
    }

    let theme = terminal_theme();
    for line in render_lines(kind, &snapshot, theme.as_ref(), cfg.bar_width) {
        println!("{line}");
    }
    Ok(())
}

async fn run_watch(
    cfg: &AppConfig,
    provider: String,
    model: String,
    turn_seconds: u64,
) -> Result<(), AppError> {
    if ProviderKind::from_provider_id(&provider).is_none() {
        info!(%provider, "provider has no usage tracking; footer stays empty");
    }

    let service = UsageService::new(cfg, CredentialLoader::from_config(cfg))?;
    let scheduler = Scheduler::new(
        service,
        cfg.refresh_interval(),
        RenderOptions {
            bar_width: cfg.bar_width,
        },
    );
    let active = ModelRef {
        provider,
        id: model,
    };
    info!(provider = %active.provider, model = %active.id, "watching usage");
    let host = TerminalHost::new(Some(active), terminal_theme(), io::stdout());

    scheduler.handle(Trigger::SessionStart, &host).await;

    let mut turns = tokio::time::interval(Duration::from_secs(turn_seconds.max(1)));
    turns.tick().await;
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    loop {
        tokio::select! {
            _ = turns.tick() => scheduler.handle(Trigger::TurnEnd, &host).await,
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if let Some(model) = parse_model_line(&line) {
                        info!(provider = %model.provider, model = %model.id, "model changed");
                        host.switch_model(model);
                        scheduler.handle(Trigger::ModelChanged, &host).await;
                    }
                }
                Ok(None) => input_open = false,
                Err(e) => {
                    debug!(error = %e, "stdin closed");
                    input_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init => {
            ensure_initialized()?;
            println!("Initialized usage-footer config directory.");
        }
        Commands::Status { provider, json } => {
            let kind = parse_provider(&provider)?;
            let cfg = load_config()?;
            run_status(&cfg, kind, json).await?;
        }
        Commands::Watch {
            provider,
            model,
            turn_seconds,
        } => {
            let cfg = load_config()?;
            run_watch(&cfg, provider, model, turn_seconds).await?;
        }
        Commands::SetToken {
            provider,
            token,
            account_id,
        } => {
            let kind = parse_provider(&provider)?;
            if token.trim().is_empty() {
                return Err(AppError::Config("Token must not be empty.".into()));
            }
            set_token(kind, token.trim(), account_id.as_deref())?;
            println!("Stored {kind} token in the system keyring.");
        }
        Commands::ClearToken { provider } => {
            let kind = parse_provider(&provider)?;
            delete_token(kind)?;
            println!("Removed {kind} token from the system keyring.");
        }
    }

    Ok(())
}

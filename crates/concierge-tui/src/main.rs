use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use concierge_core::{ChatApi, Config, MessageShape, View};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(about = "Terminal client for the concierge help-desk chat", version)]
struct Cli {
    /// Chat backend root URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Page identifier sent with the intro and AI turns
    #[arg(long, global = true)]
    page_url: Option<String>,

    /// Agent poll interval in milliseconds
    #[arg(long, global = true)]
    poll_ms: Option<u64>,

    /// Use the `{sender, text}` message shape
    #[arg(long, global = true)]
    legacy_shape: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Commands {
    /// Open the chat (default)
    Chat {
        /// Which side of the conversation to join
        #[arg(long)]
        view: Option<View>,
    },
    /// Print the backend's demo greeting
    Hello,
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

/// Config file, then environment, then flags
fn load_config(cli: &Cli) -> Result<Config> {
    load_config_with(cli, |key| std::env::var(key).ok())
}

fn load_config_with(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_overrides(env)?;
    apply_flags(&mut config, cli);
    config.validate()?;
    Ok(config)
}

/// Persist `config` where it was loaded from
fn save_config(cli: &Cli, config: &Config) -> Result<PathBuf> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };
    config
        .save_to(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(page_url) = &cli.page_url {
        config.page_url = page_url.clone();
    }
    if let Some(poll_ms) = cli.poll_ms {
        config.poll_interval_ms = poll_ms;
    }
    if cli.legacy_shape {
        config.message_shape = MessageShape::SenderText;
    }
    if let Some(Commands::Chat { view: Some(view) }) = &cli.command {
        config.view = *view;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.clone().unwrap_or(Commands::Chat { view: None }) {
        Commands::Chat { .. } => run_chat(load_config(&cli)?).await,
        Commands::Hello => {
            logging::init_stderr()?;
            print_greeting(&load_config(&cli)?).await
        }
        Commands::Config { save } => {
            logging::init_stderr()?;
            let config = load_config(&cli)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if save {
                let path = save_config(&cli, &config)?;
                tracing::info!(path = %path.display(), "config saved");
            }
            Ok(())
        }
    }
}

async fn print_greeting(config: &Config) -> Result<()> {
    let api = ChatApi::new(&config.base_url, config.message_shape);
    let greeting = api
        .greeting()
        .await
        .with_context(|| format!("fetching greeting from {}", config.base_url))?;
    println!("{greeting}");
    Ok(())
}

async fn run_chat(config: Config) -> Result<()> {
    // Flushes the log file on drop
    let _guard = match config.resolved_log_dir() {
        Some(dir) => Some(logging::init_file(&dir)?),
        None => None,
    };

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_app(&mut terminal, &config).await;
    tui::restore()?;

    if let Err(e) = &result {
        tracing::error!(error = %e, "chat exited with error");
    }
    result
}

async fn run_app(terminal: &mut Tui, config: &Config) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(config, config.view, events.sender());

    tracing::info!(
        view = config.view.as_str(),
        base_url = %config.base_url,
        shape = ?config.message_shape,
        "chat started"
    );
    app.start();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(&mut app, event)?;
    }

    tracing::info!("chat closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_is_the_default_command() {
        let cli = Cli::try_parse_from(["concierge"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(!cli.legacy_shape);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "concierge",
            "chat",
            "--view",
            "agent",
            "--base-url",
            "http://helpdesk.test",
            "--poll-ms",
            "250",
            "--legacy-shape",
        ])
        .unwrap();

        let mut config = Config::new();
        apply_flags(&mut config, &cli);
        assert_eq!(config.view, View::Agent);
        assert_eq!(config.base_url, "http://helpdesk.test");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.message_shape, MessageShape::SenderText);
        assert_eq!(config.page_url, Config::new().page_url);
    }

    #[test]
    fn test_unknown_view_is_rejected() {
        let err = Cli::try_parse_from(["concierge", "chat", "--view", "manager"]).unwrap_err();
        assert!(err.to_string().contains("unknown view"));
    }

    #[test]
    fn test_load_config_reads_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"page_url": "https://shop.test/help"}"#).unwrap();

        let cli = Cli::try_parse_from([
            "concierge",
            "--config",
            path.to_str().unwrap(),
            "--poll-ms",
            "400",
            "config",
        ])
        .unwrap();

        let config = load_config_with(&cli, |_| None).unwrap();
        assert_eq!(config.page_url, "https://shop.test/help");
        assert_eq!(config.poll_interval_ms, 400);

        // flags beat the environment
        let env = |key: &str| match key {
            "CONCIERGE_POLL_MS" => Some("9000".to_string()),
            "CONCIERGE_BASE_URL" => Some("http://env.test".to_string()),
            _ => None,
        };
        let config = load_config_with(&cli, env).unwrap();
        assert_eq!(config.poll_interval_ms, 400);
        assert_eq!(config.base_url, "http://env.test");
    }

    #[test]
    fn test_config_save_writes_effective_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concierge").join("config.json");

        let cli = Cli::try_parse_from([
            "concierge",
            "--config",
            path.to_str().unwrap(),
            "--legacy-shape",
            "config",
            "--save",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::Config { save: true }));

        let config = load_config_with(&cli, |_| None).unwrap();
        assert_eq!(save_config(&cli, &config).unwrap(), path);

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.message_shape, MessageShape::SenderText);
        assert_eq!(saved, config);
    }
}

mod input;
mod render;

use clap::{Parser, Subcommand};
use input::LineReader;
use lib::chat::Notice;
use lib::config::{Config, QuickAction};
use lib::{ChatHandle, ChatRuntime};
use render::Output;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "chalk")]
#[command(about = "Chalk: talk to an AI tutor from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, workspace, TUTOR.md).
    Init {
        /// Config file path (default: CHALK_CONFIG_PATH or ~/.chalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Chat with the tutor (interactive). This is the default command.
    Chat {
        /// Config file path (default: CHALK_CONFIG_PATH or ~/.chalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Ask one question, wait for the full answer to be presented, then exit.
    Ask {
        /// Config file path (default: CHALK_CONFIG_PATH or ~/.chalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Print the final transcript as JSON instead of presenting it.
        #[arg(long)]
        json: bool,

        /// The question.
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },

    /// List models available on the Ollama backend.
    Models {
        /// Config file path (default: CHALK_CONFIG_PATH or ~/.chalk/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("chalk {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = run_chat(None).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, json, text }) => {
            if let Err(e) = run_ask(config, json, text.join(" ")).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Models { config }) => {
            if let Err(e) = run_models(config).await {
                log::error!("models failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

/// Load config and persona, then start the runtime.
fn start_runtime(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(Config, ChatHandle, tokio::task::JoinHandle<()>)> {
    let (config, path) = lib::config::load_config(config_path)?;
    let workspace = lib::config::resolve_workspace_dir(&config, &path);
    let persona = lib::persona::load_persona(Some(&workspace));
    let (handle, join) = ChatRuntime::from_config(&config, persona).spawn();
    Ok((config, handle, join))
}

/// The terminal presenter prints assistant messages itself; a speech program does not.
fn echoes_assistant(config: &Config) -> bool {
    config
        .playback
        .command
        .as_ref()
        .is_some_and(|c| !c.program.trim().is_empty())
}

/// Print notices the presentation needs; runs until the runtime stops.
async fn print_notices(
    mut notices: broadcast::Receiver<Notice>,
    echo_assistant: bool,
    quick_actions: Vec<QuickAction>,
) {
    loop {
        let notice = match notices.recv().await {
            Ok(n) => n,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("notice printer lagged, skipped {} notices", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match render::notice(&notice, echo_assistant, &quick_actions) {
            Some(Output::Stdout(text)) => println!("{}", text),
            Some(Output::Stderr(text)) => eprintln!("{}", text),
            None => {}
        }
    }
}

/// Send unless a cycle is running; the refusal mirrors the disabled send button.
async fn send(handle: &ChatHandle, text: &str) -> anyhow::Result<()> {
    if !handle.snapshot().can_send() || !handle.chat(text).await? {
        println!("Your tutor is still answering; wait for the reply to finish.");
    }
    Ok(())
}

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, handle, join) = start_runtime(config_path)?;
    let quick_actions = config.ui.quick_actions.clone();

    let printer = tokio::spawn(print_notices(
        handle.notices(),
        echoes_assistant(&config),
        quick_actions.clone(),
    ));

    println!("{}", render::welcome(&quick_actions));

    let mut lines = LineReader::new(BufReader::new(tokio::io::stdin()));
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("reading input failed: {}", e);
                break;
            }
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if !input.starts_with('/') {
            send(&handle, input).await?;
            continue;
        }
        let mut parts = input.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        match command.as_str() {
            "/exit" | "/quit" => break,
            "/help" => println!("{}", render::help()),
            "/new" => handle.start_new_chat().await?,
            "/zoom" => handle.toggle_zoom().await?,
            "/history" => println!("{}", render::history(&handle.snapshot().chat_history)),
            "/clear" => {
                if handle.snapshot().chat_history.is_empty() {
                    println!("Nothing to clear.");
                    continue;
                }
                println!("Clear the chat history? [y/N]");
                let answer = match lines.next_line().await {
                    Ok(answer) => answer.unwrap_or_default(),
                    Err(e) => {
                        log::warn!("reading confirmation failed: {}", e);
                        String::new()
                    }
                };
                if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
                    handle.clear_chat_history().await?;
                }
            }
            "/quick" => match arg
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| quick_actions.get(i))
            {
                Some(action) => {
                    println!("> {}", action.question);
                    send(&handle, &action.question).await?;
                }
                None => println!("Usage: /quick N (1-{})", quick_actions.len()),
            },
            other => println!("Unknown command {}; try /help.", other),
        }
    }

    handle.shutdown().await?;
    let _ = join.await;
    printer.abort();
    Ok(())
}

async fn run_ask(config_path: Option<PathBuf>, json: bool, text: String) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let workspace = lib::config::resolve_workspace_dir(&config, &path);
    let persona = lib::persona::load_persona(Some(&workspace));
    let runtime = ChatRuntime::from_config(&config, persona);
    let runtime = if json {
        // Nothing is presented; the transcript is printed at the end.
        runtime.with_presenter(Arc::new(lib::playback::SilentPresenter))
    } else {
        runtime
    };
    let (handle, join) = runtime.spawn();

    if !handle.chat(text).await? {
        anyhow::bail!("nothing to ask");
    }
    let snapshot = handle.wait_until_idle().await?;
    handle.shutdown().await?;
    let _ = join.await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else if echoes_assistant(&config) {
        // Speech programs print nothing, so show the answer once it has been spoken.
        for m in snapshot.chat_history.iter().filter(|m| !m.is_user()) {
            println!("< {}", m.text());
        }
    }
    if let Some(error) = snapshot.last_error {
        anyhow::bail!("the tutor could not answer: {}", error);
    }
    Ok(())
}

async fn run_models(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let timeout = Duration::from_secs(config.backend.request_timeout_secs.max(1));
    let client = lib::llm::OllamaClient::new(config.backend.ollama_url.clone(), timeout);
    let current = lib::config::resolve_model(&config.backend);
    let models = client.list_models().await?;
    if models.is_empty() {
        println!("no models installed; try `ollama pull {}`", current);
        return Ok(());
    }
    for m in models {
        let marker = if m.name == current { "*" } else { " " };
        println!("{} {}", marker, m.name);
    }
    Ok(())
}

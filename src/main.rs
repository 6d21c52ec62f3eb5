use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use kapricorn_lib::commands::{handle_chat, handle_recommendation, AppState, Reply};
use kapricorn_lib::config::Config;
use kapricorn_lib::llm::{GeminiBackend, Invocation, ModelGateway};
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "kapricorn", about = "Kapricorn - farming advisor", version)]
struct Cli {
    /// TOML configuration file; environment variables are used when absent.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one chat message and print the JSON reply.
    Chat {
        message: String,
        /// JSON file holding the prior history.
        #[arg(long)]
        history: Option<PathBuf>,
        #[arg(long)]
        paid: bool,
        #[arg(short, long)]
        location: Option<String>,
        #[arg(long)]
        npk: Option<String>,
        /// Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
    /// Crop recommendations for a location.
    Recommend { location: String },
    /// Stream a raw prompt to the chat model.
    Prompt {
        text: String,
        #[arg(long)]
        paid: bool,
    },
}

fn init_logging() {
    let noisy_crate_filters = ",hyper=warn,reqwest=warn";
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => {
            tracing_subscriber::EnvFilter::new(format!("{}{}", directives, noisy_crate_filters))
        }
        _ => tracing_subscriber::EnvFilter::new(format!("info{}", noisy_crate_filters)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok();
}

fn print_reply(reply: &Reply) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(&reply.body)?);
    Ok(reply.is_success())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = Arc::new(match cli.config.as_deref() {
        Some(path) => Config::load(Some(path))
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::from_env(),
    });

    let succeeded = match cli.command {
        Commands::Chat {
            message,
            history,
            paid,
            location,
            npk,
            date,
        } => {
            let history: Value = match history {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path).with_context(|| {
                        format!("failed to read history from {}", path.display())
                    })?;
                    serde_json::from_str(&raw).context("history file is not valid JSON")?
                }
                None => json!([]),
            };
            let date = date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
            let body = json!({
                "message": message,
                "history": history,
                "usePaidTier": paid,
                "location": location,
                "npk": npk,
                "date": date,
            });

            let state = AppState::from_config(config)?;
            print_reply(&handle_chat(&state, body).await)?
        }
        Commands::Recommend { location } => {
            let state = AppState::from_config(config)?;
            print_reply(&handle_recommendation(&state, json!({ "location": location })).await)?
        }
        Commands::Prompt { text, paid } => {
            let gateway = ModelGateway::new(Arc::new(GeminiBackend::new(&config.backend)?));
            match gateway.invoke(text.into(), config.chat_model(paid), true).await? {
                Invocation::Streaming { mut stream, input_tokens } => {
                    tracing::debug!(input_tokens, "Streaming response");
                    let mut stdout = std::io::stdout();
                    while let Some(chunk) = stream.next().await {
                        write!(stdout, "{}", chunk?)?;
                        stdout.flush()?;
                    }
                    writeln!(stdout)?;
                }
                Invocation::Complete(completion) => println!("{}", completion.text),
            }
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

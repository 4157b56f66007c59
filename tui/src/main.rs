//! Navian - terminal chat widget
//!
//! # Usage
//!
//! ```bash
//! # Interactive chat (default)
//! navian
//!
//! # One question, answer on stdout
//! navian ask "What do you offer?"
//!
//! # Through the key-injecting proxy
//! navian --proxy-url http://127.0.0.1:3000/chat
//!
//! # Send the contact form
//! navian contact --name Ada --email ada@example.com --message "Hello"
//!
//! # With logging (stderr)
//! RUST_LOG=navian_core=debug navian ask "hi" 2>navian.log
//! ```

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use navian_core::{
    default_config_path, load_config_from_path, ChatSession, ConfigOverrides, ContactClient,
    ContactForm, HttpTransport, NavianConfig, TurnOutcome, CONTACT_FAILURE_MESSAGE,
    CONTACT_SUCCESS_MESSAGE,
};
use navian_tui::app::run_terminal;
use navian_tui::{App, DisplayState, SessionHandle, TranscriptSink};

/// Terminal chat widget with streamed reasoning
#[derive(Debug, Parser)]
#[command(name = "navian", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/navian/widget.toml)
    #[arg(long, global = true, env = "NAVIAN_CONFIG")]
    config: Option<PathBuf>,

    /// Chat backend URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Proxy URL, used instead of the backend URL when set
    #[arg(long, global = true)]
    proxy_url: Option<String>,

    /// Page the backend should read (repeatable)
    #[arg(long = "url", global = true)]
    urls: Vec<String>,

    /// Company name sent with every request
    #[arg(long, global = true)]
    company_name: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat (default)
    Chat,

    /// Ask one question and print the reasoning and answer
    Ask {
        /// The question
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Submit the contact form
    Contact {
        /// Your name
        #[arg(long)]
        name: String,

        /// Reply address
        #[arg(long)]
        email: String,

        /// Company (optional)
        #[arg(long)]
        company: Option<String>,

        /// Message body
        #[arg(long)]
        message: String,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.api_url {
            overrides = overrides.with_api_url(url.clone());
        }
        if let Some(ref url) = self.proxy_url {
            overrides = overrides.with_proxy_url(url.clone());
        }
        if !self.urls.is_empty() {
            overrides = overrides.with_urls(self.urls.clone());
        }
        if let Some(ref name) = self.company_name {
            overrides = overrides.with_company_name(name.clone());
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr only when asked for; the alternate screen owns stdout
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .with_target(true)
            .init();
    }

    let cli = Cli::parse();

    let mut config = load_config_from_path(cli.config.clone().or_else(default_config_path))
        .context("Failed to load configuration")?;
    cli.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;
    tracing::info!(source = %config.source(), endpoint = %config.widget.endpoint(), "Configuration loaded");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&config).await,
        Command::Ask { query } => ask(&config, &query.join(" ")).await,
        Command::Contact {
            name,
            email,
            company,
            message,
        } => {
            let form = ContactForm {
                name,
                email,
                company,
                message,
            };
            contact(&config, &form).await
        }
    }
}

fn session(config: &NavianConfig) -> anyhow::Result<ChatSession<HttpTransport>> {
    let transport = HttpTransport::new(&config.widget).context("Failed to build HTTP client")?;
    Ok(ChatSession::new(transport, config.widget.clone(), config.reveal))
}

async fn chat(config: &NavianConfig) -> anyhow::Result<ExitCode> {
    let handle = SessionHandle::spawn(session(config)?);
    let display = DisplayState::new(config.widget.company_name.clone(), config.widget.show_welcome);
    let app = App::new(handle, display, config.widget.endpoint());

    run_terminal(app).await?;
    Ok(ExitCode::SUCCESS)
}

async fn ask(config: &NavianConfig, query: &str) -> anyhow::Result<ExitCode> {
    let mut session = session(config)?;
    let mut sink = TranscriptSink::new(io::stdout());

    let outcome = session.send_message(query, &mut sink).await?;
    sink.finish().context("Failed to write answer")?;

    Ok(match outcome {
        TurnOutcome::Completed | TurnOutcome::EndedWithoutCompletion => ExitCode::SUCCESS,
        TurnOutcome::Failed => ExitCode::FAILURE,
    })
}

async fn contact(config: &NavianConfig, form: &ContactForm) -> anyhow::Result<ExitCode> {
    let client = ContactClient::new(config.contact.clone());
    match client.submit(form).await {
        Ok(()) => {
            println!("{CONTACT_SUCCESS_MESSAGE}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Contact form submission failed");
            eprintln!("{CONTACT_FAILURE_MESSAGE}");
            eprintln!("({e})");
            Ok(ExitCode::FAILURE)
        }
    }
}

mod notify;
mod settings;
mod submit;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use api_types::{PluginRating, DIRECT_MESSAGE_SERVER_ID};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use settings::Settings;

/// Submit social credit ratings on behalf of a logged-in Discord user.
#[derive(Parser)]
#[command(author, version, about)]
struct Opts {
    /// Path to the settings file.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Store the plugin API key generated in the web client.
    SetKey { key: String },
    /// Change the rating endpoint.
    SetEndpoint { url: String },
    /// Print the current settings with the key masked.
    Show,
    /// Rate the author of a message.
    Submit {
        /// Discord id of the user giving the rating.
        #[arg(long)]
        acting: String,
        /// Discord id of the message author.
        #[arg(long)]
        target: String,
        /// Guild id, `@me` for direct messages.
        #[arg(long, default_value = DIRECT_MESSAGE_SERVER_ID)]
        server: String,
        #[arg(long)]
        message: String,
        /// Whole-number score change.
        #[arg(long, allow_hyphen_values = true)]
        delta: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let opts = Opts::parse();
    let path = match opts.settings {
        Some(path) => path,
        None => settings::default_path()?,
    };
    let mut settings = Settings::load(&path)?;

    match opts.command {
        Cmd::SetKey { key } => {
            settings.api_key = key.trim().to_string();
            settings.save(&path)?;
            println!("API key saved to {}", path.display());
        }
        Cmd::SetEndpoint { url } => {
            reqwest::Url::parse(&url).with_context(|| format!("invalid endpoint {url}"))?;
            settings.endpoint = url;
            settings.save(&path)?;
            println!("Endpoint set to {}", settings.endpoint);
        }
        Cmd::Show => {
            println!("api_key  = {}", settings.masked_key());
            println!("endpoint = {}", settings.endpoint);
        }
        Cmd::Submit {
            acting,
            target,
            server,
            message,
            delta,
        } => {
            let rating = PluginRating {
                acting_user_id: acting,
                target_user_id: target,
                server_id: server,
                message_id: message,
                score_delta: submit::parse_delta(&delta),
            };
            let notice = submit::submit(&reqwest::Client::new(), &settings, &rating).await;
            notify::write(&notice)?;
            if notice.is_error() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

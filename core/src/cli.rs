use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line client for the Discord social credit service.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the backend base URL.
    #[arg(long, global = true)]
    pub api_base: Option<String>,
    /// Override the directory holding the local session.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Default)]
pub enum Command {
    /// Print the URL that starts the Discord login flow.
    LoginUrl,
    /// Finish login with the URL the backend redirected to.
    Login {
        /// Redirect URL carrying the `token` query parameter.
        redirect_url: String,
    },
    /// Forget the local session. Asks twice.
    Logout,
    /// Show the logged-in user.
    #[default]
    Whoami,
    /// List servers with their tracked user counts.
    Servers,
    /// Look up a Discord user by numeric id. Reads ids from stdin when omitted.
    Lookup { user_id: Option<String> },
    /// Start tracking a Discord user.
    Track {
        user_id: String,
        /// Server to associate the user with.
        #[arg(long)]
        server: Option<String>,
    },
    /// Stop tracking a user.
    Untrack {
        user_id: String,
        #[arg(long)]
        yes: bool,
    },
    /// List tracked users with their current score and tier.
    Tracked {
        #[arg(long)]
        server: Option<String>,
    },
    /// Rate a user, e.g. `rate 1234 -10 --reason late`.
    Rate {
        user_id: String,
        /// Signed score change, e.g. +5 or -10.
        #[arg(allow_hyphen_values = true)]
        delta: String,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        server: Option<String>,
    },
    /// Undo the most recent rating of a user.
    Undo { user_id: String },
    /// Print score histories aligned on a shared time axis.
    Graph {
        #[arg(long)]
        server: Option<String>,
        /// Emit CSV instead of a table.
        #[arg(long)]
        csv: bool,
    },
    /// Group tracked users into tiers.
    Tiers {
        #[arg(long)]
        server: Option<String>,
    },
    /// Manage the key used by the rating plugin.
    PluginKey {
        #[command(subcommand)]
        command: PluginKeyCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PluginKeyCommand {
    /// Show whether a key exists.
    Status,
    /// Generate a key, invalidating any existing one.
    Generate {
        #[arg(long)]
        yes: bool,
    },
    /// Revoke the current key.
    Revoke {
        #[arg(long)]
        yes: bool,
    },
}

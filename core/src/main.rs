use anyhow::{bail, Context, Result};
use api_types::UserProfile;
use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::{self, Instant},
};
use tracing::{info, warn};

use socred::{
    cli::{Cli, Command, PluginKeyCommand},
    confirm::{ClickOutcome, LogoutConfirm, LogoutState},
    history::{align, fetch_histories},
    output,
    rating::rating_request,
    search::{lookup, run_interactive, LookupOutcome},
    services::{self, storage::Storage},
    session::{self, Session, SessionError, SessionState},
    tier::{group_by_tier, Tier},
    ApiClient, ApiError, Config, TrackedUsers,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    services::log::init(config.logging_enabled);
    let storage = Storage::open(&config.data_dir).await?;
    let mut api = ApiClient::new(config.api_base.clone());
    if let Some(token) = session::stored_token(&storage).await {
        api = api.with_token(token);
    }

    let result = run(cli.command, &config, &storage, &api).await;
    if let Err(err) = &result {
        if is_unauthorized(err) && api.has_token() {
            warn!("backend rejected the session");
            session::logout(&storage).await?;
        }
    }
    result
}

async fn run(command: Command, config: &Config, storage: &Storage, api: &ApiClient) -> Result<()> {
    match command {
        Command::LoginUrl => println!("{}", api.login_url()?),
        Command::Login { redirect_url } => {
            let token = session::accept_redirect(storage, &redirect_url).await?;
            let api = api.clone().with_token(token);
            let session = require_session(&api, storage).await?;
            println!("Logged in as {}", session.user.username);
        }
        Command::Logout => {
            if !api.has_token() {
                println!("Not logged in.");
                return Ok(());
            }
            let username = match session::bootstrap(api, storage).await {
                Ok(SessionState::LoggedIn(session)) => session.user.username,
                Ok(SessionState::LoggedOut) => {
                    println!("Not logged in.");
                    return Ok(());
                }
                Err(err) => {
                    warn!("backend unreachable, logging out locally: {err}");
                    session::cached_user(storage)
                        .await
                        .map(|u| u.username)
                        .unwrap_or_else(|| "current session".into())
                }
            };
            confirm_logout(config, storage, &username).await?
        }
        Command::Whoami => {
            let session = require_session(api, storage).await?;
            println!("{} ({})", session.user.username, session.user.user_id);
            if let Some(pic) = &session.user.profile_pic_url {
                println!("{pic}");
            }
        }
        Command::Servers => {
            let session = require_session(api, storage).await?;
            let mut table = output::table(["id", "tracked", "name"]);
            for server in &session.servers {
                table.add_row(vec![
                    server.id.clone(),
                    server.tracked_user_count.to_string(),
                    server.name.clone(),
                ]);
            }
            println!("{table}");
        }
        Command::Lookup { user_id: Some(id) } => print_lookup(&id, lookup(api, &id).await)?,
        Command::Lookup { user_id: None } => {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(String, LookupOutcome)>();
            let stdin = BufReader::new(tokio::io::stdin());
            let printer = async move {
                while let Some((query, outcome)) = rx.recv().await {
                    if let Err(err) = print_lookup(&query, outcome) {
                        eprintln!("{err}");
                    }
                }
            };
            let (read, ()) =
                tokio::join!(run_interactive(api, stdin, config.search_debounce, tx), printer);
            read.context("reading lookup input")?;
        }
        Command::Track { user_id, server } => {
            let profile = fetch_profile(api, &user_id).await?;
            let mut users = TrackedUsers::load(storage).await;
            let label = profile.display_tag();
            if users.track(profile, server.as_deref()) {
                println!("Now tracking {label}");
            } else {
                println!("{label} is already tracked");
            }
            users.save(storage).await?;
        }
        Command::Untrack { user_id, yes } => {
            let session = require_session(api, storage).await?;
            let mut users = TrackedUsers::load(storage).await;
            let label = users
                .get(&user_id)
                .map(|u| u.profile.display_tag())
                .unwrap_or_else(|| user_id.clone());
            let prompt = format!(
                "Stop tracking {label}? This deletes every rating you gave them."
            );
            if !confirm(&prompt, yes).await? {
                println!("Cancelled.");
                return Ok(());
            }
            api.untrack(&session.user.user_id, &user_id).await?;
            users.untrack(&user_id);
            users.save(storage).await?;
            println!("Stopped tracking {label}");
        }
        Command::Tracked { server } => {
            let session = require_session(api, storage).await?;
            let users = refresh_tracked(api, storage, &session, server.as_deref()).await?;
            let visible = users.visible_in(server.as_deref());
            if visible.is_empty() {
                println!("No tracked users.");
                return Ok(());
            }
            let mut table = output::table(["id", "score", "tier", "user"]);
            for user in visible {
                table.add_row(vec![
                    user.id().to_string(),
                    user.score().to_string(),
                    Tier::for_score(user.score()).to_string(),
                    user.profile.display_tag(),
                ]);
            }
            println!("{table}");
        }
        Command::Rate {
            user_id,
            delta,
            reason,
            server,
        } => {
            let request = rating_request(&delta, reason.as_deref(), server.as_deref())?;
            let session = require_session(api, storage).await?;
            let mut users = TrackedUsers::load(storage).await;
            // resolve the profile first so a failed lookup submits nothing
            if users.get(&user_id).is_none() {
                users.track(fetch_profile(api, &user_id).await?, server.as_deref());
            }
            let history = api.rate(&session.user.user_id, &user_id, &request).await?;
            let score = history.current_score();
            users.associate(&user_id, server.as_deref());
            users.set_score(&user_id, score);
            users.save(storage).await?;
            info!(user_id = %user_id, score, "rating submitted");
            println!("Score is now {score} ({})", Tier::for_score(score));
        }
        Command::Undo { user_id } => {
            let session = require_session(api, storage).await?;
            api.undo_latest(&session.user.user_id, &user_id).await?;
            let history = api
                .score_history(&session.user.user_id, &user_id, None)
                .await?;
            let mut users = TrackedUsers::load(storage).await;
            users.set_score(&user_id, history.current_score());
            users.save(storage).await?;
            println!("Latest rating removed. Score is now {}", history.current_score());
        }
        Command::Graph { server, csv } => {
            let session = require_session(api, storage).await?;
            let users = TrackedUsers::load(storage).await;
            let profiles: Vec<&UserProfile> = users
                .visible_in(server.as_deref())
                .into_iter()
                .map(|u| &u.profile)
                .collect();
            let (histories, failures) =
                fetch_histories(api, &session.user.user_id, &profiles, server.as_deref()).await;
            for (id, err) in &failures {
                eprintln!("could not load history for {id}: {err}");
            }
            let aligned = align(&profiles, &histories);
            if aligned.is_empty() {
                println!("No score history yet.");
            } else if csv {
                print!("{}", aligned.to_csv());
            } else {
                let (lo, hi) = aligned.value_range();
                print!("{}", aligned.to_table());
                println!("range {lo} .. {hi}");
            }
        }
        Command::Tiers { server } => {
            let session = require_session(api, storage).await?;
            let users = refresh_tracked(api, storage, &session, server.as_deref()).await?;
            for (tier, members) in group_by_tier(users.visible_in(server.as_deref())) {
                let names: Vec<String> = members
                    .iter()
                    .map(|u| format!("{} ({})", u.profile.display_tag(), u.score()))
                    .collect();
                println!("{tier}: {}", names.join(", "));
            }
        }
        Command::PluginKey { command } => plugin_key(api, command).await?,
    }
    Ok(())
}

async fn require_session(api: &ApiClient, storage: &Storage) -> Result<Session> {
    match session::bootstrap(api, storage).await? {
        SessionState::LoggedIn(session) => Ok(session),
        SessionState::LoggedOut => bail!("Not logged in. Run `socred login-url` to start."),
    }
}

/// Pull the backend's rated users into the local list and persist it.
async fn refresh_tracked(
    api: &ApiClient,
    storage: &Storage,
    session: &Session,
    server: Option<&str>,
) -> Result<TrackedUsers> {
    let mut users = TrackedUsers::load(storage).await;
    match api.rated_users(&session.user.user_id, server).await {
        Ok(rated) => {
            users.merge_rated(rated, server);
            users.save(storage).await?;
        }
        Err(err) if err.is_unauthorized() => return Err(err.into()),
        Err(err) => warn!("using cached tracked users: {err}"),
    }
    Ok(users)
}

async fn fetch_profile(api: &ApiClient, user_id: &str) -> Result<UserProfile> {
    match lookup(api, user_id).await {
        LookupOutcome::Found(profile) => Ok(profile),
        LookupOutcome::Failed(message) => bail!(message),
        LookupOutcome::Cleared => bail!("A user id is required."),
    }
}

fn print_lookup(query: &str, outcome: LookupOutcome) -> Result<()> {
    match outcome {
        LookupOutcome::Cleared => {}
        LookupOutcome::Found(profile) => {
            println!("{}  {}", profile.id, profile.display_tag());
            println!("  avatar: {}", profile.avatar_or_default());
        }
        LookupOutcome::Failed(message) => bail!("{query}: {message}"),
    }
    Ok(())
}

async fn plugin_key(api: &ApiClient, command: PluginKeyCommand) -> Result<()> {
    match command {
        PluginKeyCommand::Status => {
            let status = api.plugin_key_status().await?;
            match status.generated_at {
                Some(at) if status.has_api_key => println!("A plugin key exists (generated {at})."),
                _ if status.has_api_key => println!("A plugin key exists."),
                _ => println!("No plugin key."),
            }
        }
        PluginKeyCommand::Generate { yes } => {
            let exists = api.plugin_key_status().await?.has_api_key;
            let prompt = if exists {
                "Regenerate the plugin key? The current key stops working immediately."
            } else {
                "Generate a plugin key?"
            };
            if !confirm(prompt, yes).await? {
                println!("Cancelled.");
                return Ok(());
            }
            let generated = api.generate_plugin_key().await?;
            println!("{}", generated.api_key.unwrap_or_default());
            println!("Copy this key now. It will not be shown again.");
        }
        PluginKeyCommand::Revoke { yes } => {
            if !confirm("Revoke the plugin key?", yes).await? {
                println!("Cancelled.");
                return Ok(());
            }
            api.revoke_plugin_key().await?;
            println!("Plugin key revoked.");
        }
    }
    Ok(())
}

/// Ask a yes/no question on stdin unless `assume_yes`.
async fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    println!("{prompt} [y/N]");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Arm the logout and wait for a second Enter before the arm window and its
/// fade-out run out.
async fn confirm_logout(config: &Config, storage: &Storage, username: &str) -> Result<()> {
    let mut machine = LogoutConfirm::new(config.logout_arm, config.logout_fade);
    machine.click(Instant::now());
    println!("{} (press Enter)", machine.title(username));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(deadline) = machine.next_deadline() {
        tokio::select! {
            line = lines.next_line() => {
                if line?.is_none() {
                    break;
                }
                if machine.click(Instant::now()) == ClickOutcome::Logout {
                    session::logout(storage).await?;
                    println!("Logged out.");
                    return Ok(());
                }
                println!("{}", machine.title(username));
            }
            _ = time::sleep_until(deadline) => {
                if machine.advance(Instant::now()) != LogoutState::Disarmed {
                    println!("{}", machine.title(username));
                }
            }
        }
    }
    println!("Logout cancelled.");
    Ok(())
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<ApiError>() {
        Some(err) => err.is_unauthorized(),
        None => matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::Api(api)) if api.is_unauthorized()
        ),
    }
}

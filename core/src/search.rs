//! User lookup by Discord id, debounced when fed from interactive input.

use api_types::UserProfile;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc::UnboundedSender,
    time::Duration,
};
use tracing::debug;

use crate::{api::ApiClient, error::ValidationError, services::timer::spawn_debouncer};

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Blank input; any previous result should be dropped.
    Cleared,
    Found(UserProfile),
    Failed(String),
}

/// Look up `input` as a Discord user id. Blank input never reaches the
/// backend and ids must be all digits.
pub async fn lookup(api: &ApiClient, input: &str) -> LookupOutcome {
    let id = input.trim();
    if id.is_empty() {
        return LookupOutcome::Cleared;
    }
    if !id.chars().all(|c| c.is_ascii_digit()) {
        return LookupOutcome::Failed(ValidationError::InvalidUserId.to_string());
    }
    match api.lookup_user(id).await {
        Ok(profile) => LookupOutcome::Found(profile),
        Err(err) if err.status() == Some(404) => {
            LookupOutcome::Failed(ValidationError::InvalidUserId.to_string())
        }
        Err(err) => LookupOutcome::Failed(err.to_string()),
    }
}

/// Read lines from `input`, look up the last one typed after `quiet` has
/// passed without another line, and send each outcome to `results`.
/// Returns once the input is exhausted and the final lookup is done.
pub async fn run_interactive<R>(
    api: &ApiClient,
    input: R,
    quiet: Duration,
    results: UnboundedSender<(String, LookupOutcome)>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let (debouncer, mut settled) = spawn_debouncer::<String>(quiet);
    // dropping the input side flushes the last pending line
    let mut debouncer = Some(debouncer);
    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line(), if debouncer.is_some() => match line? {
                Some(line) => {
                    if let Some(d) = &debouncer {
                        d.push(line);
                    }
                }
                None => debouncer = None,
            },
            query = settled.recv() => match query {
                Some(query) => {
                    debug!(query = %query, "lookup settled");
                    let outcome = lookup(api, &query).await;
                    if results.send((query, outcome)).is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    Ok(())
}

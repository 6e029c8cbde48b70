//! Login token handling and the startup handshake with the backend.

use anyhow::Context;
use api_types::{AppUser, ServerData};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
    api::ApiClient,
    error::ApiError,
    services::storage::{Storage, ACCESS_TOKEN_KEY, CURRENT_USER_KEY},
    tracking::TrackedUsers,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid redirect url: {0}")]
    BadRedirect(#[from] url::ParseError),
    #[error("Login failed: no token in redirect url.")]
    MissingToken,
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: AppUser,
    /// Servers with the global pseudo-server first.
    pub servers: Vec<ServerData>,
}

#[derive(Debug, Clone)]
pub enum SessionState {
    LoggedOut,
    LoggedIn(Session),
}

/// The stored bearer token, if any.
pub async fn stored_token(storage: &Storage) -> Option<String> {
    storage
        .get_str(ACCESS_TOKEN_KEY)
        .await
        .filter(|t| !t.is_empty())
}

/// The user seen by the last successful bootstrap.
pub async fn cached_user(storage: &Storage) -> Option<AppUser> {
    storage.get_as(CURRENT_USER_KEY).await
}

/// Persist the token carried by the backend's OAuth redirect.
pub async fn accept_redirect(storage: &Storage, redirect_url: &str) -> Result<String, SessionError> {
    let url = Url::parse(redirect_url)?;
    let token = url
        .query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .filter(|t| !t.is_empty())
        .ok_or(SessionError::MissingToken)?;
    storage
        .put(ACCESS_TOKEN_KEY, Value::String(token.clone()))
        .await
        .context("saving access token")?;
    info!("access token stored");
    Ok(token)
}

/// Resolve the stored token into a session. A rejected token wipes local
/// storage and reports a logged-out state instead of an error.
pub async fn bootstrap(api: &ApiClient, storage: &Storage) -> Result<SessionState, SessionError> {
    if !api.has_token() {
        return Ok(SessionState::LoggedOut);
    }
    match tokio::try_join!(api.me(), api.tracked_servers()) {
        Ok((user, backend_servers)) => {
            let mut servers = Vec::with_capacity(backend_servers.len() + 1);
            servers.push(ServerData::global(0));
            servers.extend(backend_servers.into_iter().filter(|s| !s.is_global()));
            TrackedUsers::load(storage).await.apply_counts(&mut servers);
            storage
                .put_as(CURRENT_USER_KEY, &user)
                .await
                .context("caching current user")?;
            info!(user = %user.username, servers = servers.len() - 1, "session restored");
            Ok(SessionState::LoggedIn(Session { user, servers }))
        }
        Err(err) if err.is_unauthorized() => {
            warn!("stored token rejected, clearing local session");
            logout(storage).await?;
            Ok(SessionState::LoggedOut)
        }
        Err(err) => Err(err.into()),
    }
}

/// Forget the token and every cached value.
pub async fn logout(storage: &Storage) -> Result<(), SessionError> {
    storage.clear().await.context("clearing local session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn redirect_token_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        let token = accept_redirect(&storage, "http://localhost:3000/auth/callback?token=abc%2B1")
            .await
            .unwrap();
        assert_eq!(token, "abc+1");
        assert_eq!(stored_token(&storage).await.as_deref(), Some("abc+1"));
    }

    #[tokio::test]
    async fn redirect_without_token_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        let err = accept_redirect(&storage, "http://localhost:3000/auth/callback?error=denied")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::MissingToken));
        assert!(stored_token(&storage).await.is_none());
    }

    #[tokio::test]
    async fn no_token_means_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        let api = ApiClient::new(Url::parse("http://127.0.0.1:9").unwrap());
        let state = bootstrap(&api, &storage).await.unwrap();
        assert!(matches!(state, SessionState::LoggedOut));
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(dir.path()).await.unwrap();
        storage
            .put(ACCESS_TOKEN_KEY, Value::String("t".into()))
            .await
            .unwrap();
        storage
            .put_as(
                CURRENT_USER_KEY,
                &AppUser {
                    user_id: "1".into(),
                    username: "cat".into(),
                    profile_pic_url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(cached_user(&storage).await.unwrap().username, "cat");
        logout(&storage).await.unwrap();
        assert!(stored_token(&storage).await.is_none());
        assert!(cached_user(&storage).await.is_none());
    }
}

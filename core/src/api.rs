//! Thin typed client over the social credit REST backend.

use api_types::{
    is_global_id, AppUser, ErrorBody, GeneratedApiKey, PluginApiKeyStatus,
    RatedUserProfileResponse, RatingRequest, ScoreHistory, ServerData, UserProfile,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ApiError, ApiResult};

/// Client for the backend. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: Client::new(),
            base,
            token: None,
        }
    }

    /// Attach the bearer token used for every authenticated call.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Where a browser should be sent to start the Discord login.
    pub fn login_url(&self) -> ApiResult<Url> {
        self.endpoint(&["auth", "discord", "login"])
    }

    #[instrument(skip(self))]
    pub async fn me(&self) -> ApiResult<AppUser> {
        let url = self.endpoint(&["users", "me"])?;
        decode(self.authed(self.http.get(url))?.send().await?).await
    }

    #[instrument(skip(self))]
    pub async fn tracked_servers(&self) -> ApiResult<Vec<ServerData>> {
        let url = self.endpoint(&["users", "me", "tracked-servers"])?;
        decode(self.authed(self.http.get(url))?.send().await?).await
    }

    /// Users the acting user has rated, optionally limited to one server.
    #[instrument(skip(self))]
    pub async fn rated_users(
        &self,
        acting_user_id: &str,
        server_id: Option<&str>,
    ) -> ApiResult<Vec<RatedUserProfileResponse>> {
        let mut url = self.endpoint(&["users", acting_user_id, "rated-users"])?;
        scope_to_server(&mut url, server_id);
        decode(self.authed(self.http.get(url))?.send().await?).await
    }

    /// Every rating `acting_user_id` has given `target_user_id`, oldest first.
    #[instrument(skip(self))]
    pub async fn score_history(
        &self,
        acting_user_id: &str,
        target_user_id: &str,
        server_id: Option<&str>,
    ) -> ApiResult<ScoreHistory> {
        let mut url =
            self.endpoint(&["users", acting_user_id, "credit", "given", target_user_id])?;
        scope_to_server(&mut url, server_id);
        decode(self.authed(self.http.get(url))?.send().await?).await
    }

    #[instrument(skip(self, request), fields(delta = request.score_delta))]
    pub async fn rate(
        &self,
        acting_user_id: &str,
        target_user_id: &str,
        request: &RatingRequest,
    ) -> ApiResult<ScoreHistory> {
        let url = self.endpoint(&["users", acting_user_id, "credit", target_user_id])?;
        let resp = self
            .authed(self.http.post(url))?
            .json(request)
            .send()
            .await?;
        decode(resp).await
    }

    /// Remove the most recent rating given to a user.
    #[instrument(skip(self))]
    pub async fn undo_latest(&self, acting_user_id: &str, target_user_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["users", acting_user_id, "credit", target_user_id, "latest"])?;
        check(self.authed(self.http.delete(url))?.send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn untrack(&self, acting_user_id: &str, target_user_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["users", acting_user_id, "tracking", target_user_id])?;
        check(self.authed(self.http.delete(url))?.send().await?).await?;
        Ok(())
    }

    /// Look up a Discord user by numeric id.
    #[instrument(skip(self))]
    pub async fn lookup_user(&self, user_id: &str) -> ApiResult<UserProfile> {
        let url = self.endpoint(&["discord", "users", user_id])?;
        decode(self.authed(self.http.get(url))?.send().await?).await
    }

    pub async fn plugin_key_status(&self) -> ApiResult<PluginApiKeyStatus> {
        let url = self.endpoint(&["users", "me", "plugin-api-key-status"])?;
        decode(self.authed(self.http.get(url))?.send().await?).await
    }

    /// Generate a new plugin key. Any previous key stops working.
    pub async fn generate_plugin_key(&self) -> ApiResult<GeneratedApiKey> {
        let url = self.endpoint(&["users", "me", "plugin-api-key"])?;
        let key: GeneratedApiKey = decode(self.authed(self.http.post(url))?.send().await?).await?;
        match key.api_key.as_deref() {
            Some(k) if !k.is_empty() => Ok(key),
            _ => {
                warn!("plugin key response carried no key");
                Err(ApiError::MissingApiKey)
            }
        }
    }

    pub async fn revoke_plugin_key(&self) -> ApiResult<()> {
        let url = self.endpoint(&["users", "me", "plugin-api-key"])?;
        check(self.authed(self.http.delete(url))?.send().await?).await?;
        Ok(())
    }

    fn authed(&self, req: RequestBuilder) -> ApiResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ApiError::NotLoggedIn)?;
        Ok(req.bearer_auth(token))
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn scope_to_server(url: &mut Url, server_id: Option<&str>) {
    if let Some(id) = server_id.filter(|id| !is_global_id(id)) {
        url.query_pairs_mut().append_pair("server_id", id);
    }
}

async fn check(resp: Response) -> ApiResult<Response> {
    let status = resp.status();
    debug!(%status, url = %resp.url(), "backend responded");
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.detail)
            .unwrap_or_else(|_| format!("Error: {}", status.as_u16()));
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}

async fn decode<T: DeserializeOwned>(resp: Response) -> ApiResult<T> {
    Ok(check(resp).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(Url::parse(base).unwrap())
    }

    #[test]
    fn endpoints_encode_ids() {
        let api = client("http://localhost:8000");
        let url = api.endpoint(&["discord", "users", "12/34"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/discord/users/12%2F34");
    }

    #[test]
    fn endpoints_keep_base_path() {
        let api = client("https://example.com/api/");
        assert_eq!(
            api.login_url().unwrap().as_str(),
            "https://example.com/api/auth/discord/login"
        );
    }

    #[test]
    fn global_scope_adds_no_query() {
        let mut url = Url::parse("http://h/users/1/rated-users").unwrap();
        scope_to_server(&mut url, Some(api_types::GLOBAL_SERVER_ID));
        assert_eq!(url.query(), None);
        scope_to_server(&mut url, Some("s1"));
        assert_eq!(url.query(), Some("server_id=s1"));
    }

    #[tokio::test]
    async fn calls_without_token_fail_locally() {
        let api = client("http://127.0.0.1:9");
        let err = api.me().await.unwrap_err();
        assert!(matches!(err, ApiError::NotLoggedIn));
        assert!(err.is_unauthorized());
    }
}

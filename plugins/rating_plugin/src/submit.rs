use api_types::PluginRating;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::{notify::Notice, settings::Settings};

pub const API_KEY_HEADER: &str = "X-Plugin-API-Key";
pub const ACTING_USER_HEADER: &str = "X-Acting-User-ID";

/// Read a whole-number score delta the lenient way: leading whitespace and
/// one sign are allowed, parsing stops at the first non-digit, and anything
/// without leading digits is zero. Values past the `i64` range saturate.
pub fn parse_delta(input: &str) -> i64 {
    let s = input.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }
    // only overflow can fail here, so clamp to the nearest bound
    if negative {
        format!("-{digits}").parse().unwrap_or(i64::MIN)
    } else {
        digits.parse().unwrap_or(i64::MAX)
    }
}

/// Post a rating to the configured endpoint and describe the result.
#[instrument(skip(http, settings), fields(target = %rating.target_user_id, delta = rating.score_delta))]
pub async fn submit(http: &Client, settings: &Settings, rating: &PluginRating) -> Notice {
    if !settings.has_key() {
        return Notice::error("API Key not set. Please configure it in the plugin settings.");
    }
    let sent = http
        .post(&settings.endpoint)
        .header(API_KEY_HEADER, settings.api_key.trim())
        .header(ACTING_USER_HEADER, &rating.acting_user_id)
        .json(rating)
        .send()
        .await;
    let resp = match sent {
        Ok(resp) => resp,
        Err(err) => {
            warn!("submission failed: {err}");
            return Notice::error("Failed to send score. Network error or server down.");
        }
    };
    let status = resp.status();
    debug!(%status, "endpoint responded");
    if status == StatusCode::CREATED {
        Notice::success("Social credit score submitted successfully!")
    } else if status.is_success() {
        Notice::info(format!(
            "Score submission acknowledged (Status: {})!",
            status.as_u16()
        ))
    } else {
        let body = resp.text().await.unwrap_or_default();
        let detail = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Unknown server error")
                .to_string()
        } else {
            body
        };
        Notice::error(format!("API Error: {} - {detail}", status.as_u16()))
    }
}

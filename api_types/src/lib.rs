use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Id of the synthetic server that aggregates every tracked user.
pub const GLOBAL_SERVER_ID: &str = "global";

/// Server id reported for ratings made from a direct message.
pub const DIRECT_MESSAGE_SERVER_ID: &str = "@me";

/// Avatar shown when a Discord user has none.
pub const DEFAULT_AVATAR_URL: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

/// The logged-in user as reported by `/users/me`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AppUser {
    pub user_id: String,
    pub username: String,
    #[serde(default, alias = "profilePicUrl", alias = "profile_picture_url")]
    pub profile_pic_url: Option<String>,
}

/// A Discord guild the user belongs to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, alias = "trackedUserCount")]
    pub tracked_user_count: u32,
}

impl ServerData {
    /// Build the global pseudo-server.
    pub fn global(tracked_user_count: u32) -> Self {
        Self {
            id: GLOBAL_SERVER_ID.into(),
            name: "Global".into(),
            icon: None,
            tracked_user_count,
        }
    }

    pub fn is_global(&self) -> bool {
        is_global_id(&self.id)
    }
}

/// True when `id` names the global pseudo-server.
pub fn is_global_id(id: &str) -> bool {
    id == GLOBAL_SERVER_ID
}

/// A Discord user that has been looked up or rated.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_flags: Option<u64>,
    #[serde(default, alias = "associatedServerIds")]
    pub associated_server_ids: Vec<String>,
}

impl UserProfile {
    /// `username#discriminator`, or just the username for migrated accounts.
    pub fn display_tag(&self) -> String {
        if self.discriminator.is_empty() || self.discriminator == "0" {
            self.username.clone()
        } else {
            format!("{}#{}", self.username, self.discriminator)
        }
    }

    pub fn avatar_or_default(&self) -> &str {
        self.avatar_url.as_deref().unwrap_or(DEFAULT_AVATAR_URL)
    }
}

/// One historical rating event.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoreEntry {
    #[serde(with = "timestamp")]
    pub timestamp: OffsetDateTime,
    pub score_value: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Ratings the acting user has given one target, oldest first.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ScoreHistory {
    pub target_user_id: String,
    #[serde(default)]
    pub scores_history: Vec<ScoreEntry>,
}

impl ScoreHistory {
    /// Score after the most recent rating, zero when never rated.
    pub fn current_score(&self) -> f64 {
        self.scores_history
            .last()
            .map(|e| e.score_value)
            .unwrap_or(0.0)
    }
}

/// Current aggregate view of a tracked user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RatedUserProfileResponse {
    pub profile: UserProfile,
    pub current_score: f64,
}

/// Body of a rating submitted from the client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RatingRequest {
    pub score_delta: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
}

/// Body of a rating submitted by the companion plugin.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PluginRating {
    pub acting_user_id: String,
    pub target_user_id: String,
    pub server_id: String,
    pub message_id: String,
    pub score_delta: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PluginApiKeyStatus {
    pub has_api_key: bool,
    #[serde(default, with = "timestamp::option")]
    pub generated_at: Option<OffsetDateTime>,
}

/// A freshly generated plugin key. The backend only ever shows it once.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GeneratedApiKey {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub generated_at: Option<OffsetDateTime>,
}

/// Error payload returned by the backend.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

/// RFC 3339 timestamps. Naive ISO 8601 values (no offset) are read as UTC.
pub mod timestamp {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use time::{
        format_description::well_known::{Iso8601, Rfc3339},
        OffsetDateTime, PrimitiveDateTime,
    };

    pub fn parse(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
        OffsetDateTime::parse(s, &Rfc3339).or_else(|err| {
            PrimitiveDateTime::parse(s, &Iso8601::DEFAULT)
                .map(PrimitiveDateTime::assume_utc)
                .map_err(|_| err)
        })
    }

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, s: S) -> Result<S::Ok, S::Error> {
        let text = value
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(d)?;
        parse(&text).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<OffsetDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<OffsetDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(text) => parse(&text).map(Some).map_err(D::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn profile_accepts_camel_case_associations() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "42",
            "username": "theebis",
            "discriminator": "0001",
            "avatar": null,
            "avatar_url": null,
            "associatedServerIds": ["s1", "s2"]
        }))
        .unwrap();
        assert_eq!(profile.associated_server_ids, vec!["s1", "s2"]);
        assert_eq!(profile.display_tag(), "theebis#0001");
        assert_eq!(profile.avatar_or_default(), DEFAULT_AVATAR_URL);
    }

    #[test]
    fn migrated_usernames_have_no_discriminator() {
        let profile: UserProfile =
            serde_json::from_value(json!({"id": "1", "username": "vough", "discriminator": "0"}))
                .unwrap();
        assert_eq!(profile.display_tag(), "vough");
        assert!(profile.associated_server_ids.is_empty());
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let entry: ScoreEntry = serde_json::from_value(json!({
            "timestamp": "2024-05-01T12:30:00.250000",
            "score_value": 15.0,
            "reason": "Helped with a quest"
        }))
        .unwrap();
        assert_eq!(entry.timestamp, datetime!(2024-05-01 12:30:00.25 UTC));
        assert!(entry.server_id.is_none());
    }

    #[test]
    fn offset_timestamps_keep_their_instant() {
        let ts = timestamp::parse("2024-05-01T14:30:00+02:00").unwrap();
        assert_eq!(ts, datetime!(2024-05-01 12:30:00 UTC));
    }

    #[test]
    fn history_current_score_is_last_entry() {
        let history = ScoreHistory {
            target_user_id: "u2".into(),
            scores_history: vec![
                ScoreEntry {
                    timestamp: datetime!(2024-01-01 0:00 UTC),
                    score_value: 10.0,
                    reason: None,
                    server_id: None,
                    message_id: None,
                },
                ScoreEntry {
                    timestamp: datetime!(2024-01-02 0:00 UTC),
                    score_value: 15.0,
                    reason: None,
                    server_id: None,
                    message_id: None,
                },
            ],
        };
        assert_eq!(history.current_score(), 15.0);
        let empty = ScoreHistory {
            target_user_id: "u3".into(),
            scores_history: vec![],
        };
        assert_eq!(empty.current_score(), 0.0);
    }

    #[test]
    fn key_status_without_key() {
        let status: PluginApiKeyStatus =
            serde_json::from_value(json!({"has_api_key": false})).unwrap();
        assert!(!status.has_api_key);
        assert!(status.generated_at.is_none());
    }

    #[test]
    fn global_server_sentinel() {
        let global = ServerData::global(3);
        assert!(global.is_global());
        let guild: ServerData =
            serde_json::from_value(json!({"id": "s1", "name": "Gaming Crew", "trackedUserCount": 2}))
                .unwrap();
        assert!(!guild.is_global());
        assert_eq!(guild.tracked_user_count, 2);
    }
}

/// Discord integration
///
/// Two unrelated flows share this module: the OAuth identity check that
/// gates the admin dashboard, and the unauthenticated presence-relay poll
/// that feeds the public activity widget.
use crate::{
    config::DiscordConfig,
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Discord profile fields the dashboard cares about
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

// ----------------------------------------------------------------------
// Presence relay wire shapes
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RelayResponse {
    success: bool,
    data: Option<RelayPresence>,
}

#[derive(Debug, Deserialize)]
struct RelayPresence {
    discord_status: String,
    #[serde(default)]
    activities: Vec<RelayActivity>,
    #[serde(default)]
    kv: Value,
}

/// One activity as the relay reports it
#[derive(Debug, Clone, Deserialize)]
pub struct RelayActivity {
    pub name: String,
    pub details: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "type")]
    pub kind: i64,
    pub timestamps: Option<ActivityTimestamps>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

/// Presence category the public site filters on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Coding,
    Gaming,
    Communication,
    Unknown,
}

/// Activity after classification and detail annotation
#[derive(Debug, Clone, Serialize)]
pub struct EnhancedActivity {
    pub name: String,
    pub details: String,
    #[serde(rename = "originalDetails", skip_serializing_if = "Option::is_none")]
    pub original_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "type")]
    pub kind: i64,
    pub category: ActivityCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,
}

/// What the public activity endpoint serves
#[derive(Debug, Clone, Serialize)]
pub struct PresenceSnapshot {
    pub status: String,
    pub activity: Option<EnhancedActivity>,
    #[serde(rename = "customStatus")]
    pub custom_status: Value,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
    /// Present only on synthetic snapshots served when the relay is down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Activity type the relay uses for music listening; handled by the
/// Spotify integration instead of this one.
const LISTENING_TYPE: i64 = 2;

const CODING_APPS: &[&str] = &[
    "Visual Studio Code",
    "VS Code",
    "IntelliJ",
    "WebStorm",
    "Atom",
    "Sublime Text",
    "Vim",
    "Emacs",
    "Code",
];

const GAMING_APPS: &[&str] = &[
    "VALORANT",
    "League of Legends",
    "CS2",
    "Counter-Strike",
    "Dota 2",
    "Overwatch",
    "Apex Legends",
    "Fortnite",
    "Rocket League",
    "Minecraft",
    "Among Us",
];

/// Discord API client
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("portfolio-hub/0.1")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Exchange an authorization code for an access token and the profile
    /// behind it.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> ApiResult<(String, DiscordUser)> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(ApiError::Config(
                "Discord OAuth not configured".to_string(),
            ));
        }

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.config.api_url))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Discord token endpoint: {}", e)))?;

        if !response.status().is_success() {
            warn!("Discord code exchange rejected: {}", response.status());
            return Err(ApiError::Validation(
                "Failed to exchange authorization code".to_string(),
            ));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid Discord token response: {}", e)))?;

        let user = self.fetch_user(&token.access_token).await?;

        Ok((token.access_token, user))
    }

    /// Resolve the profile behind a bearer token. A provider rejection is
    /// an invalid-credential condition (401), not an upstream failure.
    pub async fn fetch_user(&self, access_token: &str) -> ApiResult<DiscordUser> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.config.api_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Discord identity endpoint: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Auth("Invalid Discord token".to_string()));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid Discord identity response: {}", e)))
    }

    /// Authenticate a token AND authorize its identity.
    ///
    /// An invalid token is a 401; a valid token belonging to anyone but
    /// the configured admin is a 403. The distinction is load-bearing for
    /// the HTTP layer.
    pub async fn verify_admin(&self, access_token: &str) -> ApiResult<DiscordUser> {
        let user = self.fetch_user(access_token).await?;

        if user.id != self.config.authorized_user_id {
            return Err(ApiError::Forbidden("Access denied".to_string()));
        }

        Ok(user)
    }

    /// Poll the public presence relay for the configured user.
    ///
    /// Callers are expected to map failures to [`fallback_snapshot`]; the
    /// public site never sees a 5xx because a third-party relay is down.
    pub async fn presence(&self) -> ApiResult<PresenceSnapshot> {
        let response = self
            .http
            .get(format!(
                "{}/v1/users/{}",
                self.config.relay_url, self.config.presence_user_id
            ))
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Presence relay: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "Presence relay returned {}",
                response.status()
            )));
        }

        let relay: RelayResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid presence relay response: {}", e)))?;

        let presence = match relay.data {
            Some(data) if relay.success => data,
            _ => {
                return Err(ApiError::Upstream(
                    "Presence relay has no data for this user".to_string(),
                ))
            }
        };

        let activity = pick_relevant(&presence.activities).map(enhance);

        Ok(PresenceSnapshot {
            status: presence.discord_status,
            activity,
            custom_status: presence.kv,
            last_seen: Utc::now(),
            source: None,
        })
    }
}

/// First activity that is not the built-in Spotify pseudo-activity and not
/// a listening-type entry.
pub fn pick_relevant(activities: &[RelayActivity]) -> Option<&RelayActivity> {
    activities
        .iter()
        .find(|act| act.name != "Spotify" && act.kind != LISTENING_TYPE)
}

/// Classify an activity and decorate its detail line.
pub fn enhance(activity: &RelayActivity) -> EnhancedActivity {
    let mut category = ActivityCategory::Unknown;
    let mut details = activity.details.clone().unwrap_or_default();

    if CODING_APPS.iter().any(|app| activity.name.contains(app)) {
        category = ActivityCategory::Coding;

        if let Some(original) = &activity.details {
            if let Some(file_name) = find_filename(original) {
                details = format!("{} Editing {}", file_indicator(&file_name), file_name);
            } else if original.contains("Editing") {
                details = format!("💻 {}", original);
            }
        }
    } else if activity.kind == 0 {
        if GAMING_APPS.iter().any(|game| activity.name.contains(game)) {
            category = ActivityCategory::Gaming;

            let base = activity.details.clone();
            details = if activity.name.contains("VALORANT") {
                format!("🎯 {}", base.unwrap_or_else(|| "Playing VALORANT".into()))
            } else if activity.name.contains("League") {
                format!(
                    "⚔️ {}",
                    base.unwrap_or_else(|| "Playing League of Legends".into())
                )
            } else {
                format!("🎮 {}", base.unwrap_or_else(|| activity.name.clone()))
            };
        }
    } else if activity.name.contains("Discord") {
        category = ActivityCategory::Communication;

        let mentions_voice = |text: &Option<String>| {
            text.as_deref()
                .map(|t| t.to_lowercase().contains("voice"))
                .unwrap_or(false)
        };
        if mentions_voice(&activity.details) || mentions_voice(&activity.state) {
            details = format!(
                "🎤 In voice: {}",
                activity.state.clone().unwrap_or_else(|| "General".into())
            );
        }
    }

    EnhancedActivity {
        name: activity.name.clone(),
        details,
        original_details: activity.details.clone(),
        state: activity.state.clone(),
        kind: activity.kind,
        category,
        timestamps: activity.timestamps.clone(),
    }
}

/// First whitespace-delimited token that looks like `name.ext`
fn find_filename(text: &str) -> Option<String> {
    for token in text.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '_');
        if let Some((stem, ext)) = token.rsplit_once('.') {
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphabetic()) {
                return Some(token.to_string());
            }
        }
    }
    None
}

/// File-type indicator for the annotated detail line
fn file_indicator(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "ts" | "tsx" => "🔷",
        "js" | "jsx" => "🟡",
        "py" => "🐍",
        "css" | "scss" => "🎨",
        "html" => "🌐",
        "json" => "📋",
        "md" => "📝",
        "env" => "⚙️",
        "yml" | "yaml" => "📄",
        "sql" => "🗃️",
        "php" => "🐘",
        "java" => "☕",
        "cpp" | "c" => "⚡",
        "rs" => "🦀",
        "go" => "🐹",
        _ => "📄",
    }
}

/// Synthetic snapshot served while the relay is unreachable, always
/// labeled so the client can tell it apart from live data.
pub fn fallback_snapshot() -> PresenceSnapshot {
    let now_ms = Utc::now().timestamp_millis();
    let mock_activities = [
        EnhancedActivity {
            name: "Visual Studio Code".to_string(),
            details: "🦀 Editing main.rs".to_string(),
            original_details: Some("Editing main.rs".to_string()),
            state: Some("Working on the backend".to_string()),
            kind: 0,
            category: ActivityCategory::Coding,
            timestamps: Some(ActivityTimestamps {
                start: Some(now_ms - 3_600_000),
                end: None,
            }),
        },
        EnhancedActivity {
            name: "Visual Studio Code".to_string(),
            details: "🔷 Editing StatusWidget.tsx".to_string(),
            original_details: Some("Editing StatusWidget.tsx".to_string()),
            state: Some("Working on portfolio components".to_string()),
            kind: 0,
            category: ActivityCategory::Coding,
            timestamps: Some(ActivityTimestamps {
                start: Some(now_ms - 2_400_000),
                end: None,
            }),
        },
        EnhancedActivity {
            name: "VALORANT".to_string(),
            details: "🎯 Competitive Match".to_string(),
            original_details: Some("Competitive Match".to_string()),
            state: Some("Haven • 12-10".to_string()),
            kind: 0,
            category: ActivityCategory::Gaming,
            timestamps: Some(ActivityTimestamps {
                start: Some(now_ms - 1_800_000),
                end: None,
            }),
        },
        EnhancedActivity {
            name: "Discord".to_string(),
            details: "🎤 In voice: General".to_string(),
            original_details: Some("In a voice channel".to_string()),
            state: Some("General".to_string()),
            kind: 0,
            category: ActivityCategory::Communication,
            timestamps: Some(ActivityTimestamps {
                start: Some(now_ms - 600_000),
                end: None,
            }),
        },
    ];

    let mut rng = rand::thread_rng();
    let activity = if rng.gen_bool(0.7) {
        mock_activities.choose(&mut rng).cloned()
    } else {
        None
    };

    PresenceSnapshot {
        status: "online".to_string(),
        activity,
        custom_status: Value::Object(Default::default()),
        last_seen: Utc::now(),
        source: Some("fallback".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(name: &str, kind: i64, details: Option<&str>, state: Option<&str>) -> RelayActivity {
        RelayActivity {
            name: name.to_string(),
            details: details.map(String::from),
            state: state.map(String::from),
            kind,
            timestamps: None,
        }
    }

    #[test]
    fn test_pick_relevant_skips_spotify_and_listening() {
        let activities = vec![
            activity("Spotify", 2, None, None),
            activity("Some Radio", 2, None, None),
            activity("VALORANT", 0, Some("Competitive Match"), None),
        ];

        let picked = pick_relevant(&activities).expect("one relevant activity");
        assert_eq!(picked.name, "VALORANT");
    }

    #[test]
    fn test_pick_relevant_empty_when_only_music() {
        let activities = vec![activity("Spotify", 2, None, None)];
        assert!(pick_relevant(&activities).is_none());
    }

    #[test]
    fn test_enhance_classifies_editors_as_coding() {
        let enhanced = enhance(&activity(
            "Visual Studio Code",
            0,
            Some("Editing server.rs"),
            Some("Workspace: portfolio"),
        ));

        assert_eq!(enhanced.category, ActivityCategory::Coding);
        assert_eq!(enhanced.details, "🦀 Editing server.rs");
        assert_eq!(enhanced.original_details.as_deref(), Some("Editing server.rs"));
    }

    #[test]
    fn test_enhance_coding_without_filename_keeps_editing_line() {
        let enhanced = enhance(&activity(
            "IntelliJ",
            0,
            Some("Editing a workspace"),
            None,
        ));

        assert_eq!(enhanced.category, ActivityCategory::Coding);
        assert_eq!(enhanced.details, "💻 Editing a workspace");
    }

    #[test]
    fn test_enhance_classifies_known_games() {
        let enhanced = enhance(&activity("VALORANT", 0, Some("Competitive Match"), None));
        assert_eq!(enhanced.category, ActivityCategory::Gaming);
        assert_eq!(enhanced.details, "🎯 Competitive Match");

        let enhanced = enhance(&activity("Minecraft", 0, None, None));
        assert_eq!(enhanced.category, ActivityCategory::Gaming);
        assert_eq!(enhanced.details, "🎮 Minecraft");
    }

    #[test]
    fn test_enhance_unknown_game_title_stays_unknown() {
        let enhanced = enhance(&activity("Obscure Indie Game", 0, Some("Level 3"), None));
        assert_eq!(enhanced.category, ActivityCategory::Unknown);
        assert_eq!(enhanced.details, "Level 3");
    }

    #[test]
    fn test_enhance_voice_channel_is_communication() {
        let enhanced = enhance(&activity(
            "Discord",
            4,
            Some("In a voice channel"),
            Some("General"),
        ));

        assert_eq!(enhanced.category, ActivityCategory::Communication);
        assert_eq!(enhanced.details, "🎤 In voice: General");
    }

    #[test]
    fn test_find_filename() {
        assert_eq!(
            find_filename("Editing main.rs in portfolio-hub"),
            Some("main.rs".to_string())
        );
        assert_eq!(
            find_filename("Editing StatusWidget.tsx,"),
            Some("StatusWidget.tsx".to_string())
        );
        assert_eq!(find_filename("Idling"), None);
        // Version numbers are not filenames
        assert_eq!(find_filename("Running v1.2"), None);
    }

    #[test]
    fn test_file_indicator_known_and_unknown_extensions() {
        assert_eq!(file_indicator("main.rs"), "🦀");
        assert_eq!(file_indicator("app.tsx"), "🔷");
        assert_eq!(file_indicator("notes.weird"), "📄");
    }

    #[test]
    fn test_fallback_snapshot_is_labeled() {
        let snapshot = fallback_snapshot();
        assert_eq!(snapshot.source.as_deref(), Some("fallback"));
        assert_eq!(snapshot.status, "online");
    }
}

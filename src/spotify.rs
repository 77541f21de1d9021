/// Spotify integration
///
/// Owns the OAuth token lifecycle for the single connected account:
/// authorization-code exchange, server-side refresh against the stored
/// refresh token, and the normalized "now playing" fetch the public site
/// polls.
use crate::{
    config::SpotifyConfig,
    error::{ApiError, ApiResult},
    store::{
        models::{AuthToken, TokenUpsert},
        Store,
    },
};
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SERVICE: &str = "spotify";

/// Token material returned by the accounts token endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenExchange {
    pub access_token: String,
    /// Absent on refresh when the provider does not rotate refresh tokens
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

/// Normalized track shape served to the browser
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurrentTrack {
    pub name: String,
    pub artists: Vec<NamedLink>,
    pub album: NamedLink,
    pub images: TrackImages,
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
    /// Playback position in milliseconds at capture time
    pub progress: i64,
    pub duration: i64,
    pub external_url: String,
    pub preview_url: Option<String>,
    pub explicit: bool,
    pub popularity: i64,
    /// Epoch milliseconds; the client extrapolates progress from this
    /// between polls.
    #[serde(rename = "fetchedAt")]
    pub fetched_at: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NamedLink {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackImages {
    pub large: Option<String>,
    pub medium: Option<String>,
    pub small: Option<String>,
}

/// Result of one "now playing" poll
#[derive(Debug, Clone)]
pub enum NowPlaying {
    Playing(Box<CurrentTrack>),
    /// Nothing playing (provider 204 or a paused/empty player)
    NotPlaying,
}

/// Outcome of a single player fetch before refresh handling
enum FetchOutcome {
    Ok(NowPlaying),
    Unauthorized,
}

// ----------------------------------------------------------------------
// Provider wire shapes
// ----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    is_playing: bool,
    progress_ms: Option<i64>,
    item: Option<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
    duration_ms: i64,
    explicit: bool,
    #[serde(default)]
    popularity: i64,
    preview_url: Option<String>,
    external_urls: ExternalUrls,
    artists: Vec<ArtistItem>,
    album: AlbumItem,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    name: String,
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct AlbumItem {
    name: String,
    external_urls: ExternalUrls,
    images: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    url: String,
    height: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: String,
}

/// Spotify API client
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    config: SpotifyConfig,
    store: Store,
}

impl SpotifyClient {
    pub fn new(config: SpotifyConfig, store: Store) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("portfolio-hub/0.1")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            store,
        })
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    fn ensure_configured(&self) -> ApiResult<()> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(ApiError::Config(
                "Spotify client credentials not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Provider rejection of the code maps to a 400 for the dashboard to
    /// surface, not a 401.
    pub async fn exchange_code(&self, code: &str) -> ApiResult<TokenExchange> {
        self.ensure_configured()?;

        let response = self
            .http
            .post(format!("{}/api/token", self.config.accounts_url))
            .header("authorization", self.basic_auth())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Spotify token endpoint: {}", e)))?;

        if !response.status().is_success() {
            warn!("Spotify code exchange rejected: {}", response.status());
            return Err(ApiError::Validation(
                "Failed to exchange authorization code".to_string(),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid Spotify token response: {}", e)))
    }

    /// Refresh the access token and persist the result, keeping the same
    /// refresh token when the provider does not rotate it.
    ///
    /// Any failure here means the stored grant is unusable (revoked or
    /// malformed), which callers must surface as an auth condition.
    async fn refresh_and_store(&self, stored: &AuthToken) -> ApiResult<String> {
        self.ensure_configured()?;

        let refresh_token = stored.refresh_token.as_deref().ok_or_else(|| {
            ApiError::Auth(
                "No refresh token available. Connect Spotify in the dashboard.".to_string(),
            )
        })?;

        debug!("Refreshing Spotify access token");

        let response = self
            .http
            .post(format!("{}/api/token", self.config.accounts_url))
            .header("authorization", self.basic_auth())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Spotify token endpoint: {}", e)))?;

        if !response.status().is_success() {
            warn!("Spotify token refresh rejected: {}", response.status());
            return Err(ApiError::Auth("Failed to refresh Spotify token".to_string()));
        }

        let exchanged: TokenExchange = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid Spotify token response: {}", e)))?;

        let saved = self
            .store
            .save_token(
                SERVICE,
                TokenUpsert {
                    access_token: exchanged.access_token,
                    refresh_token: exchanged.refresh_token,
                    expires_in: exchanged.expires_in,
                },
            )
            .await?;

        Ok(saved.access_token)
    }

    /// Fetch the currently playing track.
    ///
    /// A caller-supplied bearer token is used as-is. Otherwise the stored
    /// token is loaded; an expired or provider-rejected token gets exactly
    /// one refresh before one retry. A failing refresh surfaces as 401 and
    /// never loops.
    pub async fn current_track(&self, bearer: Option<&str>) -> ApiResult<NowPlaying> {
        if let Some(token) = bearer {
            return match self.fetch_player(token).await? {
                FetchOutcome::Ok(now_playing) => Ok(now_playing),
                FetchOutcome::Unauthorized => {
                    Err(ApiError::Auth("Token expired or invalid".to_string()))
                }
            };
        }

        let stored = match self.store.get_token(SERVICE).await {
            Ok(token) => token,
            Err(ApiError::NotFound(_)) => {
                return Err(ApiError::Auth(
                    "No valid access token available. Connect Spotify in the dashboard."
                        .to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        let mut refreshed = false;
        let mut access_token = stored.access_token.clone();
        if stored.is_expired(Utc::now()) {
            access_token = self.refresh_and_store(&stored).await?;
            refreshed = true;
        }

        match self.fetch_player(&access_token).await? {
            FetchOutcome::Ok(now_playing) => Ok(now_playing),
            FetchOutcome::Unauthorized if !refreshed => {
                let access_token = self.refresh_and_store(&stored).await?;
                match self.fetch_player(&access_token).await? {
                    FetchOutcome::Ok(now_playing) => Ok(now_playing),
                    FetchOutcome::Unauthorized => {
                        Err(ApiError::Auth("Token expired or invalid".to_string()))
                    }
                }
            }
            FetchOutcome::Unauthorized => {
                Err(ApiError::Auth("Token expired or invalid".to_string()))
            }
        }
    }

    async fn fetch_player(&self, access_token: &str) -> ApiResult<FetchOutcome> {
        let response = self
            .http
            .get(format!(
                "{}/v1/me/player/currently-playing",
                self.config.api_url
            ))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("Spotify player endpoint: {}", e)))?;

        match response.status().as_u16() {
            204 => return Ok(FetchOutcome::Ok(NowPlaying::NotPlaying)),
            401 => return Ok(FetchOutcome::Unauthorized),
            status if !(200..300).contains(&status) => {
                return Err(ApiError::Upstream(format!(
                    "Spotify player endpoint returned {}",
                    status
                )))
            }
            _ => {}
        }

        let payload: PlayerResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid Spotify player response: {}", e)))?;

        Ok(FetchOutcome::Ok(normalize(
            payload,
            Utc::now().timestamp_millis(),
        )))
    }

    /// Forget the stored grant. Idempotent.
    pub async fn disconnect(&self) -> ApiResult<()> {
        self.store.delete_token(SERVICE).await
    }

    /// Whether a usable grant is on file (the dashboard's "connected" light)
    pub async fn is_connected(&self) -> ApiResult<bool> {
        match self.store.get_token(SERVICE).await {
            Ok(token) => Ok(token.refresh_token.is_some()),
            Err(ApiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Map the provider payload to the fixed response shape.
///
/// Image sizes are matched by height (640/300/64) with positional
/// fallback, mirroring how the provider orders album art.
fn normalize(payload: PlayerResponse, fetched_at: i64) -> NowPlaying {
    let item = match payload.item {
        Some(item) if payload.is_playing => item,
        _ => return NowPlaying::NotPlaying,
    };

    let image_url = |height: i64, index: usize| {
        item.album
            .images
            .iter()
            .find(|img| img.height == Some(height))
            .or_else(|| item.album.images.get(index))
            .map(|img| img.url.clone())
    };

    NowPlaying::Playing(Box::new(CurrentTrack {
        name: item.name,
        artists: item
            .artists
            .into_iter()
            .map(|artist| NamedLink {
                name: artist.name,
                url: artist.external_urls.spotify,
            })
            .collect(),
        album: NamedLink {
            name: item.album.name,
            url: item.album.external_urls.spotify,
        },
        images: TrackImages {
            large: image_url(640, 0),
            medium: image_url(300, 1),
            small: image_url(64, 2),
        },
        is_playing: payload.is_playing,
        progress: payload.progress_ms.unwrap_or(0),
        duration: item.duration_ms,
        external_url: item.external_urls.spotify,
        preview_url: item.preview_url,
        explicit: item.explicit,
        popularity: item.popularity,
        fetched_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player_payload() -> serde_json::Value {
        json!({
            "is_playing": true,
            "progress_ms": 61_000,
            "item": {
                "name": "Song One",
                "duration_ms": 240_000,
                "explicit": false,
                "popularity": 73,
                "preview_url": "https://p.scdn.co/mp3-preview/xyz",
                "external_urls": { "spotify": "https://open.spotify.com/track/1" },
                "artists": [
                    {
                        "name": "Artist A",
                        "external_urls": { "spotify": "https://open.spotify.com/artist/a" }
                    }
                ],
                "album": {
                    "name": "Album X",
                    "external_urls": { "spotify": "https://open.spotify.com/album/x" },
                    "images": [
                        { "url": "https://i.scdn.co/large", "height": 640 },
                        { "url": "https://i.scdn.co/medium", "height": 300 },
                        { "url": "https://i.scdn.co/small", "height": 64 }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_normalize_playing_track() {
        let payload: PlayerResponse = serde_json::from_value(player_payload()).unwrap();

        let track = match normalize(payload, 1_700_000_000_000) {
            NowPlaying::Playing(track) => track,
            NowPlaying::NotPlaying => panic!("expected a playing track"),
        };

        assert_eq!(track.name, "Song One");
        assert_eq!(track.artists.len(), 1);
        assert_eq!(track.artists[0].name, "Artist A");
        assert_eq!(track.album.name, "Album X");
        assert_eq!(track.images.large.as_deref(), Some("https://i.scdn.co/large"));
        assert_eq!(track.images.medium.as_deref(), Some("https://i.scdn.co/medium"));
        assert_eq!(track.images.small.as_deref(), Some("https://i.scdn.co/small"));
        assert!(track.is_playing);
        assert_eq!(track.progress, 61_000);
        assert_eq!(track.duration, 240_000);
        assert_eq!(track.popularity, 73);
        assert_eq!(track.fetched_at, 1_700_000_000_000);
    }

    #[test]
    fn test_normalize_falls_back_to_positional_images() {
        let mut payload = player_payload();
        // Heights the size matcher does not know
        payload["item"]["album"]["images"] = json!([
            { "url": "https://i.scdn.co/first", "height": 512 },
            { "url": "https://i.scdn.co/second", "height": 256 }
        ]);

        let payload: PlayerResponse = serde_json::from_value(payload).unwrap();
        let track = match normalize(payload, 0) {
            NowPlaying::Playing(track) => track,
            NowPlaying::NotPlaying => panic!("expected a playing track"),
        };

        assert_eq!(track.images.large.as_deref(), Some("https://i.scdn.co/first"));
        assert_eq!(track.images.medium.as_deref(), Some("https://i.scdn.co/second"));
        assert_eq!(track.images.small, None);
    }

    #[test]
    fn test_normalize_paused_player_is_not_playing() {
        let mut payload = player_payload();
        payload["is_playing"] = json!(false);

        let payload: PlayerResponse = serde_json::from_value(payload).unwrap();
        assert!(matches!(normalize(payload, 0), NowPlaying::NotPlaying));
    }

    #[test]
    fn test_normalize_empty_player_is_not_playing() {
        let payload: PlayerResponse =
            serde_json::from_value(json!({ "is_playing": true, "item": null })).unwrap();
        assert!(matches!(normalize(payload, 0), NowPlaying::NotPlaying));
    }

    #[test]
    fn test_current_track_serializes_with_client_field_names() {
        let payload: PlayerResponse = serde_json::from_value(player_payload()).unwrap();
        let track = match normalize(payload, 42) {
            NowPlaying::Playing(track) => track,
            NowPlaying::NotPlaying => panic!("expected a playing track"),
        };

        let value = serde_json::to_value(&*track).unwrap();
        assert_eq!(value["isPlaying"], json!(true));
        assert_eq!(value["fetchedAt"], json!(42));
        assert_eq!(value["external_url"], json!("https://open.spotify.com/track/1"));
    }
}

/// GitHub aggregation
///
/// Token-less, read-only fetches of one user's public profile, repository
/// list, and event feed, reduced to the few numbers the dashboard and the
/// public projects grid display.
use crate::{
    config::GithubConfig,
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Public profile fields used by the stats card
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub followers: i64,
}

/// Repository fields surfaced on the public site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub homepage: Option<String>,
    pub stargazers_count: i64,
    pub forks_count: i64,
    pub watchers_count: i64,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(rename = "private")]
    pub is_private: bool,
    pub fork: bool,
}

/// Public event fields needed for the commit counter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: EventPayload,
    /// Remaining fields, carried through for the recent-activity feed
    #[serde(flatten)]
    pub rest: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub commits: Vec<Value>,
}

/// Derived statistics for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct GithubStats {
    /// Commits pushed on the current UTC calendar day
    #[serde(rename = "todaysCommits")]
    pub todays_commits: i64,
    /// Repositories updated within the trailing 30 days
    #[serde(rename = "activeRepos")]
    pub active_repos: i64,
    pub followers: i64,
    /// Stars across owned, non-fork repositories
    #[serde(rename = "totalStars")]
    pub total_stars: i64,
}

/// GitHub API client
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    config: GithubConfig,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("portfolio-hub/0.1")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self
            .http
            .get(format!("{}{}", self.config.api_url, path))
            .header("accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("GitHub API: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "GitHub API returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Invalid GitHub response: {}", e)))
    }

    pub async fn fetch_user(&self) -> ApiResult<GithubUser> {
        self.get_json(&format!("/users/{}", self.config.username))
            .await
    }

    pub async fn fetch_repos(&self) -> ApiResult<Vec<GithubRepo>> {
        self.get_json(&format!("/users/{}/repos", self.config.username))
            .await
    }

    pub async fn fetch_events(&self) -> ApiResult<Vec<GithubEvent>> {
        self.get_json(&format!("/users/{}/events/public", self.config.username))
            .await
    }

    /// Repositories for the public projects grid: no forks, no private
    /// repos, best score first.
    pub async fn list_public_repos(&self) -> ApiResult<Vec<GithubRepo>> {
        let mut repos: Vec<GithubRepo> = self
            .fetch_repos()
            .await?
            .into_iter()
            .filter(|repo| !repo.fork && !repo.is_private)
            .collect();

        repos.sort_by(|a, b| {
            score(b)
                .partial_cmp(&score(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(repos)
    }
}

/// Composite popularity/recency score.
///
/// Stars dominate; push recency breaks ties because epoch seconds scaled
/// by 1e9 stay well below one star's weight.
fn score(repo: &GithubRepo) -> f64 {
    let pushed = repo.pushed_at.map(|at| at.timestamp()).unwrap_or(0);
    (repo.stargazers_count * 2) as f64 + pushed as f64 / 1e9
}

/// Sum push-event commit counts for events on the same UTC calendar day
/// as `now`.
pub fn commits_on_day(events: &[GithubEvent], now: DateTime<Utc>) -> i64 {
    let today = now.date_naive();
    events
        .iter()
        .filter(|event| event.kind == "PushEvent" && event.created_at.date_naive() == today)
        .map(|event| event.payload.commits.len() as i64)
        .sum()
}

/// Count repositories updated within the trailing 30 days.
pub fn active_repo_count(repos: &[GithubRepo], now: DateTime<Utc>) -> i64 {
    let cutoff = now - Duration::days(30);
    repos.iter().filter(|repo| repo.updated_at > cutoff).count() as i64
}

/// Total stars across owned, non-fork repositories.
pub fn total_stars(repos: &[GithubRepo]) -> i64 {
    repos
        .iter()
        .filter(|repo| !repo.fork)
        .map(|repo| repo.stargazers_count)
        .sum()
}

/// Reduce the three fetches to the dashboard numbers.
pub fn compute_stats(
    user: &GithubUser,
    repos: &[GithubRepo],
    events: &[GithubEvent],
    now: DateTime<Utc>,
) -> GithubStats {
    GithubStats {
        todays_commits: commits_on_day(events, now),
        active_repos: active_repo_count(repos, now),
        followers: user.followers,
        total_stars: total_stars(repos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repo(name: &str, stars: i64, fork: bool, pushed_days_ago: i64) -> GithubRepo {
        let now = Utc::now();
        GithubRepo {
            id: 1,
            name: name.to_string(),
            full_name: format!("someone/{}", name),
            description: None,
            html_url: format!("https://github.com/someone/{}", name),
            homepage: None,
            stargazers_count: stars,
            forks_count: 0,
            watchers_count: stars,
            language: Some("Rust".to_string()),
            topics: vec![],
            created_at: now - Duration::days(400),
            updated_at: now - Duration::days(pushed_days_ago),
            pushed_at: Some(now - Duration::days(pushed_days_ago)),
            is_private: false,
            fork,
        }
    }

    fn push_event(days_ago: i64, commit_count: usize) -> GithubEvent {
        GithubEvent {
            kind: "PushEvent".to_string(),
            created_at: Utc::now() - Duration::days(days_ago),
            payload: EventPayload {
                commits: vec![json!({"sha": "abc"}); commit_count],
            },
            rest: json!({}),
        }
    }

    #[test]
    fn test_commits_on_day_counts_only_todays_pushes() {
        let now = Utc::now();
        let mut events = vec![push_event(0, 3), push_event(0, 2), push_event(1, 5)];
        events.push(GithubEvent {
            kind: "WatchEvent".to_string(),
            created_at: now,
            payload: EventPayload::default(),
            rest: json!({}),
        });

        assert_eq!(commits_on_day(&events, now), 5);
    }

    #[test]
    fn test_commits_on_day_empty_feed() {
        assert_eq!(commits_on_day(&[], Utc::now()), 0);
    }

    #[test]
    fn test_total_stars_excludes_forks() {
        let repos = vec![
            repo("mine", 10, false, 1),
            repo("also-mine", 3, false, 2),
            repo("someone-elses", 500, true, 1),
        ];

        assert_eq!(total_stars(&repos), 13);
    }

    #[test]
    fn test_active_repo_count_uses_trailing_window() {
        let repos = vec![
            repo("fresh", 0, false, 3),
            repo("recent", 0, false, 29),
            repo("stale", 0, false, 45),
        ];

        assert_eq!(active_repo_count(&repos, Utc::now()), 2);
    }

    #[test]
    fn test_score_orders_stars_before_recency() {
        let popular_old = repo("popular", 50, false, 300);
        let fresh_unstarred = repo("fresh", 0, false, 0);

        assert!(score(&popular_old) > score(&fresh_unstarred));
    }

    #[test]
    fn test_score_breaks_star_ties_by_recency() {
        let newer = repo("newer", 5, false, 1);
        let older = repo("older", 5, false, 200);

        assert!(score(&newer) > score(&older));
    }

    #[test]
    fn test_compute_stats() {
        let user = GithubUser { followers: 12 };
        let repos = vec![repo("mine", 4, false, 2), repo("forked", 9, true, 2)];
        let events = vec![push_event(0, 2)];

        let stats = compute_stats(&user, &repos, &events, Utc::now());

        assert_eq!(stats.todays_commits, 2);
        assert_eq!(stats.active_repos, 2);
        assert_eq!(stats.followers, 12);
        assert_eq!(stats.total_stars, 4);
    }

    #[test]
    fn test_repo_listing_json_shape() {
        // The fields the site consumes survive a serde round trip
        let value = serde_json::to_value(repo("mine", 4, false, 2)).unwrap();
        assert_eq!(value["private"], json!(false));
        assert_eq!(value["fork"], json!(false));
        assert_eq!(value["stargazers_count"], json!(4));
    }
}

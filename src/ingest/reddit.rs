use crate::config::Config;
use crate::db;
use crate::error::{BatchOutcome, PipelineError, Result};
use crate::types::{Article, OAuthToken, ProcessingStatus, SourceType};
use crate::utils::{log_step, log_success, md5_hex};
use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, ResourceOwnerPassword, ResourceOwnerUsername, TokenUrl};
use serde::Deserialize;
use serde_json::Value;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const BASE_API: &str = "https://oauth.reddit.com";
const DEFAULT_SUBREDDITS: &[&str] = &[
    "AbingdonVA",
    "BristolTN",
    "BristolVA",
    "Roanoke",
    "Blacksburg",
    "Christiansburg",
    "Virginia",
];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// §4.8: OAuth2 client-credentials or password grant, matching the
/// teacher's existing OAuth stack. Persists the resulting token into
/// `oauth_tokens` (provider="reddit") so a later run can skip re-auth
/// until expiry.
pub async fn fetch_access_token(config: &Config) -> Result<String> {
    let client_id = config
        .reddit_client_id
        .clone()
        .ok_or_else(|| PipelineError::config("ingest::reddit::fetch_access_token", "REDDIT_CLIENT_ID is not set"))?;
    let client_secret = config.reddit_client_secret.clone();

    if let Ok(Some(existing)) = db::get_oauth_token(config, "reddit", "default") {
        if existing.expires_at.map(|exp| exp > Utc::now()).unwrap_or(false) {
            return Ok(existing.access_token);
        }
    }

    let oauth_client = BasicClient::new(
        ClientId::new(client_id),
        client_secret.map(ClientSecret::new),
        AuthUrl::new(TOKEN_URL.to_string())
            .map_err(|e| PipelineError::fatal_display("ingest::reddit::fetch_access_token", e))?,
        Some(
            TokenUrl::new(TOKEN_URL.to_string())
                .map_err(|e| PipelineError::fatal_display("ingest::reddit::fetch_access_token", e))?,
        ),
    );

    let token_result = if let (Some(user), Some(pass)) =
        (&config.reddit_username, &config.reddit_password)
    {
        oauth_client
            .exchange_password(
                &ResourceOwnerUsername::new(user.clone()),
                &ResourceOwnerPassword::new(pass.clone()),
            )
            .request_async(oauth2::reqwest::async_http_client)
            .await
    } else {
        oauth_client
            .exchange_client_credentials()
            .request_async(oauth2::reqwest::async_http_client)
            .await
    };

    let token = token_result
        .map_err(|e| PipelineError::transient("ingest::reddit::fetch_access_token", e))?;

    let access_token = oauth2::TokenResponse::access_token(&token).secret().clone();
    let expires_at = oauth2::TokenResponse::expires_in(&token).map(|d| Utc::now() + chrono::Duration::from_std(d).unwrap_or_default());

    db::upsert_oauth_token(
        config,
        &OAuthToken {
            provider: "reddit".to_string(),
            account: "default".to_string(),
            access_token: access_token.clone(),
            refresh_token: None,
            scope: Some("read".to_string()),
            expires_at,
        },
    )?;

    Ok(access_token)
}

fn subreddit_list(config: &Config) -> Vec<String> {
    // The original reads a comma-separated REDDIT_SUBREDDITS override; here
    // that knob isn't modeled as a dedicated Config field, so we fall back
    // straight to the seed list used when the env var is unset upstream.
    let _ = config;
    DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Value,
}

fn article_from_post(post: &Value, subreddit: &str) -> Option<Article> {
    let title = post.get("title")?.as_str()?.to_string();
    let permalink = post.get("permalink").and_then(Value::as_str);
    let url = permalink
        .map(|p| format!("https://www.reddit.com{p}"))
        .or_else(|| post.get("url").and_then(Value::as_str).map(str::to_string));

    let selftext = post.get("selftext").and_then(Value::as_str).unwrap_or("").trim();
    let content = if !selftext.is_empty() {
        selftext.to_string()
    } else if let Some(link) = post.get("url").and_then(Value::as_str) {
        format!("Link: {link}\n\n(See discussion in thread)")
    } else {
        String::new()
    };

    let created_utc = post.get("created_utc").and_then(Value::as_f64).unwrap_or(0.0);
    let date_published = DateTime::<Utc>::from_timestamp(created_utc as i64, 0);
    let author = post.get("author").and_then(Value::as_str).map(str::to_string);
    let content_hash = md5_hex(&format!("{title}{content}"));

    let mut metadata = std::collections::HashMap::new();
    metadata.insert("subreddit".to_string(), Value::String(subreddit.to_string()));
    if let Some(score) = post.get("score") {
        metadata.insert("score".to_string(), score.clone());
    }
    if let Some(num_comments) = post.get("num_comments") {
        metadata.insert("num_comments".to_string(), num_comments.clone());
    }

    Some(Article {
        id: None,
        title,
        content: content.clone(),
        content_hash,
        source_type: SourceType::Reddit,
        url: url.clone(),
        source_url: url,
        source_file: None,
        page_number: None,
        column_number: None,
        section: Some(format!("Reddit/{subreddit}")),
        author,
        tags: Vec::new(),
        word_count: Article::word_count_of(&content),
        date_published,
        date_extracted: Utc::now(),
        date_created: None,
        date_updated: None,
        processing_status: ProcessingStatus::Extracted,
        raw_html: None,
        metadata,
        location_name: None,
        location_lat: None,
        location_lon: None,
        event_dates: Vec::new(),
    })
}

/// Polls `/r/<sub>/new` for every configured subreddit at ≤ 1 req/2s
/// (§4.8), mapping each listing into an `Article` and routing it through
/// the same dedup path as the Extractor.
pub async fn ingest(config: &Config, limit: u32) -> Result<BatchOutcome<Article>> {
    let token = fetch_access_token(config).await?;
    let client = reqwest::Client::new();
    let mut outcome = BatchOutcome::new();
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(2));

    for sub in subreddit_list(config) {
        interval.tick().await;
        log_step("📡", &format!("Polling r/{sub}..."));

        let url = format!("{BASE_API}/r/{sub}/new");
        let response = client
            .get(&url)
            .bearer_auth(&token)
            .header("User-Agent", "newsroom-pipeline/0.1")
            .query(&[("limit", limit.to_string())])
            .send()
            .await;

        let listing: Listing = match response {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(l) => l,
                Err(e) => {
                    outcome.record_err(sub.clone(), PipelineError::parse("ingest::reddit::ingest", e.to_string()));
                    continue;
                }
            },
            Ok(resp) => {
                outcome.record_err(
                    sub.clone(),
                    PipelineError::rate_limited("ingest::reddit::ingest", format!("HTTP {}", resp.status())),
                );
                continue;
            }
            Err(e) => {
                outcome.record_err(sub.clone(), PipelineError::transient("ingest::reddit::ingest", e));
                continue;
            }
        };

        for child in listing.data.children {
            if let Some(article) = article_from_post(&child.data, &sub) {
                match db::upsert_article(config, &article) {
                    Ok(_) => outcome.record_ok(article),
                    Err(e) => outcome.record_err(sub.clone(), e),
                }
            }
        }
    }

    log_success(&format!(
        "Reddit ingest complete: {} article(s) ingested, {} failure(s).",
        outcome.succeeded.len(),
        outcome.failed.len()
    ));
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_from_post_prefers_selftext_over_link() {
        let post = serde_json::json!({
            "title": "Town meeting tonight",
            "selftext": "Come to the town hall at 7pm.",
            "permalink": "/r/Test/comments/abc/town_meeting",
            "created_utc": 1_700_000_000.0,
            "author": "localuser",
            "score": 5,
            "num_comments": 2,
        });
        let article = article_from_post(&post, "Test").unwrap();
        assert_eq!(article.source_type, SourceType::Reddit);
        assert!(article.content.contains("town hall"));
        assert_eq!(article.section.as_deref(), Some("Reddit/Test"));
    }

    #[test]
    fn article_from_post_falls_back_to_link_placeholder() {
        let post = serde_json::json!({
            "title": "Check this out",
            "selftext": "",
            "url": "https://example.com/story",
            "created_utc": 1_700_000_000.0,
        });
        let article = article_from_post(&post, "Test").unwrap();
        assert!(article.content.starts_with("Link:"));
    }
}

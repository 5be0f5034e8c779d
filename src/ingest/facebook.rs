use crate::config::Config;
use crate::db;
use crate::error::{BatchOutcome, PipelineError, Result};
use crate::types::{Article, OAuthToken, ProcessingStatus, SourceType};
use crate::utils::{log_step, log_success, md5_hex};
use chrono::{DateTime, Utc};
use serde_json::Value;

const GRAPH_BASE: &str = "https://graph.facebook.com/v19.0";
const POST_FIELDS: &str = "id,message,permalink_url,created_time";

/// §4.8: Graph API `GET /{page-id}/posts` with a page access token stored
/// in `oauth_tokens` (provider="facebook").
pub async fn ingest(config: &Config) -> Result<BatchOutcome<Article>> {
    let page_id = config
        .facebook_page_id
        .clone()
        .ok_or_else(|| PipelineError::config("ingest::facebook::ingest", "FACEBOOK_PAGE_ID is not set"))?;

    let token = resolve_page_token(config, &page_id)?;

    log_step("📘", &format!("Fetching Facebook posts for page {page_id}..."));
    let client = reqwest::Client::new();
    let mut outcome = BatchOutcome::new();

    let response = client
        .get(format!("{GRAPH_BASE}/{page_id}/posts"))
        .query(&[("fields", POST_FIELDS), ("access_token", token.as_str())])
        .send()
        .await
        .map_err(|e| PipelineError::transient("ingest::facebook::ingest", e))?;

    if !response.status().is_success() {
        return Err(PipelineError::auth(
            "ingest::facebook::ingest",
            format!("Graph API returned HTTP {}", response.status()),
        ));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| PipelineError::parse("ingest::facebook::ingest", e.to_string()))?;

    let posts = body.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
    for post in &posts {
        if let Some(article) = article_from_post(post) {
            match db::upsert_article(config, &article) {
                Ok(_) => outcome.record_ok(article),
                Err(e) => outcome.record_err(page_id.clone(), e),
            }
        }
    }

    log_success(&format!(
        "Facebook ingest complete: {} post(s) ingested, {} failure(s).",
        outcome.succeeded.len(),
        outcome.failed.len()
    ));
    Ok(outcome)
}

fn resolve_page_token(config: &Config, page_id: &str) -> Result<String> {
    if let Some(token) = &config.facebook_page_token {
        return Ok(token.clone());
    }
    match db::get_oauth_token(config, "facebook", page_id)? {
        Some(token) => Ok(token.access_token),
        None => Err(PipelineError::auth(
            "ingest::facebook::resolve_page_token",
            "no FACEBOOK_PAGE_TOKEN configured and no cached oauth_tokens row",
        )),
    }
}

/// Persists a page access token obtained out-of-band (the user-token → page-token
/// exchange itself is an interactive setup step, out of scope here).
pub fn store_page_token(config: &Config, page_id: &str, access_token: &str) -> Result<()> {
    db::upsert_oauth_token(
        config,
        &OAuthToken {
            provider: "facebook".to_string(),
            account: page_id.to_string(),
            access_token: access_token.to_string(),
            refresh_token: None,
            scope: None,
            expires_at: None,
        },
    )
}

fn article_from_post(post: &Value) -> Option<Article> {
    let id = post.get("id").and_then(Value::as_str)?;
    let content = post.get("message").and_then(Value::as_str).unwrap_or("").trim().to_string();
    if content.is_empty() {
        return None;
    }
    let title = content.lines().next().unwrap_or("Facebook post").chars().take(120).collect::<String>();
    let url = post.get("permalink_url").and_then(Value::as_str).map(str::to_string);
    let date_published = post
        .get("created_time")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let content_hash = md5_hex(&format!("{title}{content}"));

    Some(Article {
        id: None,
        title,
        content: content.clone(),
        content_hash,
        source_type: SourceType::Facebook,
        url: url.clone(),
        source_url: url,
        source_file: None,
        page_number: None,
        column_number: None,
        section: Some("Facebook".to_string()),
        author: None,
        tags: Vec::new(),
        word_count: Article::word_count_of(&content),
        date_published,
        date_extracted: Utc::now(),
        date_created: None,
        date_updated: None,
        processing_status: ProcessingStatus::Extracted,
        raw_html: None,
        metadata: std::iter::once(("facebook_post_id".to_string(), Value::String(id.to_string()))).collect(),
        location_name: None,
        location_lat: None,
        location_lon: None,
        event_dates: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_from_post_uses_first_line_as_title() {
        let post = serde_json::json!({
            "id": "123_456",
            "message": "Road closure on Main St.\nExpect delays through Friday.",
            "permalink_url": "https://facebook.com/123/posts/456",
            "created_time": "2026-07-28T12:00:00+0000",
        });
        let article = article_from_post(&post).unwrap();
        assert_eq!(article.title, "Road closure on Main St.");
        assert_eq!(article.source_type, SourceType::Facebook);
    }

    #[test]
    fn article_from_post_skips_empty_message() {
        let post = serde_json::json!({ "id": "1", "message": "" });
        assert!(article_from_post(&post).is_none());
    }
}

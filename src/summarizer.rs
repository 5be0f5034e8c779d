use crate::config::Config;
use crate::db;
use crate::error::{BatchOutcome, PipelineError, Result};
use crate::types::{Article, ProcessingStatus, Summary};
use crate::utils::{log_step, log_success, log_warn};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a local news analyst. Given an article, respond with a JSON object \
containing: summary (2-3 sentences), key_points (array of short bullet strings), sentiment \
(one of positive/neutral/negative), tags (array of short topical keywords), entities (array of \
{\"name\":..,\"type\":..} for people/places/organizations mentioned), topics (array of \
{\"name\":..,\"score\":0-1} for the article's main subjects). Respond with JSON only.";

const MAX_CONTENT_CHARS: usize = 3000 * 4;

static THINK_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static BULLET_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*]|\d+\.)\s+(.*)$").unwrap());

/// §4.5 step 3: ranks `[primary, ...fallbacks]`; on an invalid-model error
/// the current name is marked unavailable and the next is tried; on
/// success that name becomes sticky for the rest of the process.
pub struct ModelFailover {
    models: Vec<String>,
    current: Mutex<usize>,
}

impl ModelFailover {
    pub fn new(primary: impl Into<String>, fallbacks: impl IntoIterator<Item = String>) -> Self {
        let mut models = vec![primary.into()];
        models.extend(fallbacks);
        Self {
            models,
            current: Mutex::new(0),
        }
    }

    pub fn current_model(&self) -> String {
        let idx = *self.current.lock().unwrap();
        self.models[idx.min(self.models.len() - 1)].clone()
    }

    fn advance(&self) -> bool {
        let mut idx = self.current.lock().unwrap();
        if *idx + 1 < self.models.len() {
            *idx += 1;
            true
        } else {
            false
        }
    }

    fn make_sticky(&self, model: &str) {
        if let Some(pos) = self.models.iter().position(|m| m == model) {
            *self.current.lock().unwrap() = pos;
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct EntityPayload {
    name: String,
    #[serde(rename = "type")]
    entity_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct TopicPayload {
    name: String,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct SummaryPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default = "default_sentiment")]
    sentiment: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    entities: Vec<EntityPayload>,
    #[serde(default)]
    topics: Vec<TopicPayload>,
    #[serde(default = "default_confidence")]
    confidence_score: f64,
}

fn default_sentiment() -> String {
    "neutral".to_string()
}

fn default_confidence() -> f64 {
    0.9
}

/// §4.5 step 4: strips `<think>` blocks, tries direct JSON, then the
/// largest `{…}` substring, and finally synthesizes a payload from the raw
/// text. The bullet-detection fallback below intentionally preserves the
/// original's quirk of treating a leading dash as a bullet marker even when
/// it's part of a normal sentence — not fixed, kept for parity.
fn tolerant_parse(raw_text: &str) -> SummaryPayload {
    let cleaned = THINK_BLOCK.replace_all(raw_text, "").trim().to_string();

    if let Ok(payload) = serde_json::from_str::<SummaryPayload>(&cleaned) {
        return payload;
    }

    if let Some(m) = JSON_OBJECT.find(&cleaned) {
        if let Ok(payload) = serde_json::from_str::<SummaryPayload>(m.as_str()) {
            return payload;
        }
    }

    let key_points: Vec<String> = BULLET_LINE
        .captures_iter(&cleaned)
        .map(|c| c[1].trim().to_string())
        .collect();

    SummaryPayload {
        summary: cleaned,
        key_points,
        sentiment: default_sentiment(),
        tags: Vec::new(),
        entities: Vec::new(),
        topics: Vec::new(),
        confidence_score: 0.6,
    }
}

/// §4.5 step 1: 4 chars ≈ 1 token heuristic, truncating to a sentence
/// boundary when possible rather than cutting mid-sentence. Truncates on a
/// char boundary (codepoint count, not byte offset) so non-ASCII article
/// text never panics on a mid-character split.
fn truncate_for_budget(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let window: String = content.chars().take(MAX_CONTENT_CHARS).collect();
    match window.rfind(". ") {
        Some(idx) if idx > MAX_CONTENT_CHARS / 2 => window[..=idx].to_string(),
        _ => window,
    }
}

fn build_client(config: &Config) -> Client<OpenAIConfig> {
    let mut oai_config = OpenAIConfig::new();
    if let Some(key) = &config.openai_api_key {
        oai_config = oai_config.with_api_key(key);
    }
    if let Some(base) = &config.openai_api_base {
        oai_config = oai_config.with_api_base(base);
    }
    Client::with_config(oai_config)
}

async fn summarize_one(client: &Client<OpenAIConfig>, failover: &ModelFailover, article: &Article) -> Result<SummaryPayload> {
    let content = truncate_for_budget(&article.content);
    let user_prompt = format!("Title: {}\n\nContent:\n{}", article.title, content);

    loop {
        let model = failover.current_model();
        let request = CreateChatCompletionRequestArgs::default()
            .model(&model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| PipelineError::fatal_display("summarizer::summarize_one", e))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_prompt.clone())
                    .build()
                    .map_err(|e| PipelineError::fatal_display("summarizer::summarize_one", e))?
                    .into(),
            ])
            .build()
            .map_err(|e| PipelineError::fatal_display("summarizer::summarize_one", e))?;

        match client.chat().create(request).await {
            Ok(response) => {
                failover.make_sticky(&model);
                let text = response
                    .choices
                    .first()
                    .and_then(|c| c.message.content.clone())
                    .unwrap_or_default();
                return Ok(tolerant_parse(&text));
            }
            Err(e) => {
                let message = e.to_string();
                let looks_like_invalid_model = message.to_lowercase().contains("model")
                    && (message.to_lowercase().contains("does not exist") || message.to_lowercase().contains("invalid"));
                if looks_like_invalid_model && failover.advance() {
                    log_warn(&format!("Model {model} unavailable, falling back."));
                    continue;
                }
                return Err(PipelineError::fatal("summarizer::summarize_one", message));
            }
        }
    }
}

/// §4.5: pulls up to `batch_size` extracted articles, summarizes each
/// concurrently, writes summary + taxonomy atomically, flips status. Loops
/// until `max_batches` or an empty pull, matching the teacher's `jira.rs`
/// per-batch `FuturesUnordered` task-group pattern.
pub async fn run(config: &Config) -> Result<BatchOutcome<i64>> {
    let client = build_client(config);
    let fallbacks = vec![
        "gpt-4o-mini".to_string(),
        "gpt-4.1-mini".to_string(),
        "gpt-3.5-turbo".to_string(),
    ];
    let failover = ModelFailover::new(config.openai_model.clone(), fallbacks);

    let mut outcome = BatchOutcome::new();

    for batch_num in 0..config.summarizer_max_batches {
        let batch = db::fetch_extracted_batch(config, config.summarizer_batch_size as i64)?;
        if batch.is_empty() {
            break;
        }

        log_step("🧠", &format!("Summarizing batch {} ({} article(s))...", batch_num + 1, batch.len()));

        for (i, article) in batch.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }

            let Some(article_id) = article.id else {
                continue;
            };

            match summarize_one(&client, &failover, article).await {
                Ok(payload) => {
                    let entities: Vec<(String, Option<String>)> = payload
                        .entities
                        .iter()
                        .map(|e| (e.name.clone(), e.entity_type.clone()))
                        .collect();
                    let topics: Vec<(String, f64)> =
                        payload.topics.iter().map(|t| (t.name.clone(), t.score)).collect();

                    let write_result = (|| -> Result<()> {
                        db::upsert_summary(
                            config,
                            &Summary {
                                article_id,
                                summary_type: "brief".to_string(),
                                summary_text: payload.summary.clone(),
                                model_used: failover.current_model(),
                                tokens_used: None,
                                generation_time_ms: None,
                                key_points: payload.key_points.clone(),
                                sentiment: payload.sentiment.clone(),
                                confidence_score: payload.confidence_score,
                            },
                        )?;
                        db::upsert_taxonomy(config, article_id, &payload.tags, &entities, &topics)?;
                        db::replace_article_events(config, article_id, &article.event_dates)?;
                        db::set_article_status(config, article_id, ProcessingStatus::Summarized)?;
                        Ok(())
                    })();

                    match write_result {
                        Ok(()) => outcome.record_ok(article_id),
                        Err(e) => outcome.record_err(article_id.to_string(), e),
                    }
                }
                Err(e) => outcome.record_err(article_id.to_string(), e),
            }
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    log_success(&format!(
        "Summarization complete: {} succeeded, {} failed.",
        outcome.succeeded.len(),
        outcome.failed.len()
    ));
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerant_parse_reads_direct_json() {
        let raw = r#"{"summary":"A town meeting happened.","key_points":["Budget approved"],"sentiment":"neutral","confidence_score":0.95}"#;
        let payload = tolerant_parse(raw);
        assert_eq!(payload.summary, "A town meeting happened.");
        assert_eq!(payload.key_points, vec!["Budget approved".to_string()]);
    }

    #[test]
    fn tolerant_parse_strips_think_blocks_and_finds_embedded_json() {
        let raw = "<think>reasoning here</think>Sure, here you go: {\"summary\":\"Short summary.\",\"sentiment\":\"positive\"}";
        let payload = tolerant_parse(raw);
        assert_eq!(payload.summary, "Short summary.");
        assert_eq!(payload.sentiment, "positive");
    }

    #[test]
    fn tolerant_parse_falls_back_to_bullet_heuristic() {
        let raw = "Not JSON at all.\n- First point\n- Second point\n3. Third point";
        let payload = tolerant_parse(raw);
        assert_eq!(payload.confidence_score, 0.6);
        assert_eq!(payload.key_points.len(), 3);
    }

    #[test]
    fn model_failover_advances_and_sticks() {
        let failover = ModelFailover::new("a", vec!["b".to_string(), "c".to_string()]);
        assert_eq!(failover.current_model(), "a");
        assert!(failover.advance());
        assert_eq!(failover.current_model(), "b");
        failover.make_sticky("c");
        assert_eq!(failover.current_model(), "c");
    }

    #[test]
    fn truncate_for_budget_prefers_sentence_boundary() {
        let long_sentence = "word ".repeat(4000);
        let truncated = truncate_for_budget(&long_sentence);
        assert!(truncated.len() <= long_sentence.len());
    }
}

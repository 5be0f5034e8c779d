pub mod dedup;
pub mod html;
pub mod pdf;

use crate::config::Config;
use crate::db;
use crate::error::{BatchOutcome, Result};
use crate::object_cache::ObjectCache;
use crate::types::{Article, SourceType};
use crate::utils::{log_step, log_success, log_warn};
use chrono::{NaiveDate, Utc};

/// §9's redesign: two tagged variants converge into the single canonical
/// `Article` via an explicit converter here, rather than a dynamic dict
/// shape or downcasting.
#[derive(Debug, Clone)]
pub struct PdfArticleCandidate {
    pub title: String,
    pub content: String,
    pub page_number: i32,
    pub column: i32,
    pub source_file: String,
}

#[derive(Debug, Clone)]
pub struct HtmlArticleCandidate {
    pub title: String,
    pub content: String,
    pub url: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub raw_html: String,
    pub date_published: Option<chrono::DateTime<chrono::Utc>>,
    pub section: Option<String>,
}

pub fn article_from_pdf_candidate(candidate: PdfArticleCandidate, extracted_at: chrono::DateTime<chrono::Utc>) -> Article {
    let content_hash = crate::utils::md5_hex(&format!("{}{}", candidate.title, candidate.content));
    let event_dates = crate::events::extract_events(&candidate.content, extracted_at);
    Article {
        id: None,
        title: candidate.title,
        content: candidate.content.clone(),
        content_hash,
        source_type: SourceType::Pdf,
        url: None,
        source_url: None,
        source_file: Some(candidate.source_file),
        page_number: Some(candidate.page_number),
        column_number: Some(candidate.column),
        section: None,
        author: None,
        tags: Vec::new(),
        word_count: Article::word_count_of(&candidate.content),
        date_published: None,
        date_extracted: extracted_at,
        date_created: None,
        date_updated: None,
        processing_status: crate::types::ProcessingStatus::Extracted,
        raw_html: None,
        metadata: Default::default(),
        location_name: None,
        location_lat: None,
        location_lon: None,
        event_dates,
    }
}

pub fn article_from_html_candidate(candidate: HtmlArticleCandidate, extracted_at: chrono::DateTime<chrono::Utc>) -> Article {
    let content_hash = crate::utils::md5_hex(&format!("{}{}", candidate.title, candidate.content));
    let event_dates = crate::events::extract_events(&candidate.content, extracted_at);
    Article {
        id: None,
        title: candidate.title,
        content: candidate.content.clone(),
        content_hash,
        source_type: SourceType::Html,
        url: Some(candidate.url.clone()),
        source_url: Some(candidate.url),
        source_file: None,
        page_number: None,
        column_number: None,
        section: candidate.section,
        author: candidate.author,
        tags: candidate.tags,
        word_count: Article::word_count_of(&candidate.content),
        date_published: candidate.date_published,
        date_extracted: extracted_at,
        date_created: None,
        date_updated: None,
        processing_status: crate::types::ProcessingStatus::Extracted,
        raw_html: Some(candidate.raw_html),
        metadata: Default::default(),
        location_name: None,
        location_lat: None,
        location_lon: None,
        event_dates,
    }
}

/// §4.4: walks the Object Cache keys under `date`'s prefix, parses each
/// cached blob with the format-appropriate extractor, and writes the
/// resulting articles to the Article Store (status=`extracted`).
pub async fn run(config: &Config, cache: &ObjectCache, date: NaiveDate) -> Result<BatchOutcome<i64>> {
    let prefix = format!("{}/", date.format("%Y-%m-%d"));
    let keys = cache.list_keys_with_prefix(&prefix).await?;

    log_step("📰", &format!("Extracting {} cached page(s) for {date}...", keys.len()));
    let mut outcome = BatchOutcome::new();

    for key in keys {
        let extracted_at = Utc::now();
        let candidates = match extract_from_key(cache, &key, extracted_at).await {
            Ok(articles) => articles,
            Err(e) => {
                outcome.record_err(key.clone(), e);
                continue;
            }
        };

        for article in candidates {
            match db::upsert_article(config, &article) {
                Ok(db::UpsertOutcome::Inserted(id) | db::UpsertOutcome::Merged(id)) => outcome.record_ok(id),
                Err(e) => outcome.record_err(key.clone(), e),
            }
        }
    }

    log_success(&format!(
        "Extraction complete: {} article(s) written, {} cache entr(y/ies) failed.",
        outcome.succeeded.len(),
        outcome.failed.len()
    ));
    Ok(outcome)
}

async fn extract_from_key(
    cache: &ObjectCache,
    key: &str,
    extracted_at: chrono::DateTime<Utc>,
) -> Result<Vec<Article>> {
    let bytes = cache.get(key).await?;
    let meta = cache.get_meta(key).await?;

    if key.to_lowercase().ends_with(".pdf") {
        let articles = pdf::extract_articles(&bytes)?;
        Ok(articles
            .into_iter()
            .map(|a| {
                article_from_pdf_candidate(
                    PdfArticleCandidate {
                        title: a.title,
                        content: a.content,
                        page_number: meta.page_number.unwrap_or(0),
                        column: a.column as i32,
                        source_file: meta.url.clone(),
                    },
                    extracted_at,
                )
            })
            .collect())
    } else {
        let text = String::from_utf8_lossy(&bytes).to_string();
        let document = scraper::Html::parse_document(&text);
        let Some(main_article) = html::extract_main_article(&document) else {
            log_warn(&format!("No main article found for {key}, skipping."));
            return Ok(Vec::new());
        };

        let mut articles = vec![article_from_html_candidate(
            HtmlArticleCandidate {
                title: main_article.title,
                content: main_article.text,
                url: meta.url.clone(),
                author: main_article.author,
                tags: main_article.tags,
                raw_html: text.clone(),
                date_published: main_article.date_published,
                section: meta.section.clone(),
            },
            extracted_at,
        )];

        for secondary in html::extract_secondary_articles(&document) {
            articles.push(article_from_html_candidate(
                HtmlArticleCandidate {
                    title: secondary.title,
                    content: secondary.text,
                    url: meta.url.clone(),
                    author: secondary.author,
                    tags: secondary.tags,
                    raw_html: text.clone(),
                    date_published: secondary.date_published,
                    section: meta.section.clone(),
                },
                extracted_at,
            ));
        }

        Ok(articles)
    }
}

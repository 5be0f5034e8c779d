use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// §9: replaces the original's string-typed `processing_status` with a
/// state enum carrying a total ordering. Reprocessing is a deliberate
/// reset, never an implicit side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Extracted,
    Summarized,
    Notified,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::Summarized => "summarized",
            Self::Notified => "notified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "extracted" => Some(Self::Extracted),
            "summarized" => Some(Self::Summarized),
            "notified" => Some(Self::Notified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Pdf,
    Html,
    Reddit,
    Osint,
    Scanner,
    Facebook,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::Reddit => "reddit",
            Self::Osint => "osint",
            Self::Scanner => "scanner",
            Self::Facebook => "facebook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "html" => Some(Self::Html),
            "reddit" => Some(Self::Reddit),
            "osint" => Some(Self::Osint),
            "scanner" => Some(Self::Scanner),
            "facebook" => Some(Self::Facebook),
            _ => None,
        }
    }
}

/// A single event dict, as carried in `Article::event_dates` and in the
/// `article_events` child table. Equality here is the "canonicalized JSON
/// of the event object" used by the dedup merge's event-date union (§4.4.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleEvent {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location_name: Option<String>,
    pub location_meta: Option<Value>,
}

/// Canonical Article record (§3). One row per unique `content_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub source_type: SourceType,
    pub url: Option<String>,
    pub source_url: Option<String>,
    pub source_file: Option<String>,
    pub page_number: Option<i32>,
    pub column_number: Option<i32>,
    pub section: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub word_count: i32,
    pub date_published: Option<DateTime<Utc>>,
    pub date_extracted: DateTime<Utc>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub processing_status: ProcessingStatus,
    pub raw_html: Option<String>,
    pub metadata: HashMap<String, Value>,
    pub location_name: Option<String>,
    pub location_lat: Option<f64>,
    pub location_lon: Option<f64>,
    pub event_dates: Vec<ArticleEvent>,
}

impl Article {
    pub fn word_count_of(content: &str) -> i32 {
        content.split_whitespace().count() as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub article_id: i64,
    pub summary_type: String,
    pub summary_text: String,
    pub model_used: String,
    pub tokens_used: Option<i32>,
    pub generation_time_ms: Option<i64>,
    pub key_points: Vec<String>,
    pub sentiment: String,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingHistory {
    pub date_processed: DateTime<Utc>,
    pub source_type: SourceType,
    pub source_identifier: String,
    pub articles_found: i32,
    pub articles_new: i32,
    pub articles_duplicate: i32,
    pub status: String,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    Section,
    Publication,
    Tag,
    Topic,
    Entity,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Publication => "publication",
            Self::Tag => "tag",
            Self::Topic => "topic",
            Self::Entity => "entity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "section" => Some(Self::Section),
            "publication" => Some(Self::Publication),
            "tag" => Some(Self::Tag),
            "topic" => Some(Self::Topic),
            "entity" => Some(Self::Entity),
            _ => None,
        }
    }

    pub fn all() -> [MetricKind; 5] {
        [
            Self::Section,
            Self::Publication,
            Self::Tag,
            Self::Topic,
            Self::Entity,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetric {
    pub metric_date: chrono::NaiveDate,
    pub kind: MetricKind,
    pub key: String,
    pub count: i64,
    pub sum_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingItem {
    pub metric_date: chrono::NaiveDate,
    pub kind: MetricKind,
    pub key: String,
    pub score: f64,
    pub zscore: f64,
    pub delta: f64,
    pub win_size: i32,
    pub details: Value,
}

/// Supplemented from `original_source`'s trend computation; table shape
/// resolved in SPEC_FULL §3.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendForecast {
    pub metric_date: chrono::NaiveDate,
    pub kind: MetricKind,
    pub key: String,
    pub horizon_day: i32,
    pub yhat: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub provider: String,
    pub account: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFormat {
    Pdf,
    Html,
}

impl PageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

/// Output of the Edition Discoverer (§4.2): a single page within an edition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditionPage {
    pub url: String,
    pub page_number: Option<i32>,
    pub section: Option<String>,
    pub format: PageFormat,
    pub title: Option<String>,
}

/// Metadata sidecar for a cached blob (§6's Object Cache paths).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedBlobMeta {
    pub url: String,
    pub page_number: Option<i32>,
    pub format: String,
    pub content_hash: String,
    pub cached_at: DateTime<Utc>,
    pub publication: String,
    pub section: Option<String>,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_status_has_total_ordering() {
        assert!(ProcessingStatus::Extracted < ProcessingStatus::Summarized);
        assert!(ProcessingStatus::Summarized < ProcessingStatus::Notified);
    }

    #[test]
    fn processing_status_round_trips_through_str() {
        for s in [
            ProcessingStatus::Extracted,
            ProcessingStatus::Summarized,
            ProcessingStatus::Notified,
        ] {
            assert_eq!(ProcessingStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn source_type_round_trips_through_str() {
        for s in [
            SourceType::Pdf,
            SourceType::Html,
            SourceType::Reddit,
            SourceType::Osint,
            SourceType::Scanner,
            SourceType::Facebook,
        ] {
            assert_eq!(SourceType::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn word_count_splits_on_whitespace() {
        assert_eq!(Article::word_count_of("one two  three\nfour"), 4);
    }
}

use crate::config::Config;
use crate::db_utils::{with_connection, with_transaction};
use crate::error::{PipelineError, Result};
use crate::queries::*;
use crate::types::{
    Article, ArticleEvent, DailyMetric, MetricKind, OAuthToken, ProcessingHistory,
    ProcessingStatus, SourceType, Summary, TrendForecast, TrendingItem,
};
use crate::utils::{log_step, log_success};
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{params, Connection, Row};
use std::collections::HashMap;

/// Creates every table in the Article Store (idempotent) and loads the
/// bundled full-text-search extension, mirroring the teacher's
/// `create_*_table` functions collapsed into one schema-init entry point.
pub fn init_schema(config: &Config) -> Result<()> {
    log_step("📦", "Initializing article store schema...");
    with_connection(config, "db::init_schema", |conn| {
        for ddl in ALL_TABLE_DDL {
            conn.execute_batch(ddl).map_err(db_err("init_schema"))?;
        }
        conn.execute_batch(LOAD_FTS_EXTENSION)
            .map_err(db_err("init_schema: fts extension"))?;
        conn.execute_batch(CREATE_FTS_INDEX)
            .map_err(db_err("init_schema: fts index"))?;
        Ok(())
    })?;
    log_success("Article store schema ready.");
    Ok(())
}

fn db_err(context: &'static str) -> impl Fn(duckdb::Error) -> PipelineError {
    move |e| PipelineError::Fatal {
        context: context.to_string(),
        detail: e.to_string(),
    }
}

fn to_naive(dt: &DateTime<Utc>) -> chrono::NaiveDateTime {
    dt.naive_utc()
}

fn from_naive(ndt: chrono::NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(ndt, Utc)
}

fn row_to_article(row: &Row) -> duckdb::Result<Article> {
    let tags_json: Option<String> = row.get(12)?;
    let metadata_json: Option<String> = row.get(20)?;
    let event_dates_json: Option<String> = row.get(24)?;
    let source_type_s: String = row.get(4)?;
    let status_s: String = row.get(18)?;
    let date_published: Option<chrono::NaiveDateTime> = row.get(14)?;
    let date_extracted: chrono::NaiveDateTime = row.get(15)?;
    let date_created: Option<chrono::NaiveDateTime> = row.get(16)?;
    let date_updated: Option<chrono::NaiveDateTime> = row.get(17)?;

    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        content_hash: row.get(3)?,
        source_type: SourceType::parse(&source_type_s).unwrap_or(SourceType::Html),
        url: row.get(5)?,
        source_url: row.get(6)?,
        source_file: row.get(7)?,
        page_number: row.get(8)?,
        column_number: row.get(9)?,
        section: row.get(10)?,
        author: row.get(11)?,
        tags: tags_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        word_count: row.get(13)?,
        date_published: date_published.map(from_naive),
        date_extracted: from_naive(date_extracted),
        date_created: date_created.map(from_naive),
        date_updated: date_updated.map(from_naive),
        processing_status: ProcessingStatus::parse(&status_s).unwrap_or(ProcessingStatus::Extracted),
        raw_html: row.get(19)?,
        metadata: metadata_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        location_name: row.get(21)?,
        location_lat: row.get(22)?,
        location_lon: row.get(23)?,
        event_dates: event_dates_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
    })
}

fn find_by_content_hash(conn: &Connection, content_hash: &str) -> Result<Option<Article>> {
    let mut stmt = conn
        .prepare(GET_ARTICLE_BY_CONTENT_HASH)
        .map_err(db_err("db::find_by_content_hash"))?;
    let mut rows = stmt
        .query(params![content_hash])
        .map_err(db_err("db::find_by_content_hash"))?;
    match rows.next().map_err(db_err("db::find_by_content_hash"))? {
        Some(row) => Ok(Some(
            row_to_article(row).map_err(db_err("db::find_by_content_hash"))?,
        )),
        None => Ok(None),
    }
}

/// Merge rule set from §4.4.3: tags ordered-union, metadata shallow-merge,
/// scalar fields take the new value only when the existing value is
/// null/empty, event_dates unioned by structural equality.
fn merge_article(existing: &Article, incoming: &Article) -> Article {
    let mut tags = existing.tags.clone();
    for t in &incoming.tags {
        if !tags.contains(t) {
            tags.push(t.clone());
        }
    }

    let mut metadata = existing.metadata.clone();
    for (k, v) in &incoming.metadata {
        metadata.entry(k.clone()).or_insert_with(|| v.clone());
    }

    let mut event_dates = existing.event_dates.clone();
    for e in &incoming.event_dates {
        if !event_dates.contains(e) {
            event_dates.push(e.clone());
        }
    }

    fn pick_str(existing: &Option<String>, incoming: &Option<String>) -> Option<String> {
        match existing {
            Some(s) if !s.is_empty() => Some(s.clone()),
            _ => incoming.clone().or_else(|| existing.clone()),
        }
    }

    Article {
        id: existing.id,
        title: existing.title.clone(),
        content: existing.content.clone(),
        content_hash: existing.content_hash.clone(),
        source_type: existing.source_type,
        url: pick_str(&existing.url, &incoming.url),
        source_url: pick_str(&existing.source_url, &incoming.source_url),
        source_file: pick_str(&existing.source_file, &incoming.source_file),
        page_number: existing.page_number.or(incoming.page_number),
        column_number: existing.column_number.or(incoming.column_number),
        section: pick_str(&existing.section, &incoming.section),
        author: pick_str(&existing.author, &incoming.author),
        tags,
        word_count: if existing.word_count > 0 {
            existing.word_count
        } else {
            incoming.word_count
        },
        date_published: existing.date_published.or(incoming.date_published),
        date_extracted: existing.date_extracted,
        date_created: existing.date_created,
        date_updated: Some(Utc::now()),
        processing_status: existing.processing_status,
        raw_html: pick_str(&existing.raw_html, &incoming.raw_html),
        metadata,
        location_name: pick_str(&existing.location_name, &incoming.location_name),
        location_lat: existing.location_lat.or(incoming.location_lat),
        location_lon: existing.location_lon.or(incoming.location_lon),
        event_dates,
    }
}

/// Outcome of a single dedup-and-merge attempt, used by the Extractor and
/// the ancillary ingesters (§4.4.3, §4.8) to build `ProcessingHistory`
/// counters.
pub enum UpsertOutcome {
    Inserted(i64),
    Merged(i64),
}

/// Inserts a new article or merges into the existing row sharing its
/// `content_hash`. This is the single choke point every ingestion path
/// (Extractor, Reddit/NWS/Facebook) routes through.
pub fn upsert_article(config: &Config, article: &Article) -> Result<UpsertOutcome> {
    with_transaction(config, "db::upsert_article", |tx| {
        if let Some(existing) = find_by_content_hash(tx, &article.content_hash)? {
            let merged = merge_article(&existing, article);
            let id = existing.id.ok_or_else(|| PipelineError::Fatal {
                context: "db::upsert_article".to_string(),
                detail: "existing article row missing id".to_string(),
            })?;
            tx.execute(
                UPDATE_ARTICLE_MERGE,
                params![
                    merged.section,
                    merged.author,
                    merged.word_count,
                    merged.page_number,
                    merged.column_number,
                    merged.date_published.as_ref().map(to_naive),
                    merged.raw_html,
                    merged.source_file,
                    merged.source_url,
                    merged.location_name,
                    merged.location_lat,
                    merged.location_lon,
                    serde_json::to_string(&merged.tags).unwrap_or_default(),
                    serde_json::to_string(&merged.metadata).unwrap_or_default(),
                    serde_json::to_string(&merged.event_dates).unwrap_or_default(),
                    to_naive(&merged.date_updated.unwrap_or_else(Utc::now)),
                    id,
                ],
            )
            .map_err(db_err("db::upsert_article: merge"))?;
            Ok(UpsertOutcome::Merged(id))
        } else {
            let now = Utc::now();
            let mut stmt = tx
                .prepare(INSERT_ARTICLE)
                .map_err(db_err("db::upsert_article: prepare insert"))?;
            let id: i64 = stmt
                .query_row(
                    params![
                        article.title,
                        article.content,
                        article.content_hash,
                        article.source_type.as_str(),
                        article.url,
                        article.source_url,
                        article.source_file,
                        article.page_number,
                        article.column_number,
                        article.section,
                        article.author,
                        serde_json::to_string(&article.tags).unwrap_or_default(),
                        article.word_count,
                        article.date_published.as_ref().map(to_naive),
                        to_naive(&article.date_extracted),
                        to_naive(&now),
                        to_naive(&now),
                        article.processing_status.as_str(),
                        article.raw_html,
                        serde_json::to_string(&article.metadata).unwrap_or_default(),
                        article.location_name,
                        article.location_lat,
                        article.location_lon,
                        serde_json::to_string(&article.event_dates).unwrap_or_default(),
                    ],
                    |row| row.get(0),
                )
                .map_err(db_err("db::upsert_article: insert"))?;
            Ok(UpsertOutcome::Inserted(id))
        }
    })
}

pub fn touch_article(config: &Config, article_id: i64) -> Result<()> {
    with_connection(config, "db::touch_article", |conn| {
        conn.execute(TOUCH_ARTICLE, params![to_naive(&Utc::now()), article_id])
            .map_err(db_err("db::touch_article"))?;
        Ok(())
    })
}

pub fn set_article_status(
    config: &Config,
    article_id: i64,
    status: ProcessingStatus,
) -> Result<()> {
    with_connection(config, "db::set_article_status", |conn| {
        conn.execute(
            SET_ARTICLE_STATUS,
            params![status.as_str(), to_naive(&Utc::now()), article_id],
        )
        .map_err(db_err("db::set_article_status"))?;
        Ok(())
    })
}

pub fn fetch_extracted_batch(config: &Config, limit: i64) -> Result<Vec<Article>> {
    with_connection(config, "db::fetch_extracted_batch", |conn| {
        let mut stmt = conn
            .prepare(SELECT_EXTRACTED_ARTICLES_BATCH)
            .map_err(db_err("db::fetch_extracted_batch"))?;
        let rows = stmt
            .query_map(params![limit], row_to_article)
            .map_err(db_err("db::fetch_extracted_batch"))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(db_err("db::fetch_extracted_batch"))?);
        }
        Ok(out)
    })
}

/// Row shape consumed by the Vector Indexer (§4.7): narrower than the full
/// `Article` since only these fields go into the upsert payload.
pub struct IndexableArticle {
    pub id: i64,
    pub title: String,
    pub section: Option<String>,
    pub content: String,
    pub date_published: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub summary: Option<String>,
}

pub fn fetch_articles_for_vector_index(
    config: &Config,
    since: DateTime<Utc>,
) -> Result<Vec<IndexableArticle>> {
    with_connection(config, "db::fetch_articles_for_vector_index", |conn| {
        let mut stmt = conn
            .prepare(SELECT_ARTICLES_FOR_VECTOR_INDEX)
            .map_err(db_err("db::fetch_articles_for_vector_index"))?;
        let rows = stmt
            .query_map(params![to_naive(&since)], |row| {
                let date_published: Option<chrono::NaiveDateTime> = row.get(4)?;
                Ok(IndexableArticle {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    section: row.get(2)?,
                    content: row.get(3)?,
                    date_published: date_published.map(from_naive),
                    url: row.get(5)?,
                    summary: row.get(6)?,
                })
            })
            .map_err(db_err("db::fetch_articles_for_vector_index"))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(db_err("db::fetch_articles_for_vector_index"))?);
        }
        Ok(out)
    })
}

pub fn upsert_summary(config: &Config, summary: &Summary) -> Result<()> {
    with_connection(config, "db::upsert_summary", |conn| {
        conn.execute(
            UPSERT_SUMMARY,
            params![
                summary.article_id,
                summary.summary_type,
                summary.summary_text,
                summary.model_used,
                summary.tokens_used,
                summary.generation_time_ms,
                serde_json::to_string(&summary.key_points).unwrap_or_default(),
                summary.sentiment,
                summary.confidence_score,
            ],
        )
        .map_err(db_err("db::upsert_summary"))?;
        Ok(())
    })
}

/// Regenerates `article_events` atomically: delete-then-insert inside one
/// transaction, matching the child-row "cascade" semantics named in §9.
pub fn replace_article_events(
    config: &Config,
    article_id: i64,
    events: &[ArticleEvent],
) -> Result<()> {
    with_transaction(config, "db::replace_article_events", |tx| {
        tx.execute(DELETE_ARTICLE_EVENTS, params![article_id])
            .map_err(db_err("db::replace_article_events: delete"))?;
        let mut stmt = tx
            .prepare(INSERT_ARTICLE_EVENT)
            .map_err(db_err("db::replace_article_events: prepare"))?;
        for event in events {
            stmt.execute(params![
                article_id,
                event.title,
                event.description,
                to_naive(&event.start_time),
                event.end_time.as_ref().map(to_naive),
                event.location_name,
                event
                    .location_meta
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ])
            .map_err(db_err("db::replace_article_events: insert"))?;
        }
        Ok(())
    })
}

/// Writes taxonomy output from the Summarizer: tags/entities/topics
/// attached to one article (§4.5 step 5).
pub fn upsert_taxonomy(
    config: &Config,
    article_id: i64,
    tags: &[String],
    entities: &[(String, Option<String>)],
    topics: &[(String, f64)],
) -> Result<()> {
    with_transaction(config, "db::upsert_taxonomy", |tx| {
        for tag in tags {
            tx.execute(UPSERT_ARTICLE_TAG, params![article_id, tag])
                .map_err(db_err("db::upsert_taxonomy: tag"))?;
        }
        for (name, entity_type) in entities {
            tx.execute(UPSERT_ENTITY, params![name, entity_type])
                .map_err(db_err("db::upsert_taxonomy: entity"))?;
            tx.execute(UPSERT_ARTICLE_ENTITY, params![article_id, name])
                .map_err(db_err("db::upsert_taxonomy: article_entity"))?;
        }
        for (name, score) in topics {
            tx.execute(UPSERT_TOPIC, params![name])
                .map_err(db_err("db::upsert_taxonomy: topic"))?;
            tx.execute(UPSERT_ARTICLE_TOPIC, params![article_id, name, score])
                .map_err(db_err("db::upsert_taxonomy: article_topic"))?;
        }
        Ok(())
    })
}

pub fn record_processing_history(config: &Config, history: &ProcessingHistory) -> Result<()> {
    with_connection(config, "db::record_processing_history", |conn| {
        conn.execute(
            UPSERT_PROCESSING_HISTORY,
            params![
                to_naive(&history.date_processed),
                history.source_type.as_str(),
                history.source_identifier,
                history.articles_found,
                history.articles_new,
                history.articles_duplicate,
                history.status,
                history.error_message,
                history.processing_time_ms,
            ],
        )
        .map_err(db_err("db::record_processing_history"))?;
        Ok(())
    })
}

pub fn upsert_daily_metric(config: &Config, metric: &DailyMetric) -> Result<()> {
    with_connection(config, "db::upsert_daily_metric", |conn| {
        conn.execute(
            UPSERT_DAILY_METRIC,
            params![
                metric.metric_date,
                metric.kind.as_str(),
                metric.key,
                metric.count,
                metric.sum_score,
            ],
        )
        .map_err(db_err("db::upsert_daily_metric"))?;
        Ok(())
    })
}

/// Trailing counts per key for a `[from, to)` date window, used by
/// Analytics' trending z-score computation (§4.6).
pub fn fetch_trailing_daily_metrics(
    config: &Config,
    kind: MetricKind,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<HashMap<String, Vec<(NaiveDate, i64)>>> {
    with_connection(config, "db::fetch_trailing_daily_metrics", |conn| {
        let mut stmt = conn
            .prepare(SELECT_TRAILING_DAILY_METRICS)
            .map_err(db_err("db::fetch_trailing_daily_metrics"))?;
        let rows = stmt
            .query_map(params![kind.as_str(), from, to], |row| {
                let date: NaiveDate = row.get(0)?;
                let key: String = row.get(1)?;
                let count: i64 = row.get(2)?;
                Ok((key, date, count))
            })
            .map_err(db_err("db::fetch_trailing_daily_metrics"))?;
        let mut out: HashMap<String, Vec<(NaiveDate, i64)>> = HashMap::new();
        for r in rows {
            let (key, date, count) = r.map_err(db_err("db::fetch_trailing_daily_metrics"))?;
            out.entry(key).or_default().push((date, count));
        }
        Ok(out)
    })
}

pub fn upsert_trending_item(config: &Config, item: &TrendingItem) -> Result<()> {
    with_connection(config, "db::upsert_trending_item", |conn| {
        conn.execute(
            UPSERT_TRENDING_ITEM,
            params![
                item.metric_date,
                item.kind.as_str(),
                item.key,
                item.score,
                item.zscore,
                item.delta,
                item.win_size,
                item.details.to_string(),
            ],
        )
        .map_err(db_err("db::upsert_trending_item"))?;
        Ok(())
    })
}

pub fn upsert_trend_forecast(config: &Config, forecast: &TrendForecast) -> Result<()> {
    with_connection(config, "db::upsert_trend_forecast", |conn| {
        conn.execute(
            UPSERT_TREND_FORECAST,
            params![
                forecast.metric_date,
                forecast.kind.as_str(),
                forecast.key,
                forecast.horizon_day,
                forecast.yhat,
                to_naive(&forecast.generated_at),
            ],
        )
        .map_err(db_err("db::upsert_trend_forecast"))?;
        Ok(())
    })
}

pub fn upsert_oauth_token(config: &Config, token: &OAuthToken) -> Result<()> {
    with_connection(config, "db::upsert_oauth_token", |conn| {
        conn.execute(
            UPSERT_OAUTH_TOKEN,
            params![
                token.provider,
                token.account,
                token.access_token,
                token.refresh_token,
                token.scope,
                token.expires_at.as_ref().map(to_naive),
            ],
        )
        .map_err(db_err("db::upsert_oauth_token"))?;
        Ok(())
    })
}

pub fn get_oauth_token(config: &Config, provider: &str, account: &str) -> Result<Option<OAuthToken>> {
    with_connection(config, "db::get_oauth_token", |conn| {
        let mut stmt = conn
            .prepare(GET_OAUTH_TOKEN)
            .map_err(db_err("db::get_oauth_token"))?;
        let mut rows = stmt
            .query(params![provider, account])
            .map_err(db_err("db::get_oauth_token"))?;
        match rows.next().map_err(db_err("db::get_oauth_token"))? {
            Some(row) => {
                let expires_at: Option<chrono::NaiveDateTime> = row.get(5)?;
                Ok(Some(OAuthToken {
                    provider: row.get(0)?,
                    account: row.get(1)?,
                    access_token: row.get(2)?,
                    refresh_token: row.get(3)?,
                    scope: row.get(4)?,
                    expires_at: expires_at.map(from_naive),
                }))
            }
            None => Ok(None),
        }
        .map_err(db_err("db::get_oauth_token"))
    })
}

/// §9's resolved open question: `days` is bound as a parameter, never
/// string-interpolated into the `INTERVAL` literal.
pub fn cleanup_old_article_events(config: &Config, days: i64) -> Result<()> {
    with_connection(config, "db::cleanup_old_article_events", |conn| {
        conn.execute(CLEANUP_OLD_ARTICLE_EVENTS, params![days.to_string()])
            .map_err(db_err("db::cleanup_old_article_events"))?;
        Ok(())
    })
}

pub fn get_processing_stats_since(
    config: &Config,
    days: i64,
) -> Result<Vec<(SourceType, i64, i64, i64)>> {
    with_connection(config, "db::get_processing_stats_since", |conn| {
        let mut stmt = conn
            .prepare(GET_PROCESSING_STATS_SINCE)
            .map_err(db_err("db::get_processing_stats_since"))?;
        let rows = stmt
            .query_map(params![days.to_string()], |row| {
                let source_type_s: String = row.get(0)?;
                Ok((
                    source_type_s,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(db_err("db::get_processing_stats_since"))?;
        let mut out = Vec::new();
        for r in rows {
            let (source_type_s, found, new, dup) =
                r.map_err(db_err("db::get_processing_stats_since"))?;
            out.push((
                SourceType::parse(&source_type_s).unwrap_or(SourceType::Html),
                found,
                new,
                dup,
            ));
        }
        Ok(out)
    })
}

/// Per-kind daily counts feeding Analytics' aggregation step (§4.6). Each
/// entry is `(key, count, sum_score)`; `sum_score` is only meaningful for
/// `Topic`. `Publication` has no dedicated column on `articles`, so its key
/// is derived in Rust from `source_url`'s host rather than in SQL.
pub fn fetch_daily_counts_by_kind(
    config: &Config,
    kind: MetricKind,
    date: NaiveDate,
) -> Result<Vec<(String, i64, Option<f64>)>> {
    match kind {
        MetricKind::Section => with_connection(config, "db::fetch_daily_counts_by_kind", |conn| {
            let mut stmt = conn
                .prepare(SELECT_SECTION_COUNTS_FOR_DAY)
                .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
            collect_key_count_rows(&mut stmt, date)
        }),
        MetricKind::Tag => with_connection(config, "db::fetch_daily_counts_by_kind", |conn| {
            let mut stmt = conn
                .prepare(SELECT_TAG_COUNTS_FOR_DAY)
                .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
            collect_key_count_rows(&mut stmt, date)
        }),
        MetricKind::Entity => with_connection(config, "db::fetch_daily_counts_by_kind", |conn| {
            let mut stmt = conn
                .prepare(SELECT_ENTITY_COUNTS_FOR_DAY)
                .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
            collect_key_count_rows(&mut stmt, date)
        }),
        MetricKind::Topic => with_connection(config, "db::fetch_daily_counts_by_kind", |conn| {
            let mut stmt = conn
                .prepare(SELECT_TOPIC_SCORES_FOR_DAY)
                .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
            let rows = stmt
                .query_map(params![date], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                    ))
                })
                .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r.map_err(db_err("db::fetch_daily_counts_by_kind"))?);
            }
            Ok(out)
        }),
        MetricKind::Publication => with_connection(config, "db::fetch_daily_counts_by_kind", |conn| {
            let mut stmt = conn
                .prepare(SELECT_SOURCE_URLS_FOR_DAY)
                .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
            let rows = stmt
                .query_map(params![date], |row| row.get::<_, Option<String>>(0))
                .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
            let mut counts: HashMap<String, i64> = HashMap::new();
            for r in rows {
                let Some(source_url) = r.map_err(db_err("db::fetch_daily_counts_by_kind"))? else {
                    continue;
                };
                let key = url::Url::parse(&source_url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or(source_url);
                *counts.entry(key).or_insert(0) += 1;
            }
            Ok(counts.into_iter().map(|(k, n)| (k, n, None)).collect())
        }),
    }
}

fn collect_key_count_rows(
    stmt: &mut duckdb::Statement,
    date: NaiveDate,
) -> Result<Vec<(String, i64, Option<f64>)>> {
    let rows = stmt
        .query_map(params![date], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(db_err("db::fetch_daily_counts_by_kind"))?;
    let mut out = Vec::new();
    for r in rows {
        let (key, count) = r.map_err(db_err("db::fetch_daily_counts_by_kind"))?;
        out.push((key, count, None));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceType;

    fn sample_article(content_hash: &str) -> Article {
        Article {
            id: Some(1),
            title: "Title".to_string(),
            content: "Content".to_string(),
            content_hash: content_hash.to_string(),
            source_type: SourceType::Html,
            url: None,
            source_url: None,
            source_file: None,
            page_number: None,
            column_number: None,
            section: None,
            author: None,
            tags: vec!["a".to_string()],
            word_count: 2,
            date_published: None,
            date_extracted: Utc::now(),
            date_created: Some(Utc::now()),
            date_updated: Some(Utc::now()),
            processing_status: ProcessingStatus::Extracted,
            raw_html: None,
            metadata: HashMap::new(),
            location_name: None,
            location_lat: None,
            location_lon: None,
            event_dates: Vec::new(),
        }
    }

    #[test]
    fn merge_unions_tags_and_fills_null_scalars() {
        let mut existing = sample_article("h1");
        existing.tags = vec!["a".to_string()];
        existing.section = None;

        let mut incoming = sample_article("h1");
        incoming.tags = vec!["b".to_string(), "a".to_string()];
        incoming.section = Some("Sports".to_string());

        let merged = merge_article(&existing, &incoming);
        assert_eq!(merged.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(merged.section, Some("Sports".to_string()));
    }

    #[test]
    fn merge_never_nulls_an_existing_nonnull_scalar() {
        let mut existing = sample_article("h2");
        existing.section = Some("News".to_string());

        let mut incoming = sample_article("h2");
        incoming.section = None;

        let merged = merge_article(&existing, &incoming);
        assert_eq!(merged.section, Some("News".to_string()));
    }
}

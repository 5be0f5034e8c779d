// DDL

pub const CREATE_ARTICLES_TABLE: &str = r#"
CREATE SEQUENCE IF NOT EXISTS articles_id_seq;
CREATE TABLE IF NOT EXISTS articles (
    id BIGINT PRIMARY KEY DEFAULT nextval('articles_id_seq'),
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL UNIQUE,
    source_type TEXT NOT NULL,
    url TEXT,
    source_url TEXT,
    source_file TEXT,
    page_number INTEGER,
    column_number INTEGER,
    section TEXT,
    author TEXT,
    tags TEXT,
    word_count INTEGER NOT NULL,
    date_published TIMESTAMP,
    date_extracted TIMESTAMP NOT NULL,
    date_created TIMESTAMP NOT NULL,
    date_updated TIMESTAMP NOT NULL,
    processing_status TEXT NOT NULL,
    raw_html TEXT,
    metadata TEXT,
    location_name TEXT,
    location_lat DOUBLE,
    location_lon DOUBLE,
    event_dates TEXT
);
"#;

pub const CREATE_SUMMARIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS summaries (
    article_id BIGINT NOT NULL,
    summary_type TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    model_used TEXT NOT NULL,
    tokens_used INTEGER,
    generation_time_ms BIGINT,
    key_points TEXT,
    sentiment TEXT,
    confidence_score DOUBLE,
    PRIMARY KEY (article_id, summary_type)
);
"#;

pub const CREATE_ARTICLE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS article_events (
    article_id BIGINT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP,
    location_name TEXT,
    location_meta TEXT
);
"#;

pub const CREATE_PROCESSING_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS processing_history (
    date_processed TIMESTAMP NOT NULL,
    source_type TEXT NOT NULL,
    source_identifier TEXT NOT NULL,
    articles_found INTEGER NOT NULL DEFAULT 0,
    articles_new INTEGER NOT NULL DEFAULT 0,
    articles_duplicate INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_message TEXT,
    processing_time_ms BIGINT,
    PRIMARY KEY (date_processed, source_type, source_identifier)
);
"#;

pub const CREATE_ARTICLE_TAGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS article_tags (
    article_id BIGINT NOT NULL,
    tag TEXT NOT NULL,
    PRIMARY KEY (article_id, tag)
);
"#;

pub const CREATE_ENTITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    name TEXT PRIMARY KEY,
    entity_type TEXT
);
"#;

pub const CREATE_ARTICLE_ENTITIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS article_entities (
    article_id BIGINT NOT NULL,
    entity_name TEXT NOT NULL,
    PRIMARY KEY (article_id, entity_name)
);
"#;

pub const CREATE_TOPICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS topics (
    name TEXT PRIMARY KEY
);
"#;

pub const CREATE_ARTICLE_TOPICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS article_topics (
    article_id BIGINT NOT NULL,
    topic_name TEXT NOT NULL,
    score DOUBLE NOT NULL DEFAULT 0.0,
    PRIMARY KEY (article_id, topic_name)
);
"#;

pub const CREATE_DAILY_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_metrics (
    metric_date DATE NOT NULL,
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    count BIGINT NOT NULL,
    sum_score DOUBLE,
    PRIMARY KEY (metric_date, kind, key)
);
"#;

pub const CREATE_TRENDING_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS trending_items (
    metric_date DATE NOT NULL,
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    score DOUBLE NOT NULL,
    zscore DOUBLE NOT NULL,
    delta DOUBLE NOT NULL,
    win_size INTEGER NOT NULL,
    details TEXT,
    PRIMARY KEY (metric_date, kind, key)
);
"#;

pub const CREATE_TREND_FORECASTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS trend_forecasts (
    metric_date DATE NOT NULL,
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    horizon_day INTEGER NOT NULL,
    yhat DOUBLE NOT NULL,
    generated_at TIMESTAMP NOT NULL,
    PRIMARY KEY (metric_date, kind, key, horizon_day)
);
"#;

pub const CREATE_OAUTH_TOKENS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS oauth_tokens (
    provider TEXT NOT NULL,
    account TEXT NOT NULL,
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    scope TEXT,
    expires_at TIMESTAMP,
    PRIMARY KEY (provider, account)
);
"#;

pub const ALL_TABLE_DDL: &[&str] = &[
    CREATE_ARTICLES_TABLE,
    CREATE_SUMMARIES_TABLE,
    CREATE_ARTICLE_EVENTS_TABLE,
    CREATE_PROCESSING_HISTORY_TABLE,
    CREATE_ARTICLE_TAGS_TABLE,
    CREATE_ENTITIES_TABLE,
    CREATE_ARTICLE_ENTITIES_TABLE,
    CREATE_TOPICS_TABLE,
    CREATE_ARTICLE_TOPICS_TABLE,
    CREATE_DAILY_METRICS_TABLE,
    CREATE_TRENDING_ITEMS_TABLE,
    CREATE_TREND_FORECASTS_TABLE,
    CREATE_OAUTH_TOKENS_TABLE,
];

/// DuckDB's bundled full-text-search extension, loaded once at startup (§6).
pub const LOAD_FTS_EXTENSION: &str = "INSTALL fts; LOAD fts;";

pub const CREATE_FTS_INDEX: &str = r#"
PRAGMA create_fts_index('articles', 'id', 'title', 'content', overwrite=1);
"#;

// DML — articles

pub const INSERT_ARTICLE: &str = r#"
INSERT INTO articles
(title, content, content_hash, source_type, url, source_url, source_file,
 page_number, column_number, section, author, tags, word_count,
 date_published, date_extracted, date_created, date_updated,
 processing_status, raw_html, metadata, location_name, location_lat,
 location_lon, event_dates)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
RETURNING id;
"#;

pub const GET_ARTICLE_BY_CONTENT_HASH: &str = r#"
SELECT id, title, content, content_hash, source_type, url, source_url,
       source_file, page_number, column_number, section, author, tags,
       word_count, date_published, date_extracted, date_created,
       date_updated, processing_status, raw_html, metadata, location_name,
       location_lat, location_lon, event_dates
FROM articles WHERE content_hash = ?;
"#;

pub const UPDATE_ARTICLE_MERGE: &str = r#"
UPDATE articles SET
    section = ?, author = ?, word_count = ?, page_number = ?,
    column_number = ?, date_published = ?, raw_html = ?, source_file = ?,
    source_url = ?, location_name = ?, location_lat = ?, location_lon = ?,
    tags = ?, metadata = ?, event_dates = ?, date_updated = ?
WHERE id = ?;
"#;

pub const TOUCH_ARTICLE: &str = r#"
UPDATE articles SET date_updated = ? WHERE id = ?;
"#;

pub const SET_ARTICLE_STATUS: &str = r#"
UPDATE articles SET processing_status = ?, date_updated = ? WHERE id = ?;
"#;

pub const SELECT_EXTRACTED_ARTICLES_BATCH: &str = r#"
SELECT id, title, content, content_hash, source_type, url, source_url,
       source_file, page_number, column_number, section, author, tags,
       word_count, date_published, date_extracted, date_created,
       date_updated, processing_status, raw_html, metadata, location_name,
       location_lat, location_lon, event_dates
FROM articles
WHERE processing_status = 'extracted'
ORDER BY date_extracted ASC
LIMIT ?;
"#;

pub const SELECT_ARTICLES_FOR_VECTOR_INDEX: &str = r#"
SELECT a.id, a.title, a.section, a.content, a.date_published, a.url, s.summary_text
FROM articles a
LEFT JOIN summaries s ON s.article_id = a.id AND s.summary_type = 'brief'
WHERE a.processing_status = 'summarized'
  AND a.date_updated >= ?;
"#;

// DML — summaries

pub const UPSERT_SUMMARY: &str = r#"
INSERT INTO summaries
(article_id, summary_type, summary_text, model_used, tokens_used,
 generation_time_ms, key_points, sentiment, confidence_score)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (article_id, summary_type) DO UPDATE SET
    summary_text = excluded.summary_text,
    model_used = excluded.model_used,
    tokens_used = excluded.tokens_used,
    generation_time_ms = excluded.generation_time_ms,
    key_points = excluded.key_points,
    sentiment = excluded.sentiment,
    confidence_score = excluded.confidence_score;
"#;

// DML — article_events (delete-then-insert per article)

pub const DELETE_ARTICLE_EVENTS: &str = r#"
DELETE FROM article_events WHERE article_id = ?;
"#;

pub const INSERT_ARTICLE_EVENT: &str = r#"
INSERT INTO article_events
(article_id, title, description, start_time, end_time, location_name, location_meta)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#;

// DML — processing_history

pub const UPSERT_PROCESSING_HISTORY: &str = r#"
INSERT INTO processing_history
(date_processed, source_type, source_identifier, articles_found,
 articles_new, articles_duplicate, status, error_message, processing_time_ms)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (date_processed, source_type, source_identifier) DO UPDATE SET
    articles_found = processing_history.articles_found + excluded.articles_found,
    articles_new = processing_history.articles_new + excluded.articles_new,
    articles_duplicate = processing_history.articles_duplicate + excluded.articles_duplicate,
    status = excluded.status,
    error_message = excluded.error_message,
    processing_time_ms = excluded.processing_time_ms;
"#;

// DML — tags / entities / topics (taxonomy writes from the Summarizer)

pub const UPSERT_ARTICLE_TAG: &str = r#"
INSERT INTO article_tags (article_id, tag) VALUES (?, ?)
ON CONFLICT (article_id, tag) DO NOTHING;
"#;

pub const UPSERT_ENTITY: &str = r#"
INSERT INTO entities (name, entity_type) VALUES (?, ?)
ON CONFLICT (name) DO UPDATE SET entity_type = excluded.entity_type;
"#;

pub const UPSERT_ARTICLE_ENTITY: &str = r#"
INSERT INTO article_entities (article_id, entity_name) VALUES (?, ?)
ON CONFLICT (article_id, entity_name) DO NOTHING;
"#;

pub const UPSERT_TOPIC: &str = r#"
INSERT INTO topics (name) VALUES (?)
ON CONFLICT (name) DO NOTHING;
"#;

pub const UPSERT_ARTICLE_TOPIC: &str = r#"
INSERT INTO article_topics (article_id, topic_name, score) VALUES (?, ?, ?)
ON CONFLICT (article_id, topic_name) DO UPDATE SET score = excluded.score;
"#;

// DML — Analytics aggregation sources (§4.6)

pub const SELECT_SECTION_COUNTS_FOR_DAY: &str = r#"
SELECT COALESCE(section, 'General') AS key, COUNT(*) AS n
FROM articles
WHERE CAST(date_extracted AS DATE) = ?
GROUP BY key;
"#;

pub const SELECT_SOURCE_URLS_FOR_DAY: &str = r#"
SELECT source_url FROM articles
WHERE CAST(date_extracted AS DATE) = ? AND source_url IS NOT NULL;
"#;

pub const SELECT_TAG_COUNTS_FOR_DAY: &str = r#"
SELECT t.tag AS key, COUNT(*) AS n
FROM article_tags t
JOIN articles a ON a.id = t.article_id
WHERE CAST(a.date_extracted AS DATE) = ?
GROUP BY key;
"#;

pub const SELECT_TOPIC_SCORES_FOR_DAY: &str = r#"
SELECT t.topic_name AS key, COUNT(*) AS n, SUM(t.score) AS total_score
FROM article_topics t
JOIN articles a ON a.id = t.article_id
WHERE CAST(a.date_extracted AS DATE) = ?
GROUP BY key;
"#;

pub const SELECT_ENTITY_COUNTS_FOR_DAY: &str = r#"
SELECT e.entity_name AS key, COUNT(*) AS n
FROM article_entities e
JOIN articles a ON a.id = e.article_id
WHERE CAST(a.date_extracted AS DATE) = ?
GROUP BY key;
"#;

// DML — daily_metrics / trending_items / trend_forecasts

pub const UPSERT_DAILY_METRIC: &str = r#"
INSERT INTO daily_metrics (metric_date, kind, key, count, sum_score)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (metric_date, kind, key) DO UPDATE SET
    count = excluded.count,
    sum_score = excluded.sum_score;
"#;

pub const SELECT_TRAILING_DAILY_METRICS: &str = r#"
SELECT metric_date, key, count FROM daily_metrics
WHERE kind = ? AND metric_date >= ? AND metric_date < ?
ORDER BY metric_date ASC;
"#;

pub const UPSERT_TRENDING_ITEM: &str = r#"
INSERT INTO trending_items
(metric_date, kind, key, score, zscore, delta, win_size, details)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (metric_date, kind, key) DO UPDATE SET
    score = excluded.score,
    zscore = excluded.zscore,
    delta = excluded.delta,
    win_size = excluded.win_size,
    details = excluded.details;
"#;

pub const UPSERT_TREND_FORECAST: &str = r#"
INSERT INTO trend_forecasts
(metric_date, kind, key, horizon_day, yhat, generated_at)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (metric_date, kind, key, horizon_day) DO UPDATE SET
    yhat = excluded.yhat,
    generated_at = excluded.generated_at;
"#;

// DML — oauth_tokens

pub const UPSERT_OAUTH_TOKEN: &str = r#"
INSERT INTO oauth_tokens (provider, account, access_token, refresh_token, scope, expires_at)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (provider, account) DO UPDATE SET
    access_token = excluded.access_token,
    refresh_token = excluded.refresh_token,
    scope = excluded.scope,
    expires_at = excluded.expires_at;
"#;

pub const GET_OAUTH_TOKEN: &str = r#"
SELECT provider, account, access_token, refresh_token, scope, expires_at
FROM oauth_tokens WHERE provider = ? AND account = ?;
"#;

// Maintenance — §9's open question: parameterized consistently, unlike the
// original's string-interpolated INTERVAL literal.

pub const CLEANUP_OLD_ARTICLE_EVENTS: &str = r#"
DELETE FROM article_events
WHERE article_id IN (
    SELECT id FROM articles WHERE date_created < CURRENT_TIMESTAMP - CAST(? || ' days' AS INTERVAL)
);
"#;

pub const GET_PROCESSING_STATS_SINCE: &str = r#"
SELECT source_type, SUM(articles_found), SUM(articles_new), SUM(articles_duplicate)
FROM processing_history
WHERE date_processed >= CURRENT_TIMESTAMP - CAST(? || ' days' AS INTERVAL)
GROUP BY source_type;
"#;

use crate::config::Config;
use crate::db;
use crate::error::{BatchOutcome, PipelineError, Result};
use crate::types::{Article, ProcessingStatus, SourceType};
use crate::utils::{log_step, log_success, md5_hex};
use chrono::{DateTime, Utc};
use serde_json::Value;

const BASE_URL: &str = "https://api.weather.gov/alerts/active";
const DEFAULT_ZONES: &[&str] = &["VAZ022", "VAZ023", "VAZ024"];

fn zone_list(config: &Config) -> Vec<String> {
    // No dedicated NWS_ZONES Config field; fall back to the same seed zones
    // the original uses when its env override is unset.
    let _ = config;
    DEFAULT_ZONES.iter().map(|s| s.to_string()).collect()
}

fn feature_to_article(feature: &Value) -> Option<Article> {
    let props = feature.get("properties")?;
    let title = props
        .get("headline")
        .and_then(Value::as_str)
        .or_else(|| props.get("event").and_then(Value::as_str))
        .unwrap_or("NWS Alert")
        .to_string();

    let url = props
        .get("@id")
        .and_then(Value::as_str)
        .or_else(|| feature.get("id").and_then(Value::as_str))
        .map(str::to_string);

    let issued = props
        .get("onset")
        .or_else(|| props.get("effective"))
        .or_else(|| props.get("sent"))
        .and_then(Value::as_str);
    let expires = props
        .get("expires")
        .or_else(|| props.get("ends"))
        .and_then(Value::as_str);

    let date_published = issued
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let mut lines = Vec::new();
    if let Some(event) = props.get("event").and_then(Value::as_str) {
        lines.push(format!("Event: {event}"));
    }
    if let Some(area) = props.get("areaDesc").and_then(Value::as_str) {
        lines.push(format!("Area: {area}"));
    }
    let impact_bits: Vec<String> = [
        props.get("severity").and_then(Value::as_str).map(|v| format!("Severity: {v}")),
        props.get("urgency").and_then(Value::as_str).map(|v| format!("Urgency: {v}")),
        props.get("certainty").and_then(Value::as_str).map(|v| format!("Certainty: {v}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !impact_bits.is_empty() {
        lines.push(impact_bits.join("; "));
    }
    if let Some(issued) = issued {
        lines.push(format!("Issued: {issued}"));
    }
    if let Some(expires) = expires {
        lines.push(format!("Expires: {expires}"));
    }

    let description = props.get("description").and_then(Value::as_str).unwrap_or("").trim();
    let instruction = props.get("instruction").and_then(Value::as_str).unwrap_or("").trim();
    if !description.is_empty() {
        lines.push(String::new());
        lines.push(description.to_string());
    }
    if !instruction.is_empty() {
        lines.push(String::new());
        lines.push(format!("Instructions: {instruction}"));
    }
    let content = lines.join("\n").trim().to_string();

    let content_hash = md5_hex(&format!("{title}{content}"));

    let mut metadata = std::collections::HashMap::new();
    for key in ["severity", "urgency", "certainty", "event"] {
        if let Some(v) = props.get(key) {
            metadata.insert(key.to_string(), v.clone());
        }
    }
    if let Some(zones) = props.get("affectedZones") {
        metadata.insert("zones".to_string(), zones.clone());
    }

    let (location_name, location_lat, location_lon) = centroid_from_geometry(feature);

    let event_dates = match (date_published, expires.and_then(|s| DateTime::parse_from_rfc3339(s).ok())) {
        (Some(start), Some(end)) => vec![crate::types::ArticleEvent {
            title: title.clone(),
            description: None,
            start_time: start,
            end_time: Some(end.with_timezone(&Utc)),
            location_name: location_name.clone(),
            location_meta: None,
        }],
        _ => Vec::new(),
    };

    Some(Article {
        id: None,
        title,
        content: content.clone(),
        content_hash,
        source_type: SourceType::Osint,
        url: url.clone(),
        source_url: url,
        source_file: None,
        page_number: None,
        column_number: None,
        section: Some("NWS Alerts".to_string()),
        author: None,
        tags: Vec::new(),
        word_count: Article::word_count_of(&content),
        date_published,
        date_extracted: Utc::now(),
        date_created: None,
        date_updated: None,
        processing_status: ProcessingStatus::Extracted,
        raw_html: None,
        metadata,
        location_name,
        location_lat,
        location_lon,
        event_dates,
    })
}

/// NWS GeoJSON features carry a polygon, not a point; the alert's affected
/// zone centroid is approximated as the mean of the outer ring's vertices,
/// good enough for a map pin (§4.8).
fn centroid_from_geometry(feature: &Value) -> (Option<String>, Option<f64>, Option<f64>) {
    let area = feature
        .get("properties")
        .and_then(|p| p.get("areaDesc"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let ring = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(|c| c.get(0))
        .and_then(Value::as_array);

    let Some(ring) = ring else {
        return (area, None, None);
    };

    let mut sum_lon = 0.0;
    let mut sum_lat = 0.0;
    let mut count = 0.0;
    for point in ring {
        if let Some(pair) = point.as_array() {
            if let (Some(lon), Some(lat)) = (pair.first().and_then(Value::as_f64), pair.get(1).and_then(Value::as_f64)) {
                sum_lon += lon;
                sum_lat += lat;
                count += 1.0;
            }
        }
    }
    if count == 0.0 {
        (area, None, None)
    } else {
        (area, Some(sum_lat / count), Some(sum_lon / count))
    }
}

/// §4.8: unauthenticated `GET /alerts/active?zone=…` per configured zone,
/// each feature converted into an `Article` and routed through the same
/// dedup path as the Extractor.
pub async fn ingest(config: &Config) -> Result<BatchOutcome<Article>> {
    let client = reqwest::Client::new();
    let mut outcome = BatchOutcome::new();

    for zone in zone_list(config) {
        log_step("🌩️", &format!("Fetching NWS alerts for zone {zone}..."));
        let response = client
            .get(BASE_URL)
            .header("Accept", "application/geo+json")
            .header("User-Agent", "newsroom-pipeline/0.1")
            .query(&[("zone", zone.as_str()), ("status", "actual"), ("message_type", "alert")])
            .send()
            .await;

        let body: Value = match response {
            Ok(resp) if resp.status().is_success() => match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    outcome.record_err(zone.clone(), PipelineError::parse("ingest::nws::ingest", e.to_string()));
                    continue;
                }
            },
            Ok(resp) => {
                outcome.record_err(
                    zone.clone(),
                    PipelineError::rate_limited("ingest::nws::ingest", format!("HTTP {}", resp.status())),
                );
                continue;
            }
            Err(e) => {
                outcome.record_err(zone.clone(), PipelineError::transient("ingest::nws::ingest", e));
                continue;
            }
        };

        let features = body.get("features").and_then(Value::as_array).cloned().unwrap_or_default();
        for feature in &features {
            if let Some(article) = feature_to_article(feature) {
                match db::upsert_article(config, &article) {
                    Ok(_) => outcome.record_ok(article),
                    Err(e) => outcome.record_err(zone.clone(), e),
                }
            }
        }
    }

    log_success(&format!(
        "NWS ingest complete: {} alert(s) ingested, {} failure(s).",
        outcome.succeeded.len(),
        outcome.failed.len()
    ));
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_to_article_prefers_headline_over_event() {
        let feature = serde_json::json!({
            "id": "https://api.weather.gov/alerts/1",
            "properties": {
                "headline": "Flood Warning issued",
                "event": "Flood Warning",
                "areaDesc": "Smyth County",
                "severity": "Severe",
                "description": "Heavy rain expected.",
                "onset": "2026-07-28T10:00:00+00:00",
                "expires": "2026-07-29T10:00:00+00:00",
            }
        });
        let article = feature_to_article(&feature).unwrap();
        assert_eq!(article.title, "Flood Warning issued");
        assert_eq!(article.source_type, SourceType::Osint);
        assert!(article.content.contains("Heavy rain"));
        assert_eq!(article.event_dates.len(), 1);
    }

    #[test]
    fn feature_without_properties_is_skipped() {
        let feature = serde_json::json!({ "id": "x" });
        assert!(feature_to_article(&feature).is_none());
    }
}

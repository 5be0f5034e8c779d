use crate::types::ArticleEvent;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const CONTEXT_WINDOW: usize = 160;
const MAX_CONTEXT_LEN: usize = 220;
const FUTURE_CAP_DAYS: i64 = 180;
const PAST_CAP_DAYS: i64 = 1;
const MAX_EVENTS: usize = 5;

static WEEKDAY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday|Mon|Tue|Wed|Thu|Fri|Sat|Sun)\b").unwrap()
});

static MONTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December|Jan\.?|Feb\.?|Mar\.?|Apr\.?|Jun\.?|Jul\.?|Aug\.?|Sep\.?|Sept\.?|Oct\.?|Nov\.?|Dec\.?)\b").unwrap()
});

static DATE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(0?[1-9]|1[0-2])/(0?[1-9]|[12][0-9]|3[01])/(20\d{2})\b").unwrap()
});

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s?(am|pm|a\.m\.|p\.m\.)\b").unwrap()
});

static LOCATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:at|in|inside|outside|on)\s+([A-Z][^.,;\n]{2,80})").unwrap()
});

static FALLBACK_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bat\s+([^.,;\n]{3,80})").unwrap());
static FALLBACK_IN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bin\s+([^.,;\n]{3,80})").unwrap());
static TRAILING_CONNECTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(and|with|for|featuring)\b.*$").unwrap());
static CURRENCY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s?\d").unwrap());
static AT_OR_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(at|from)\b").unwrap());

/// §4.4.3/§9: the closed keyword set, with the original's duplicated
/// `workshop|class` alternative collapsed — same matches, no redundancy.
static EVENT_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(meeting|meet|festival|concert|workshop|class|clinic|seminar|webinar|ceremony|parade|game|match|tournament|celebration|fundraiser|luncheon|banquet|conference|summit|service|gala|open house|open-house|kickoff|cook-?off|cookoff|trail|race|5k|10k|run|walk|tour|dance|performance|play|screening|market|fair|forum|panel|hearing|camp|drive|lecture|symposium|training)\b",
    )
    .unwrap()
});

/// A month-name-plus-day-plus-year or numeric date-phrase candidate, the
/// Rust stand-in for `dateparser.search.search_dates`'s free-text scan.
static DATE_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December|Jan\.?|Feb\.?|Mar\.?|Apr\.?|Jun\.?|Jul\.?|Aug\.?|Sep\.?|Sept\.?|Oct\.?|Nov\.?|Dec\.?)\s+(\d{1,2})(?:st|nd|rd|th)?,?\s*(\d{4})?",
    )
    .unwrap()
});

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let lower = lower.trim_end_matches('.');
    Some(match lower {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sep" | "sept" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    })
}

/// §4.4.3: extracts candidate calendar events from article text. Favors
/// precision over recall — a conjunction of date/time/keyword signals over
/// a trimmed context window, rather than accepting any date mention.
pub fn extract_events(text: &str, now: DateTime<Utc>) -> Vec<ArticleEvent> {
    let mut events = Vec::new();
    if text.trim().is_empty() {
        return events;
    }
    if text.trim().to_lowercase().starts_with("key points:") {
        return events;
    }

    let future_limit = now + Duration::days(FUTURE_CAP_DAYS);
    let past_limit = now - Duration::days(PAST_CAP_DAYS);

    let mut seen_keys = std::collections::HashSet::new();

    for caps in DATE_PHRASE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let Some(month) = month_number(&caps[1]) else {
            continue;
        };
        let Ok(day) = caps[2].parse::<u32>() else {
            continue;
        };
        let year = match caps.get(3) {
            Some(y) => match y.as_str().parse::<i32>() {
                Ok(y) => y,
                Err(_) => continue,
            },
            None => now.year(),
        };
        if !(2000..=2050).contains(&year) {
            continue;
        }
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };

        let context = extract_context(text, whole.start(), whole.end());
        let ctx = context.trim();
        if ctx.is_empty() {
            continue;
        }

        let dt = match Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap()) {
            chrono::LocalResult::Single(dt) => dt,
            _ => continue,
        };
        if dt > future_limit || dt < past_limit {
            continue;
        }

        let too_long = ctx.len() > MAX_CONTEXT_LEN;
        let has_date_cue =
            WEEKDAY_PATTERN.is_match(ctx) || MONTH_PATTERN.is_match(ctx) || DATE_NUMERIC.is_match(ctx);
        let has_time_or_at = TIME_PATTERN.is_match(ctx) || AT_OR_FROM.is_match(ctx);
        let looks_like_bullets = {
            let lower = ctx.to_lowercase();
            lower.starts_with("key points") || lower.starts_with("sentiment")
        };
        let contains_money = CURRENCY_PATTERN.is_match(ctx);
        let has_keyword = EVENT_KEYWORDS.is_match(ctx);

        if too_long || !has_date_cue || !has_time_or_at || looks_like_bullets || contains_money || !has_keyword {
            continue;
        }

        let location = extract_location(ctx).or_else(|| fallback_location(ctx)).map(|l| sanitize_location(&l));

        let key = (dt.format("%Y-%m-%dT%H:%M").to_string(), ctx.chars().take(80).collect::<String>());
        if !seen_keys.insert(key) {
            continue;
        }

        events.push(ArticleEvent {
            title: derive_title(ctx),
            description: None,
            start_time: dt,
            end_time: None,
            location_name: location,
            location_meta: None,
        });

        if events.len() >= MAX_EVENTS {
            break;
        }
    }

    events
}

pub fn extract_location(text: &str) -> Option<String> {
    LOCATION_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| sanitize_location(m.as_str().trim()))
}

fn fallback_location(text: &str) -> Option<String> {
    FALLBACK_AT
        .captures(text)
        .or_else(|| FALLBACK_IN.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn sanitize_location(raw: &str) -> String {
    let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == ' ' || c == '.' || c == ',' || c == ':' || c == ';');
    let cut = TRAILING_CONNECTOR.replace(trimmed, "").to_string();
    cut.chars().take(120).collect()
}

fn derive_title(context: &str) -> String {
    if context.is_empty() {
        return "Community event".to_string();
    }
    let title = match context.find(". ") {
        Some(idx) => &context[..idx + 1],
        None => context,
    };
    let title = title.trim();
    let title = if title.chars().count() > 160 {
        let truncated: String = title.chars().take(157).collect();
        format!("{truncated}...")
    } else {
        title.to_string()
    };
    if title.is_empty() {
        "Community event".to_string()
    } else {
        title
    }
}

fn extract_context(full_text: &str, match_start: usize, match_end: usize) -> String {
    let start = match_start.saturating_sub(CONTEXT_WINDOW);
    let end = (match_end + CONTEXT_WINDOW).min(full_text.len());
    let start = floor_char_boundary(full_text, start);
    let end = ceil_char_boundary(full_text, end);
    let mut context = full_text[start..end].to_string();

    if let Some(before) = context.rfind(". ") {
        if before > CONTEXT_WINDOW / 2 {
            context = context[before + 2..].to_string();
        }
    }
    if let Some(after) = context.find(". ") {
        if after > match_end.saturating_sub(match_start) {
            context = context[..=after].to_string();
        }
    }
    context
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_key_points_blocks() {
        let now = Utc::now();
        let text = "Key Points: the city council met on March 5, 2026 at 7pm for a meeting.";
        assert!(extract_events(text, now).is_empty());
    }

    #[test]
    fn extracts_event_with_date_time_and_keyword() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let text = "Residents are invited to a community festival on July 15, 2026 at 6pm at Central Park, featuring live music.";
        let events = extract_events(text, now);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].location_name.as_deref(), Some("Central Park"));
    }

    #[test]
    fn drops_events_further_than_180_days_out() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let text = "Join us for a festival on December 31, 2026 at 6pm at the fairgrounds.";
        assert!(extract_events(text, now).is_empty());
    }

    #[test]
    fn drops_lines_with_currency() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
        let text = "Tickets to the July 10, 2026 concert at 7pm at the arena cost $25 and are on sale now.";
        assert!(extract_events(text, now).is_empty());
    }

}

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use scraper::{ElementRef, Html, Selector};

/// §4.4.2: closed set of secondary-article container selectors, tried after
/// the main-article heuristic.
const SECONDARY_SELECTORS: &[&str] = &[
    "article",
    ".article",
    ".post",
    ".news-item",
    ".story",
    "[class*=article]",
    "[class*=story]",
    ".content-item",
];

const MIN_TITLE_LEN: usize = 5;
const MIN_ARTICLE_WORDS: usize = 10;

#[derive(Debug, Clone)]
pub struct ExtractedHtmlArticle {
    pub title: String,
    pub text: String,
    pub date_published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub site_name: Option<String>,
}

/// Main-article extraction: picks the `<article>`/`<main>` candidate with
/// the highest text density (text length relative to tag count), a cheap
/// boilerplate-removal heuristic grounded on `dashflow-webscrape`'s
/// `scraper`-based DOM walking.
pub fn extract_main_article(document: &Html) -> Option<ExtractedHtmlArticle> {
    let candidate_selector = Selector::parse("article, main, [role=main]").ok()?;
    let title_selector = Selector::parse("h1").ok()?;

    let best = document
        .select(&candidate_selector)
        .max_by_key(|el| text_density(el))?;

    let title = best
        .select(&title_selector)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .or_else(|| {
            document
                .select(&title_selector)
                .next()
                .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        })?;

    let text = collapse_whitespace(&best.text().collect::<String>());
    if title.len() < MIN_TITLE_LEN || text.split_whitespace().count() < MIN_ARTICLE_WORDS {
        return None;
    }

    Some(ExtractedHtmlArticle {
        title,
        text,
        date_published: find_published_date(document),
        author: find_author(document),
        tags: find_tags(document),
        site_name: find_site_name(document),
    })
}

/// Secondary scan: every container matching the closed selector set,
/// filtering out elements nested inside an already-seen container to avoid
/// duplicate candidates.
pub fn extract_secondary_articles(document: &Html) -> Vec<ExtractedHtmlArticle> {
    let title_selector = Selector::parse("h1, h2, h3").ok();
    let mut results = Vec::new();
    let mut seen_texts = std::collections::HashSet::new();

    for selector_str in SECONDARY_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        'candidates: for el in document.select(&selector) {
            let text = collapse_whitespace(&el.text().collect::<String>());
            if text.split_whitespace().count() < MIN_ARTICLE_WORDS {
                continue;
            }
            if !seen_texts.insert(text.clone()) {
                continue;
            }
            // Skip elements nested inside any element already accepted as a result.
            for ancestor in el.ancestors() {
                if let Some(ancestor_el) = ElementRef::wrap(ancestor) {
                    let ancestor_text = collapse_whitespace(&ancestor_el.text().collect::<String>());
                    if ancestor_text != text && seen_texts.contains(&ancestor_text) {
                        continue 'candidates;
                    }
                }
            }

            let title = title_selector
                .as_ref()
                .and_then(|sel| el.select(sel).next())
                .map(|t| collapse_whitespace(&t.text().collect::<String>()))
                .unwrap_or_default();
            if title.len() < MIN_TITLE_LEN {
                continue;
            }

            results.push(ExtractedHtmlArticle {
                title,
                text,
                date_published: None,
                author: None,
                tags: Vec::new(),
                site_name: None,
            });
        }
    }

    results
}

fn text_density(el: &ElementRef) -> usize {
    el.text().collect::<String>().len()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn find_author(document: &Html) -> Option<String> {
    let selector = Selector::parse("[rel=author], .author, .byline, [itemprop=author]").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn find_site_name(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[property="og:site_name"]"#).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

fn find_tags(document: &Html) -> Vec<String> {
    let selector = match Selector::parse(".tags a, .tag-list a, [rel=tag]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    document
        .select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Date parsing tries ISO, US, and long-form formats via `chrono` (§4.4.2).
fn find_published_date(document: &Html) -> Option<DateTime<Utc>> {
    let selector = Selector::parse(
        r#"meta[property="article:published_time"], meta[name="date"], time[datetime]"#,
    )
    .ok()?;
    let raw = document.select(&selector).find_map(|el| {
        el.value()
            .attr("content")
            .or_else(|| el.value().attr("datetime"))
            .map(str::to_string)
    })?;
    parse_flexible_datetime(&raw)
}

pub fn parse_flexible_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%m/%d/%Y %H:%M") {
        return Some(DateTime::from_naive_utc_and_offset(ndt, Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Some(DateTime::from_naive_utc_and_offset(d.and_hms_opt(0, 0, 0)?, Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%B %d, %Y") {
        return Some(DateTime::from_naive_utc_and_offset(d.and_hms_opt(0, 0, 0)?, Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_article_requires_title_and_word_floor() {
        let html = r#"<html><body><main><h1>Hi</h1><p>too short</p></main></body></html>"#;
        let document = Html::parse_document(html);
        assert!(extract_main_article(&document).is_none());
    }

    #[test]
    fn main_article_extracts_title_and_text() {
        let words = (0..MIN_ARTICLE_WORDS).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let html = format!(
            r#"<html><body><article><h1>A Real Headline</h1><p>{words}</p></article></body></html>"#
        );
        let document = Html::parse_document(&html);
        let article = extract_main_article(&document).unwrap();
        assert_eq!(article.title, "A Real Headline");
    }

    #[test]
    fn secondary_scan_skips_nested_duplicates() {
        let words = (0..MIN_ARTICLE_WORDS).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let html = format!(
            r#"<html><body><div class="story"><h2>Outer</h2><p>{words}</p>
            <div class="article"><h3>Inner</h3></div></div></body></html>"#
        );
        let document = Html::parse_document(&html);
        let results = extract_secondary_articles(&document);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn flexible_datetime_parses_rfc3339() {
        assert!(parse_flexible_datetime("2026-07-28T10:00:00Z").is_some());
    }

    #[test]
    fn flexible_datetime_parses_us_format() {
        assert!(parse_flexible_datetime("07/28/2026").is_some());
    }
}

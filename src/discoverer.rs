use crate::error::{PipelineError, Result};
use crate::types::{EditionPage, PageFormat};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};

/// Result of a `PageFetcher` fetch (§4.2/§9): the Discoverer and Downloader
/// share this capability so discovery strategies are pure functions over
/// `body`, independent of whatever actually performed the network fetch.
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    pub final_url: String,
}

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

static PAGE_NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)page\s*([0-9]+)").unwrap(),
        Regex::new(r"(?i)\bp([0-9]{1,3})\b").unwrap(),
        Regex::new(r"([0-9]+)\s*$").unwrap(),
    ]
});

static TOTAL_PAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)of\s+([0-9]+)").unwrap(),
        Regex::new(r"/\s*([0-9]+)").unwrap(),
        Regex::new(r"(?i)total:\s*([0-9]+)").unwrap(),
        Regex::new(r"(?i)([0-9]+)\s*pages?").unwrap(),
        Regex::new(r"(?i)page\s*[0-9]+\s*of\s*([0-9]+)").unwrap(),
    ]
});

const SECTION_ALIASES: &[(&str, &str)] = &[
    ("a1", "Front Page"),
    ("front", "Front Page"),
    ("sports", "Sports"),
    ("sport", "Sports"),
    ("opinion", "Opinion"),
    ("editorial", "Opinion"),
    ("business", "Business"),
    ("biz", "Business"),
    ("lifestyle", "Lifestyle"),
    ("life", "Lifestyle"),
    ("obituaries", "Obituaries"),
    ("classifieds", "Classifieds"),
];

/// Normalizes a raw section label to a canonical one via the alias table,
/// falling back to "General" (§3's Article.section default).
pub fn normalize_section(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    for (alias, canonical) in SECTION_ALIASES {
        if lower == *alias {
            return canonical.to_string();
        }
    }
    if lower.is_empty() {
        "General".to_string()
    } else {
        raw.trim().to_string()
    }
}

pub fn parse_page_number(text: &str) -> Option<i32> {
    for pattern in PAGE_NUMBER_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                if let Ok(n) = m.as_str().parse::<i32>() {
                    return Some(n);
                }
            }
        }
    }
    None
}

pub fn parse_format_from_url(url: &str) -> PageFormat {
    if url.to_lowercase().ends_with(".pdf") {
        PageFormat::Pdf
    } else {
        PageFormat::Html
    }
}

/// Publication alias table mapping a human-entered name to a site slug.
/// Falls back to a default publication when the name is unrecognized.
pub struct PublicationResolver {
    aliases: HashMap<String, String>,
    default_slug: String,
}

impl PublicationResolver {
    pub fn new(aliases: HashMap<String, String>, default_slug: impl Into<String>) -> Self {
        Self {
            aliases,
            default_slug: default_slug.into(),
        }
    }

    pub fn resolve(&self, publication: &str) -> String {
        self.aliases
            .get(&publication.to_lowercase())
            .cloned()
            .unwrap_or_else(|| self.default_slug.clone())
    }
}

/// Discovers an edition's pages for `(date, publication)` by trying each
/// strategy in priority order and stopping at the first that yields ≥1
/// page (§4.2). Strategies (a)-(c) and (e) are pure HTML-parsing passes over
/// a fetched index page; (d) issues one further fetch to recurse into a
/// viewer iframe; (f) is the no-page-found fallback.
pub struct EditionDiscoverer<F: PageFetcher> {
    fetcher: F,
    resolver: PublicationResolver,
}

impl<F: PageFetcher> EditionDiscoverer<F> {
    pub fn new(fetcher: F, resolver: PublicationResolver) -> Self {
        Self { fetcher, resolver }
    }

    pub async fn discover(&self, date: NaiveDate, publication: &str) -> Result<Vec<EditionPage>> {
        let slug = self.resolver.resolve(publication);
        let index_url = format!(
            "https://{}.example/editions/{}",
            slug,
            date.format("%Y-%m-%d")
        );
        let fetched = self.fetcher.fetch(&index_url).await?;
        if fetched.status >= 400 {
            return Err(PipelineError::Fatal {
                context: "discoverer::discover".to_string(),
                detail: format!("index fetch for {index_url} returned HTTP {}", fetched.status),
            });
        }

        let pages = strategy_index_list(&fetched.body);
        let pages = if pages.is_empty() {
            strategy_pdf_anchor_harvest(&fetched.body)
        } else {
            pages
        };
        let pages = if pages.is_empty() {
            strategy_thumbnail_grid(&fetched.body)
        } else {
            pages
        };
        let pages = if pages.is_empty() {
            self.strategy_viewer_iframe(&fetched.body, &index_url).await?
        } else {
            pages
        };
        let pages = if pages.is_empty() {
            strategy_page_count_synthesis(&fetched.body, &index_url)
        } else {
            pages
        };
        let pages = if pages.is_empty() {
            strategy_single_page_fallback(&fetched.final_url)
        } else {
            pages
        };

        Ok(dedup_by_url(pages))
    }

    /// Strategy (d): the edition viewer is sometimes embedded in an iframe
    /// rather than rendered inline. Fetches the iframe's `src` and re-scans
    /// that document for PageSuite-viewer page items.
    async fn strategy_viewer_iframe(&self, body: &str, base_url: &str) -> Result<Vec<EditionPage>> {
        let document = Html::parse_document(body);
        let Ok(selector) =
            Selector::parse("iframe[src*=pagesuite], iframe[src*=edition], iframe[id*=viewer]")
        else {
            return Ok(Vec::new());
        };
        let Some(iframe_src) = document.select(&selector).next().and_then(|el| el.value().attr("src")) else {
            return Ok(Vec::new());
        };

        let iframe_url = resolve_url(base_url, iframe_src);
        let fetched = self.fetcher.fetch(&iframe_url).await?;
        Ok(strategy_pagesuite_viewer_items(&fetched.body, base_url))
    }
}

/// Strategy (a): index-list anchor parsing of "Page A1"-style links.
fn strategy_index_list(body: &str) -> Vec<EditionPage> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("a[href]").unwrap();
    let page_link_text = Regex::new(r"(?i)page\s*[a-z0-9]+").unwrap();

    document
        .select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            let text = el.text().collect::<String>();
            if !page_link_text.is_match(&text) {
                return None;
            }
            Some(EditionPage {
                url: href.to_string(),
                page_number: parse_page_number(&text),
                section: None,
                format: parse_format_from_url(href),
                title: Some(text.trim().to_string()),
            })
        })
        .collect()
}

/// Strategy (b): PDF-download anchor harvest — any `<a>` pointing at a
/// `.pdf` is treated as a candidate page when strategy (a) found nothing.
fn strategy_pdf_anchor_harvest(body: &str) -> Vec<EditionPage> {
    let document = Html::parse_document(body);
    let selector = Selector::parse("a[href]").unwrap();

    document
        .select(&selector)
        .filter_map(|el| {
            let href = el.value().attr("href")?;
            if !href.to_lowercase().ends_with(".pdf") {
                return None;
            }
            let text = el.text().collect::<String>();
            Some(EditionPage {
                url: href.to_string(),
                page_number: parse_page_number(&text).or_else(|| parse_page_number(href)),
                section: None,
                format: PageFormat::Pdf,
                title: Some(text.trim().to_string()),
            })
        })
        .collect()
}

/// Strategy (c): thumbnail-grid parsing. Each thumbnail's enclosing `<a>`
/// supplies the page URL; lacking that, a `data-page`/`data-page-id`
/// attribute or the thumbnail `src` itself is used to synthesize one.
fn strategy_thumbnail_grid(body: &str) -> Vec<EditionPage> {
    let document = Html::parse_document(body);
    let Ok(selector) = Selector::parse(
        "img[class*=thumb], img[class*=page], div[class*=thumb] img, \
         div[class*='page-thumb'] img, .page-thumbnail img, .edition-page img",
    ) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|thumb| {
            let href = thumb
                .ancestors()
                .find_map(|node| ElementRef::wrap(node).filter(|el| el.value().name() == "a"))
                .and_then(|a| a.value().attr("href").map(str::to_string))
                .or_else(|| {
                    thumb
                        .value()
                        .attr("data-page")
                        .or_else(|| thumb.value().attr("data-page-id"))
                        .map(|id| format!("download/page_{id}.pdf"))
                })
                .or_else(|| {
                    thumb.value().attr("src").map(|src| {
                        src.replace("/thumb/", "/pdf/")
                            .replace(".jpg", ".pdf")
                            .replace(".png", ".pdf")
                    })
                })?;

            let alt = thumb.value().attr("alt").unwrap_or("");
            let title = thumb.value().attr("title").unwrap_or("");
            let combined = format!("{alt} {title}");

            Some(EditionPage {
                page_number: parse_page_number(&combined).or_else(|| parse_page_number(&href)),
                section: None,
                format: parse_format_from_url(&href),
                title: if alt.is_empty() { None } else { Some(alt.to_string()) },
                url: href,
            })
        })
        .collect()
}

/// Shared by strategy (d): once the viewer iframe's own document is
/// fetched, its page items follow a distinct, narrower selector set from
/// the outer index page's.
fn strategy_pagesuite_viewer_items(body: &str, base_url: &str) -> Vec<EditionPage> {
    let document = Html::parse_document(body);
    let Ok(selector) =
        Selector::parse(".page-item, .page-tile, .edition-page-item, [data-page-number], [data-page-id]")
    else {
        return Vec::new();
    };
    let Ok(link_selector) = Selector::parse("a[download], a[href*='.pdf']") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .enumerate()
        .map(|(i, item)| {
            let page_number = item
                .value()
                .attr("data-page-number")
                .or_else(|| item.value().attr("data-page"))
                .and_then(|s| s.parse::<i32>().ok())
                .or_else(|| parse_page_number(&item.text().collect::<String>()))
                .unwrap_or((i + 1) as i32);

            let href = item
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| resolve_url(base_url, href))
                .unwrap_or_else(|| format!("{}download/page_{page_number}.pdf", ensure_trailing_slash(base_url)));

            EditionPage {
                page_number: Some(page_number),
                section: None,
                format: parse_format_from_url(&href),
                title: None,
                url: href,
            }
        })
        .collect()
}

/// Strategy (e): reads a navigation element's total-page-count text and
/// synthesizes one PDF download URL per page number via the site's common
/// `download/page_N.pdf` pattern.
fn strategy_page_count_synthesis(body: &str, base_url: &str) -> Vec<EditionPage> {
    let document = Html::parse_document(body);
    let Ok(selector) =
        Selector::parse("[class*='page-count'], [class*='total-pages'], [data-total-pages], .navigation-info")
    else {
        return Vec::new();
    };
    let Some(text) = document.select(&selector).next().map(|el| el.text().collect::<String>()) else {
        return Vec::new();
    };
    let Some(total) = extract_total_pages(&text) else {
        return Vec::new();
    };

    (1..=total)
        .map(|n| EditionPage {
            url: format!("{}download/page_{n}.pdf", ensure_trailing_slash(base_url)),
            page_number: Some(n as i32),
            section: None,
            format: PageFormat::Pdf,
            title: None,
        })
        .collect()
}

fn extract_total_pages(text: &str) -> Option<u32> {
    for pattern in TOTAL_PAGE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Some(m) = caps.get(1) {
                if let Ok(n) = m.as_str().parse::<u32>() {
                    return Some(n);
                }
            }
        }
    }
    Regex::new(r"[0-9]+")
        .unwrap()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .max()
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Resolves a possibly-relative href against a base URL, matching the
/// original's scheme-relative / absolute / site-root / relative cases.
fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("//") {
        return format!("https:{href}");
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(joined) = base.join(href) {
            return joined.to_string();
        }
    }
    href.to_string()
}

/// Strategy (f): single-page fallback when every other strategy yields
/// nothing — the index URL itself becomes the one page of the edition.
fn strategy_single_page_fallback(final_url: &str) -> Vec<EditionPage> {
    vec![EditionPage {
        url: final_url.to_string(),
        page_number: Some(1),
        section: None,
        format: parse_format_from_url(final_url),
        title: None,
    }]
}

/// Within an edition, duplicates are resolved by keeping the first-seen URL.
fn dedup_by_url(pages: Vec<EditionPage>) -> Vec<EditionPage> {
    let mut seen = HashSet::new();
    pages
        .into_iter()
        .filter(|p| seen.insert(p.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_section_is_idempotent() {
        for raw in ["Sports", "sport", "", "Unusual Section"] {
            let once = normalize_section(raw);
            let twice = normalize_section(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn normalize_section_defaults_to_general() {
        assert_eq!(normalize_section(""), "General");
        assert_eq!(normalize_section("   "), "General");
    }

    #[test]
    fn parse_page_number_handles_page_prefix() {
        assert_eq!(parse_page_number("Page 7"), Some(7));
        assert_eq!(parse_page_number("p12"), Some(12));
    }

    #[test]
    fn dedup_by_url_keeps_first_seen() {
        let pages = vec![
            EditionPage {
                url: "https://x/1".to_string(),
                page_number: Some(1),
                section: None,
                format: PageFormat::Html,
                title: Some("first".to_string()),
            },
            EditionPage {
                url: "https://x/1".to_string(),
                page_number: Some(1),
                section: None,
                format: PageFormat::Html,
                title: Some("second".to_string()),
            },
        ];
        let out = dedup_by_url(pages);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title.as_deref(), Some("first"));
    }

    #[test]
    fn strategy_index_list_extracts_page_links() {
        let html = r#"<html><body>
            <a href="/p1.pdf">Page A1</a>
            <a href="/about">About</a>
            <a href="/p2.pdf">Page 2</a>
        </body></html>"#;
        let pages = strategy_index_list(html);
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn strategy_thumbnail_grid_follows_ancestor_anchor() {
        let html = r#"<html><body>
            <a href="/download/page_1.pdf"><img class="page-thumb" src="/thumb/1.jpg" alt="Page 1"></a>
            <img class="page-thumb" data-page="2" src="/thumb/2.jpg">
        </body></html>"#;
        let pages = strategy_thumbnail_grid(html);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].url, "/download/page_1.pdf");
        assert_eq!(pages[1].url, "download/page_2.pdf");
    }

    #[test]
    fn strategy_page_count_synthesis_reads_total_and_synthesizes_urls() {
        let html = r#"<html><body><div class="page-count">Page 1 of 4</div></body></html>"#;
        let pages = strategy_page_count_synthesis(html, "https://news.example/editions/2026-07-28");
        assert_eq!(pages.len(), 4);
        assert_eq!(pages[3].url, "https://news.example/editions/2026-07-28/download/page_4.pdf");
    }

    #[test]
    fn resolve_url_handles_relative_and_absolute_hrefs() {
        assert_eq!(
            resolve_url("https://news.example/editions/x", "https://cdn.example/a.pdf"),
            "https://cdn.example/a.pdf"
        );
        assert_eq!(resolve_url("https://news.example/editions/x", "//cdn.example/a.pdf"), "https://cdn.example/a.pdf");
        assert_eq!(
            resolve_url("https://news.example/editions/x/", "page_1.pdf"),
            "https://news.example/editions/x/page_1.pdf"
        );
    }
}

use crate::error::{PipelineError, Result};
use pdf_extract::{output_doc, OutputDev, OutputError, Transform};
use regex::Regex;
use std::collections::HashMap;

const COLUMN_THRESHOLD: f64 = 50.0;
const TITLE_FONT_THRESHOLD: f64 = 1.2;
const MIN_ARTICLE_WORDS: usize = 10;

/// A positioned run of text, ported from `pdf_extractor.py`'s `TextBlock`
/// dataclass. One `TextBlock` here corresponds to a single flushed text
/// line from the `OutputDev` character stream, rather than pdfminer's
/// whole-paragraph `LTTextContainer` — title/column detection below treats
/// both granularities the same way (a sequence of blocks to group).
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub text: String,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub page: u32,
    pub font_size: f64,
}

/// Collects characters from `pdf-extract`'s event stream into `TextBlock`s,
/// the analogue of pdfminer's `LTChar` walk in the original extractor.
#[derive(Default)]
struct PdfLayoutCollector {
    page: u32,
    blocks: Vec<TextBlock>,
    buf: String,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    font_sizes: Vec<f64>,
    has_content: bool,
}

impl PdfLayoutCollector {
    fn flush_line(&mut self) {
        if !self.has_content {
            return;
        }
        let text = self.buf.trim().to_string();
        if !text.is_empty() {
            let avg_font = if self.font_sizes.is_empty() {
                12.0
            } else {
                self.font_sizes.iter().sum::<f64>() / self.font_sizes.len() as f64
            };
            self.blocks.push(TextBlock {
                text,
                x0: self.x0,
                y0: self.y0,
                x1: self.x1,
                y1: self.y1,
                page: self.page,
                font_size: avg_font,
            });
        }
        self.buf.clear();
        self.font_sizes.clear();
        self.has_content = false;
    }
}

impl OutputDev for PdfLayoutCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        _media_box: &pdf_extract::MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.flush_line();
        self.page = page_num;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.flush_line();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        text: &str,
    ) -> Result<(), OutputError> {
        let x0 = trm.e;
        let y0 = trm.f;
        let x1 = x0 + width * font_size;
        let y1 = y0 + font_size;

        if !self.has_content {
            self.x0 = x0;
            self.y0 = y0;
            self.x1 = x1;
            self.y1 = y1;
            self.has_content = true;
        } else {
            self.x0 = self.x0.min(x0);
            self.y0 = self.y0.min(y0);
            self.x1 = self.x1.max(x1);
            self.y1 = self.y1.max(y1);
        }
        self.font_sizes.push(font_size);
        self.buf.push_str(text);
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        self.buf.push(' ');
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        self.flush_line();
        Ok(())
    }
}

pub fn extract_text_blocks(pdf_bytes: &[u8]) -> Result<Vec<TextBlock>> {
    let mut collector = PdfLayoutCollector::default();
    let doc = pdf_extract::Document::load_mem(pdf_bytes)
        .map_err(|e| PipelineError::parse("extractor::pdf::extract_text_blocks", e.to_string()))?;
    output_doc(&doc, &mut collector)
        .map_err(|e| PipelineError::parse("extractor::pdf::extract_text_blocks", e.to_string()))?;
    collector.flush_line();
    Ok(collector.blocks)
}

/// Column segmentation per §4.4.1 step 2: per page, sort by x0; group while
/// `|x0 - last_x| < threshold`; sort each column top-to-bottom.
pub fn segment_columns(blocks: Vec<TextBlock>) -> Vec<Vec<TextBlock>> {
    let mut by_page: HashMap<u32, Vec<TextBlock>> = HashMap::new();
    for block in blocks {
        by_page.entry(block.page).or_default().push(block);
    }

    let mut all_columns = Vec::new();
    let mut pages: Vec<u32> = by_page.keys().copied().collect();
    pages.sort_unstable();

    for page in pages {
        let mut page_blocks = by_page.remove(&page).unwrap();
        page_blocks.sort_by(|a, b| a.x0.partial_cmp(&b.x0).unwrap());

        let mut columns: Vec<Vec<TextBlock>> = Vec::new();
        let mut current: Vec<TextBlock> = Vec::new();
        let mut last_x: Option<f64> = None;

        for block in page_blocks {
            match last_x {
                Some(x) if (block.x0 - x).abs() < COLUMN_THRESHOLD => {
                    current.push(block);
                }
                _ => {
                    if !current.is_empty() {
                        columns.push(std::mem::take(&mut current));
                    }
                    current.push(block);
                }
            }
            last_x = Some(current.last().unwrap().x0);
        }
        if !current.is_empty() {
            columns.push(current);
        }

        for column in &mut columns {
            column.sort_by(|a, b| b.y0.partial_cmp(&a.y0).unwrap());
        }
        all_columns.extend(columns);
    }

    all_columns
}

static NEWS_PATTERNS: once_cell::sync::Lazy<Vec<Regex>> = once_cell::sync::Lazy::new(|| {
    vec![
        Regex::new(r"^[A-Z][A-Z\s]{5,}$").unwrap(),
        Regex::new(r"^[A-Z][a-z]+ [A-Z][a-z]+").unwrap(),
        Regex::new(r"^\w+: ").unwrap(),
    ]
});

fn is_title_case(text: &str) -> bool {
    text.split_whitespace().all(|w| {
        w.chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(true)
    })
}

/// §4.4.1 step 3's title predicate: font-size outlier, all-caps short line,
/// title-case short line without terminal punctuation, or a news-dateline
/// regex match.
fn is_likely_title(block: &TextBlock, avg_font_size: f64) -> bool {
    if block.font_size > avg_font_size * TITLE_FONT_THRESHOLD {
        return true;
    }

    let text = block.text.trim();
    let word_count = text.split_whitespace().count();

    if text == text.to_uppercase() && text.chars().any(|c| c.is_alphabetic()) && word_count <= 8 {
        return true;
    }

    if is_title_case(text)
        && word_count <= 10
        && !text.ends_with('.')
        && !text.ends_with('!')
        && !text.ends_with('?')
    {
        return true;
    }

    NEWS_PATTERNS.iter().any(|re| re.is_match(text))
}

#[derive(Debug, Clone)]
pub struct PdfArticle {
    pub title: String,
    pub content: String,
    pub page_number: u32,
    pub column: usize,
    pub word_count: usize,
}

/// §4.4.1 step 3-4: walk a column in reading order, opening a new article
/// at every detected title, emitting only articles meeting the word floor.
pub fn extract_articles_from_column(column: &[TextBlock], column_index: usize) -> Vec<PdfArticle> {
    if column.is_empty() {
        return Vec::new();
    }

    let font_sizes: Vec<f64> = column.iter().map(|b| b.font_size).collect();
    let avg_font_size = font_sizes.iter().sum::<f64>() / font_sizes.len() as f64;

    let mut articles = Vec::new();
    let mut current_blocks: Vec<&TextBlock> = Vec::new();
    let mut current_title: Option<String> = None;

    for block in column {
        let is_title = is_likely_title(block, avg_font_size);

        if is_title && !current_blocks.is_empty() {
            if let Some(article) = assemble_article(&current_blocks, current_title.take(), column_index) {
                articles.push(article);
            }
            current_blocks.clear();
            current_title = Some(block.text.trim().to_string());
        } else if is_title && current_blocks.is_empty() {
            current_title = Some(block.text.trim().to_string());
        } else {
            current_blocks.push(block);
        }
    }

    if !current_blocks.is_empty() {
        if let Some(article) = assemble_article(&current_blocks, current_title, column_index) {
            articles.push(article);
        }
    }

    articles
}

fn assemble_article(
    blocks: &[&TextBlock],
    title: Option<String>,
    column_index: usize,
) -> Option<PdfArticle> {
    if blocks.is_empty() {
        return None;
    }

    let content = blocks
        .iter()
        .map(|b| b.text.trim())
        .collect::<Vec<_>>()
        .join("\n");
    let word_count = content.split_whitespace().count();
    if word_count < MIN_ARTICLE_WORDS {
        return None;
    }

    let title = match title {
        Some(t) => {
            let collapsed: String = t.split_whitespace().collect::<Vec<_>>().join(" ");
            collapsed.chars().take(200).collect()
        }
        None => {
            let first_line = content.lines().next().unwrap_or_default();
            if first_line.len() > 100 {
                format!("{}...", &first_line[..100])
            } else {
                first_line.to_string()
            }
        }
    };

    Some(PdfArticle {
        title,
        content,
        page_number: blocks[0].page,
        column: column_index,
        word_count,
    })
}

/// Runs the full PDF path (§4.4.1) end to end: positioned text blocks →
/// column segmentation → per-column article boundary detection.
pub fn extract_articles(pdf_bytes: &[u8]) -> Result<Vec<PdfArticle>> {
    let blocks = extract_text_blocks(pdf_bytes)?;
    let columns = segment_columns(blocks);
    Ok(columns
        .iter()
        .enumerate()
        .flat_map(|(i, column)| extract_articles_from_column(column, i))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str, x0: f64, y0: f64, page: u32, font_size: f64) -> TextBlock {
        TextBlock {
            text: text.to_string(),
            x0,
            y0,
            x1: x0 + 10.0,
            y1: y0 + font_size,
            page,
            font_size,
        }
    }

    #[test]
    fn column_segmentation_groups_boundary_block_into_left_column() {
        let blocks = vec![
            block("left col line", 72.0, 500.0, 1, 10.0),
            block("boundary line", 119.0, 480.0, 1, 10.0),
            block("right col line", 320.0, 500.0, 1, 10.0),
        ];
        let columns = segment_columns(blocks);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].len(), 2);
        assert_eq!(columns[1].len(), 1);
    }

    #[test]
    fn title_detection_flags_all_caps_short_line() {
        let b = block("BREAKING NEWS TODAY", 72.0, 700.0, 1, 10.0);
        assert!(is_likely_title(&b, 10.0));
    }

    #[test]
    fn article_below_word_floor_is_dropped() {
        let blocks = vec![block("too short", 72.0, 500.0, 1, 10.0)];
        let refs: Vec<&TextBlock> = blocks.iter().collect();
        assert!(assemble_article(&refs, Some("Title".to_string()), 0).is_none());
    }

    #[test]
    fn article_meeting_word_floor_is_assembled_with_truncated_title() {
        let long_title = "T".repeat(250);
        let content = (0..MIN_ARTICLE_WORDS)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let blocks = vec![block(&content, 72.0, 500.0, 1, 10.0)];
        let refs: Vec<&TextBlock> = blocks.iter().collect();
        let article = assemble_article(&refs, Some(long_title), 0).unwrap();
        assert_eq!(article.title.chars().count(), 200);
    }
}

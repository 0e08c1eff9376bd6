//! Main-body text extraction from article HTML.

use crate::error::{NewsError, NewsResult};
use scraper::{ElementRef, Html, Selector};

/// Containers tried in order before falling back to the densest block.
const BODY_SELECTORS: &[&str] = &[
    r#"div[data-gu-name="body"]"#,
    r#"[itemprop="articleBody"]"#,
    "article",
    "main",
];

/// Candidate blocks for the density fallback.
const FALLBACK_CONTAINERS: &[&str] = &["article", "main", "section", "div"];

/// Paragraphs inside these never count as body text.
const BOILERPLATE: &[&str] = &[
    "nav", "aside", "footer", "header", "figure", "script", "style", "noscript", "form",
];

/// Extracted body: paragraphs in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBody {
    pub paragraphs: Vec<String>,
}

impl ExtractedBody {
    pub fn text(&self) -> String {
        self.paragraphs.join("\n")
    }
}

fn selector(css: &str) -> NewsResult<Selector> {
    Selector::parse(css)
        .map_err(|e| NewsError::ExtractionFailed(format!("invalid selector {}: {:?}", css, e)))
}

/// Pull the article body out of a page.
///
/// Known body containers win in priority order. Otherwise the container whose
/// own paragraphs (not those of nested blocks) hold the most text is used, so
/// page-level wrappers never win over the story block. Fails rather than
/// returning empty text.
pub fn extract_body(html: &str) -> NewsResult<ExtractedBody> {
    let document = Html::parse_document(html);
    let paragraph = selector("p")?;

    for css in BODY_SELECTORS {
        let container = selector(css)?;
        if let Some(found) = document
            .select(&container)
            .map(|element| paragraphs_in(element, &paragraph))
            .find(|paragraphs| !paragraphs.is_empty())
        {
            return Ok(ExtractedBody { paragraphs: found });
        }
    }

    let fallback = selector(&FALLBACK_CONTAINERS.join(", "))?;
    let mut densest: Option<(ElementRef<'_>, usize)> = None;
    for element in document.select(&fallback) {
        let score = own_text_len(element, &paragraph);
        // Strictly greater keeps the first container on ties
        if score > 0 && densest.map_or(true, |(_, best)| score > best) {
            densest = Some((element, score));
        }
    }

    match densest.map(|(element, _)| paragraphs_in(element, &paragraph)) {
        Some(paragraphs) if !paragraphs.is_empty() => Ok(ExtractedBody { paragraphs }),
        _ => Err(NewsError::ExtractionFailed(
            "no article body found; the page layout may differ".to_string(),
        )),
    }
}

/// Text length of the paragraphs whose nearest enclosing block is `container`.
fn own_text_len(container: ElementRef<'_>, paragraph: &Selector) -> usize {
    container
        .select(paragraph)
        .filter(|p| !inside_boilerplate(*p, container))
        .filter(|p| {
            p.ancestors()
                .find(|node| {
                    node.value()
                        .as_element()
                        .is_some_and(|el| FALLBACK_CONTAINERS.contains(&el.name()))
                })
                .map(|node| node.id())
                == Some(container.id())
        })
        .map(|p| collapse_whitespace(&p.text().collect::<String>()).len())
        .sum()
}

fn paragraphs_in(container: ElementRef<'_>, paragraph: &Selector) -> Vec<String> {
    container
        .select(paragraph)
        .filter(|p| !inside_boilerplate(*p, container))
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect()
}

/// Whether `element` sits under a boilerplate tag below `container`.
fn inside_boilerplate(element: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    for ancestor in element.ancestors() {
        if ancestor.id() == container.id() {
            return false;
        }
        if let Some(el) = ancestor.value().as_element() {
            if BOILERPLATE.contains(&el.name()) {
                return true;
            }
        }
    }
    false
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

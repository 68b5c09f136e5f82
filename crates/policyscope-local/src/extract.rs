use html_scraper::{ElementRef, Html, Selector};
use policyscope_core::ExtractionResult;
use std::collections::BTreeSet;

pub const DEFAULT_TITLE: &str = "Privacy Policy";
pub const NO_CONTENT_ERROR: &str = "Could not find policy content on the page.";
/// Downstream analysis has an input-size budget; anything past this is cut.
pub const MAX_CONTENT_CHARS: usize = 30_000;
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated for analysis...]";
/// Blocks at or below this length are treated as navigational noise.
pub const MIN_BLOCK_CHARS: usize = 20;

/// Subtrees whose text must never reach the output, regardless of which
/// content root is later selected.
const EXCLUDED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

/// Structural/semantic selectors, most-specific first. The first one that
/// matches a node outside an excluded subtree wins.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".content",
    ".main-content",
    "#content",
    "#main-content",
    ".article-content",
    ".post-content",
    ".entry-content",
    ".policy-content",
    ".privacy-policy",
    ".legal-content",
];

fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_excluded_tag(name: &str) -> bool {
    EXCLUDED_TAGS.contains(&name)
}

fn in_excluded_subtree(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| is_excluded_tag(a.value().name()))
}

/// Visible text of `el` with excluded subtrees skipped and whitespace collapsed.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    norm_ws(&out)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(t) = child.value().as_text() {
            out.push_str(&t.text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !is_excluded_tag(child_el.value().name()) {
                collect_text(child_el, out);
            }
        }
    }
}

fn page_title(doc: &Html) -> String {
    Selector::parse("title")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .map(|el| norm_ws(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// The extraction cascade: structural selectors, then the MediaWiki container
/// pattern, then the whole body. Returns `None` only when the page has no body.
fn select_content_root(doc: &Html) -> Option<ElementRef<'_>> {
    for css in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).find(|el| !in_excluded_subtree(el)) {
            tracing::debug!(selector = %css, "content root matched");
            return Some(el);
        }
    }

    // MediaWiki-style pages keep the rendered article under a fixed container
    // id, with the parsed body one class deeper.
    if let Ok(outer_sel) = Selector::parse("#mw-content-text") {
        if let Some(outer) = doc.select(&outer_sel).next() {
            if let Ok(inner_sel) = Selector::parse(".mw-parser-output") {
                if let Some(inner) = outer.select(&inner_sel).next() {
                    tracing::debug!("content root matched: mw-parser-output");
                    return Some(inner);
                }
            }
            tracing::debug!("content root matched: mw-content-text");
            return Some(outer);
        }
    }

    let body_sel = Selector::parse("body").ok()?;
    doc.select(&body_sel).next()
}

/// Flatten the chosen root into an ordered sequence of text blocks:
/// headings, paragraphs, list items and generic divs in document order,
/// noise-filtered and exact-deduplicated (nested elements re-emit ancestor
/// text; the first occurrence wins).
fn flatten_blocks(root: ElementRef<'_>) -> Vec<String> {
    let Ok(sel) = Selector::parse("h1,h2,h3,h4,h5,h6,p,li,div") else {
        return Vec::new();
    };
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for el in root.select(&sel) {
        if in_excluded_subtree(&el) {
            continue;
        }
        let text = visible_text(el);
        if text.chars().count() <= MIN_BLOCK_CHARS {
            continue;
        }
        if !seen.insert(text.clone()) {
            continue;
        }
        out.push(text);
    }
    out
}

/// Join blocks with blank-line separators and enforce the size cap.
fn join_and_cap(blocks: &[String], max_chars: usize) -> String {
    let joined = blocks.join("\n\n");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    let mut out: String = joined.chars().take(max_chars).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Extract the substantive policy text from a page.
///
/// Never panics and never returns an ambiguous result: either `success` with
/// non-empty capped content, or `success=false` with [`NO_CONTENT_ERROR`].
pub fn extract_policy(html: &str) -> ExtractionResult {
    let doc = Html::parse_document(html);
    let title = page_title(&doc);

    let Some(root) = select_content_root(&doc) else {
        tracing::warn!("page has no body element");
        return ExtractionResult::failed(title, NO_CONTENT_ERROR);
    };

    let blocks = flatten_blocks(root);
    if blocks.is_empty() {
        tracing::debug!("no qualifying text blocks under content root");
        return ExtractionResult::failed(title, NO_CONTENT_ERROR);
    }

    let content = join_and_cap(&blocks, MAX_CONTENT_CHARS);
    ExtractionResult::ok(title, content)
}

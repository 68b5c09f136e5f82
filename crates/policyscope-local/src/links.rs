use html_scraper::{Html, Selector};

/// Well-known policy locations, probed in this order when a page carries no
/// explicit link.
pub const POLICY_PATHS: &[&str] = &[
    "/privacy-policy",
    "/privacy",
    "/privacypolicy",
    "/legal/privacy",
    "/about/privacy",
    "/policies/privacy",
    "/terms/privacy",
];

/// Resolve [`POLICY_PATHS`] against a base URL, preserving order.
pub fn candidate_policy_paths(base_url: &str) -> Vec<String> {
    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };
    POLICY_PATHS
        .iter()
        .filter_map(|p| base.join(p).ok())
        .map(|u| u.to_string())
        .collect()
}

/// Find a privacy-policy hyperlink in a page.
///
/// Scans anchors in document order; the first whose href or visible text
/// contains "privacy" (case-insensitive) wins. Relative and protocol-relative
/// hrefs are resolved against `base_url`; absolute hrefs come back unchanged.
/// Returns `None` when no link matches — absence is a normal outcome.
pub fn find_policy_link(html: &str, base_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").ok()?;
    let base = url::Url::parse(base_url).ok();

    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }
        let href_lc = href.to_ascii_lowercase();
        if href_lc.starts_with("javascript:") || href_lc.starts_with("mailto:") {
            continue;
        }

        let text = el
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        if !href_lc.contains("privacy") && !text.contains("privacy") {
            continue;
        }

        if url::Url::parse(href).is_ok() {
            return Some(href.to_string());
        }
        if let Some(b) = &base {
            if let Ok(u) = b.join(href) {
                return Some(u.to_string());
            }
        }
        // Unresolvable relative href with no usable base: keep scanning.
    }
    None
}

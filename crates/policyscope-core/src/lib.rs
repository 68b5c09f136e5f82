use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("no content: {0}")]
    NoContent(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("insufficient content: {0}")]
    InsufficientContent(String),
    #[error("llm failed: {0}")]
    Llm(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the whole fetch (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    /// Optional headers to add (best-effort; adapter may drop invalid headers).
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

/// External text-generation collaborator (OpenAI-compatible or a test double).
#[async_trait::async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Whether a credential is available. Checked before any request is built,
    /// so a misconfigured deployment fails fast without a network call.
    fn is_configured(&self) -> bool {
        true
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String>;
}

/// Outcome of the content-extraction stage.
///
/// Invariant: `success == true` implies non-empty `content` and no `error`;
/// `success == false` implies empty `content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn ok(title: String, content: String) -> Self {
        debug_assert!(!content.is_empty());
        Self {
            success: true,
            title,
            content,
            error: None,
        }
    }

    pub fn failed(title: String, error: impl Into<String>) -> Self {
        Self {
            success: false,
            title,
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Outcome of the analysis stage. `grade` is a letter grade (`A+`..`F`) or the
/// `"N/A"` sentinel; it is never empty on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub analysis: String,
    pub grade: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn ok(analysis: String, grade: String) -> Self {
        debug_assert!(!grade.is_empty());
        Self {
            success: true,
            analysis,
            grade,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis: String::new(),
            grade: String::new(),
            error: Some(error.into()),
        }
    }
}

/// The single record handed to the presentation layer: one boolean per stage
/// plus a human-readable error when a stage halted the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub url: String,
    pub scrape_success: bool,
    pub analysis_success: bool,
    pub title: String,
    pub content_preview: String,
    pub analysis: String,
    pub grade: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            scrape_success: false,
            analysis_success: false,
            title: String::new(),
            content_preview: String::new(),
            analysis: String::new(),
            grade: String::new(),
            error: None,
        }
    }
}

pub const PREVIEW_CHARS: usize = 500;

/// First `PREVIEW_CHARS` characters of `content`, ellipsis-suffixed when cut.
pub fn content_preview(content: &str) -> String {
    let mut out = String::new();
    for (n, ch) in content.chars().enumerate() {
        if n >= PREVIEW_CHARS {
            out.push_str("...");
            return out;
        }
        out.push(ch);
    }
    out
}

/// Normalize user input into an absolute http(s) URL.
///
/// Bare hosts like `example.com` get an `https://` scheme; anything that still
/// fails to parse (or is not http/https) is an `InvalidUrl`.
pub fn normalize_input_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidUrl("empty url".to_string()));
    }
    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed = url::Url::parse(&candidate).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::InvalidUrl(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }
    Ok(parsed.to_string())
}

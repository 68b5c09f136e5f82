use crate::{analyze, extract};
use policyscope_core::{
    content_preview, normalize_input_url, AnalysisBackend, Error, FetchBackend, FetchRequest,
    PipelineResult,
};
use std::collections::BTreeMap;

/// Knobs for one pipeline invocation. Passed explicitly; no ambient state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch_timeout_ms: u64,
    pub fetch_max_bytes: u64,
    /// Extracted content below this is not worth an analysis call.
    pub min_content_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 15_000,
            fetch_max_bytes: 5_000_000,
            min_content_chars: 100,
        }
    }
}

/// Run the full FETCH → EXTRACT → ANALYZE → GRADE transaction for one URL.
///
/// Each stage gates the next; the first failure halts the pipeline and lands
/// in `error`. The caller always gets a complete record — this function never
/// fails, and nothing is retried.
pub async fn run_pipeline(
    fetcher: &dyn FetchBackend,
    analyzer: &dyn AnalysisBackend,
    cfg: &PipelineConfig,
    raw_url: &str,
) -> PipelineResult {
    let mut out = PipelineResult::new(raw_url);

    let url = match normalize_input_url(raw_url) {
        Ok(u) => u,
        Err(e) => {
            out.error = Some(e.to_string());
            return out;
        }
    };
    out.url = url.clone();

    let req = FetchRequest {
        url,
        timeout_ms: Some(cfg.fetch_timeout_ms),
        max_bytes: Some(cfg.fetch_max_bytes),
        headers: BTreeMap::new(),
    };
    let page = match fetcher.fetch(&req).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(url = %req.url, error = %e, "fetch stage failed");
            out.error = Some(format!("Failed to fetch the page: {e}"));
            return out;
        }
    };

    let extraction = extract::extract_policy(&page.text_lossy());
    out.title = extraction.title.clone();
    if !extraction.success {
        out.error = extraction
            .error
            .clone()
            .or_else(|| Some(extract::NO_CONTENT_ERROR.to_string()));
        return out;
    }
    out.scrape_success = true;
    out.content_preview = content_preview(&extraction.content);
    tracing::debug!(
        url = %out.url,
        chars = extraction.content.chars().count(),
        "extraction succeeded"
    );

    // Analysis preconditions: both are terminal, neither is retried.
    if !analyzer.is_configured() {
        out.error = Some(
            Error::NotConfigured("analysis api key is not set".to_string()).to_string(),
        );
        return out;
    }
    let content_chars = extraction.content.trim().chars().count();
    if content_chars < cfg.min_content_chars {
        out.error = Some(
            Error::InsufficientContent(format!(
                "extracted {content_chars} chars, need at least {}",
                cfg.min_content_chars
            ))
            .to_string(),
        );
        return out;
    }

    let analysis = analyze::analyze_policy(analyzer, &extraction.content).await;
    if !analysis.success {
        tracing::warn!(url = %out.url, "analysis stage failed");
        out.error = analysis.error;
        return out;
    }
    out.analysis_success = true;
    out.grade = analysis.grade;
    out.analysis = analysis.analysis;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalFetcher;
    use policyscope_core::{FetchResponse, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixtureFetcher {
        html: &'static str,
        requested: Mutex<Vec<String>>,
    }

    impl FixtureFetcher {
        fn new(html: &'static str) -> Self {
            Self {
                html,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl FetchBackend for FixtureFetcher {
        async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
            self.requested.lock().unwrap().push(req.url.clone());
            Ok(FetchResponse {
                url: req.url.clone(),
                final_url: req.url.clone(),
                status: 200,
                content_type: Some("text/html".to_string()),
                bytes: self.html.as_bytes().to_vec(),
            })
        }
    }

    struct FailingFetcher;

    #[async_trait::async_trait]
    impl FetchBackend for FailingFetcher {
        async fn fetch(&self, _req: &FetchRequest) -> Result<FetchResponse> {
            Err(Error::Fetch("connection reset".to_string()))
        }
    }

    struct MockAnalyzer {
        configured: bool,
        reply: Result<String>,
        calls: AtomicUsize,
    }

    impl MockAnalyzer {
        fn replying(text: &str) -> Self {
            Self {
                configured: true,
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(err: Error) -> Self {
            Self {
                configured: true,
                reply: Err(err),
                calls: AtomicUsize::new(0),
            }
        }

        fn unconfigured() -> Self {
            Self {
                configured: false,
                reply: Ok(String::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AnalysisBackend for MockAnalyzer {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn chat(&self, _system: &str, user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(user.contains("---"), "content must be delimited");
            match &self.reply {
                Ok(t) => Ok(t.clone()),
                Err(e) => Err(Error::Llm(e.to_string())),
            }
        }
    }

    const POLICY_PAGE: &str = r#"
    <html><head><title>Acme Privacy Policy</title></head><body>
      <nav><a href="/">Home</a></nav>
      <article>
        <p>We collect your email address, device identifiers and browsing history
           whenever you interact with any part of the Acme service.</p>
        <p>Collected data may be shared with advertising partners and affiliates
           under agreements that permit further onward disclosure.</p>
      </article>
    </body></html>
    "#;

    #[tokio::test]
    async fn full_pipeline_success_carries_grade_and_preview() {
        let fetcher = FixtureFetcher::new(POLICY_PAGE);
        let analyzer =
            MockAnalyzer::replying("**Privacy Protection Grade**: B+\n\nMostly fine.");
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&fetcher, &analyzer, &cfg, "https://acme.test/privacy").await;
        assert!(r.scrape_success);
        assert!(r.analysis_success);
        assert!(r.error.is_none());
        assert_eq!(r.title, "Acme Privacy Policy");
        assert_eq!(r.grade, "B+");
        assert!(r.analysis.contains("Mostly fine."));
        assert!(r.content_preview.contains("We collect your email"));
        assert_eq!(analyzer.call_count(), 1);
    }

    #[tokio::test]
    async fn bare_host_is_normalized_to_https_before_fetch() {
        let fetcher = FixtureFetcher::new(POLICY_PAGE);
        let analyzer = MockAnalyzer::replying("Grade: A");
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&fetcher, &analyzer, &cfg, "acme.test").await;
        assert_eq!(r.url, "https://acme.test/");
        assert_eq!(
            fetcher.requested.lock().unwrap().clone(),
            vec!["https://acme.test/".to_string()]
        );
        assert!(r.scrape_success);
    }

    #[tokio::test]
    async fn fetch_failure_halts_before_extraction_and_analysis() {
        let analyzer = MockAnalyzer::replying("Grade: A");
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&FailingFetcher, &analyzer, &cfg, "https://acme.test/").await;
        assert!(!r.scrape_success);
        assert!(!r.analysis_success);
        assert!(r.error.as_deref().unwrap().starts_with("Failed to fetch"));
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn extraction_failure_never_reaches_the_analyzer() {
        let fetcher = FixtureFetcher::new(
            "<html><body><nav><a href=\"/\">Home</a></nav><footer>fine print</footer></body></html>",
        );
        let analyzer = MockAnalyzer::replying("Grade: A");
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&fetcher, &analyzer, &cfg, "https://acme.test/").await;
        assert!(!r.scrape_success);
        assert_eq!(r.error.as_deref(), Some(extract::NO_CONTENT_ERROR));
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn thin_content_halts_with_insufficient_content() {
        // One block over the noise threshold but under the analysis minimum.
        let fetcher = FixtureFetcher::new(
            "<html><body><article><p>Only forty-two characters of policy text.</p></article></body></html>",
        );
        let analyzer = MockAnalyzer::replying("Grade: A");
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&fetcher, &analyzer, &cfg, "https://acme.test/").await;
        assert!(r.scrape_success);
        assert!(!r.analysis_success);
        assert!(r.error.as_deref().unwrap().contains("insufficient content"));
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_credential_halts_without_calling_collaborator() {
        let fetcher = FixtureFetcher::new(POLICY_PAGE);
        let analyzer = MockAnalyzer::unconfigured();
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&fetcher, &analyzer, &cfg, "https://acme.test/").await;
        assert!(r.scrape_success);
        assert!(!r.analysis_success);
        assert!(r.error.as_deref().unwrap().contains("not configured"));
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn collaborator_error_surfaces_verbatim_and_halts_grading() {
        let fetcher = FixtureFetcher::new(POLICY_PAGE);
        let analyzer = MockAnalyzer::failing(Error::Llm("quota exceeded".to_string()));
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&fetcher, &analyzer, &cfg, "https://acme.test/").await;
        assert!(r.scrape_success);
        assert!(!r.analysis_success);
        assert!(r.error.as_deref().unwrap().contains("quota exceeded"));
        assert!(r.grade.is_empty());
        assert_eq!(analyzer.call_count(), 1);
    }

    #[tokio::test]
    async fn unparsable_verdict_still_succeeds_with_sentinel_grade() {
        let fetcher = FixtureFetcher::new(POLICY_PAGE);
        let analyzer = MockAnalyzer::replying("The policy is hard to assess.");
        let cfg = PipelineConfig::default();

        let r = run_pipeline(&fetcher, &analyzer, &cfg, "https://acme.test/").await;
        assert!(r.analysis_success);
        assert_eq!(r.grade, crate::grade::NO_GRADE);
    }

    #[tokio::test]
    async fn slow_page_reports_transport_error_within_the_bound() {
        use axum::{routing::get, Router};
        use std::time::{Duration, Instant};

        let app = Router::new().route(
            "/",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                "late"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let fetcher = LocalFetcher::new().unwrap();
        let analyzer = MockAnalyzer::replying("Grade: A");
        let cfg = PipelineConfig {
            fetch_timeout_ms: 300,
            ..PipelineConfig::default()
        };

        let t0 = Instant::now();
        let r = run_pipeline(&fetcher, &analyzer, &cfg, &format!("http://{addr}/")).await;
        assert!(!r.scrape_success);
        assert!(r.error.as_deref().unwrap().starts_with("Failed to fetch"));
        assert!(t0.elapsed() < Duration::from_secs(5));
        assert_eq!(analyzer.call_count(), 0);
    }
}

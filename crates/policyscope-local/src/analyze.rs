use policyscope_core::{AnalysisBackend, AnalysisResult, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ANALYST_SYSTEM_PROMPT: &str = "You are an expert privacy policy analyst. \
    Your goal is to help users understand privacy policies and make informed decisions \
    about their data.";

const ANALYSIS_PROMPT_TEMPLATE: &str = r#"You are a privacy policy expert. Analyze the following privacy policy and provide:

1. **Privacy Protection Grade**: Rate the policy from A+ (most protective) to F (least protective) based on how well it protects user privacy.

2. **Overall Summary**: A brief 2-3 sentence summary of what this policy covers.

3. **Key Findings**: List the most important points users should know, organized into:
   - **Good Practices** (things that protect users)
   - **Concerns** (things users should be aware of)
   - **Red Flags** (serious privacy concerns if any)

4. **Data Collection**: What types of data are collected?

5. **Data Sharing**: Who is the data shared with?

6. **User Rights**: What rights do users have over their data?

7. **Recommendations**: What should users do or be aware of?

Format your response in a clear, easy-to-read manner with headers and bullet points. Use simple language that anyone can understand.

Here is the privacy policy to analyze:

---
{policy_content}
---
"#;

/// Build the user message: the fixed instructional template with the extracted
/// content embedded between the delimiter lines.
pub fn analysis_prompt(policy_content: &str) -> String {
    ANALYSIS_PROMPT_TEMPLATE.replacen("{policy_content}", policy_content, 1)
}

/// Send extracted content to the analysis collaborator and parse the verdict.
///
/// Collaborator failures land in `error`; a reply without a recognizable grade
/// still succeeds, carrying the `"N/A"` sentinel.
pub async fn analyze_policy(analyzer: &dyn AnalysisBackend, content: &str) -> AnalysisResult {
    let user = analysis_prompt(content);
    match analyzer.chat(ANALYST_SYSTEM_PROMPT, &user).await {
        Ok(text) => {
            let grade = crate::grade::extract_grade(&text);
            AnalysisResult::ok(text, grade)
        }
        Err(e) => AnalysisResult::failed(e.to_string()),
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Configuration for the analysis collaborator. Passed explicitly into
/// components; nothing reads process state at call time.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u64,
    /// Low temperature for determinism-leaning verdicts.
    pub temperature: f64,
    pub timeout_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2_000,
            temperature: 0.3,
            timeout_ms: 60_000,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env("POLICYSCOPE_API_KEY").or_else(|| env("OPENAI_API_KEY")),
            base_url: env("POLICYSCOPE_BASE_URL").unwrap_or(defaults.base_url),
            model: env("POLICYSCOPE_MODEL").unwrap_or(defaults.model),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            timeout_ms: defaults.timeout_ms,
        }
    }
}

/// Chat client for any OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    cfg: AnalyzerConfig,
}

impl OpenAiCompatClient {
    pub fn new(client: reqwest::Client, cfg: AnalyzerConfig) -> Self {
        Self { client, cfg }
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl AnalysisBackend for OpenAiCompatClient {
    fn is_configured(&self) -> bool {
        self.cfg
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let api_key = self
            .cfg
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::NotConfigured(
                    "missing api key (set POLICYSCOPE_API_KEY or OPENAI_API_KEY)".to_string(),
                )
            })?;

        let req = ChatCompletionsRequest {
            model: self.cfg.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: Some(self.cfg.max_tokens),
            temperature: Some(self.cfg.temperature),
            stream: Some(false),
        };

        tracing::debug!(model = %self.cfg.model, "sending analysis request");
        let resp = self
            .client
            .post(self.endpoint_chat_completions())
            .timeout(Duration::from_millis(self.cfg.timeout_ms))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("chat.completions HTTP {status}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::Llm("empty completion".to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    content: String,
}

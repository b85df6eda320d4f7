//! Generative-AI estimate adapter
//!
//! Asks an OpenAI-compatible chat completion endpoint for the latest value
//! of an indicator and reads the answer out of the reply. Treated like any
//! other source: same interface, same plausibility check, longer timeout.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use super::http::classify_status;
use super::{parse_decimal, read_credential, AdapterKind, FetchRequest, RateBudget, SourceAdapter};
use crate::error::{EngineError, FetchError};
use crate::types::Reading;

const CONTENT_POINTER: &str = "/choices/0/message/content";
const SYSTEM_PROMPT: &str =
    "You are a financial market data assistant. Answer with a single number and no other text.";

pub struct AiCompletionAdapter {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    prompt_template: String,
    credential: Option<String>,
    budget: RateBudget,
    offered: bool,
}

impl AiCompletionAdapter {
    pub fn from_config(
        client: reqwest::Client,
        source: &config::SourceConfig,
    ) -> Result<Self, EngineError> {
        let base_url = source
            .base_url
            .as_deref()
            .ok_or_else(|| EngineError::source(&source.name, "base_url is required"))?;
        let model = source
            .model
            .clone()
            .ok_or_else(|| EngineError::source(&source.name, "model is required"))?;

        let credential = read_credential(source.credential_env.as_deref());
        let offered = source.enabled && (source.credential_env.is_none() || credential.is_some());

        Ok(Self {
            name: source.name.clone(),
            client,
            endpoint: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                source.path_template.as_deref().unwrap_or("/chat/completions")
            ),
            model,
            prompt_template: source
                .prompt_template
                .clone()
                .unwrap_or_else(config::default_prompt_template),
            credential,
            budget: RateBudget::new(source.max_concurrent),
            offered,
        })
    }

    pub fn render_prompt(&self, request: &FetchRequest<'_>) -> String {
        render_prompt(&self.prompt_template, request)
    }
}

pub fn render_prompt(template: &str, request: &FetchRequest<'_>) -> String {
    template
        .replace("{indicator}", request.indicator_id)
        .replace("{name}", request.indicator_name)
        .replace("{query}", request.query)
        .replace("{unit}", request.unit)
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"-?\d{1,3}(?:,\d{3})+(?:\.\d+)?|-?\d+(?:\.\d+)?").expect("number regex is valid")
    })
}

/// Numeric answer in a completion reply.
///
/// Numbers glued to words, dates or other digits ("10-year", "2024-03-15",
/// "Q3", "4,33") are not answers. Bare years are dropped when anything else
/// is left. Of what remains the last number wins: replies that explain
/// themselves end with the value.
pub fn extract_number(text: &str) -> Option<f64> {
    let candidates: Vec<&str> = number_regex()
        .find_iter(text)
        .filter(|m| !glued(&text[..m.start()], &text[m.end()..]))
        .map(|m| m.as_str())
        .collect();

    let answer = candidates
        .iter()
        .rev()
        .find(|token| !looks_like_year(token))
        .or_else(|| candidates.last())?;
    parse_decimal(answer)
}

fn glued(before: &str, after: &str) -> bool {
    let mut back = before.chars().rev();
    let glued_before = match back.next() {
        Some(c) if c.is_alphanumeric() => true,
        Some(',' | '.' | '-') => back.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };

    let mut ahead = after.chars();
    let glued_after = match ahead.next() {
        Some(c) if c.is_alphanumeric() => true,
        Some(',' | '.' | '-') => ahead.next().is_some_and(|c| c.is_alphanumeric()),
        _ => false,
    };

    glued_before || glued_after
}

fn looks_like_year(token: &str) -> bool {
    token.len() == 4 && token.parse::<u16>().is_ok_and(|y| (1900..=2100).contains(&y))
}

#[async_trait]
impl SourceAdapter for AiCompletionAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::AiEstimate
    }

    fn is_offered(&self) -> bool {
        self.offered
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Reading, FetchError> {
        let _permit = self.budget.acquire().await?;

        let payload = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": self.render_prompt(request)},
            ],
        });

        let mut call = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&payload);
        if let Some(credential) = &self.credential {
            call = call.bearer_auth(credential);
        }

        let response = call.send().await?;
        classify_status(response.status())?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        let content = body
            .pointer(CONTENT_POINTER)
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::MalformedResponse("completion has no message content".to_string()))?;

        debug!(source = %self.name, indicator = request.indicator_id, reply = content, "AI estimate received");

        let value = extract_number(content).ok_or_else(|| {
            FetchError::MalformedResponse(format!("no number in completion: {content:.80}"))
        })?;
        Ok(Reading::now(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::serve;
    use assert_matches::assert_matches;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use futures::future::join_all;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// What the completion endpoint received
    #[derive(Default)]
    struct Seen {
        body: Mutex<Option<Value>>,
        authorization: Mutex<Option<String>>,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    fn reply(content: &str) -> Json<Value> {
        Json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        }))
    }

    async fn completion(
        State(seen): State<Arc<Seen>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let now = seen.current.fetch_add(1, Ordering::SeqCst) + 1;
        seen.peak.fetch_max(now, Ordering::SeqCst);
        *seen.authorization.lock() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *seen.body.lock() = Some(body);
        tokio::time::sleep(Duration::from_millis(50)).await;
        seen.current.fetch_sub(1, Ordering::SeqCst);
        reply("Based on recent data, the Shiller CAPE ratio for 2024 is approximately 34.7.")
    }

    fn ai_source(base_url: &str, credential_env: &str) -> config::SourceConfig {
        let mut source = config::SourceConfig::new("ai_estimate", config::SourceKind::AiCompletion);
        source.base_url = Some(base_url.to_string());
        source.model = Some("test-model".to_string());
        source.credential_env = Some(credential_env.to_string());
        source.max_concurrent = 1;
        source
    }

    fn cape_request() -> FetchRequest<'static> {
        FetchRequest {
            indicator_id: "shiller_cape",
            indicator_name: "Shiller CAPE ratio",
            query: "S&P 500 cyclically adjusted P/E",
            unit: "x",
            value_pointer: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_fetch_reads_completion_content() {
        std::env::set_var("CCPI_AI_TEST_LIVE_KEY", "sk-test");
        let seen = Arc::new(Seen::default());
        let router = Router::new()
            .route("/chat/completions", post(completion))
            .with_state(Arc::clone(&seen));
        let base = serve(router).await;
        let adapter = AiCompletionAdapter::from_config(
            reqwest::Client::new(),
            &ai_source(&base, "CCPI_AI_TEST_LIVE_KEY"),
        )
        .unwrap();
        assert!(adapter.is_offered());

        let reading = adapter.fetch(&cape_request()).await.unwrap();
        assert_eq!(reading.value, 34.7);

        assert_eq!(seen.authorization.lock().as_deref(), Some("Bearer sk-test"));
        let body = seen.body.lock().clone().unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        let prompt = body["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("Shiller CAPE ratio"));
        assert!(prompt.contains("S&P 500 cyclically adjusted P/E"));
    }

    #[tokio::test]
    async fn test_completion_calls_respect_budget() {
        let seen = Arc::new(Seen::default());
        let router = Router::new()
            .route("/chat/completions", post(completion))
            .with_state(Arc::clone(&seen));
        let base = serve(router).await;
        let mut source = ai_source(&base, "CCPI_AI_TEST_BUDGET_KEY");
        source.credential_env = None;
        let adapter = AiCompletionAdapter::from_config(reqwest::Client::new(), &source).unwrap();

        let request = cape_request();
        let results = join_all((0..4).map(|_| adapter.fetch(&request))).await;
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(seen.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unusable_completions() {
        let router = Router::new()
            .route("/refuses/chat/completions", post(|| async { reply("I don't have access to live data.") }))
            .route("/empty/chat/completions", post(|| async { Json(json!({"choices": []})) }))
            .route(
                "/busy/chat/completions",
                post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
            );
        let base = serve(router).await;

        for (prefix, expect_rate_limited) in [("refuses", false), ("empty", false), ("busy", true)] {
            let mut source = ai_source(&format!("{base}/{prefix}"), "CCPI_AI_TEST_UNUSED");
            source.credential_env = None;
            let adapter = AiCompletionAdapter::from_config(reqwest::Client::new(), &source).unwrap();
            let result = adapter.fetch(&cape_request()).await;
            if expect_rate_limited {
                assert_matches!(result, Err(FetchError::RateLimited(_)));
            } else {
                assert_matches!(result, Err(FetchError::MalformedResponse(_)));
            }
        }
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number("31.2"), Some(31.2));
        assert_eq!(extract_number("The CAPE ratio is about 34.7 today."), Some(34.7));
        assert_eq!(extract_number("-0.42%"), Some(-0.42));
        assert_eq!(extract_number("roughly 1,234.5 billion"), Some(1234.5));
        assert_eq!(extract_number("unknown"), None);
    }

    #[test]
    fn test_extract_number_skips_echoed_context() {
        assert_eq!(extract_number("The 10-year Treasury yield is 4.33%"), Some(4.33));
        assert_eq!(extract_number("As of March 2024 the ratio was 34.7."), Some(34.7));
        assert_eq!(extract_number("34.7 (as of 2024)"), Some(34.7));
        assert_eq!(extract_number("2024-03-15: 17.2"), Some(17.2));
        assert_eq!(extract_number("Q3 margin debt: 812,400"), Some(812400.0));
        assert_eq!(extract_number("4,33"), None);
        assert_eq!(extract_number("2024"), Some(2024.0));
    }

    #[test]
    fn test_render_prompt() {
        let request = cape_request();
        let prompt = render_prompt("[{indicator}] {name} / {query} in {unit}", &request);
        assert_eq!(
            prompt,
            "[shiller_cape] Shiller CAPE ratio / S&P 500 cyclically adjusted P/E in x"
        );
    }

    #[test]
    fn test_from_config() {
        let mut source = config::SourceConfig::new("ai_estimate", config::SourceKind::AiCompletion);
        source.base_url = Some("https://api.example.com/v1/".to_string());
        source.model = Some("test-model".to_string());
        source.credential_env = Some("CCPI_AI_TEST_NEVER_SET".to_string());

        let adapter = AiCompletionAdapter::from_config(reqwest::Client::new(), &source).unwrap();
        assert_eq!(adapter.endpoint, "https://api.example.com/v1/chat/completions");
        assert_eq!(adapter.kind(), AdapterKind::AiEstimate);
        assert!(!adapter.is_offered());

        source.model = None;
        assert!(AiCompletionAdapter::from_config(reqwest::Client::new(), &source).is_err());
    }
}

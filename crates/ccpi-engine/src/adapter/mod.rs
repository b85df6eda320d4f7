//! Source adapters
//!
//! An adapter turns one indicator query into one numeric reading from one
//! external source. Adapters are stateless apart from their rate budget;
//! whether a source is usable at all ("offered") is decided once, when the
//! adapter is built from configuration.

pub mod ai;
pub mod fixed;
pub mod http;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use crate::error::{EngineError, FetchError};
use crate::registry::PlausibleRange;
use crate::types::Reading;

pub use ai::AiCompletionAdapter;
pub use fixed::StaticAdapter;
pub use http::HttpJsonAdapter;

/// Whether a source is a market-data API or a generative estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Api,
    AiEstimate,
}

/// Everything an adapter needs for one call
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub indicator_id: &'a str,
    pub indicator_name: &'a str,
    pub query: &'a str,
    pub unit: &'a str,
    /// Per-indicator override of the source's JSON pointer
    pub value_pointer: Option<&'a str>,
    /// Tier timeout; the whole call including rate-budget wait must fit
    pub timeout: Duration,
}

/// A capability that fetches indicator values from one source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> AdapterKind;

    /// False when the source lacks a credential or is disabled
    fn is_offered(&self) -> bool;

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Reading, FetchError>;
}

/// Bounded concurrency against one external source
#[derive(Debug, Clone)]
pub struct RateBudget {
    permits: Arc<Semaphore>,
}

impl RateBudget {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| FetchError::Transport("rate budget closed".to_string()))
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Call an adapter under the tier timeout and enforce the plausible range.
///
/// This is the only path the resolver uses, so no adapter value outside the
/// indicator's range can ever reach scoring. Out-of-range values are
/// rejected, never clamped.
pub async fn fetch_checked(
    adapter: &dyn SourceAdapter,
    request: &FetchRequest<'_>,
    range: PlausibleRange,
) -> Result<Reading, FetchError> {
    if !adapter.is_offered() {
        return Err(FetchError::NotOffered);
    }

    let reading = tokio::time::timeout(request.timeout, adapter.fetch(request))
        .await
        .map_err(|_| FetchError::Timeout)??;

    if !range.contains(reading.value) {
        return Err(FetchError::Implausible {
            value: reading.value,
            min: range.min,
            max: range.max,
        });
    }

    Ok(reading)
}

/// Read a number at a JSON pointer. Numeric strings are accepted; `"."`
/// (the placeholder some series use for a missing observation) is not.
pub fn json_number(body: &Value, pointer: &str) -> Result<f64, FetchError> {
    match body.pointer(pointer) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| FetchError::MalformedResponse(format!("unrepresentable number at {pointer}"))),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed == "." {
                return Err(FetchError::MalformedResponse(format!("missing value at {pointer}")));
            }
            parse_decimal(trimmed)
                .ok_or_else(|| FetchError::MalformedResponse(format!("'{trimmed}' at {pointer} is not a number")))
        }
        Some(other) => Err(FetchError::MalformedResponse(format!(
            "expected a number at {pointer}, found {other}"
        ))),
        None => Err(FetchError::MalformedResponse(format!("no value at {pointer}"))),
    }
}

fn grouped_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d{1,3}(?:,\d{3})+(?:\.\d+)?$").expect("grouping regex is valid"))
}

/// Parse a decimal. Commas are accepted only as thousands separators
/// (`1,234.5`); any other comma, as in the decimal-comma `4,33`, makes the
/// text unreadable rather than silently a different number.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.contains(',') {
        if !grouped_regex().is_match(raw) {
            return None;
        }
        return raw.replace(',', "").parse().ok();
    }
    raw.parse().ok()
}

/// Parse an observation date in RFC 3339 or `YYYY-MM-DD` form
pub fn parse_observation_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Read a credential once. Blank values count as absent.
pub(crate) fn read_credential(var: Option<&str>) -> Option<String> {
    let var = var?;
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

/// Adapters by source name
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.insert(adapter);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.get(name)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Build every configured source. Sources without credentials are
    /// still registered; they report themselves as not offered.
    pub fn from_config(sources: &[config::SourceConfig]) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ccpi/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::Config(format!("HTTP client: {e}")))?;

        let mut set = Self::new();
        for source in sources {
            let adapter: Arc<dyn SourceAdapter> = match source.kind {
                config::SourceKind::HttpJson => {
                    Arc::new(HttpJsonAdapter::from_config(client.clone(), source)?)
                }
                config::SourceKind::AiCompletion => {
                    Arc::new(AiCompletionAdapter::from_config(client.clone(), source)?)
                }
                config::SourceKind::Static => Arc::new(StaticAdapter::from_config(source)),
            };

            if adapter.is_offered() {
                info!(source = %source.name, kind = ?adapter.kind(), "Source adapter ready");
            } else if source.enabled {
                warn!(source = %source.name, "Source not offered (credential missing), tier will be skipped");
            } else {
                debug!(source = %source.name, "Source disabled");
            }
            set.insert(adapter);
        }
        Ok(set)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serve `router` on an ephemeral local port; returns the base URL
    pub async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// In-memory adapter with scripted outcomes
    pub struct ScriptedAdapter {
        name: String,
        kind: AdapterKind,
        offered: bool,
        default: Result<f64, FetchError>,
        per_indicator: HashMap<String, Result<f64, FetchError>>,
        delay: Option<Duration>,
        observed_at: Option<DateTime<Utc>>,
        calls: AtomicUsize,
    }

    impl ScriptedAdapter {
        pub fn ok(name: &str, value: f64) -> Self {
            Self::with_default(name, Ok(value))
        }

        pub fn failing(name: &str, error: FetchError) -> Self {
            Self::with_default(name, Err(error))
        }

        fn with_default(name: &str, default: Result<f64, FetchError>) -> Self {
            Self {
                name: name.to_string(),
                kind: AdapterKind::Api,
                offered: true,
                default,
                per_indicator: HashMap::new(),
                delay: None,
                observed_at: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn ai(mut self) -> Self {
            self.kind = AdapterKind::AiEstimate;
            self
        }

        pub fn not_offered(mut self) -> Self {
            self.offered = false;
            self
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
            self.observed_at = Some(at);
            self
        }

        pub fn value_for(mut self, indicator: &str, value: Result<f64, FetchError>) -> Self {
            self.per_indicator.insert(indicator.to_string(), value);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> AdapterKind {
            self.kind
        }

        fn is_offered(&self) -> bool {
            self.offered
        }

        async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Reading, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let outcome = self
                .per_indicator
                .get(request.indicator_id)
                .unwrap_or(&self.default)
                .clone();
            let observed_at = self.observed_at.unwrap_or_else(Utc::now);
            outcome.map(|value| Reading::new(value, observed_at))
        }
    }

    pub fn request(id: &str, timeout: Duration) -> FetchRequest<'_> {
        FetchRequest {
            indicator_id: id,
            indicator_name: id,
            query: id,
            unit: "pts",
            value_pointer: None,
            timeout,
        }
    }
}

//! REST/JSON source adapter

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use super::{
    json_number, parse_observation_date, read_credential, AdapterKind, FetchRequest, RateBudget,
    SourceAdapter,
};
use crate::error::{EngineError, FetchError};
use crate::types::Reading;

/// Fetches a JSON document over HTTP GET and reads one number out of it.
///
/// The URL is `base_url + path_template` where `{query}` is replaced by the
/// indicator binding's query and `{credential}` by the URL-encoded key. The
/// key can instead travel as a query parameter or a header.
pub struct HttpJsonAdapter {
    name: String,
    client: reqwest::Client,
    base_url: String,
    path_template: String,
    value_pointer: Option<String>,
    date_pointer: Option<String>,
    credential: Option<String>,
    credential_param: Option<String>,
    credential_header: Option<String>,
    budget: RateBudget,
    offered: bool,
}

impl HttpJsonAdapter {
    pub fn from_config(
        client: reqwest::Client,
        source: &config::SourceConfig,
    ) -> Result<Self, EngineError> {
        let base_url = source
            .base_url
            .clone()
            .ok_or_else(|| EngineError::source(&source.name, "base_url is required"))?;

        let credential = read_credential(source.credential_env.as_deref());
        let offered = source.enabled && (source.credential_env.is_none() || credential.is_some());

        Ok(Self {
            name: source.name.clone(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path_template: source.path_template.clone().unwrap_or_default(),
            value_pointer: source.value_pointer.clone(),
            date_pointer: source.date_pointer.clone(),
            credential,
            credential_param: source.credential_param.clone(),
            credential_header: source.credential_header.clone(),
            budget: RateBudget::new(source.max_concurrent),
            offered,
        })
    }

    /// Expand the URL for a query. Queries are trusted configuration and
    /// inserted as written; the credential is URL-encoded.
    pub fn build_url(&self, query: &str) -> String {
        let mut path = self.path_template.replace("{query}", query);
        if path.contains("{credential}") {
            let encoded: String = self
                .credential
                .as_deref()
                .map(|c| url::form_urlencoded::byte_serialize(c.as_bytes()).collect())
                .unwrap_or_default();
            path = path.replace("{credential}", &encoded);
        }
        format!("{}{}", self.base_url, path)
    }
}

/// Map an HTTP status onto the adapter error taxonomy
pub fn classify_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(FetchError::Unauthorized(format!("HTTP {}", status.as_u16())))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Err(FetchError::RateLimited(format!("HTTP {}", status.as_u16())))
        }
        _ => Err(FetchError::Transport(format!("HTTP {}", status.as_u16()))),
    }
}

/// Extract value and observation time from a response body
pub fn read_body(
    body: &Value,
    value_pointer: &str,
    date_pointer: Option<&str>,
) -> Result<Reading, FetchError> {
    let value = json_number(body, value_pointer)?;
    let now = Utc::now();
    let observed_at = date_pointer
        .and_then(|p| body.pointer(p))
        .and_then(Value::as_str)
        .and_then(parse_observation_date)
        .map(|at| at.min(now))
        .unwrap_or(now);
    Ok(Reading::new(value, observed_at))
}

#[async_trait]
impl SourceAdapter for HttpJsonAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Api
    }

    fn is_offered(&self) -> bool {
        self.offered
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Reading, FetchError> {
        let pointer = request
            .value_pointer
            .or(self.value_pointer.as_deref())
            .ok_or_else(|| FetchError::MalformedResponse("no value pointer configured".to_string()))?;

        let _permit = self.budget.acquire().await?;

        let url = self.build_url(request.query);
        debug!(source = %self.name, indicator = request.indicator_id, "GET {}", self.base_url);

        let mut call = self.client.get(&url).timeout(request.timeout);
        if let Some(credential) = &self.credential {
            if let Some(param) = &self.credential_param {
                call = call.query(&[(param.as_str(), credential.as_str())]);
            }
            if let Some(header) = &self.credential_header {
                call = call.header(header.as_str(), credential.as_str());
            }
        }

        let response = call.send().await?;
        classify_status(response.status())?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        read_body(&body, pointer, self.date_pointer.as_deref())
    }
}

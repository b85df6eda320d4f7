//! Static values from configuration

use std::collections::HashMap;

use async_trait::async_trait;

use super::{AdapterKind, FetchRequest, SourceAdapter};
use crate::error::FetchError;
use crate::types::Reading;

/// Serves fixed values keyed by indicator id. Used for offline and demo
/// deployments; it still passes through the plausibility check.
pub struct StaticAdapter {
    name: String,
    values: HashMap<String, f64>,
    offered: bool,
}

impl StaticAdapter {
    pub fn new(name: impl Into<String>, values: HashMap<String, f64>) -> Self {
        Self {
            name: name.into(),
            values,
            offered: true,
        }
    }

    pub fn from_config(source: &config::SourceConfig) -> Self {
        Self {
            name: source.name.clone(),
            values: source.values.clone(),
            offered: source.enabled,
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
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
        self.values
            .get(request.indicator_id)
            .map(|&value| Reading::now(value))
            .ok_or_else(|| {
                FetchError::MalformedResponse(format!("no static value for {}", request.indicator_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::request;
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    #[tokio::test]
    async fn test_static_values() {
        let adapter = StaticAdapter::new("demo", HashMap::from([("vix".to_string(), 17.5)]));
        let reading = adapter.fetch(&request("vix", Duration::from_secs(1))).await.unwrap();
        assert_eq!(reading.value, 17.5);

        let missing = adapter.fetch(&request("skew_index", Duration::from_secs(1))).await;
        assert_matches!(missing, Err(FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_disabled_from_config() {
        let mut source = config::SourceConfig::new("demo", config::SourceKind::Static);
        source.enabled = false;
        assert!(!StaticAdapter::from_config(&source).is_offered());
    }
}

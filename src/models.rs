//! Live model-list fetch and final model reconciliation.
//!
//! Naming heuristics (see [`crate::provider`]) pick a good default before
//! the network round-trip completes; this module has the final say. The
//! fetch targets the OpenAI-compatible `GET {base_url}/models` shape and
//! degrades to the provider's static fallback list on any transport or
//! decode error, so an offline import still completes.

use serde::Deserialize;
use std::time::Duration;

use crate::provider::Provider;

/// OpenAI-compatible model list response.
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Result of reconciling a requested model against the live list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResolution {
    /// The model to persist.
    pub model: String,
    /// Whether the requested model was replaced by a fallback.
    pub replaced: bool,
}

/// Fetches provider model lists over HTTP.
pub struct ModelCatalog {
    client: reqwest::Client,
}

impl ModelCatalog {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// List model ids available at `base_url`.
    ///
    /// Failure degrades to the provider's static fallback list rather than
    /// blocking import completion.
    pub async fn list_models(
        &self,
        base_url: &str,
        api_key: Option<&str>,
        provider: &Provider,
    ) -> Vec<String> {
        match self.fetch_models(base_url, api_key).await {
            Ok(ids) if !ids.is_empty() => ids,
            Ok(_) => {
                tracing::warn!(provider = provider.id(), "Model list empty, using fallback list");
                provider.fallback_models().iter().map(|s| s.to_string()).collect()
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.id(),
                    "Model list fetch failed ({e}), using fallback list"
                );
                provider.fallback_models().iter().map(|s| s.to_string()).collect()
            }
        }
    }

    async fn fetch_models(
        &self,
        base_url: &str,
        api_key: Option<&str>,
    ) -> Result<Vec<String>, reqwest::Error> {
        let url = format!("{}/models", base_url.trim_end_matches('/'));
        let mut request = self.client.get(&url);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let parsed: ModelsResponse = response.json().await?;
        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }

    /// Finalize the model selection against the live list.
    ///
    /// Accepts the requested model if the provider actually serves it;
    /// otherwise substitutes the first available provider fallback, or the
    /// first listed model when none of the fallbacks exist either. The
    /// returned model is never one the list rules out.
    pub async fn reconcile(
        &self,
        requested: &str,
        provider: &Provider,
        base_url: &str,
        api_key: Option<&str>,
    ) -> ModelResolution {
        let available = self.list_models(base_url, api_key, provider).await;

        if available.is_empty() || available.iter().any(|id| id == requested) {
            return ModelResolution {
                model: requested.to_string(),
                replaced: false,
            };
        }

        let fallback = provider
            .fallback_models()
            .iter()
            .find(|candidate| available.iter().any(|id| id == *candidate))
            .map(|s| s.to_string())
            .or_else(|| available.first().cloned());

        match fallback {
            Some(model) => ModelResolution {
                model,
                replaced: true,
            },
            None => ModelResolution {
                model: requested.to_string(),
                replaced: false,
            },
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_failure_degrades_to_fallback_list() {
        // Unroutable port; the request fails fast.
        let catalog = ModelCatalog::new(Duration::from_millis(200));
        let models = catalog
            .list_models("http://127.0.0.1:9", None, &Provider::Groq)
            .await;

        assert_eq!(
            models,
            Provider::Groq
                .fallback_models()
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn reconcile_replaces_unavailable_model() {
        let catalog = ModelCatalog::new(Duration::from_millis(200));
        // Offline: the live list degrades to Groq's fallback models, which
        // do not contain the requested id.
        let resolution = catalog
            .reconcile("claude-x", &Provider::Groq, "http://127.0.0.1:9", None)
            .await;

        assert!(resolution.replaced);
        assert!(Provider::Groq
            .fallback_models()
            .contains(&resolution.model.as_str()));
    }

    #[tokio::test]
    async fn reconcile_accepts_model_present_in_list() {
        let catalog = ModelCatalog::new(Duration::from_millis(200));
        let resolution = catalog
            .reconcile(
                "llama-3.1-8b-instant",
                &Provider::Groq,
                "http://127.0.0.1:9",
                None,
            )
            .await;

        assert!(!resolution.replaced);
        assert_eq!(resolution.model, "llama-3.1-8b-instant");
    }

    #[tokio::test]
    async fn unknown_provider_with_empty_list_keeps_request() {
        let catalog = ModelCatalog::new(Duration::from_millis(200));
        let provider = Provider::from_id("acme");
        let resolution = catalog
            .reconcile("acme-chat-1", &provider, "http://127.0.0.1:9", None)
            .await;

        assert!(!resolution.replaced);
        assert_eq!(resolution.model, "acme-chat-1");
    }
}

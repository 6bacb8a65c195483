//! MCP connection applicator.
//!
//! Sharing clients are sloppy about credential shapes: the same service key
//! may arrive as a bare token string or as an object wrapper, depending on
//! which client produced the link. Everything is normalized to the tagged
//! [`McpCredential`] union at this boundary; unrecognized shapes skip with
//! a warning and never crash the import.
//!
//! After the awaited store write (the commit barrier), a best-effort
//! reconnect runs for services that support it. Reconnect failure is
//! non-fatal and turns into a "reconnect manually" status line.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use super::ApplyContext;
use crate::error::ImportWarning;
use crate::payload::SharedPayload;
use crate::store::{keys, set_typed, StoreError};

/// Canonical stored shape of an MCP service credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpCredential {
    /// OAuth token record (e.g. GitHub app installations).
    #[serde(rename = "oauth")]
    OAuth {
        access_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<i64>,
    },
    /// Plain bearer token (e.g. Slack-style integrations).
    Bearer { token: String },
    /// Static API key (e.g. search or weather services).
    ApiKey { key: String },
}

/// Credential style a service expects when the payload gives only a bare
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceKind {
    OAuth,
    Bearer,
    ApiKey,
}

fn service_kind(service: &str) -> ServiceKind {
    match service {
        "github" | "gitlab" => ServiceKind::OAuth,
        "slack" | "notion" | "linear" => ServiceKind::Bearer,
        "serper" | "openweather" | "brave-search" => ServiceKind::ApiKey,
        // Bare strings for unknown services are treated as bearer tokens,
        // the most common wire shape.
        _ => ServiceKind::Bearer,
    }
}

/// Normalize a payload credential value to the canonical stored shape.
///
/// Accepts a bare string (interpreted per service kind) or an object
/// wrapper carrying `access_token`, `token`, or `key`. Anything else is an
/// unrecognized shape.
pub fn normalize_credential(service: &str, value: &Value) -> Option<McpCredential> {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            let s = s.trim().to_string();
            Some(match service_kind(service) {
                ServiceKind::OAuth => McpCredential::OAuth {
                    access_token: s,
                    refresh_token: None,
                    expires_at: None,
                },
                ServiceKind::Bearer => McpCredential::Bearer { token: s },
                ServiceKind::ApiKey => McpCredential::ApiKey { key: s },
            })
        }
        Value::Object(map) => {
            if let Some(Value::String(access_token)) = map.get("access_token") {
                return Some(McpCredential::OAuth {
                    access_token: access_token.clone(),
                    refresh_token: map
                        .get("refresh_token")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    expires_at: map.get("expires_at").and_then(Value::as_i64),
                });
            }
            if let Some(Value::String(token)) = map.get("token") {
                return Some(McpCredential::Bearer {
                    token: token.clone(),
                });
            }
            if let Some(Value::String(key)) = map.get("key") {
                return Some(McpCredential::ApiKey { key: key.clone() });
            }
            None
        }
        _ => None,
    }
}

/// Error from a live reconnect attempt.
#[derive(Debug, Error)]
#[error("reconnect to {service} failed: {message}")]
pub struct ReconnectError {
    pub service: String,
    pub message: String,
}

/// Live-integration reconnect hook.
///
/// Implemented by the host's connector registry; the import only asks for a
/// best-effort reconnect after credentials land in the store.
#[async_trait]
pub trait McpConnector: Send + Sync {
    /// Whether this service supports automatic reconnection.
    fn supports_reconnect(&self, service: &str) -> bool;

    /// Attempt to (re)establish the live connection with the stored
    /// credential.
    async fn reconnect(
        &self,
        service: &str,
        credential: &McpCredential,
    ) -> Result<(), ReconnectError>;
}

/// Connector that never reconnects; the default when the host has no live
/// integrations.
pub struct NullConnector;

#[async_trait]
impl McpConnector for NullConnector {
    fn supports_reconnect(&self, _service: &str) -> bool {
        false
    }

    async fn reconnect(
        &self,
        service: &str,
        _credential: &McpCredential,
    ) -> Result<(), ReconnectError> {
        Err(ReconnectError {
            service: service.to_string(),
            message: "no live connector available".to_string(),
        })
    }
}

pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
    connector: &dyn McpConnector,
    settle: std::time::Duration,
) -> Result<(), StoreError> {
    if payload.mcp_connections.is_empty() {
        return Ok(());
    }

    let mut stored: BTreeMap<String, McpCredential> = BTreeMap::new();
    for (service, raw) in &payload.mcp_connections {
        match normalize_credential(service, raw) {
            Some(credential) => {
                set_typed(ctx.store, &keys::mcp_service(service), &credential).await?;
                ctx.summary.mcp_services.push(service.clone());
                stored.insert(service.clone(), credential);
            }
            None => {
                ctx.warn(ImportWarning::UnknownCredentialShape {
                    service: service.clone(),
                });
            }
        }
    }

    // The store writes above have completed; the extra settle delay is for
    // stores that acknowledge before durability.
    if !stored.is_empty() && !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    for (service, credential) in &stored {
        if !connector.supports_reconnect(service) {
            continue;
        }
        match connector.reconnect(service, credential).await {
            Ok(()) => {
                tracing::info!(service = service.as_str(), "Reconnected MCP service");
            }
            Err(e) => {
                tracing::warn!("MCP reconnect failed: {e}");
                ctx.warn(ImportWarning::ReconnectFailed {
                    service: service.clone(),
                });
            }
        }
    }

    Ok(())
}

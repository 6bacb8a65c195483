//! Shared payload types and data structures.
//!
//! A [`SharedPayload`] is the decoded configuration bundle carried by a
//! shared link. It is produced once per decode attempt, consumed
//! synchronously by one apply call, then discarded; only the side effects
//! written to the profile store outlive the import.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a synthetic system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Whether this is a system message.
    pub fn is_system(&self) -> bool {
        self.role == MessageRole::System
    }
}

/// A reusable prompt shared through a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Stable identity; minted on import when the payload omits one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content: String,
}

/// An executable function definition (tool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    #[serde(default)]
    pub description: String,
    /// JSON schema for the function parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Source code executed by the host's sandbox; opaque to the import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Grouping metadata for a function collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The decoded configuration bundle extracted from a shared link.
///
/// Every field is optional: each domain applicator treats an absent field as
/// a no-op. Unknown fields are ignored so older clients can open links
/// produced by newer ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<Prompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_prompt_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_default_prompt_ids: Option<Vec<String>>,
    /// Function definitions keyed by function name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub functions: BTreeMap<String, FunctionDefinition>,
    /// Function name → collection id.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub function_collections: BTreeMap<String, String>,
    /// Collection id → metadata.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub function_collection_metadata: BTreeMap<String, CollectionMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_functions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_tools_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_default_function_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_default_function_collection_ids: Option<Vec<String>>,
    /// Service key → credential in whatever shape the sharing client used.
    /// Normalized to [`crate::apply::mcp::McpCredential`] at the boundary.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mcp_connections: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_eu_documents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
}

impl SharedPayload {
    /// Whether the payload carries nothing at all.
    pub fn is_empty(&self) -> bool {
        serde_json::to_value(self)
            .map(|v| v.as_object().map(|o| o.is_empty()).unwrap_or(true))
            .unwrap_or(true)
    }
}

/// Caller-supplied options for one apply call.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Stage the payload's welcome message for display by the caller.
    pub display_welcome_message: bool,
    /// Agent loading: reconcile function activation to exactly the payload's
    /// enabled set instead of enabling additively.
    pub clean_slate_for_agent: bool,
    /// Re-validate the resolved model against the live model list and
    /// finalize the persisted selection.
    pub validate_after_apply: bool,
}

/// Outcome of one import, returned to the caller for display.
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Model requested by the payload after heuristic (and, when enabled,
    /// live-list) resolution; `None` when the payload named no model.
    pub pending_model: Option<String>,
    /// Consolidated human-readable status lines, grouped by stage.
    pub status_lines: Vec<String>,
    /// Stage-local failures; later stages still ran.
    pub errors: Vec<crate::error::ImportError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_deserializes_camel_case() {
        let json = serde_json::json!({
            "apiKey": "sk-test",
            "baseUrl": "https://api.example.com/v1",
            "enabledFunctions": ["f1"],
            "functionToolsEnabled": true,
            "ragEnabled": false,
        });
        let payload: SharedPayload = serde_json::from_value(json).unwrap();
        assert_eq!(payload.api_key.as_deref(), Some("sk-test"));
        assert_eq!(payload.enabled_functions, Some(vec!["f1".to_string()]));
        assert_eq!(payload.function_tools_enabled, Some(true));
        assert_eq!(payload.rag_enabled, Some(false));
    }

    #[test]
    fn payload_ignores_unknown_fields() {
        let json = serde_json::json!({
            "model": "gpt-4o-mini",
            "someFutureField": {"nested": true},
        });
        let payload: SharedPayload = serde_json::from_value(json).unwrap();
        assert_eq!(payload.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn empty_payload_round_trips_empty() {
        let payload = SharedPayload::default();
        assert!(payload.is_empty());
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, "{}");
    }
}

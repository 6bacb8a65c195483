//! Domain applicators.
//!
//! One submodule per configuration domain. Each applicator is idempotent,
//! independently callable, and treats an absent payload field as a no-op —
//! never an error. Store write failures bubble up as [`StoreError`] and are
//! wrapped into a stage-local failure by the orchestrator; one stage's
//! failure never stops the stages after it.

pub mod credentials;
pub mod functions;
pub mod history;
pub mod mcp;
pub mod model;
pub mod prompts;
pub mod rag;
pub mod theme;

use crate::error::ImportWarning;
use crate::payload::ApplyOptions;
use crate::session::ImportSession;
use crate::store::KvStore;
use crate::util::join_fragments;

/// Mutable state threaded through the applicator sequence.
pub struct ApplyContext<'a> {
    pub store: &'a dyn KvStore,
    pub session: &'a ImportSession,
    pub options: &'a ApplyOptions,
    /// Fragments consolidated into the final status lines.
    pub summary: ImportSummary,
    /// Non-fatal conditions surfaced as extra status lines.
    pub warnings: Vec<ImportWarning>,
}

impl<'a> ApplyContext<'a> {
    pub fn new(
        store: &'a dyn KvStore,
        session: &'a ImportSession,
        options: &'a ApplyOptions,
    ) -> Self {
        Self {
            store,
            session,
            options,
            summary: ImportSummary::default(),
            warnings: Vec::new(),
        }
    }

    /// Record a warning; logged immediately, surfaced as a status line.
    pub fn warn(&mut self, warning: ImportWarning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }
}

/// Accumulated summary fragments, consolidated into at most two lines: a
/// configuration line and a loaded-items line. Individual per-field
/// messages are aggregated, not emitted one by one.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub provider_label: Option<String>,
    pub endpoint: Option<String>,
    pub masked_key: Option<String>,
    pub model: Option<String>,
    pub prompt_count: usize,
    pub enabled_functions: Vec<String>,
    pub mcp_services: Vec<String>,
    pub theme: Option<String>,
    pub rag_enabled: Option<bool>,
}

impl ImportSummary {
    /// `Configuration applied: <provider> provider (<endpoint>) with key
    /// <masked>, model "<id>"` — present pieces only.
    pub fn configuration_line(&self) -> Option<String> {
        let mut head: Option<String> = None;
        if let Some(provider) = &self.provider_label {
            let mut part = format!("{provider} provider");
            if let Some(endpoint) = &self.endpoint {
                part.push_str(&format!(" ({endpoint})"));
            }
            head = Some(part);
        } else if let Some(endpoint) = &self.endpoint {
            head = Some(format!("endpoint {endpoint}"));
        }

        let mut rest: Vec<String> = Vec::new();
        if let Some(key) = &self.masked_key {
            rest.push(format!("key {key}"));
        }
        if let Some(model) = &self.model {
            rest.push(format!("model \"{model}\""));
        }

        match (head, rest.is_empty()) {
            (None, true) => None,
            (None, false) => Some(format!("Configuration applied: {}", rest.join(", "))),
            (Some(head), true) => Some(format!("Configuration applied: {head}")),
            (Some(head), false) => Some(format!(
                "Configuration applied: {head} with {}",
                rest.join(", ")
            )),
        }
    }

    /// `Loaded: N prompts | Functions: a, b, c | MCP: github | Theme: Dark`
    /// — present pieces only.
    pub fn loaded_line(&self) -> Option<String> {
        let mut fragments: Vec<String> = Vec::new();

        if self.prompt_count > 0 {
            let noun = if self.prompt_count == 1 { "prompt" } else { "prompts" };
            fragments.push(format!("{} {noun}", self.prompt_count));
        }
        if !self.enabled_functions.is_empty() {
            fragments.push(format!("Functions: {}", self.enabled_functions.join(", ")));
        }
        if !self.mcp_services.is_empty() {
            fragments.push(format!("MCP: {}", self.mcp_services.join(", ")));
        }
        if let Some(rag) = self.rag_enabled {
            fragments.push(format!("RAG: {}", if rag { "enabled" } else { "disabled" }));
        }
        if let Some(theme) = &self.theme {
            fragments.push(format!("Theme: {theme}"));
        }

        if fragments.is_empty() {
            None
        } else {
            Some(format!("Loaded: {}", join_fragments(&fragments)))
        }
    }

    /// The consolidated status lines, configuration first.
    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(line) = self.configuration_line() {
            lines.push(line);
        }
        if let Some(line) = self.loaded_line() {
            lines.push(line);
        }
        lines
    }
}

//! Import orchestrator: secret resolution, decoding, and the fixed apply
//! sequence.
//!
//! One orchestrator serves one client context. The flow is
//! `Idle → ResolvingSecret → Decoding → Applying → Done`, with a loop back
//! to `ResolvingSecret` on a wrong secret and a terminal `Cancelled` when
//! the user abandons the prompt. The apply sequence is fixed:
//!
//! Credentials+Model → RAG → Prompts → Functions → MCP → Theme →
//! Welcome staging → Conversation history.
//!
//! History runs last because it consumes the status lines every prior stage
//! produced. Each stage is individually caught: a failing store write
//! aborts that stage only, and the orchestrator accumulates the failures
//! into [`ImportResult::errors`] instead of throwing on the first one.
//! Partial success is the expected outcome, not a rollback.

use std::sync::{Arc, Mutex};

use crate::apply::history::{ConversationOutcome, NamespaceResolver, StoreNamespaceResolver};
use crate::apply::mcp::{McpConnector, NullConnector};
use crate::apply::{self, ApplyContext};
use crate::codec::PayloadCodec;
use crate::config::ImportConfig;
use crate::error::{ImportError, Stage};
use crate::models::ModelCatalog;
use crate::payload::{ApplyOptions, ImportResult, SharedPayload};
use crate::provider::Provider;
use crate::secret::{SecretOutcome, SecretResolver};
use crate::session::ImportSession;
use crate::store::{self, keys, KvStore};

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    ResolvingSecret,
    Decoding,
    Applying,
    Done,
    Cancelled,
}

/// Sequences the import pipeline and exposes the single apply entry point.
pub struct ImportOrchestrator {
    store: Arc<dyn KvStore>,
    codec: Arc<dyn PayloadCodec>,
    session: Arc<ImportSession>,
    connector: Arc<dyn McpConnector>,
    namespace: Arc<dyn NamespaceResolver>,
    catalog: ModelCatalog,
    config: ImportConfig,
    state: Mutex<ImportState>,
}

impl ImportOrchestrator {
    pub fn new(
        store: Arc<dyn KvStore>,
        codec: Arc<dyn PayloadCodec>,
        session: Arc<ImportSession>,
        config: ImportConfig,
    ) -> Self {
        let catalog = ModelCatalog::new(config.http_timeout);
        let namespace = Arc::new(StoreNamespaceResolver::new(Arc::clone(&store)));
        Self {
            store,
            codec,
            session,
            connector: Arc::new(NullConnector),
            namespace,
            catalog,
            config,
            state: Mutex::new(ImportState::Idle),
        }
    }

    /// Use a live connector registry for MCP reconnects.
    pub fn with_connector(mut self, connector: Arc<dyn McpConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Override how conversation liveness is decided.
    pub fn with_namespace_resolver(mut self, namespace: Arc<dyn NamespaceResolver>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn session(&self) -> &Arc<ImportSession> {
        &self.session
    }

    pub fn state(&self) -> ImportState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ImportState) {
        *self.state.lock().unwrap() = state;
    }

    fn secret_resolver(&self) -> SecretResolver {
        SecretResolver::new(
            Arc::clone(&self.codec),
            Arc::clone(&self.session),
            Arc::clone(&self.store),
        )
    }

    /// Try to decode `blob` with known secrets; `NeedsPrompt` means the
    /// caller must obtain one from the user and call
    /// [`resolve_with_secret`](Self::resolve_with_secret).
    pub async fn resolve_secret(&self, blob: &str) -> Result<SecretOutcome, ImportError> {
        self.set_state(ImportState::ResolvingSecret);
        let outcome = self.secret_resolver().resolve(blob).await?;
        if matches!(outcome, SecretOutcome::Decoded(_)) {
            self.set_state(ImportState::Decoding);
        }
        Ok(outcome)
    }

    /// Decode `blob` with a user-entered secret.
    ///
    /// A wrong secret loops the state machine back to `ResolvingSecret` for
    /// another attempt; retries are unlimited and nothing has been written.
    pub async fn resolve_with_secret(
        &self,
        blob: &str,
        secret: &str,
    ) -> Result<SharedPayload, ImportError> {
        self.set_state(ImportState::Decoding);
        match self
            .secret_resolver()
            .resolve_with_secret(blob, secret, self.config.lock_secret)
            .await
        {
            Ok(payload) => Ok(payload),
            Err(ImportError::IncorrectSecret) => {
                self.set_state(ImportState::ResolvingSecret);
                Err(ImportError::IncorrectSecret)
            }
            Err(e) => Err(e),
        }
    }

    /// Abandon the secret prompt. Only possible before applying begins;
    /// once the sequence runs it completes (with per-stage error capture).
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match *state {
            ImportState::Applying | ImportState::Done => false,
            _ => {
                *state = ImportState::Cancelled;
                true
            }
        }
    }

    /// Apply a decoded payload: the single entry point used by callers.
    ///
    /// Never returns early on stage failures; every stage gets its chance
    /// and failures accumulate in [`ImportResult::errors`].
    pub async fn apply(&self, payload: &SharedPayload, options: ApplyOptions) -> ImportResult {
        let Some(_guard) = self.session.begin_import() else {
            return ImportResult {
                errors: vec![ImportError::ImportInProgress],
                ..Default::default()
            };
        };
        self.set_state(ImportState::Applying);

        let mut ctx = ApplyContext::new(&*self.store, &self.session, &options);
        let mut errors: Vec<ImportError> = Vec::new();
        let mut pending_model: Option<String> = None;

        // Credentials and model form one orchestration step: model
        // resolution needs the provider the credentials stage just wrote.
        if let Err(source) = apply::credentials::apply(&mut ctx, payload).await {
            errors.push(ImportError::StageFailure {
                stage: Stage::Credentials,
                source,
            });
        }
        match apply::model::apply(&mut ctx, payload).await {
            Ok(model) => pending_model = model,
            Err(source) => errors.push(ImportError::StageFailure {
                stage: Stage::Model,
                source,
            }),
        }

        if let Err(source) = apply::rag::apply(&mut ctx, payload).await {
            errors.push(ImportError::StageFailure {
                stage: Stage::Rag,
                source,
            });
        }
        if let Err(source) = apply::prompts::apply(&mut ctx, payload).await {
            errors.push(ImportError::StageFailure {
                stage: Stage::Prompts,
                source,
            });
        }
        if let Err(source) = apply::functions::apply(&mut ctx, payload).await {
            errors.push(ImportError::StageFailure {
                stage: Stage::Functions,
                source,
            });
        }
        if let Err(source) = apply::mcp::apply(
            &mut ctx,
            payload,
            &*self.connector,
            self.config.reconnect_settle,
        )
        .await
        {
            errors.push(ImportError::StageFailure {
                stage: Stage::Mcp,
                source,
            });
        }
        if let Err(source) = apply::theme::apply(&mut ctx, payload).await {
            errors.push(ImportError::StageFailure {
                stage: Stage::Theme,
                source,
            });
        }

        // Welcome staging: consumed exactly once by the conversation view.
        if options.display_welcome_message {
            if let Some(welcome) = &payload.welcome_message {
                self.session.stage_welcome(welcome);
            }
        }

        if options.validate_after_apply {
            if let Some(requested) = pending_model.clone() {
                match self.finalize_model(&mut ctx, &requested).await {
                    Ok(model) => pending_model = Some(model),
                    Err(source) => errors.push(ImportError::StageFailure {
                        stage: Stage::Model,
                        source,
                    }),
                }
            }
        }

        // Consolidate: at most two summary lines, then warning lines.
        let mut status_lines = ctx.summary.status_lines();
        status_lines.extend(ctx.warnings.iter().map(|w| w.to_string()));

        // History runs last; it consumes the lines above.
        match apply::history::apply(&mut ctx, payload, &*self.namespace, &status_lines).await {
            Ok(ConversationOutcome::ReloadedLocal) => {
                tracing::info!("Existing conversation reloaded from local store");
            }
            Ok(_) => {}
            Err(source) => errors.push(ImportError::StageFailure {
                stage: Stage::History,
                source,
            }),
        }

        self.set_state(ImportState::Done);
        ImportResult {
            pending_model,
            status_lines,
            errors,
        }
    }

    /// Re-validate the heuristic model choice against the live model list
    /// and persist the final selection. The store, not the payload, is the
    /// source of truth for provider and endpoint at this point.
    async fn finalize_model(
        &self,
        ctx: &mut ApplyContext<'_>,
        requested: &str,
    ) -> Result<String, crate::store::StoreError> {
        let provider = store::get_typed::<String>(&*self.store, keys::PROVIDER)
            .await?
            .map(|id| Provider::from_id(&id));
        let base_url = store::get_typed::<String>(&*self.store, keys::BASE_URL).await?;
        let api_key = store::get_typed::<String>(&*self.store, keys::API_KEY).await?;

        let (Some(provider), Some(base_url)) = (provider, base_url) else {
            // Nothing to fetch against; the heuristic choice stands.
            return Ok(requested.to_string());
        };

        let resolution = self
            .catalog
            .reconcile(requested, &provider, &base_url, api_key.as_deref())
            .await;

        if resolution.replaced {
            ctx.warn(crate::error::ImportWarning::ModelReplaced {
                requested: requested.to_string(),
                fallback: resolution.model.clone(),
            });
            apply::model::persist_model(ctx, &resolution.model).await?;
            ctx.summary.model = Some(resolution.model.clone());
        }

        Ok(resolution.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::AesGcmCodec;
    use crate::payload::{ChatMessage, FunctionDefinition, MessageRole};
    use crate::store::{get_typed, set_typed, MemoryStore, StoreError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn orchestrator_with(store: Arc<MemoryStore>) -> ImportOrchestrator {
        ImportOrchestrator::new(
            store as Arc<dyn KvStore>,
            Arc::new(AesGcmCodec::with_iterations(16)),
            ImportSession::new(),
            ImportConfig::default(),
        )
    }

    fn fresh_payload() -> SharedPayload {
        SharedPayload {
            api_key: Some("sk-xxxxxxxxxxxxxxxx1234".into()),
            provider: Some("openai".into()),
            model: Some("gpt-4-mini".into()),
            functions: BTreeMap::from([(
                "f1".to_string(),
                FunctionDefinition {
                    description: "demo".into(),
                    parameters: serde_json::json!({"type": "object"}),
                    code: None,
                },
            )]),
            enabled_functions: Some(vec!["f1".into()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fresh_import_scenario() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(Arc::clone(&store));

        let result = orchestrator
            .apply(&fresh_payload(), ApplyOptions::default())
            .await;

        assert!(result.errors.is_empty());
        assert_eq!(result.pending_model.as_deref(), Some("gpt-4-mini"));

        let enabled: Vec<String> = get_typed(&*store, keys::ENABLED_FUNCTIONS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enabled, vec!["f1".to_string()]);

        // One configuration line mentioning the masked key and provider.
        let config_line = &result.status_lines[0];
        assert!(config_line.starts_with("Configuration applied: OpenAI provider"));
        assert!(config_line.contains("sk-xxxxxxx****************1234"));
        assert!(!config_line.contains("sk-xxxxxxxxxxxxxxxx1234"));
        assert_eq!(orchestrator.state(), ImportState::Done);
    }

    #[tokio::test]
    async fn reapplying_the_same_payload_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(Arc::clone(&store));
        let payload = fresh_payload();

        orchestrator.apply(&payload, ApplyOptions::default()).await;
        let mut first = store.snapshot().await;

        orchestrator.apply(&payload, ApplyOptions::default()).await;
        let mut second = store.snapshot().await;

        // The write timestamp is the only field allowed to move.
        first.remove(keys::MODEL_UPDATED_AT);
        second.remove(keys::MODEL_UPDATED_AT);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn incompatible_model_is_replaced_by_provider_fallback() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(Arc::clone(&store));

        let payload = SharedPayload {
            provider: Some("openai".into()),
            model: Some("claude-x".into()),
            ..Default::default()
        };
        let result = orchestrator.apply(&payload, ApplyOptions::default()).await;

        let persisted: String = get_typed(&*store, keys::MODEL).await.unwrap().unwrap();
        assert_ne!(persisted, "claude-x");
        assert!(Provider::OpenAI.is_compatible(&persisted));
        assert_eq!(result.pending_model.as_deref(), Some(persisted.as_str()));
    }

    #[tokio::test]
    async fn live_conversation_is_not_overwritten() {
        let store = Arc::new(MemoryStore::new());
        let local = vec![ChatMessage {
            role: MessageRole::User,
            content: "work in progress".into(),
        }];
        set_typed(&*store, keys::CONVERSATION, &local).await.unwrap();

        let orchestrator = orchestrator_with(Arc::clone(&store));
        let payload = SharedPayload {
            messages: vec![ChatMessage {
                role: MessageRole::User,
                content: "imported".into(),
            }],
            ..Default::default()
        };
        orchestrator.apply(&payload, ApplyOptions::default()).await;

        let stored: Vec<ChatMessage> = get_typed(&*store, keys::CONVERSATION)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, local);
    }

    #[tokio::test]
    async fn concurrent_apply_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(store);

        let _held = orchestrator.session().begin_import().unwrap();
        let result = orchestrator
            .apply(&fresh_payload(), ApplyOptions::default())
            .await;

        assert!(matches!(
            result.errors.as_slice(),
            [ImportError::ImportInProgress]
        ));
        assert!(result.status_lines.is_empty());
    }

    #[tokio::test]
    async fn secret_retry_loop() {
        let store = Arc::new(MemoryStore::new());
        let codec = AesGcmCodec::with_iterations(16);
        let blob = codec.encode(&fresh_payload(), "right").unwrap();
        let orchestrator = orchestrator_with(Arc::clone(&store));

        assert!(matches!(
            orchestrator.resolve_secret(&blob).await.unwrap(),
            SecretOutcome::NeedsPrompt
        ));

        let err = orchestrator
            .resolve_with_secret(&blob, "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::IncorrectSecret));
        assert_eq!(orchestrator.state(), ImportState::ResolvingSecret);
        assert!(store.snapshot().await.is_empty());

        let payload = orchestrator
            .resolve_with_secret(&blob, "right")
            .await
            .unwrap();
        let result = orchestrator.apply(&payload, ApplyOptions::default()).await;
        assert!(result.errors.is_empty());
        assert!(orchestrator.session().is_verified());
    }

    #[tokio::test]
    async fn cancel_before_apply_aborts_cleanly() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(Arc::clone(&store));

        let codec = AesGcmCodec::with_iterations(16);
        let blob = codec.encode(&fresh_payload(), "pw").unwrap();
        orchestrator.resolve_secret(&blob).await.unwrap();

        assert!(orchestrator.cancel());
        assert_eq!(orchestrator.state(), ImportState::Cancelled);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn welcome_message_is_staged_once() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(store);

        let payload = SharedPayload {
            welcome_message: Some("Hello from the agent".into()),
            ..Default::default()
        };
        let options = ApplyOptions {
            display_welcome_message: true,
            ..Default::default()
        };
        orchestrator.apply(&payload, options).await;

        let session = orchestrator.session();
        assert_eq!(
            session.take_deferred_welcome().as_deref(),
            Some("Hello from the agent")
        );
        assert_eq!(session.take_deferred_welcome(), None);
    }

    /// Store that fails writes to one key, for stage-isolation tests.
    struct FailingStore {
        inner: MemoryStore,
        poison_key: &'static str,
    }

    #[async_trait]
    impl KvStore for FailingStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
            if key == self.poison_key {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn one_failing_stage_does_not_stop_the_rest() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::new(),
            poison_key: keys::PROMPTS,
        });
        let orchestrator = ImportOrchestrator::new(
            Arc::clone(&store) as Arc<dyn KvStore>,
            Arc::new(AesGcmCodec::with_iterations(16)),
            ImportSession::new(),
            ImportConfig::default(),
        );

        let payload = SharedPayload {
            prompts: vec![crate::payload::Prompt {
                id: Some("p1".into()),
                name: "One".into(),
                description: None,
                content: "text".into(),
            }],
            theme: Some("Dark".into()),
            ..Default::default()
        };
        let result = orchestrator.apply(&payload, ApplyOptions::default()).await;

        assert!(matches!(
            result.errors.as_slice(),
            [ImportError::StageFailure { stage: Stage::Prompts, .. }]
        ));
        // The theme stage after the failure still ran.
        let theme: Option<String> = get_typed(&*store, keys::THEME).await.unwrap();
        assert_eq!(theme.as_deref(), Some("Dark"));
    }

    #[tokio::test]
    async fn import_guard_clears_after_apply() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator_with(store);

        orchestrator
            .apply(&fresh_payload(), ApplyOptions::default())
            .await;
        assert!(!orchestrator.session().import_in_progress());

        // A second import may start now.
        let result = orchestrator
            .apply(&fresh_payload(), ApplyOptions::default())
            .await;
        assert!(result.errors.is_empty());
    }
}

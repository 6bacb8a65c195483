//! Model applicator.
//!
//! Runs after credentials so the provider is known. The requested model is
//! resolved through the naming heuristics, persisted immediately (so
//! concurrent API calls see it), and the session's in-memory model cache is
//! invalidated — the store must win over any cached value the moment the
//! import lands. Live-list validation happens later in the orchestrator
//! when `validate_after_apply` is set.

use super::ApplyContext;
use crate::error::ImportWarning;
use crate::payload::SharedPayload;
use crate::provider::{resolve_requested_model, Provider};
use crate::store::{keys, set_typed, StoreError};

/// Persist a model selection together with its staleness timestamp, and
/// drop any in-memory copy.
pub async fn persist_model(
    ctx: &mut ApplyContext<'_>,
    model: &str,
) -> Result<(), StoreError> {
    set_typed(ctx.store, keys::MODEL, &model.to_string()).await?;
    set_typed(
        ctx.store,
        keys::MODEL_UPDATED_AT,
        &chrono::Utc::now().to_rfc3339(),
    )
    .await?;
    ctx.session.invalidate_model_cache();
    Ok(())
}

/// Returns the pending model after heuristic resolution, if the payload
/// named one.
pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
) -> Result<Option<String>, StoreError> {
    let Some(requested) = &payload.model else {
        return Ok(None);
    };

    let provider = payload.provider.as_deref().map(Provider::from_id);
    let (model, replaced) = resolve_requested_model(requested, provider.as_ref());

    if replaced {
        ctx.warn(ImportWarning::ModelReplaced {
            requested: requested.clone(),
            fallback: model.clone(),
        });
    }

    persist_model(ctx, &model).await?;
    ctx.summary.model = Some(model.clone());
    tracing::info!(model = %model, "Applied model selection");

    Ok(Some(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ApplyOptions;
    use crate::session::ImportSession;
    use crate::store::{get_typed, MemoryStore};

    #[tokio::test]
    async fn persists_model_and_timestamp() {
        let store = MemoryStore::new();
        let session = ImportSession::new();
        let options = ApplyOptions::default();
        let mut ctx = ApplyContext::new(&store, &session, &options);

        let payload = SharedPayload {
            model: Some("gpt-4o-mini".into()),
            provider: Some("openai".into()),
            ..Default::default()
        };
        let pending = apply(&mut ctx, &payload).await.unwrap();

        assert_eq!(pending.as_deref(), Some("gpt-4o-mini"));
        let stored: Option<String> = get_typed(&store, keys::MODEL).await.unwrap();
        assert_eq!(stored.as_deref(), Some("gpt-4o-mini"));
        let stamp: Option<String> = get_typed(&store, keys::MODEL_UPDATED_AT).await.unwrap();
        assert!(stamp.is_some());
    }

    #[tokio::test]
    async fn incompatible_model_is_replaced_and_warned() {
        let store = MemoryStore::new();
        let session = ImportSession::new();
        let options = ApplyOptions::default();
        let mut ctx = ApplyContext::new(&store, &session, &options);

        let payload = SharedPayload {
            model: Some("claude-x".into()),
            provider: Some("openai".into()),
            ..Default::default()
        };
        let pending = apply(&mut ctx, &payload).await.unwrap().unwrap();

        assert_ne!(pending, "claude-x");
        assert!(Provider::OpenAI.is_compatible(&pending));
        assert!(matches!(
            ctx.warnings.as_slice(),
            [ImportWarning::ModelReplaced { .. }]
        ));
    }

    #[tokio::test]
    async fn stale_model_cache_is_invalidated() {
        let store = MemoryStore::new();
        let session = ImportSession::new();
        session.set_cached_model("old-model");
        let options = ApplyOptions::default();
        let mut ctx = ApplyContext::new(&store, &session, &options);

        let payload = SharedPayload {
            model: Some("gpt-4o-mini".into()),
            ..Default::default()
        };
        apply(&mut ctx, &payload).await.unwrap();

        assert_eq!(session.cached_model(), None);
    }

    #[tokio::test]
    async fn absent_model_is_a_no_op() {
        let store = MemoryStore::new();
        let session = ImportSession::new();
        let options = ApplyOptions::default();
        let mut ctx = ApplyContext::new(&store, &session, &options);

        let pending = apply(&mut ctx, &SharedPayload::default()).await.unwrap();
        assert!(pending.is_none());
        assert!(store.snapshot().await.is_empty());
    }
}

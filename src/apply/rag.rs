//! RAG settings applicator.

use super::ApplyContext;
use crate::payload::SharedPayload;
use crate::store::{keys, set_typed, StoreError};

pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
) -> Result<(), StoreError> {
    if let Some(enabled) = payload.rag_enabled {
        set_typed(ctx.store, keys::RAG_ENABLED, &enabled).await?;
        ctx.summary.rag_enabled = Some(enabled);
    }

    if let Some(documents) = &payload.rag_eu_documents {
        set_typed(ctx.store, keys::RAG_EU_DOCUMENTS, documents).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ApplyOptions;
    use crate::session::ImportSession;
    use crate::store::{get_typed, MemoryStore};

    #[tokio::test]
    async fn persists_flag_and_document_set() {
        let store = MemoryStore::new();
        let session = ImportSession::new();
        let options = ApplyOptions::default();
        let mut ctx = ApplyContext::new(&store, &session, &options);

        let payload = SharedPayload {
            rag_enabled: Some(true),
            rag_eu_documents: Some(vec!["doc-1".into(), "doc-2".into()]),
            ..Default::default()
        };
        apply(&mut ctx, &payload).await.unwrap();

        let enabled: Option<bool> = get_typed(&store, keys::RAG_ENABLED).await.unwrap();
        assert_eq!(enabled, Some(true));
        let documents: Vec<String> = get_typed(&store, keys::RAG_EU_DOCUMENTS)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(documents.len(), 2);
    }

    #[tokio::test]
    async fn absence_leaves_existing_settings() {
        let store = MemoryStore::new();
        let session = ImportSession::new();
        let options = ApplyOptions::default();

        set_typed(&store, keys::RAG_ENABLED, &true).await.unwrap();

        let mut ctx = ApplyContext::new(&store, &session, &options);
        apply(&mut ctx, &SharedPayload::default()).await.unwrap();

        let enabled: Option<bool> = get_typed(&store, keys::RAG_ENABLED).await.unwrap();
        assert_eq!(enabled, Some(true));
    }
}

//! Theme applicator.

use super::ApplyContext;
use crate::payload::SharedPayload;
use crate::store::{keys, set_typed, StoreError};

pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
) -> Result<(), StoreError> {
    let Some(theme) = &payload.theme else {
        return Ok(());
    };

    set_typed(ctx.store, keys::THEME, theme).await?;
    ctx.summary.theme = Some(theme.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::ApplyOptions;
    use crate::session::ImportSession;
    use crate::store::{get_typed, MemoryStore};

    #[tokio::test]
    async fn persists_theme_name() {
        let store = MemoryStore::new();
        let session = ImportSession::new();
        let options = ApplyOptions::default();
        let mut ctx = ApplyContext::new(&store, &session, &options);

        let payload = SharedPayload {
            theme: Some("Dark".into()),
            ..Default::default()
        };
        apply(&mut ctx, &payload).await.unwrap();

        let theme: Option<String> = get_typed(&store, keys::THEME).await.unwrap();
        assert_eq!(theme.as_deref(), Some("Dark"));
        assert_eq!(ctx.summary.theme.as_deref(), Some("Dark"));
    }
}

//! Prompt library applicator.
//!
//! Prompts are persisted by identity and merged into the existing library;
//! a payload prompt without an id adopts the id of an existing prompt with
//! the same name (so re-imports do not duplicate) before a fresh id is
//! minted. Built-in prompt selections reset to empty when the payload
//! carries none — an import states the complete intended selection.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::ApplyContext;
use crate::payload::{Prompt, SharedPayload};
use crate::store::{get_typed, keys, set_typed, StoreError};

pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
) -> Result<(), StoreError> {
    let mut library: BTreeMap<String, Prompt> =
        get_typed(ctx.store, keys::PROMPTS).await?.unwrap_or_default();

    if !payload.prompts.is_empty() {
        for prompt in &payload.prompts {
            let id = prompt
                .id
                .clone()
                .or_else(|| {
                    library
                        .iter()
                        .find(|(_, existing)| existing.name == prompt.name)
                        .map(|(id, _)| id.clone())
                })
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            let mut stored = prompt.clone();
            stored.id = Some(id.clone());
            library.insert(id, stored);
        }

        set_typed(ctx.store, keys::PROMPTS, &library).await?;
        ctx.summary.prompt_count = payload.prompts.len();
        tracing::info!(count = payload.prompts.len(), "Imported prompts");
    }

    if let Some(selected) = &payload.selected_prompt_ids {
        set_typed(ctx.store, keys::SELECTED_PROMPT_IDS, selected).await?;
    }

    // Built-in selections reset to empty when absent: the import is the
    // complete statement of what should be selected.
    let default_selected = payload
        .selected_default_prompt_ids
        .clone()
        .unwrap_or_default();
    set_typed(
        ctx.store,
        keys::SELECTED_DEFAULT_PROMPT_IDS,
        &default_selected,
    )
    .await?;

    recompute_system_prompt(ctx, &library, payload, &default_selected).await
}

/// Recompute the effective system prompt from the union of selections, in
/// stable id order. Only runs when some selection is non-empty; a payload
/// with no selections leaves whatever the credentials stage wrote.
async fn recompute_system_prompt(
    ctx: &mut ApplyContext<'_>,
    library: &BTreeMap<String, Prompt>,
    payload: &SharedPayload,
    default_selected: &[String],
) -> Result<(), StoreError> {
    let mut selected: Vec<&str> = payload
        .selected_prompt_ids
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(String::as_str)
        .collect();
    selected.extend(default_selected.iter().map(String::as_str));

    if selected.is_empty() {
        return Ok(());
    }

    selected.sort_unstable();
    selected.dedup();

    let combined: Vec<&str> = selected
        .iter()
        .filter_map(|id| library.get(*id).map(|p| p.content.as_str()))
        .collect();

    if combined.is_empty() {
        return Ok(());
    }

    set_typed(
        ctx.store,
        keys::SYSTEM_PROMPT,
        &combined.join("\n\n"),
    )
    .await
}

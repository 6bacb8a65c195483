//! Function (tool) applicator.
//!
//! Definitions merge into the existing registry without discarding anything.
//! Activation then runs in one of two modes: clean-slate agent loading
//! reconciles the enabled set to exactly the payload's set via the minimal
//! diff (unrelated live integrations keep their registrations), while the
//! normal mode is purely additive — nothing is disabled.

use std::collections::{BTreeMap, BTreeSet};

use super::ApplyContext;
use crate::diff;
use crate::error::ImportWarning;
use crate::payload::{FunctionDefinition, SharedPayload};
use crate::store::{get_typed, keys, set_typed, StoreError};

pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
) -> Result<(), StoreError> {
    let mut registry: BTreeMap<String, FunctionDefinition> = get_typed(ctx.store, keys::FUNCTIONS)
        .await?
        .unwrap_or_default();

    if !payload.functions.is_empty() {
        for (name, definition) in &payload.functions {
            registry.insert(name.clone(), definition.clone());
        }
        set_typed(ctx.store, keys::FUNCTIONS, &registry).await?;
        tracing::info!(count = payload.functions.len(), "Imported function definitions");
    }

    if !payload.function_collections.is_empty() {
        let mut collections: BTreeMap<String, String> =
            get_typed(ctx.store, keys::FUNCTION_COLLECTIONS)
                .await?
                .unwrap_or_default();
        collections.extend(
            payload
                .function_collections
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        set_typed(ctx.store, keys::FUNCTION_COLLECTIONS, &collections).await?;
    }

    if !payload.function_collection_metadata.is_empty() {
        let mut metadata: BTreeMap<String, crate::payload::CollectionMetadata> =
            get_typed(ctx.store, keys::FUNCTION_COLLECTION_METADATA)
                .await?
                .unwrap_or_default();
        metadata.extend(
            payload
                .function_collection_metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        set_typed(ctx.store, keys::FUNCTION_COLLECTION_METADATA, &metadata).await?;
    }

    apply_activation(ctx, payload, &registry).await?;
    apply_tools_flag(ctx, payload).await?;

    // Built-in selections reset to empty when absent, same policy as
    // prompts: the import states the complete intended selection.
    set_typed(
        ctx.store,
        keys::SELECTED_DEFAULT_FUNCTION_IDS,
        &payload
            .selected_default_function_ids
            .clone()
            .unwrap_or_default(),
    )
    .await?;
    set_typed(
        ctx.store,
        keys::SELECTED_DEFAULT_FUNCTION_COLLECTION_IDS,
        &payload
            .selected_default_function_collection_ids
            .clone()
            .unwrap_or_default(),
    )
    .await?;

    if !payload.functions.is_empty() {
        ctx.summary.enabled_functions = payload.functions.keys().cloned().collect();
    } else if let Some(enabled) = &payload.enabled_functions {
        ctx.summary.enabled_functions = enabled.clone();
    }

    Ok(())
}

async fn apply_activation(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
    registry: &BTreeMap<String, FunctionDefinition>,
) -> Result<(), StoreError> {
    let all_defined: BTreeSet<String> = registry.keys().cloned().collect();
    let mut enabled: BTreeSet<String> = get_typed::<Vec<String>>(ctx.store, keys::ENABLED_FUNCTIONS)
        .await?
        .unwrap_or_default()
        .into_iter()
        .collect();

    if ctx.options.clean_slate_for_agent {
        // Agent loading: the enabled set becomes exactly the payload's set,
        // touching as little as possible along the way.
        let required: BTreeSet<String> = payload
            .enabled_functions
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();

        let activation = diff::diff(&all_defined, &enabled, &required);
        for name in &activation.missing {
            ctx.warn(ImportWarning::UnknownFunction { name: name.clone() });
        }
        if activation.is_empty() {
            return Ok(());
        }

        enabled.retain(|name| !activation.to_disable.contains(name));
        enabled.extend(activation.to_enable.iter().cloned());
    } else {
        // Additive: enable what the payload asks for, disable nothing.
        let Some(required) = &payload.enabled_functions else {
            return Ok(());
        };
        let mut changed = false;
        for name in required {
            if !all_defined.contains(name) {
                ctx.warn(ImportWarning::UnknownFunction { name: name.clone() });
            } else if enabled.insert(name.clone()) {
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }
    }

    set_typed(
        ctx.store,
        keys::ENABLED_FUNCTIONS,
        &enabled.iter().cloned().collect::<Vec<_>>(),
    )
    .await
}

async fn apply_tools_flag(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
) -> Result<(), StoreError> {
    // Explicit flag wins; otherwise supplying functions implies tools on.
    let flag = match payload.function_tools_enabled {
        Some(explicit) => explicit,
        None if !payload.functions.is_empty() => true,
        None => return Ok(()),
    };
    set_typed(ctx.store, keys::FUNCTION_TOOLS_ENABLED, &flag).await
}

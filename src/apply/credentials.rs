//! Credentials/endpoint applicator.
//!
//! API key, base URL, and provider are persisted together: the three fields
//! are only meaningful as a unit, and later stages (model resolution) read
//! them back from the store. When the payload names a provider but no base
//! URL, the provider's default endpoint is derived.

use super::ApplyContext;
use crate::payload::SharedPayload;
use crate::provider::Provider;
use crate::store::{keys, set_typed, StoreError};
use crate::util::mask_secret;

pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
) -> Result<(), StoreError> {
    let provider = payload.provider.as_deref().map(Provider::from_id);

    let base_url = payload.base_url.clone().or_else(|| {
        provider
            .as_ref()
            .and_then(|p| p.default_base_url())
            .map(|url| url.to_string())
    });

    if let Some(key) = &payload.api_key {
        set_typed(ctx.store, keys::API_KEY, key).await?;
        ctx.summary.masked_key = Some(mask_secret(key));
    }

    if let Some(url) = &base_url {
        set_typed(ctx.store, keys::BASE_URL, url).await?;
        ctx.summary.endpoint = Some(url.clone());
    }

    if let Some(p) = &provider {
        set_typed(ctx.store, keys::PROVIDER, &p.id().to_string()).await?;
        ctx.summary.provider_label = Some(p.display_name().to_string());
        tracing::info!(provider = p.id(), "Applied provider credentials");
    }

    if let Some(system_prompt) = &payload.system_prompt {
        set_typed(ctx.store, keys::SYSTEM_PROMPT, system_prompt).await?;
    }

    Ok(())
}

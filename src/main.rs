//! sharelink - CLI entry point.
//!
//! Imports a shared configuration link into a local profile:
//!
//! ```text
//! sharelink [--agent] [--no-welcome] [--validate] <url>
//! ```
//!
//! The passphrase comes from `SHARELINK_PASSPHRASE` when set; otherwise the
//! tool prompts on stdin and retries until the secret opens the link or the
//! user aborts with an empty line.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sharelink::codec::extract_fragment_payload;
use sharelink::{
    AesGcmCodec, ApplyOptions, ImportConfig, ImportError, ImportOrchestrator, ImportSession,
    JsonFileStore, KvStore, SecretOutcome,
};

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

struct CliArgs {
    url: String,
    agent: bool,
    welcome: bool,
    validate: bool,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut url = None;
    let mut agent = false;
    let mut welcome = true;
    let mut validate = false;

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--agent" => agent = true,
            "--no-welcome" => welcome = false,
            "--validate" => validate = true,
            "--help" | "-h" => {
                eprintln!("Usage: sharelink [--agent] [--no-welcome] [--validate] <url>");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("Unknown flag: {other}"),
            other => url = Some(other.to_string()),
        }
    }

    let url = url.context("Missing shared link URL")?;
    Ok(CliArgs {
        url,
        agent,
        welcome,
        validate,
    })
}

async fn async_main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sharelink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = parse_args()?;
    let config = ImportConfig::from_env()?;

    let blob = extract_fragment_payload(&args.url)
        .context("The URL does not carry a shared configuration")?;

    info!("Loading profile from {}", config.profile_path.display());
    let store: Arc<dyn KvStore> =
        Arc::new(JsonFileStore::new(config.profile_path.clone()).await);
    let orchestrator = ImportOrchestrator::new(
        store,
        Arc::new(AesGcmCodec::new()),
        ImportSession::new(),
        config,
    );

    let payload = match orchestrator.resolve_secret(&blob).await? {
        SecretOutcome::Decoded(payload) => payload,
        SecretOutcome::NeedsPrompt => prompt_for_secret(&orchestrator, &blob).await?,
    };

    if payload.is_empty() {
        info!("The shared link carries an empty configuration; nothing to apply");
    }

    let options = ApplyOptions {
        display_welcome_message: args.welcome,
        clean_slate_for_agent: args.agent,
        validate_after_apply: args.validate,
    };
    let result = orchestrator.apply(&payload, options).await;

    for line in &result.status_lines {
        println!("{line}");
    }
    if let Some(welcome) = orchestrator.session().take_deferred_welcome() {
        println!("{welcome}");
    }
    for error in &result.errors {
        eprintln!("error: {error}");
    }

    if result.errors.is_empty() {
        Ok(())
    } else {
        bail!("Import completed with {} stage error(s)", result.errors.len())
    }
}

/// Prompt on stdin until a secret opens the link or the user aborts.
async fn prompt_for_secret(
    orchestrator: &ImportOrchestrator,
    blob: &str,
) -> anyhow::Result<sharelink::SharedPayload> {
    if let Ok(secret) = std::env::var("SHARELINK_PASSPHRASE") {
        return match orchestrator.resolve_with_secret(blob, &secret).await {
            Ok(payload) => Ok(payload),
            Err(ImportError::IncorrectSecret) => {
                bail!("SHARELINK_PASSPHRASE does not open this link")
            }
            Err(e) => Err(e.into()),
        };
    }

    let stdin = std::io::stdin();
    loop {
        eprint!("Passphrase (empty to abort): ");
        std::io::stderr().flush().ok();

        let mut secret = String::new();
        stdin.read_line(&mut secret)?;
        let secret = secret.trim_end_matches(['\n', '\r']);

        if secret.is_empty() {
            orchestrator.cancel();
            bail!("Import cancelled");
        }

        match orchestrator.resolve_with_secret(blob, secret).await {
            Ok(payload) => return Ok(payload),
            Err(ImportError::IncorrectSecret) => {
                eprintln!("Incorrect secret, try again.");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

//! Import error taxonomy.
//!
//! Distinguishes user-recoverable failures (wrong secret: retry), per-attempt
//! fatal failures (malformed payload), and stage-local failures that abort
//! one domain while the rest of the pipeline keeps running. Warnings never
//! abort anything; they are logged and surfaced as status lines.

use thiserror::Error;

use crate::codec::CodecError;
use crate::store::StoreError;

/// A domain stage in the fixed apply sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Credentials,
    Model,
    Rag,
    Prompts,
    Functions,
    Mcp,
    Theme,
    Welcome,
    History,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Credentials => "credentials",
            Stage::Model => "model",
            Stage::Rag => "RAG settings",
            Stage::Prompts => "prompts",
            Stage::Functions => "functions",
            Stage::Mcp => "MCP connections",
            Stage::Theme => "theme",
            Stage::Welcome => "welcome message",
            Stage::History => "conversation history",
        };
        write!(f, "{name}")
    }
}

/// Error from the import pipeline.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The supplied secret did not decode the payload. Retryable without
    /// limit; nothing has been written.
    #[error("incorrect secret")]
    IncorrectSecret,

    /// The payload is malformed beyond secret problems. Fatal for this
    /// import attempt only.
    #[error("failed to decode shared payload: {0}")]
    Decode(#[from] CodecError),

    /// One domain stage failed; later stages still ran.
    #[error("{stage} stage failed: {source}")]
    StageFailure {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    /// Another import holds the in-progress guard in this context.
    #[error("an import is already in progress")]
    ImportInProgress,

    /// The user abandoned the secret prompt; nothing was written.
    #[error("import cancelled")]
    Cancelled,
}

/// Non-fatal condition surfaced as a status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    /// An enabled-set entry names a function the payload never defined.
    UnknownFunction { name: String },
    /// An MCP credential had a shape this client does not recognize.
    UnknownCredentialShape { service: String },
    /// The requested model is incompatible with the provider; a fallback
    /// was selected instead.
    ModelReplaced { requested: String, fallback: String },
    /// Credentials were stored but the live reconnect attempt failed.
    ReconnectFailed { service: String },
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportWarning::UnknownFunction { name } => {
                write!(f, "Function \"{name}\" is not defined and was not enabled")
            }
            ImportWarning::UnknownCredentialShape { service } => {
                write!(
                    f,
                    "Skipped MCP credential for \"{service}\": unrecognized format"
                )
            }
            ImportWarning::ModelReplaced { requested, fallback } => {
                write!(
                    f,
                    "Model \"{requested}\" is not available here; using \"{fallback}\""
                )
            }
            ImportWarning::ReconnectFailed { service } => {
                write!(
                    f,
                    "Stored credentials for \"{service}\"; reconnect manually to resume the integration"
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_names_the_stage() {
        let err = ImportError::StageFailure {
            stage: Stage::Prompts,
            source: StoreError::Io(std::io::Error::other("disk full")),
        };
        let message = err.to_string();
        assert!(message.contains("prompts"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn warnings_redact_nothing_sensitive() {
        let warning = ImportWarning::UnknownCredentialShape {
            service: "github".into(),
        };
        assert!(warning.to_string().contains("github"));
    }
}

//! # sharelink
//!
//! Shared-configuration import pipeline for AI chat clients.
//!
//! A shared link carries an encrypted configuration bundle (credentials,
//! model choice, prompts, functions, MCP tokens, RAG settings, theme,
//! conversation history) in its URL fragment. This library recovers the
//! secret, decodes the bundle, and merges it safely into the client's
//! local profile.
//!
//! ## Pipeline
//!
//! ```text
//!        ┌────────────────────────────────────┐
//!        │         ImportOrchestrator         │
//!        │  resolve secret → decode → apply   │
//!        └─────────────────┬──────────────────┘
//!                          │ fixed stage order
//!                          ▼
//!   Credentials+Model → RAG → Prompts → Functions → MCP
//!                     → Theme → Welcome → History
//! ```
//!
//! Each stage is idempotent, independently callable, and individually
//! caught: partial success is the expected outcome. Revisiting a link never
//! clobbers a live local conversation, and agent loading reconciles
//! function activation with a minimal enable/disable diff.
//!
//! ## Modules
//! - `orchestrator`: state machine and the single apply entry point
//! - `apply`: one applicator per configuration domain
//! - `codec`: shared-link parsing and the encrypted wire format
//! - `secret`: passphrase resolution with session/locked caching
//! - `store`: profile store trait and the JSON-on-disk implementation

pub mod apply;
pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod payload;
pub mod provider;
pub mod secret;
pub mod session;
pub mod store;
pub mod util;

pub use codec::{has_shared_config, AesGcmCodec, PayloadCodec};
pub use config::ImportConfig;
pub use error::{ImportError, ImportWarning};
pub use orchestrator::{ImportOrchestrator, ImportState};
pub use payload::{ApplyOptions, ImportResult, SharedPayload};
pub use secret::SecretOutcome;
pub use session::ImportSession;
pub use store::{JsonFileStore, KvStore, MemoryStore};

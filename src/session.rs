//! Import session context.
//!
//! One [`ImportSession`] lives as long as the client context (a tab, a CLI
//! invocation) and carries the flags other subsystems consult: whether
//! secret verification has completed, whether an import is in flight, the
//! deferred welcome message, the cached share secret, and the in-memory
//! model cache that must never be trusted over the store after an import.
//!
//! These were ambient globals in earlier incarnations of this pipeline; an
//! explicit context object keeps the lifecycle testable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared per-context import state.
#[derive(Debug, Default)]
pub struct ImportSession {
    /// Monotonic: set once the first decode with a verified secret succeeds,
    /// never reverts.
    verified: AtomicBool,
    /// Guard consulted by concurrent subsystems (e.g. outbound chat
    /// requests) to avoid racing a half-applied configuration.
    importing: AtomicBool,
    /// Secret from the last successful decode, reused for re-shares.
    cached_secret: Mutex<Option<String>>,
    /// Welcome message staged for the conversation view, consumed once.
    deferred_welcome: Mutex<Option<String>>,
    /// In-memory copy of the selected model; invalidated on import.
    model_cache: Mutex<Option<String>>,
}

impl ImportSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ── Secret verification ──────────────────────────────────────────────

    /// Whether a shared secret has been verified in this context.
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Acquire)
    }

    /// Mark verification complete. Idempotent and monotonic.
    pub fn mark_verified(&self) {
        self.verified.store(true, Ordering::Release);
    }

    /// The cached session secret, if a decode has succeeded before.
    pub fn cached_secret(&self) -> Option<String> {
        self.cached_secret.lock().unwrap().clone()
    }

    /// Cache the secret for the remainder of the session.
    pub fn cache_secret(&self, secret: &str) {
        *self.cached_secret.lock().unwrap() = Some(secret.to_string());
    }

    // ── Import-in-progress guard ─────────────────────────────────────────

    /// Whether an import is currently applying in this context.
    pub fn import_in_progress(&self) -> bool {
        self.importing.load(Ordering::Acquire)
    }

    /// Acquire the in-progress guard; fails if an import is already
    /// applying. The guard clears on drop, including on error paths.
    pub fn begin_import(self: &Arc<Self>) -> Option<ImportGuard> {
        if self
            .importing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(ImportGuard {
                session: Arc::clone(self),
            })
        } else {
            None
        }
    }

    // ── Deferred welcome message ─────────────────────────────────────────

    /// Stage a welcome message for the conversation view.
    pub fn stage_welcome(&self, message: &str) {
        *self.deferred_welcome.lock().unwrap() = Some(message.to_string());
    }

    /// Consume the staged welcome message. Returns `None` after the first
    /// call until something is staged again.
    pub fn take_deferred_welcome(&self) -> Option<String> {
        self.deferred_welcome.lock().unwrap().take()
    }

    // ── Model cache ──────────────────────────────────────────────────────

    /// The in-memory model, if any. The store wins whenever they disagree.
    pub fn cached_model(&self) -> Option<String> {
        self.model_cache.lock().unwrap().clone()
    }

    pub fn set_cached_model(&self, model: &str) {
        *self.model_cache.lock().unwrap() = Some(model.to_string());
    }

    /// Drop the in-memory model so the next read goes to the store.
    pub fn invalidate_model_cache(&self) {
        *self.model_cache.lock().unwrap() = None;
    }
}

/// RAII guard for the import-in-progress flag.
pub struct ImportGuard {
    session: Arc<ImportSession>,
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        self.session.importing.store(false, Ordering::Release);
    }
}

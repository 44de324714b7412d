//! Error taxonomy for the pipeline.
//!
//! Plain enums with hand-written `Display`/`Error` impls, matching the
//! teacher's own error style (`auth::middleware::AuthError`,
//! `auth::models::RateLimitError`) rather than a derive-macro crate.
//! Call sites that just need to bubble a failure use `anyhow::Result`;
//! call sites that need to branch on *kind* (continue the unit loop vs.
//! abort the run) match on `PipelineError`.

use std::fmt;

/// The error taxonomy from the design spec: a *kind*, not a type hierarchy.
#[derive(Debug)]
pub enum PipelineError {
    /// Missing required credentials, malformed catalog, unparseable URL at a gate.
    Config(String),
    /// Network failure, timeout, 5xx after retries.
    Transport(String),
    /// Non-retryable HTTP (4xx except 408/429).
    Protocol { status: u16, message: String },
    /// Required fields missing in a provider payload.
    Mapping(String),
    /// Insufficient identity evidence for a company.
    Identity(String),
    /// Unique constraint violation where a conflict is an expected outcome.
    StoreConflict(String),
    /// Any other store failure.
    Store(String),
    /// Observed at a suspension point; ends the run with status `failure`.
    Cancelled,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(msg) => write!(f, "config error: {msg}"),
            PipelineError::Transport(msg) => write!(f, "transport error: {msg}"),
            PipelineError::Protocol { status, message } => {
                write!(f, "protocol error ({status}): {message}")
            }
            PipelineError::Mapping(msg) => write!(f, "mapping error: {msg}"),
            PipelineError::Identity(msg) => write!(f, "identity error: {msg}"),
            PipelineError::StoreConflict(msg) => write!(f, "store conflict: {msg}"),
            PipelineError::Store(msg) => write!(f, "store error: {msg}"),
            PipelineError::Cancelled => write!(f, "run cancelled"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    /// Whether this error should abort the whole unit loop (vs. being
    /// counted and skipped). Per spec.md §7: only `StoreConflict` on
    /// offer upsert is impossible (keys are the op's own), and
    /// `Protocol` 401/403 on an aggregator search aborts the run —
    /// that distinction is made by the caller, not here, since it
    /// depends on which provider kind raised it.
    pub fn is_store_conflict(&self) -> bool {
        matches!(self, PipelineError::StoreConflict(_))
    }
}

/// Raised by a provider HTTP call that the pipeline treats as an
/// authentication failure (401/403) on an aggregator provider — these
/// halt the run immediately per spec.md §4.8.
pub fn is_auth_failure(status: u16) -> bool {
    status == 401 || status == 403
}

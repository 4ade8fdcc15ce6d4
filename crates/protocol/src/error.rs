//! Error taxonomy shared by every DiskNav component.

use thiserror::Error;

/// Interaction-level error covering all user-facing failure modes.
///
/// Adapter crates keep their own detailed error enums and convert into this
/// type at the boundary where an interaction decides what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    /// The principal is not allowed to act in this context.
    #[error("access denied")]
    AccessDenied,

    /// A remote collaborator failed or returned malformed data.
    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable {
        /// The collaborator that failed (storage, lookup, membership, transport).
        service: Upstream,
        /// Human-readable failure description.
        reason: String,
    },

    /// A token, lookup code or link URL was absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Neither editing the menu nor sending a replacement succeeded.
    #[error("menu could not be rendered: {0}")]
    RenderFallbackExhausted(String),
}

/// Remote collaborators an interaction can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Hierarchical file storage.
    Storage,
    /// Spreadsheet-backed lookup table.
    Lookup,
    /// Group membership oracle.
    Membership,
    /// Messaging transport.
    Transport,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Upstream::Storage => "storage",
            Upstream::Lookup => "lookup",
            Upstream::Membership => "membership",
            Upstream::Transport => "transport",
        };
        f.write_str(name)
    }
}

impl BotError {
    /// Shorthand for an [`BotError::UpstreamUnavailable`] error.
    pub fn upstream(service: Upstream, reason: impl Into<String>) -> Self {
        BotError::UpstreamUnavailable {
            service,
            reason: reason.into(),
        }
    }
}

/// Result type alias for interaction-level operations.
pub type Result<T> = std::result::Result<T, BotError>;

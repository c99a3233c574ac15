//! Centralized error types for mailward.

use thiserror::Error;

/// All errors produced by the mailward library.
#[derive(Error, Debug)]
pub enum WardError {
    /// An address string does not parse as an RFC 5322 mailbox.
    #[error("invalid email address: '{0}'")]
    InvalidAddress(String),

    /// A date flag was neither RFC 3339 nor a bare YYYY-MM-DD date.
    #[error("invalid --{field} date '{value}': use RFC 3339 (e.g. 2026-01-15T00:00:00Z) or a bare date (e.g. 2026-01-15)")]
    InvalidDate { field: &'static str, value: String },

    /// A draft body was supplied zero or two ways.
    #[error("invalid body input: {0}")]
    InvalidBodyInput(String),

    /// Mutually exclusive filter flags were both set.
    #[error("conflicting filters: {0}")]
    ConflictingFilters(String),

    /// Both explicit email IDs and filter flags were supplied.
    #[error("cannot combine email IDs with filter flags; use one or the other")]
    AmbiguousTargets,

    /// Neither email IDs nor filter flags were supplied.
    #[error("no emails specified; provide email IDs or filter flags (e.g. --mailbox inbox --unread)")]
    NoTargets,

    /// A filter query returned zero matching messages.
    #[error("no emails matched the given filters")]
    NoMatches,

    /// No mailbox matched the given name or role.
    #[error("mailbox not found: '{0}'")]
    MailboxNotFound(String),

    /// A directly addressed email id does not exist.
    #[error("email not found: '{0}'")]
    EmailNotFound(String),

    /// The move destination is the trash (or named like it).
    #[error("forbidden destination '{0}': moving messages to the trash is not allowed")]
    ForbiddenDestination(String),

    /// A draft-creation payload deviated from the single-create-to-drafts shape.
    #[error("unsafe draft request: {0}")]
    UnsafeDraftRequest(String),

    /// The remote service failed or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// Reading a body stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, WardError>`.
pub type Result<T> = std::result::Result<T, WardError>;

impl WardError {
    /// Create a `Network` variant from any displayable transport error.
    pub fn network(source: impl std::fmt::Display) -> Self {
        Self::Network(source.to_string())
    }

    /// Stable machine-readable code for JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "invalid_address",
            Self::InvalidDate { .. } => "invalid_date",
            Self::InvalidBodyInput(_) => "invalid_body_input",
            Self::ConflictingFilters(_) => "conflicting_filters",
            Self::AmbiguousTargets => "ambiguous_targets",
            Self::NoTargets => "no_targets",
            Self::NoMatches => "no_matches",
            Self::MailboxNotFound(_) => "mailbox_not_found",
            Self::EmailNotFound(_) => "not_found",
            Self::ForbiddenDestination(_) => "forbidden_destination",
            Self::UnsafeDraftRequest(_) => "unsafe_draft_request",
            Self::Network(_) => "network_error",
            Self::Io(_) => "io_error",
        }
    }
}

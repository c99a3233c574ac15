//! The remote mail service seam.
//!
//! The core engine talks to the server only through the [`MailClient`]
//! trait, so the triage/compose/executor logic is independent of the
//! transport. [`remote::RemoteClient`] implements it over JMAP; the
//! in-memory [`mock::MockClient`] backs the integration tests.
//!
//! The mutation payload types here are deliberately narrow: a
//! [`SetRequest`] can express mailbox-membership and keyword updates and
//! draft creations, and nothing else. There is no destroy field and no
//! submission call anywhere in this crate, so permanent deletion and
//! outbound sending are unrepresentable.

pub mod mock;
pub mod remote;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::filter::FilterSpec;
use crate::model::address::Address;
use crate::model::email::{EmailDetail, EmailSummary};
use crate::model::mailbox::Mailbox;

/// The JMAP keyword marking a message as a draft.
pub const KEYWORD_DRAFT: &str = "$draft";
/// The JMAP keyword marking a message as read.
pub const KEYWORD_SEEN: &str = "$seen";
/// The JMAP keyword marking a message as flagged.
pub const KEYWORD_FLAGGED: &str = "$flagged";

/// One membership/flag-only update for a single message.
///
/// This is the only update shape a triage operation can produce:
/// mailbox membership replacement and keyword set/clear.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatePatch {
    /// Full replacement of the message's mailbox membership, when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox_ids: Option<BTreeMap<String, bool>>,
    /// Keyword patches: `Some(true)` sets the keyword, `None` clears it.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub keywords: BTreeMap<String, Option<bool>>,
}

impl UpdatePatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.mailbox_ids.is_none() && self.keywords.is_empty()
    }
}

/// A draft message to create. The only create shape.
#[derive(Debug, Clone, Serialize)]
pub struct DraftPayload {
    /// Must be exactly `{drafts_mailbox_id: true}`.
    pub mailbox_ids: BTreeMap<String, bool>,
    /// Must include `$draft: true`.
    pub keywords: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Address>,
    pub subject: String,
    pub body: String,
    /// Whether `body` is HTML rather than plain text.
    pub html: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub in_reply_to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// A full mutation request: update-only triage, or a draft creation.
///
/// Every `SetRequest` passes through the safety gates in
/// [`crate::safety`] immediately before [`MailClient::apply_set`].
#[derive(Debug, Clone, Default)]
pub struct SetRequest {
    pub update: BTreeMap<String, UpdatePatch>,
    pub create: Vec<DraftPayload>,
}

/// Per-id failure reason reported by the server.
#[derive(Debug, Clone)]
pub struct SetError {
    /// Server error type, e.g. `notFound`.
    pub kind: String,
    pub description: Option<String>,
}

impl SetError {
    pub fn not_found() -> Self {
        Self {
            kind: "notFound".to_string(),
            description: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == "notFound"
    }

    /// Human-readable rendering for the errored set.
    pub fn message(&self) -> String {
        match &self.description {
            Some(d) => format!("{}: {}", self.kind, d),
            None => self.kind.clone(),
        }
    }
}

/// Result of one `apply_set` call.
#[derive(Debug, Clone, Default)]
pub struct SetOutcome {
    /// Ids whose update the server applied.
    pub updated: Vec<String>,
    /// Server ids of created drafts.
    pub created: Vec<String>,
    /// Per-id failures, update and create alike.
    pub failed: Vec<(String, SetError)>,
}

/// Result of a summary fetch: found projections plus the ids the server
/// did not recognize.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub found: Vec<EmailSummary>,
    pub not_found: Vec<String>,
}

/// Capability consumed from the remote mail service.
///
/// Mirrors the seam style of a storage trait object: the engine holds a
/// `&dyn MailClient` and never sees the wire format.
pub trait MailClient {
    /// Resolve a mailbox by role (preferred) or case-insensitive name.
    /// Fails with `MailboxNotFound` when nothing matches.
    fn resolve_mailbox(&self, name_or_role: &str) -> Result<Mailbox>;

    /// List all mailboxes in the account.
    fn list_mailboxes(&self) -> Result<Vec<Mailbox>>;

    /// Query message ids matching a resolved filter, in server order.
    fn query_ids(&self, filter: &FilterSpec) -> Result<Vec<String>>;

    /// Fetch lightweight summaries; unknown ids land in `not_found`.
    fn fetch_summaries(&self, ids: &[String]) -> Result<FetchOutcome>;

    /// Fetch full message content.
    fn fetch_detail(&self, id: &str) -> Result<EmailDetail>;

    /// Apply a validated update-or-create payload.
    fn apply_set(&self, request: &SetRequest) -> Result<SetOutcome>;
}

//! Batch action execution.
//!
//! Partitions target ids into size-bounded batches, passes each built
//! mutation through the safety gates, and aggregates per-id outcomes.
//! Batches run sequentially in input order so the result sets are
//! reproducible; a failure scoped to one id or one batch never aborts
//! the rest.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::client::{MailClient, SetRequest, UpdatePatch, KEYWORD_FLAGGED, KEYWORD_SEEN};
use crate::error::{Result, WardError};
use crate::filter::FilterSpec;
use crate::model::email::EmailSummary;
use crate::model::mailbox::Mailbox;
use crate::safety;
use crate::target;

/// Default number of ids per mutation request, matching typical remote
/// per-request limits.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// A membership/flag-only triage operation. Never create or destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOp {
    /// Move to the mailbox with role `archive`.
    Archive,
    /// Move to the mailbox with role `junk`.
    Spam,
    /// Move to a named destination mailbox.
    Move { destination: String },
    MarkRead,
    MarkUnread,
    Flag,
    Unflag,
}

impl TriageOp {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Spam => "spam",
            Self::Move { .. } => "move",
            Self::MarkRead => "mark-read",
            Self::MarkUnread => "mark-unread",
            Self::Flag => "flag",
            Self::Unflag => "unflag",
        }
    }

    /// The mailbox lookup this op's destination requires, if any.
    fn destination_query(&self) -> Option<&str> {
        match self {
            Self::Archive => Some("archive"),
            Self::Spam => Some("junk"),
            Self::Move { destination } => Some(destination),
            Self::MarkRead | Self::MarkUnread | Self::Flag | Self::Unflag => None,
        }
    }

    /// The update patch this op applies to every target.
    fn patch(&self, destination: Option<&Mailbox>) -> UpdatePatch {
        match self {
            Self::Archive | Self::Spam | Self::Move { .. } => {
                let dest_id = destination
                    .map(|m| m.id.clone())
                    .unwrap_or_default();
                UpdatePatch {
                    mailbox_ids: Some(BTreeMap::from([(dest_id, true)])),
                    keywords: BTreeMap::new(),
                }
            }
            Self::MarkRead => keyword_patch(KEYWORD_SEEN, Some(true)),
            Self::MarkUnread => keyword_patch(KEYWORD_SEEN, None),
            Self::Flag => keyword_patch(KEYWORD_FLAGGED, Some(true)),
            Self::Unflag => keyword_patch(KEYWORD_FLAGGED, None),
        }
    }
}

fn keyword_patch(keyword: &str, value: Option<bool>) -> UpdatePatch {
    UpdatePatch {
        mailbox_ids: None,
        keywords: BTreeMap::from([(keyword.to_string(), value)]),
    }
}

/// One triage invocation: an operation plus its targets.
#[derive(Debug)]
pub struct ActionRequest {
    pub op: TriageOp,
    /// Explicit target ids; mutually exclusive with `filter`.
    pub ids: Vec<String>,
    pub filter: FilterSpec,
    pub dry_run: bool,
}

/// Destination mailbox info carried in the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct DestinationInfo {
    pub id: String,
    pub name: String,
}

/// Aggregated outcome of a batch mutation or preview.
///
/// Every input id lands in exactly one of `succeeded`, `not_found`, or
/// `errored`; partial failure is reported here, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub operation: String,
    pub dry_run: bool,
    pub succeeded: Vec<String>,
    pub not_found: Vec<String>,
    /// Per-id error messages, in input order.
    pub errored: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationInfo>,
    /// Summaries of the messages a dry run would affect.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub previews: Vec<EmailSummary>,
}

impl ActionOutcome {
    fn new(op: &TriageOp, dry_run: bool) -> Self {
        Self {
            operation: op.label().to_string(),
            dry_run,
            succeeded: vec![],
            not_found: vec![],
            errored: vec![],
            destination: None,
            previews: vec![],
        }
    }

    /// Total ids accounted for across all buckets.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.not_found.len() + self.errored.len()
    }
}

/// Execute (or preview) a triage action.
///
/// Resolves targets and the destination mailbox, then processes batches
/// of `batch_size` ids. Each batch's mutation passes [`safety::check_triage`]
/// before any network call; in dry-run mode the mutation is replaced by
/// a read-only summary fetch and no mutating call is ever issued.
/// `progress` is invoked with `(processed, total)` after every batch.
pub fn execute(
    client: &dyn MailClient,
    request: &ActionRequest,
    batch_size: usize,
    progress: Option<&dyn Fn(usize, usize)>,
) -> Result<ActionOutcome> {
    let batch_size = batch_size.max(1);
    let ids = target::resolve_targets(client, &request.ids, &request.filter)?;

    // Destination resolution happens before any batch, dry-run included,
    // so ForbiddenDestination surfaces during preview.
    let destination = match request.op.destination_query() {
        Some(query) => {
            let mailbox = client.resolve_mailbox(query)?;
            safety::check_destination(&mailbox)?;
            Some(mailbox)
        }
        None => None,
    };

    let mut outcome = ActionOutcome::new(&request.op, request.dry_run);
    outcome.destination = destination.as_ref().map(|m| DestinationInfo {
        id: m.id.clone(),
        name: m.name.clone(),
    });

    let total = ids.len();
    tracing::info!(
        op = request.op.label(),
        targets = total,
        dry_run = request.dry_run,
        "executing triage action"
    );

    for batch in ids.chunks(batch_size) {
        let mut set = SetRequest::default();
        for id in batch {
            set.update
                .insert(id.clone(), request.op.patch(destination.as_ref()));
        }
        safety::check_triage(&set)?;

        if request.dry_run {
            let fetched = client.fetch_summaries(batch)?;
            outcome
                .succeeded
                .extend(fetched.found.iter().map(|s| s.id.clone()));
            outcome.previews.extend(fetched.found);
            outcome.not_found.extend(fetched.not_found);
        } else {
            match client.apply_set(&set) {
                Ok(result) => {
                    outcome.succeeded.extend(result.updated);
                    for (id, error) in result.failed {
                        if error.is_not_found() {
                            outcome.not_found.push(id);
                        } else {
                            outcome.errored.push((id, error.message()));
                        }
                    }
                }
                Err(e) => {
                    // A batch-scoped failure never aborts prior results
                    // or remaining batches.
                    tracing::warn!(error = %e, batch = batch.len(), "batch mutation failed");
                    let message = e.to_string();
                    outcome
                        .errored
                        .extend(batch.iter().map(|id| (id.clone(), message.clone())));
                }
            }
        }

        if let Some(progress) = progress {
            progress(outcome.total(), total);
        }
    }

    Ok(outcome)
}

/// Create a composed draft in the Drafts mailbox and return its server id.
///
/// The payload passes [`safety::check_draft`] against the resolved
/// Drafts mailbox immediately before the create call.
pub fn create_draft(
    client: &dyn MailClient,
    composed: &crate::compose::ComposedDraft,
) -> Result<String> {
    let drafts = client.resolve_mailbox("drafts")?;
    let set = SetRequest {
        update: BTreeMap::new(),
        create: vec![composed.to_payload(&drafts.id)],
    };
    safety::check_draft(&set, &drafts.id)?;

    let result = client.apply_set(&set)?;
    if let Some(id) = result.created.first() {
        tracing::info!(id = %id, "draft created");
        return Ok(id.clone());
    }
    let reason = result
        .failed
        .first()
        .map(|(_, e)| e.message())
        .unwrap_or_else(|| "server did not create the draft".to_string());
    Err(WardError::network(reason))
}

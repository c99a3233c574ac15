//! In-memory mail client.
//!
//! Backs the integration tests and offline experimentation. Mailboxes
//! and messages are seeded up front; mutations are applied to the
//! in-memory state and every `SetRequest` is recorded so tests can
//! assert that dry runs issue zero mutating calls.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, WardError};
use crate::filter::FilterSpec;
use crate::model::email::{EmailDetail, EmailSummary};
use crate::model::mailbox::Mailbox;

use super::{FetchOutcome, MailClient, SetOutcome, SetRequest, KEYWORD_FLAGGED, KEYWORD_SEEN};

/// In-memory implementation of [`MailClient`].
#[derive(Default)]
pub struct MockClient {
    mailboxes: Vec<Mailbox>,
    messages: RwLock<HashMap<String, EmailDetail>>,
    /// Insertion order, so queries return ids deterministically.
    order: Vec<String>,
    /// Every mutation request that reached `apply_set`.
    pub set_requests: RwLock<Vec<SetRequest>>,
    /// Ids that fail with a transient server error on update.
    pub failing_ids: Vec<String>,
    next_created_id: RwLock<u64>,
}

impl MockClient {
    pub fn new(mailboxes: Vec<Mailbox>, messages: Vec<EmailDetail>) -> Self {
        let order = messages.iter().map(|m| m.summary.id.clone()).collect();
        let map = messages
            .into_iter()
            .map(|m| (m.summary.id.clone(), m))
            .collect();
        Self {
            mailboxes,
            messages: RwLock::new(map),
            order,
            set_requests: RwLock::new(Vec::new()),
            failing_ids: Vec::new(),
            next_created_id: RwLock::new(0),
        }
    }

    /// Number of mutation requests that reached the server.
    pub fn mutation_count(&self) -> usize {
        self.set_requests.read().expect("lock poisoned").len()
    }

    /// Current state of a stored message, if present.
    pub fn message(&self, id: &str) -> Option<EmailDetail> {
        self.messages.read().expect("lock poisoned").get(id).cloned()
    }

    fn matches(&self, detail: &EmailDetail, filter: &FilterSpec) -> bool {
        let summary = &detail.summary;
        if let Some(mailbox_id) = &filter.mailbox_id {
            if !summary.mailbox_ids.contains(mailbox_id) {
                return false;
            }
        }
        if let Some(from) = &filter.from {
            let needle = from.to_lowercase();
            if !summary.from.iter().any(|a| {
                a.email.to_lowercase().contains(&needle)
                    || a.name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&needle))
            }) {
                return false;
            }
        }
        if let Some(to) = &filter.to {
            let needle = to.to_lowercase();
            if !summary
                .to
                .iter()
                .any(|a| a.email.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if let Some(subject) = &filter.subject {
            if !summary
                .subject
                .to_lowercase()
                .contains(&subject.to_lowercase())
            {
                return false;
            }
        }
        if let Some(before) = &filter.before {
            if summary.received_at >= *before {
                return false;
            }
        }
        if let Some(after) = &filter.after {
            if summary.received_at <= *after {
                return false;
            }
        }
        if filter.has_attachment && detail.attachments.is_empty() {
            return false;
        }
        if filter.unread && !summary.is_unread {
            return false;
        }
        if filter.flagged && !summary.is_flagged {
            return false;
        }
        if filter.unflagged && summary.is_flagged {
            return false;
        }
        true
    }
}

impl MailClient for MockClient {
    fn resolve_mailbox(&self, name_or_role: &str) -> Result<Mailbox> {
        let lowered = name_or_role.to_lowercase();
        self.mailboxes
            .iter()
            .find(|m| m.role.as_ref().is_some_and(|r| r.as_str() == lowered))
            .or_else(|| {
                self.mailboxes
                    .iter()
                    .find(|m| m.name.to_lowercase() == lowered)
            })
            .cloned()
            .ok_or_else(|| WardError::MailboxNotFound(name_or_role.to_string()))
    }

    fn list_mailboxes(&self) -> Result<Vec<Mailbox>> {
        Ok(self.mailboxes.clone())
    }

    fn query_ids(&self, filter: &FilterSpec) -> Result<Vec<String>> {
        let messages = self.messages.read().expect("lock poisoned");
        Ok(self
            .order
            .iter()
            .filter(|id| {
                messages
                    .get(*id)
                    .is_some_and(|detail| self.matches(detail, filter))
            })
            .cloned()
            .collect())
    }

    fn fetch_summaries(&self, ids: &[String]) -> Result<FetchOutcome> {
        let messages = self.messages.read().expect("lock poisoned");
        let mut outcome = FetchOutcome::default();
        for id in ids {
            match messages.get(id) {
                Some(detail) => outcome.found.push(detail.summary.clone()),
                None => outcome.not_found.push(id.clone()),
            }
        }
        Ok(outcome)
    }

    fn fetch_detail(&self, id: &str) -> Result<EmailDetail> {
        self.messages
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| WardError::EmailNotFound(id.to_string()))
    }

    fn apply_set(&self, request: &SetRequest) -> Result<SetOutcome> {
        self.set_requests
            .write()
            .expect("lock poisoned")
            .push(request.clone());

        let mut outcome = SetOutcome::default();
        let mut messages = self.messages.write().expect("lock poisoned");

        for (id, patch) in &request.update {
            if self.failing_ids.contains(id) {
                outcome.failed.push((
                    id.clone(),
                    super::SetError {
                        kind: "serverFail".to_string(),
                        description: Some("simulated failure".to_string()),
                    },
                ));
                continue;
            }
            let Some(detail) = messages.get_mut(id) else {
                outcome.failed.push((id.clone(), super::SetError::not_found()));
                continue;
            };
            if let Some(mailbox_ids) = &patch.mailbox_ids {
                detail.summary.mailbox_ids =
                    mailbox_ids.keys().cloned().collect();
            }
            for (keyword, value) in &patch.keywords {
                let set = value.unwrap_or(false);
                match keyword.as_str() {
                    KEYWORD_SEEN => detail.summary.is_unread = !set,
                    KEYWORD_FLAGGED => detail.summary.is_flagged = set,
                    _ => {}
                }
            }
            outcome.updated.push(id.clone());
        }

        for _draft in &request.create {
            let mut counter = self.next_created_id.write().expect("lock poisoned");
            *counter += 1;
            outcome.created.push(format!("draft-{}", *counter));
        }

        Ok(outcome)
    }
}

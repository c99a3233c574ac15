//! Read-only message projections fetched per invocation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::Address;

/// Lightweight message metadata, enough for list output and previews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSummary {
    /// Immutable server identifier.
    pub id: String,
    pub thread_id: String,
    /// Mailboxes the message currently belongs to. Only transiently empty
    /// while the server applies a move.
    pub mailbox_ids: BTreeSet<String>,
    pub from: Vec<Address>,
    pub to: Vec<Address>,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    /// Message size in bytes.
    pub size: u64,
    pub is_unread: bool,
    pub is_flagged: bool,
    /// Short plain-text preview supplied by the server.
    pub preview: String,
}

/// Full message content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDetail {
    pub summary: EmailSummary,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Protocol-level `Message-ID` values (not server ids).
    pub message_ids: Vec<String>,
    /// `In-Reply-To` header values.
    pub in_reply_to: Vec<String>,
    /// `References` header values, in header order.
    pub references: Vec<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    /// Raw header name/value pairs, in wire order.
    pub raw_headers: Vec<(String, String)>,
    /// Attachment metadata only. Payload bytes are never fetched.
    pub attachments: Vec<AttachmentMeta>,
}

/// Attachment name/type/size, without content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub name: Option<String>,
    pub mime_type: String,
    pub size: u64,
}

impl EmailDetail {
    /// The address replies should go to: `Reply-To` when present, else `From`.
    pub fn reply_base(&self) -> &[Address] {
        if self.reply_to.is_empty() {
            &self.summary.from
        } else {
            &self.reply_to
        }
    }
}

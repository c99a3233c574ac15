//! Remote mailbox (folder/label) projection.

use serde::{Deserialize, Serialize};

/// Well-known mailbox category, used for lookup instead of matching on
/// mutable display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Inbox,
    Archive,
    Drafts,
    Sent,
    Junk,
    Trash,
    /// Any role this tool does not treat specially.
    #[serde(untagged)]
    Other(String),
}

impl Role {
    /// Parse a server role string, case-insensitively.
    pub fn from_server(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "inbox" => Self::Inbox,
            "archive" => Self::Archive,
            "drafts" => Self::Drafts,
            "sent" => Self::Sent,
            "junk" | "spam" => Self::Junk,
            "trash" => Self::Trash,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical lowercase name of the role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "inbox",
            Self::Archive => "archive",
            Self::Drafts => "drafts",
            Self::Sent => "sent",
            Self::Junk => "junk",
            Self::Trash => "trash",
            Self::Other(s) => s,
        }
    }
}

/// A remote folder/label holding messages.
///
/// The id is the only stable identifier; the name is mutable and not
/// unique across the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mailbox {
    pub id: String,
    pub name: String,
    pub role: Option<Role>,
    pub parent_id: Option<String>,
    pub total_emails: u64,
    pub unread_emails: u64,
}

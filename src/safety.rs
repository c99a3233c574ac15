//! Structural safety gates.
//!
//! Every mutation payload passes through exactly one of these checks
//! immediately before [`crate::client::MailClient::apply_set`]. The
//! gates inspect the fully-built payload rather than flags or call
//! sites, so a bug in command wiring cannot bypass them: no code path
//! constructs a network request after a gate rejects.

use crate::client::{SetRequest, KEYWORD_DRAFT};
use crate::error::{Result, WardError};
use crate::model::mailbox::{Mailbox, Role};

/// Destination names that always mean the trash, compared
/// case-insensitively in addition to the role check.
pub const FORBIDDEN_DESTINATION_NAMES: [&str; 3] = ["trash", "deleted items", "deleted messages"];

/// Reject a move destination that is (or is named like) the trash.
///
/// Evaluated before any mutation call, including in dry-run mode, so
/// destination errors surface during preview.
pub fn check_destination(mailbox: &Mailbox) -> Result<()> {
    if mailbox.role == Some(Role::Trash) {
        return Err(WardError::ForbiddenDestination(mailbox.name.clone()));
    }
    let lowered = mailbox.name.to_lowercase();
    if FORBIDDEN_DESTINATION_NAMES.contains(&lowered.as_str()) {
        return Err(WardError::ForbiddenDestination(mailbox.name.clone()));
    }
    Ok(())
}

/// Gate for triage mutations (archive/spam/move/read/unread/flag/unflag).
///
/// The update patches can only express mailbox membership and keyword
/// changes by construction; the residual shape checks are that the
/// request creates nothing, updates at least one message, and carries
/// no empty patches.
pub fn check_triage(request: &SetRequest) -> Result<()> {
    if !request.create.is_empty() {
        return Err(WardError::UnsafeDraftRequest(
            "a triage operation must not create messages".to_string(),
        ));
    }
    if request.update.is_empty() {
        return Err(WardError::UnsafeDraftRequest(
            "a triage operation must update at least one message".to_string(),
        ));
    }
    for (id, patch) in &request.update {
        if patch.is_empty() {
            return Err(WardError::UnsafeDraftRequest(format!(
                "empty update patch for message '{id}'"
            )));
        }
    }
    Ok(())
}

/// Gate for draft creation.
///
/// Accepts iff the request contains exactly one create, that create's
/// mailbox membership is exactly `{drafts_id}`, its keywords include
/// `$draft: true`, and there are no updates. Any deviation fails with
/// `UnsafeDraftRequest` and no mutation is performed.
pub fn check_draft(request: &SetRequest, drafts_id: &str) -> Result<()> {
    if !request.update.is_empty() {
        return Err(WardError::UnsafeDraftRequest(
            "a draft request must not update messages".to_string(),
        ));
    }
    if request.create.len() != 1 {
        return Err(WardError::UnsafeDraftRequest(format!(
            "expected exactly one draft create, found {}",
            request.create.len()
        )));
    }

    let draft = &request.create[0];
    let membership_ok = draft.mailbox_ids.len() == 1
        && draft.mailbox_ids.get(drafts_id).copied() == Some(true);
    if !membership_ok {
        return Err(WardError::UnsafeDraftRequest(
            "draft must be created in exactly the Drafts mailbox".to_string(),
        ));
    }
    if draft.keywords.get(KEYWORD_DRAFT).copied() != Some(true) {
        return Err(WardError::UnsafeDraftRequest(
            "draft must carry the $draft keyword".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::client::{DraftPayload, UpdatePatch, KEYWORD_SEEN};

    fn mailbox(name: &str, role: Option<Role>) -> Mailbox {
        Mailbox {
            id: "mb1".to_string(),
            name: name.to_string(),
            role,
            parent_id: None,
            total_emails: 0,
            unread_emails: 0,
        }
    }

    fn draft_payload(mailbox_ids: BTreeMap<String, bool>, keywords: BTreeMap<String, bool>) -> DraftPayload {
        DraftPayload {
            mailbox_ids,
            keywords,
            from: None,
            to: vec![],
            cc: vec![],
            bcc: vec![],
            subject: String::new(),
            body: String::new(),
            html: false,
            in_reply_to: vec![],
            references: vec![],
        }
    }

    fn valid_draft_request(drafts_id: &str) -> SetRequest {
        SetRequest {
            update: BTreeMap::new(),
            create: vec![draft_payload(
                BTreeMap::from([(drafts_id.to_string(), true)]),
                BTreeMap::from([(KEYWORD_DRAFT.to_string(), true)]),
            )],
        }
    }

    #[test]
    fn test_destination_trash_role_rejected() {
        let mb = mailbox("Rubbish", Some(Role::Trash));
        assert!(matches!(
            check_destination(&mb),
            Err(WardError::ForbiddenDestination(_))
        ));
    }

    #[test]
    fn test_destination_trash_names_rejected() {
        for name in ["Trash", "trash", "Deleted Items", "DELETED MESSAGES"] {
            let mb = mailbox(name, None);
            assert!(
                matches!(check_destination(&mb), Err(WardError::ForbiddenDestination(_))),
                "expected rejection for '{name}'"
            );
        }
    }

    #[test]
    fn test_destination_ordinary_mailbox_ok() {
        assert!(check_destination(&mailbox("Receipts", Some(Role::Archive))).is_ok());
    }

    #[test]
    fn test_triage_rejects_create() {
        let mut request = valid_draft_request("d1");
        request.update.insert(
            "m1".to_string(),
            UpdatePatch {
                keywords: BTreeMap::from([(KEYWORD_SEEN.to_string(), Some(true))]),
                ..Default::default()
            },
        );
        assert!(check_triage(&request).is_err());
    }

    #[test]
    fn test_triage_rejects_empty_update() {
        assert!(check_triage(&SetRequest::default()).is_err());
    }

    #[test]
    fn test_triage_rejects_empty_patch() {
        let request = SetRequest {
            update: BTreeMap::from([("m1".to_string(), UpdatePatch::default())]),
            create: vec![],
        };
        assert!(check_triage(&request).is_err());
    }

    #[test]
    fn test_triage_accepts_keyword_patch() {
        let request = SetRequest {
            update: BTreeMap::from([(
                "m1".to_string(),
                UpdatePatch {
                    keywords: BTreeMap::from([(KEYWORD_SEEN.to_string(), Some(true))]),
                    ..Default::default()
                },
            )]),
            create: vec![],
        };
        assert!(check_triage(&request).is_ok());
    }

    #[test]
    fn test_draft_gate_accepts_exact_shape() {
        assert!(check_draft(&valid_draft_request("d1"), "d1").is_ok());
    }

    #[test]
    fn test_draft_gate_rejects_zero_or_two_creates() {
        let mut request = valid_draft_request("d1");
        let extra = request.create[0].clone();
        request.create.push(extra);
        assert!(check_draft(&request, "d1").is_err());

        request.create.clear();
        assert!(check_draft(&request, "d1").is_err());
    }

    #[test]
    fn test_draft_gate_rejects_wrong_mailbox() {
        let mut request = valid_draft_request("d1");
        request.create[0].mailbox_ids = BTreeMap::from([("inbox1".to_string(), true)]);
        assert!(check_draft(&request, "d1").is_err());
    }

    #[test]
    fn test_draft_gate_rejects_extra_mailbox() {
        let mut request = valid_draft_request("d1");
        request.create[0]
            .mailbox_ids
            .insert("inbox1".to_string(), true);
        assert!(check_draft(&request, "d1").is_err());
    }

    #[test]
    fn test_draft_gate_rejects_missing_draft_keyword() {
        let mut request = valid_draft_request("d1");
        request.create[0].keywords.clear();
        assert!(check_draft(&request, "d1").is_err());
    }

    #[test]
    fn test_draft_gate_rejects_accompanying_update() {
        let mut request = valid_draft_request("d1");
        request.update.insert(
            "m1".to_string(),
            UpdatePatch {
                keywords: BTreeMap::from([(KEYWORD_SEEN.to_string(), Some(true))]),
                ..Default::default()
            },
        );
        assert!(check_draft(&request, "d1").is_err());
    }
}

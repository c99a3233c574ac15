//! Draft composition: recipients, subject, body and threading headers
//! for new/reply/reply-all/forward drafts.
//!
//! All recipient comparisons use the normalized address key (lowercased
//! email); output order is first-seen. Threading headers derive strictly
//! from the original message's protocol-level Message-ID values, never
//! from server ids.

use std::collections::{BTreeMap, HashSet};
use std::io::Read;

use serde::Serialize;

use crate::client::{DraftPayload, KEYWORD_DRAFT, KEYWORD_SEEN};
use crate::error::{Result, WardError};
use crate::model::address::{dedupe, Address};
use crate::model::email::EmailDetail;

/// Composition mode. Exactly one is active per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftMode {
    New,
    Reply,
    ReplyAll,
    Forward,
}

impl DraftMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reply => "reply",
            Self::ReplyAll => "reply-all",
            Self::Forward => "forward",
        }
    }

    /// Whether this mode composes against an original message.
    pub fn needs_source(&self) -> bool {
        !matches!(self, Self::New)
    }
}

/// One draft-composition invocation, validated at construction.
#[derive(Debug)]
pub struct DraftRequest {
    pub mode: DraftMode,
    pub source_id: Option<String>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub subject: Option<String>,
    pub body: String,
    pub html: bool,
}

impl DraftRequest {
    /// Build a request from raw CLI inputs.
    ///
    /// The body must be supplied exactly once: either as a literal value
    /// or as a stream read to completion; both or neither fails with
    /// `InvalidBodyInput`. An explicit `to` is required for `new` and
    /// `forward`, and a source message id for every mode except `new`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: DraftMode,
        source_id: Option<String>,
        to: Option<&str>,
        cc: Option<&str>,
        bcc: Option<&str>,
        subject: Option<String>,
        body_literal: Option<String>,
        body_stream: Option<&mut dyn Read>,
        html: bool,
    ) -> Result<Self> {
        let body = match (body_literal, body_stream) {
            (Some(literal), None) => literal,
            (None, Some(stream)) => {
                let mut buf = String::new();
                stream.read_to_string(&mut buf)?;
                buf
            }
            (Some(_), Some(_)) => {
                return Err(WardError::InvalidBodyInput(
                    "body supplied both as a literal and as a stream".to_string(),
                ))
            }
            (None, None) => {
                return Err(WardError::InvalidBodyInput(
                    "no body supplied; pass a literal body or a stream".to_string(),
                ))
            }
        };

        if mode.needs_source() && source_id.is_none() {
            return Err(WardError::NoTargets);
        }

        let to = parse_recipients(to)?;
        if to.is_empty() && matches!(mode, DraftMode::New | DraftMode::Forward) {
            return Err(WardError::InvalidAddress(format!(
                "an explicit recipient is required for {}",
                mode.label()
            )));
        }

        Ok(Self {
            mode,
            source_id,
            to,
            cc: parse_recipients(cc)?,
            bcc: parse_recipients(bcc)?,
            subject,
            body,
            html,
        })
    }
}

/// A fully computed draft, ready for the safety gate and creation.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub subject: String,
    pub body: String,
    pub html: bool,
    /// `In-Reply-To` header values; empty when the original has no
    /// Message-ID (the headers are omitted, never synthesized).
    pub in_reply_to: Vec<String>,
    /// `References` header values, order-preserving and deduplicated.
    pub references: Vec<String>,
}

impl ComposedDraft {
    /// Shape the draft into the single-create payload the safety gate
    /// expects: membership exactly `{drafts_id}`, `$draft` set.
    pub fn to_payload(&self, drafts_id: &str) -> DraftPayload {
        DraftPayload {
            mailbox_ids: BTreeMap::from([(drafts_id.to_string(), true)]),
            keywords: BTreeMap::from([
                (KEYWORD_DRAFT.to_string(), true),
                (KEYWORD_SEEN.to_string(), true),
            ]),
            from: self.from.clone(),
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
            html: self.html,
            in_reply_to: self.in_reply_to.clone(),
            references: self.references.clone(),
        }
    }
}

/// Compute recipients, subject, body and threading headers.
///
/// `original` is required for every mode except `new`. `account_email`
/// is the authenticated account's own address; when it parses as a
/// single valid address it becomes the draft's `from` and is excluded
/// from reply-all recipients, otherwise composition proceeds without an
/// explicit sender and without self-exclusion.
pub fn compose(
    request: &DraftRequest,
    original: Option<&EmailDetail>,
    account_email: &str,
) -> Result<ComposedDraft> {
    if request.mode.needs_source() && original.is_none() {
        return Err(WardError::NoTargets);
    }

    let self_addr = Address::parse(account_email).ok();
    let self_key = self_addr.as_ref().map(Address::normalize_key);

    let (to, cc) = match request.mode {
        DraftMode::New | DraftMode::Forward => {
            (dedupe(request.to.clone()), dedupe(request.cc.clone()))
        }
        DraftMode::Reply => {
            let original = original.ok_or(WardError::NoTargets)?;
            let mut to = original.reply_base().to_vec();
            to.extend(request.to.iter().cloned());
            (dedupe(to), dedupe(request.cc.clone()))
        }
        DraftMode::ReplyAll => {
            let original = original.ok_or(WardError::NoTargets)?;
            let mut to = original.reply_base().to_vec();
            to.extend(request.to.iter().cloned());
            let to = dedupe(to);

            let to_keys: HashSet<String> = to.iter().map(Address::normalize_key).collect();
            let mut cc: Vec<Address> = original
                .summary
                .to
                .iter()
                .chain(original.cc.iter())
                .cloned()
                .collect();
            cc.extend(request.cc.iter().cloned());
            let cc = dedupe(cc)
                .into_iter()
                .filter(|a| {
                    let key = a.normalize_key();
                    Some(&key) != self_key.as_ref() && !to_keys.contains(&key)
                })
                .collect();
            (to, cc)
        }
    };

    let subject = match &request.subject {
        Some(s) => s.clone(),
        None => {
            let original_subject = original.map(|o| o.summary.subject.as_str()).unwrap_or("");
            match request.mode {
                DraftMode::New => String::new(),
                DraftMode::Reply | DraftMode::ReplyAll => prefix_subject("Re: ", original_subject),
                DraftMode::Forward => prefix_subject("Fwd: ", original_subject),
            }
        }
    };

    let (in_reply_to, references) = match (request.mode, original) {
        (DraftMode::New, _) | (_, None) => (vec![], vec![]),
        (DraftMode::Reply | DraftMode::ReplyAll | DraftMode::Forward, Some(original)) => {
            threading_headers(original)
        }
    };

    let body = match (request.mode, original) {
        (DraftMode::Forward, Some(original)) => forward_body(&request.body, original),
        _ => request.body.clone(),
    };

    Ok(ComposedDraft {
        from: self_addr,
        to,
        cc,
        bcc: dedupe(request.bcc.clone()),
        subject,
        body,
        html: request.html,
        in_reply_to,
        references,
    })
}

fn parse_recipients(raw: Option<&str>) -> Result<Vec<Address>> {
    match raw {
        Some(s) if !s.trim().is_empty() => Address::parse_list(s),
        _ => Ok(vec![]),
    }
}

/// Prepend `prefix` unless the subject already starts with it,
/// case-insensitively (so "RE: x" and "re: x" are left alone).
fn prefix_subject(prefix: &str, subject: &str) -> String {
    let marker = prefix.trim_end().to_lowercase();
    if subject.trim_start().to_lowercase().starts_with(&marker) {
        subject.to_string()
    } else {
        format!("{prefix}{subject}")
    }
}

/// Threading headers from the original's protocol Message-ID values.
///
/// `in_reply_to` is the Message-ID list verbatim; `references` is the
/// original references followed by the Message-IDs, order-preserving
/// and deduplicated. When the original carries no Message-ID, both are
/// empty and the headers are omitted from the draft.
fn threading_headers(original: &EmailDetail) -> (Vec<String>, Vec<String>) {
    if original.message_ids.is_empty() {
        return (vec![], vec![]);
    }

    let in_reply_to = original.message_ids.clone();
    let mut seen = HashSet::new();
    let references = original
        .references
        .iter()
        .chain(original.message_ids.iter())
        .filter(|r| seen.insert(r.as_str().to_string()))
        .cloned()
        .collect();
    (in_reply_to, references)
}

/// Place the user's text above a quoted rendering of the original
/// plain-text body. Deterministic: quoting the same original twice
/// yields identical output.
fn forward_body(user_body: &str, original: &EmailDetail) -> String {
    let mut out = String::new();
    out.push_str(user_body);
    if !user_body.is_empty() && !user_body.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str("---------- Forwarded message ----------\n");
    out.push_str(&format!(
        "From: {}\n",
        original
            .summary
            .from
            .iter()
            .map(Address::display)
            .collect::<Vec<_>>()
            .join(", ")
    ));
    let date = original.sent_at.unwrap_or(original.summary.received_at);
    out.push_str(&format!("Date: {}\n", date.to_rfc3339()));
    out.push_str(&format!("Subject: {}\n", original.summary.subject));
    out.push_str(&format!(
        "To: {}\n",
        original
            .summary
            .to
            .iter()
            .map(Address::display)
            .collect::<Vec<_>>()
            .join(", ")
    ));
    out.push('\n');

    if let Some(text) = &original.text_body {
        for line in text.lines() {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::model::email::EmailSummary;

    fn summary(from: &[&str], to: &[&str]) -> EmailSummary {
        EmailSummary {
            id: "m1".to_string(),
            thread_id: "t1".to_string(),
            mailbox_ids: BTreeSet::from(["inbox1".to_string()]),
            from: from.iter().map(|a| Address::bare(*a)).collect(),
            to: to.iter().map(|a| Address::bare(*a)).collect(),
            subject: "Quarterly numbers".to_string(),
            received_at: Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap(),
            size: 2048,
            is_unread: true,
            is_flagged: false,
            preview: String::new(),
        }
    }

    fn detail(from: &[&str], to: &[&str], cc: &[&str]) -> EmailDetail {
        EmailDetail {
            summary: summary(from, to),
            cc: cc.iter().map(|a| Address::bare(*a)).collect(),
            bcc: vec![],
            reply_to: vec![],
            sent_at: None,
            message_ids: vec!["<a@x>".to_string()],
            in_reply_to: vec![],
            references: vec![],
            text_body: Some("line one\nline two".to_string()),
            html_body: None,
            raw_headers: vec![],
            attachments: vec![],
        }
    }

    fn request(mode: DraftMode, to: Option<&str>) -> DraftRequest {
        DraftRequest::new(
            mode,
            Some("m1".to_string()),
            to,
            None,
            None,
            None,
            Some("hello".to_string()),
            None,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_body_supplied_twice_rejected() {
        let mut stream = std::io::Cursor::new("stream body");
        let err = DraftRequest::new(
            DraftMode::New,
            None,
            Some("a@x.com"),
            None,
            None,
            None,
            Some("literal".to_string()),
            Some(&mut stream),
            false,
        );
        assert!(matches!(err, Err(WardError::InvalidBodyInput(_))));
    }

    #[test]
    fn test_body_missing_rejected() {
        let err = DraftRequest::new(
            DraftMode::New,
            None,
            Some("a@x.com"),
            None,
            None,
            None,
            None,
            None,
            false,
        );
        assert!(matches!(err, Err(WardError::InvalidBodyInput(_))));
    }

    #[test]
    fn test_body_from_stream() {
        let mut stream = std::io::Cursor::new("from the stream");
        let req = DraftRequest::new(
            DraftMode::New,
            None,
            Some("a@x.com"),
            None,
            None,
            None,
            None,
            Some(&mut stream),
            false,
        )
        .unwrap();
        assert_eq!(req.body, "from the stream");
    }

    #[test]
    fn test_new_requires_recipient() {
        let err = DraftRequest::new(
            DraftMode::New,
            None,
            None,
            None,
            None,
            None,
            Some("hi".to_string()),
            None,
            false,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_reply_targets_reply_to_over_from() {
        let mut original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        original.reply_to = vec![Address::bare("list@x.com")];

        let composed = compose(&request(DraftMode::Reply, None), Some(&original), "me@x.com")
            .unwrap();
        let to: Vec<&str> = composed.to.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(to, ["list@x.com"]);
    }

    #[test]
    fn test_reply_appends_user_to() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let composed = compose(
            &request(DraftMode::Reply, Some("extra@x.com, alice@x.com")),
            Some(&original),
            "me@x.com",
        )
        .unwrap();
        let to: Vec<&str> = composed.to.iter().map(|a| a.email.as_str()).collect();
        // Duplicate of alice is dropped; first-seen order preserved.
        assert_eq!(to, ["alice@x.com", "extra@x.com"]);
    }

    #[test]
    fn test_reply_all_excludes_self_and_to() {
        // Scenario: from=alice, to=[me, bob], cc=[carol], self=me.
        let original = detail(&["alice@x.com"], &["me@x.com", "bob@x.com"], &["carol@x.com"]);
        let composed = compose(&request(DraftMode::ReplyAll, None), Some(&original), "me@x.com")
            .unwrap();

        let to: Vec<&str> = composed.to.iter().map(|a| a.email.as_str()).collect();
        let cc: Vec<&str> = composed.cc.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(to, ["alice@x.com"]);
        assert_eq!(cc, ["bob@x.com", "carol@x.com"]);
    }

    #[test]
    fn test_reply_all_invalid_self_skips_exclusion() {
        let original = detail(&["alice@x.com"], &["me@x.com", "bob@x.com"], &[]);
        let composed = compose(
            &request(DraftMode::ReplyAll, None),
            Some(&original),
            "not-an-address",
        )
        .unwrap();

        let cc: Vec<&str> = composed.cc.iter().map(|a| a.email.as_str()).collect();
        assert_eq!(cc, ["me@x.com", "bob@x.com"]);
        assert!(composed.from.is_none());
    }

    #[test]
    fn test_subject_prefixed_once() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let composed = compose(&request(DraftMode::Reply, None), Some(&original), "me@x.com")
            .unwrap();
        assert_eq!(composed.subject, "Re: Quarterly numbers");
    }

    #[test]
    fn test_subject_existing_re_untouched() {
        let mut original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        original.summary.subject = "RE: Quarterly numbers".to_string();
        let composed = compose(&request(DraftMode::Reply, None), Some(&original), "me@x.com")
            .unwrap();
        assert_eq!(composed.subject, "RE: Quarterly numbers");
    }

    #[test]
    fn test_forward_subject_prefix() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let composed = compose(
            &request(DraftMode::Forward, Some("dana@x.com")),
            Some(&original),
            "me@x.com",
        )
        .unwrap();
        assert_eq!(composed.subject, "Fwd: Quarterly numbers");
    }

    #[test]
    fn test_user_subject_overrides_prefixing() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let mut req = request(DraftMode::Reply, None);
        req.subject = Some("Totally new subject".to_string());
        let composed = compose(&req, Some(&original), "me@x.com").unwrap();
        assert_eq!(composed.subject, "Totally new subject");
    }

    #[test]
    fn test_threading_from_message_id() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let composed = compose(&request(DraftMode::Reply, None), Some(&original), "me@x.com")
            .unwrap();
        assert_eq!(composed.in_reply_to, ["<a@x>"]);
        assert_eq!(composed.references, ["<a@x>"]);
    }

    #[test]
    fn test_threading_appends_to_references() {
        let mut original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        original.references = vec!["<r1@x>".to_string(), "<a@x>".to_string()];
        let composed = compose(&request(DraftMode::Reply, None), Some(&original), "me@x.com")
            .unwrap();
        // "<a@x>" appears once even though it is both a reference and the id.
        assert_eq!(composed.references, ["<r1@x>", "<a@x>"]);
    }

    #[test]
    fn test_threading_absent_without_message_id() {
        let mut original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        original.message_ids.clear();
        let composed = compose(&request(DraftMode::Reply, None), Some(&original), "me@x.com")
            .unwrap();
        assert!(composed.in_reply_to.is_empty());
        assert!(composed.references.is_empty());
    }

    #[test]
    fn test_forward_body_quotes_original() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let composed = compose(
            &request(DraftMode::Forward, Some("dana@x.com")),
            Some(&original),
            "me@x.com",
        )
        .unwrap();
        assert!(composed.body.starts_with("hello\n"));
        assert!(composed
            .body
            .contains("---------- Forwarded message ----------"));
        assert!(composed.body.contains("> line one\n> line two\n"));
    }

    #[test]
    fn test_forward_body_deterministic() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let a = forward_body("hi", &original);
        let b = forward_body("hi", &original);
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_shape_for_drafts() {
        let original = detail(&["alice@x.com"], &["me@x.com"], &[]);
        let composed = compose(&request(DraftMode::Reply, None), Some(&original), "me@x.com")
            .unwrap();
        let payload = composed.to_payload("drafts1");
        assert_eq!(payload.mailbox_ids.len(), 1);
        assert_eq!(payload.mailbox_ids.get("drafts1"), Some(&true));
        assert_eq!(payload.keywords.get(KEYWORD_DRAFT), Some(&true));
    }
}

//! Selection filters over the remote mailbox.
//!
//! Raw CLI inputs are validated into a [`FilterSpec`]; an unset or
//! whitespace-only string field is absent, and a `false` boolean is
//! absent, so only explicitly-true booleans and non-empty strings count
//! as active filters. Mailbox names are resolved to ids against the
//! mail service in a separate step, so all pure validation happens
//! before any network call.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::client::MailClient;
use crate::error::{Result, WardError};

/// Raw selector inputs as they arrive from the CLI, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawFilters {
    pub mailbox: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub has_attachment: bool,
    pub unread: bool,
    pub flagged: bool,
    pub unflagged: bool,
}

/// A validated selection predicate.
///
/// `mailbox` holds the user-supplied name or role until
/// [`FilterSpec::resolve`] swaps in the id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,
    pub has_attachment: bool,
    pub unread: bool,
    pub flagged: bool,
    pub unflagged: bool,
}

impl FilterSpec {
    /// Validate raw inputs into a `FilterSpec`.
    ///
    /// Fails with `ConflictingFilters` when both `flagged` and
    /// `unflagged` are set, and `InvalidDate` for unparseable dates.
    /// Performs no network calls.
    pub fn from_raw(raw: &RawFilters) -> Result<Self> {
        if raw.flagged && raw.unflagged {
            return Err(WardError::ConflictingFilters(
                "--flagged and --unflagged are mutually exclusive".to_string(),
            ));
        }

        Ok(Self {
            mailbox: active_string(&raw.mailbox),
            mailbox_id: None,
            from: active_string(&raw.from),
            to: active_string(&raw.to),
            subject: active_string(&raw.subject),
            before: parse_date_field("before", &raw.before)?,
            after: parse_date_field("after", &raw.after)?,
            has_attachment: raw.has_attachment,
            unread: raw.unread,
            flagged: raw.flagged,
            unflagged: raw.unflagged,
        })
    }

    /// True when no filter is active; an empty spec is invalid as a
    /// selector, which the target resolver enforces.
    pub fn is_empty(&self) -> bool {
        self.mailbox.is_none()
            && self.mailbox_id.is_none()
            && self.from.is_none()
            && self.to.is_none()
            && self.subject.is_none()
            && self.before.is_none()
            && self.after.is_none()
            && !self.has_attachment
            && !self.unread
            && !self.flagged
            && !self.unflagged
    }

    /// Resolve a mailbox name/role to an id against the mail service.
    ///
    /// Fails with `MailboxNotFound` if no mailbox matches. A spec
    /// without a mailbox filter passes through unchanged.
    pub fn resolve(mut self, client: &dyn MailClient) -> Result<Self> {
        if let Some(name) = self.mailbox.take() {
            let mailbox = client.resolve_mailbox(&name)?;
            tracing::debug!(name, id = %mailbox.id, "resolved mailbox filter");
            self.mailbox_id = Some(mailbox.id);
        }
        Ok(self)
    }
}

/// Treat whitespace-only values as absent.
fn active_string(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse an optional date flag: RFC 3339, or a bare `YYYY-MM-DD`
/// interpreted as midnight UTC.
fn parse_date_field(field: &'static str, value: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    let Some(s) = active_string(value) else {
        return Ok(None);
    };

    if let Ok(t) = DateTime::parse_from_rfc3339(&s) {
        return Ok(Some(t.with_timezone(&Utc)));
    }
    if let Ok(d) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        let midnight = d.and_time(NaiveTime::MIN).and_utc();
        return Ok(Some(midnight));
    }
    Err(WardError::InvalidDate { field, value: s })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_raw_is_empty_spec() {
        let spec = FilterSpec::from_raw(&RawFilters::default()).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_whitespace_string_is_absent() {
        let raw = RawFilters {
            subject: Some("   ".to_string()),
            ..Default::default()
        };
        let spec = FilterSpec::from_raw(&raw).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_false_booleans_are_absent() {
        let raw = RawFilters {
            unread: false,
            flagged: false,
            ..Default::default()
        };
        assert!(FilterSpec::from_raw(&raw).unwrap().is_empty());
    }

    #[test]
    fn test_flagged_and_unflagged_conflict() {
        let raw = RawFilters {
            flagged: true,
            unflagged: true,
            // Other active fields must not mask the conflict.
            subject: Some("report".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            FilterSpec::from_raw(&raw),
            Err(WardError::ConflictingFilters(_))
        ));
    }

    #[test]
    fn test_bare_date_is_midnight_utc() {
        let raw = RawFilters {
            before: Some("2026-01-15".to_string()),
            ..Default::default()
        };
        let spec = FilterSpec::from_raw(&raw).unwrap();
        assert_eq!(
            spec.before.unwrap().to_rfc3339(),
            "2026-01-15T00:00:00+00:00"
        );
    }

    #[test]
    fn test_rfc3339_date_accepted() {
        let raw = RawFilters {
            after: Some("2026-01-15T08:30:00Z".to_string()),
            ..Default::default()
        };
        let spec = FilterSpec::from_raw(&raw).unwrap();
        assert!(spec.after.is_some());
        assert!(!spec.is_empty());
    }

    #[test]
    fn test_invalid_date_rejected() {
        let raw = RawFilters {
            before: Some("January 15".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            FilterSpec::from_raw(&raw),
            Err(WardError::InvalidDate { field: "before", .. })
        ));
    }

    #[test]
    fn test_active_subject_counts() {
        let raw = RawFilters {
            subject: Some("invoice".to_string()),
            ..Default::default()
        };
        let spec = FilterSpec::from_raw(&raw).unwrap();
        assert!(!spec.is_empty());
        assert_eq!(spec.subject.as_deref(), Some("invoice"));
    }
}

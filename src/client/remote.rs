//! Thin JMAP transport.
//!
//! Session discovery plus the four method calls the engine needs:
//! `Mailbox/get`, `Email/query`, `Email/get`, `Email/set`. Synchronous
//! HTTP (ureq) keeps the binary executor-agnostic. This module owns the
//! wire format; nothing above it sees JSON.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::{Result, WardError};
use crate::filter::FilterSpec;
use crate::model::address::Address;
use crate::model::email::{AttachmentMeta, EmailDetail, EmailSummary};
use crate::model::mailbox::{Mailbox, Role};

use super::{FetchOutcome, MailClient, SetError, SetOutcome, SetRequest};

const USING: [&str; 2] = [
    "urn:ietf:params:jmap:core",
    "urn:ietf:params:jmap:mail",
];

const SUMMARY_PROPERTIES: [&str; 11] = [
    "id",
    "threadId",
    "mailboxIds",
    "from",
    "to",
    "subject",
    "receivedAt",
    "size",
    "keywords",
    "preview",
    "hasAttachment",
];

/// JMAP client bound to one account.
pub struct RemoteClient {
    agent: ureq::Agent,
    api_url: String,
    token: String,
    account_id: String,
}

impl RemoteClient {
    /// Discover the session and bind to the primary mail account
    /// (or the explicitly configured one).
    pub fn connect(
        session_url: &str,
        token: &str,
        account_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        let mut response = agent
            .get(session_url)
            .header("Authorization", &format!("Bearer {token}"))
            .call()
            .map_err(WardError::network)?;
        let session: Value = response.body_mut().read_json().map_err(WardError::network)?;

        let api_url = session["apiUrl"]
            .as_str()
            .ok_or_else(|| WardError::network("session response missing apiUrl"))?
            .to_string();
        let account_id = match account_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => session["primaryAccounts"]["urn:ietf:params:jmap:mail"]
                .as_str()
                .ok_or_else(|| WardError::network("session has no primary mail account"))?
                .to_string(),
        };

        tracing::debug!(api_url, account_id, "JMAP session established");
        Ok(Self {
            agent,
            api_url,
            token: token.to_string(),
            account_id,
        })
    }

    /// Issue one method call and return its response arguments.
    fn call(&self, method: &str, args: Value) -> Result<Value> {
        let request = json!({
            "using": USING,
            "methodCalls": [[method, args, "0"]],
        });

        let mut response = self
            .agent
            .post(&self.api_url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .send_json(&request)
            .map_err(WardError::network)?;
        let body: Value = response.body_mut().read_json().map_err(WardError::network)?;

        let (name, args) = body["methodResponses"][0]
            .as_array()
            .and_then(|call| Some((call.first()?.as_str()?, call.get(1)?.clone())))
            .ok_or_else(|| WardError::network("malformed JMAP response"))?;

        if name == "error" {
            let kind = args["type"].as_str().unwrap_or("unknown");
            return Err(WardError::network(format!("server error: {kind}")));
        }
        Ok(args)
    }

    fn with_account(&self, mut args: Value) -> Value {
        args["accountId"] = Value::String(self.account_id.clone());
        args
    }
}

impl MailClient for RemoteClient {
    fn resolve_mailbox(&self, name_or_role: &str) -> Result<Mailbox> {
        let mailboxes = self.list_mailboxes()?;
        let lowered = name_or_role.to_lowercase();
        mailboxes
            .iter()
            .find(|m| m.role.as_ref().is_some_and(|r| r.as_str() == lowered))
            .or_else(|| mailboxes.iter().find(|m| m.name.to_lowercase() == lowered))
            .cloned()
            .ok_or_else(|| WardError::MailboxNotFound(name_or_role.to_string()))
    }

    fn list_mailboxes(&self) -> Result<Vec<Mailbox>> {
        let args = self.with_account(json!({ "ids": null }));
        let response = self.call("Mailbox/get", args)?;
        let list = response["list"]
            .as_array()
            .ok_or_else(|| WardError::network("Mailbox/get returned no list"))?;
        Ok(list.iter().map(parse_mailbox).collect())
    }

    fn query_ids(&self, filter: &FilterSpec) -> Result<Vec<String>> {
        let args = self.with_account(json!({
            "filter": filter_conditions(filter),
            "sort": [{ "property": "receivedAt", "isAscending": false }],
        }));
        let response = self.call("Email/query", args)?;
        Ok(response["ids"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_summaries(&self, ids: &[String]) -> Result<FetchOutcome> {
        let args = self.with_account(json!({
            "ids": ids,
            "properties": SUMMARY_PROPERTIES,
        }));
        let response = self.call("Email/get", args)?;

        let found = response["list"]
            .as_array()
            .map(|list| list.iter().map(parse_summary).collect())
            .unwrap_or_default();
        let not_found = response["notFound"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(FetchOutcome { found, not_found })
    }

    fn fetch_detail(&self, id: &str) -> Result<EmailDetail> {
        let args = self.with_account(json!({
            "ids": [id],
            "fetchTextBodyValues": true,
            "fetchHTMLBodyValues": true,
        }));
        let response = self.call("Email/get", args)?;
        let item = response["list"]
            .as_array()
            .and_then(|list| list.first())
            .ok_or_else(|| WardError::EmailNotFound(id.to_string()))?;
        Ok(parse_detail(item))
    }

    fn apply_set(&self, request: &SetRequest) -> Result<SetOutcome> {
        let mut update = serde_json::Map::new();
        for (id, patch) in &request.update {
            let mut object = serde_json::Map::new();
            if let Some(mailbox_ids) = &patch.mailbox_ids {
                object.insert("mailboxIds".to_string(), json!(mailbox_ids));
            }
            for (keyword, value) in &patch.keywords {
                object.insert(
                    format!("keywords/{keyword}"),
                    match value {
                        Some(v) => json!(v),
                        None => Value::Null,
                    },
                );
            }
            update.insert(id.clone(), Value::Object(object));
        }

        let mut create = serde_json::Map::new();
        for (n, draft) in request.create.iter().enumerate() {
            create.insert(format!("draft{n}"), draft_object(draft));
        }

        let args = self.with_account(json!({
            "update": update,
            "create": create,
        }));
        let response = self.call("Email/set", args)?;

        let mut outcome = SetOutcome::default();
        if let Some(updated) = response["updated"].as_object() {
            outcome.updated.extend(updated.keys().cloned());
        }
        if let Some(created) = response["created"].as_object() {
            for value in created.values() {
                if let Some(id) = value["id"].as_str() {
                    outcome.created.push(id.to_string());
                }
            }
        }
        for key in ["notUpdated", "notCreated"] {
            if let Some(failures) = response[key].as_object() {
                for (id, error) in failures {
                    outcome.failed.push((
                        id.clone(),
                        SetError {
                            kind: error["type"].as_str().unwrap_or("unknown").to_string(),
                            description: error["description"].as_str().map(str::to_string),
                        },
                    ));
                }
            }
        }
        Ok(outcome)
    }
}

// ── Wire parsing ────────────────────────────────────────────────

fn filter_conditions(filter: &FilterSpec) -> Value {
    let mut base = serde_json::Map::new();
    if let Some(id) = &filter.mailbox_id {
        base.insert("inMailbox".to_string(), json!(id));
    }
    if let Some(from) = &filter.from {
        base.insert("from".to_string(), json!(from));
    }
    if let Some(to) = &filter.to {
        base.insert("to".to_string(), json!(to));
    }
    if let Some(subject) = &filter.subject {
        base.insert("subject".to_string(), json!(subject));
    }
    if let Some(before) = &filter.before {
        base.insert("before".to_string(), json!(utc_date(before)));
    }
    if let Some(after) = &filter.after {
        base.insert("after".to_string(), json!(utc_date(after)));
    }
    if filter.has_attachment {
        base.insert("hasAttachment".to_string(), json!(true));
    }

    // A FilterCondition only carries one hasKeyword/notKeyword each, so
    // keyword filters become separate conditions joined with AND.
    let mut conditions: Vec<Value> = Vec::new();
    if !base.is_empty() {
        conditions.push(Value::Object(base));
    }
    if filter.unread {
        conditions.push(json!({ "notKeyword": "$seen" }));
    }
    if filter.flagged {
        conditions.push(json!({ "hasKeyword": "$flagged" }));
    }
    if filter.unflagged {
        conditions.push(json!({ "notKeyword": "$flagged" }));
    }

    match conditions.len() {
        0 => json!({}),
        1 => conditions.remove(0),
        _ => json!({ "operator": "AND", "conditions": conditions }),
    }
}

fn utc_date(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn parse_mailbox(value: &Value) -> Mailbox {
    Mailbox {
        id: str_field(value, "id"),
        name: str_field(value, "name"),
        role: value["role"].as_str().map(Role::from_server),
        parent_id: value["parentId"].as_str().map(str::to_string),
        total_emails: value["totalEmails"].as_u64().unwrap_or(0),
        unread_emails: value["unreadEmails"].as_u64().unwrap_or(0),
    }
}

fn parse_summary(value: &Value) -> EmailSummary {
    let keywords = &value["keywords"];
    EmailSummary {
        id: str_field(value, "id"),
        thread_id: str_field(value, "threadId"),
        mailbox_ids: value["mailboxIds"]
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_else(BTreeSet::new),
        from: parse_addresses(&value["from"]),
        to: parse_addresses(&value["to"]),
        subject: str_field(value, "subject"),
        received_at: value["receivedAt"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
        size: value["size"].as_u64().unwrap_or(0),
        is_unread: keywords["$seen"].as_bool() != Some(true),
        is_flagged: keywords["$flagged"].as_bool() == Some(true),
        preview: str_field(value, "preview"),
    }
}

fn parse_detail(value: &Value) -> EmailDetail {
    let body_values = &value["bodyValues"];
    let text_body = first_body_value(&value["textBody"], body_values);
    let html_body = first_body_value(&value["htmlBody"], body_values);

    EmailDetail {
        summary: parse_summary(value),
        cc: parse_addresses(&value["cc"]),
        bcc: parse_addresses(&value["bcc"]),
        reply_to: parse_addresses(&value["replyTo"]),
        sent_at: value["sentAt"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
        message_ids: string_list(&value["messageId"]),
        in_reply_to: string_list(&value["inReplyTo"]),
        references: string_list(&value["references"]),
        text_body,
        html_body,
        raw_headers: value["headers"]
            .as_array()
            .map(|headers| {
                headers
                    .iter()
                    .map(|h| (str_field(h, "name"), str_field(h, "value")))
                    .collect()
            })
            .unwrap_or_default(),
        attachments: value["attachments"]
            .as_array()
            .map(|atts| {
                atts.iter()
                    .map(|a| AttachmentMeta {
                        name: a["name"].as_str().map(str::to_string),
                        mime_type: str_field(a, "type"),
                        size: a["size"].as_u64().unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn draft_object(draft: &super::DraftPayload) -> Value {
    let mut object = serde_json::Map::new();
    object.insert("mailboxIds".to_string(), json!(draft.mailbox_ids));
    object.insert("keywords".to_string(), json!(draft.keywords));
    if let Some(from) = &draft.from {
        object.insert("from".to_string(), json!([address_object(from)]));
    }
    object.insert(
        "to".to_string(),
        json!(draft.to.iter().map(address_object).collect::<Vec<_>>()),
    );
    if !draft.cc.is_empty() {
        object.insert(
            "cc".to_string(),
            json!(draft.cc.iter().map(address_object).collect::<Vec<_>>()),
        );
    }
    if !draft.bcc.is_empty() {
        object.insert(
            "bcc".to_string(),
            json!(draft.bcc.iter().map(address_object).collect::<Vec<_>>()),
        );
    }
    object.insert("subject".to_string(), json!(draft.subject));
    if !draft.in_reply_to.is_empty() {
        object.insert("inReplyTo".to_string(), json!(draft.in_reply_to));
        object.insert("references".to_string(), json!(draft.references));
    }

    let part_id = "body1";
    let part_field = if draft.html { "htmlBody" } else { "textBody" };
    let part_type = if draft.html { "text/html" } else { "text/plain" };
    object.insert(
        part_field.to_string(),
        json!([{ "partId": part_id, "type": part_type }]),
    );
    object.insert(
        "bodyValues".to_string(),
        json!({ part_id: { "value": draft.body } }),
    );
    Value::Object(object)
}

fn address_object(address: &Address) -> Value {
    json!({ "name": address.name, "email": address.email })
}

fn parse_addresses(value: &Value) -> Vec<Address> {
    value
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|a| {
                    Some(Address {
                        name: a["name"].as_str().map(str::to_string),
                        email: a["email"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `messageId`/`inReplyTo`/`references` are string arrays or null.
fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn first_body_value(parts: &Value, body_values: &Value) -> Option<String> {
    let part_id = parts.as_array()?.first()?["partId"].as_str()?;
    body_values[part_id]["value"].as_str().map(str::to_string)
}

fn str_field(value: &Value, field: &str) -> String {
    value[field].as_str().unwrap_or_default().to_string()
}

//! Email address parsing (RFC 5322 §3.4), normalization and dedup.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WardError};

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `name = Some("Juan García")`, `email = "juan@ejemplo.com"`
/// - `"user@example.com"` → `name = None`, `email = "user@example.com"`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    /// Human-readable display name, if present.
    pub name: Option<String>,
    /// The bare email address (`user@domain`).
    pub email: String,
}

impl Address {
    /// Construct from a bare email, no display name.
    pub fn bare(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Parse a single email address from user input or a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// Fails with [`WardError::InvalidAddress`] when the addr-spec part is
    /// not `local@domain` with non-empty halves.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WardError::InvalidAddress(raw.to_string()));
        }

        // "Display Name <address>" or "<address>"
        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim();
                    validate_addr_spec(addr)
                        .ok_or_else(|| WardError::InvalidAddress(raw.to_string()))?;
                    let name_part = strip_quotes(trimmed[..angle_start].trim());
                    return Ok(Self {
                        name: if name_part.is_empty() {
                            None
                        } else {
                            Some(name_part)
                        },
                        email: addr.to_string(),
                    });
                }
            }
            return Err(WardError::InvalidAddress(raw.to_string()));
        }

        // Bare address: "user@domain.com"
        validate_addr_spec(trimmed).ok_or_else(|| WardError::InvalidAddress(raw.to_string()))?;
        Ok(Self {
            name: None,
            email: trimmed.to_string(),
        })
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`.
    /// Empty segments are skipped; any malformed segment fails the whole list.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    if !current.trim().is_empty() {
                        results.push(Self::parse(&current)?);
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        if !current.trim().is_empty() {
            results.push(Self::parse(&current)?);
        }

        Ok(results)
    }

    /// Normalization key: the lowercased email. The display name never
    /// participates in equality or dedup.
    pub fn normalize_key(&self) -> String {
        self.email.to_lowercase()
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Minimal addr-spec check: exactly one `@` splitting non-empty,
/// whitespace-free local part and domain.
fn validate_addr_spec(s: &str) -> Option<()> {
    let (local, domain) = s.split_once('@')?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || s.chars().any(char::is_whitespace)
    {
        return None;
    }
    Some(())
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Drop addresses whose normalization key was already seen, preserving
/// the relative order of first occurrences. Idempotent.
pub fn dedupe(addresses: Vec<Address>) -> Vec<Address> {
    let mut seen = std::collections::HashSet::new();
    addresses
        .into_iter()
        .filter(|a| seen.insert(a.normalize_key()))
        .collect()
}

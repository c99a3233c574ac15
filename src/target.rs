//! Target resolution: explicit email ids XOR a filter specification.

use crate::client::MailClient;
use crate::error::{Result, WardError};
use crate::filter::FilterSpec;

/// Early, network-free check that exactly one target source is present.
///
/// Fails with `AmbiguousTargets` when both ids and active filters are
/// supplied, and `NoTargets` when neither is.
pub fn validate_targets(ids: &[String], filter: &FilterSpec) -> Result<()> {
    let has_ids = !ids.is_empty();
    let has_filters = !filter.is_empty();

    if has_ids && has_filters {
        return Err(WardError::AmbiguousTargets);
    }
    if !has_ids && !has_filters {
        return Err(WardError::NoTargets);
    }
    Ok(())
}

/// Return the target email ids for an invocation.
///
/// Explicit ids are returned unmodified and unvalidated; existence is
/// checked during execution so errors surface per id instead of failing
/// the whole call. A filter is resolved and queried against the mail
/// service; zero matches fail with `NoMatches` so callers never
/// silently no-op.
pub fn resolve_targets(
    client: &dyn MailClient,
    ids: &[String],
    filter: &FilterSpec,
) -> Result<Vec<String>> {
    validate_targets(ids, filter)?;

    if !ids.is_empty() {
        return Ok(ids.to_vec());
    }

    let resolved = filter.clone().resolve(client)?;
    let matched = client.query_ids(&resolved)?;
    tracing::debug!(count = matched.len(), "filter query resolved targets");

    if matched.is_empty() {
        return Err(WardError::NoMatches);
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RawFilters;

    fn filter_with_subject() -> FilterSpec {
        FilterSpec::from_raw(&RawFilters {
            subject: Some("weekly report".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_both_sources_ambiguous() {
        let ids = vec!["m1".to_string()];
        assert!(matches!(
            validate_targets(&ids, &filter_with_subject()),
            Err(WardError::AmbiguousTargets)
        ));
    }

    #[test]
    fn test_neither_source_is_no_targets() {
        assert!(matches!(
            validate_targets(&[], &FilterSpec::default()),
            Err(WardError::NoTargets)
        ));
    }

    #[test]
    fn test_ids_alone_ok() {
        let ids = vec!["m1".to_string()];
        assert!(validate_targets(&ids, &FilterSpec::default()).is_ok());
    }

    #[test]
    fn test_filter_alone_ok() {
        assert!(validate_targets(&[], &filter_with_subject()).is_ok());
    }
}

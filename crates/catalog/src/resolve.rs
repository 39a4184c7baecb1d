//! Deterministic selection of blobs from a listing.
//!
//! The resolver is a pure function from (listing, query) to a decision. It
//! never performs I/O and never errors: an empty selection is the
//! [`NotFound`](ResolutionResult::NotFound) value, not an error path. Given
//! identical listing content it always returns the same result, regardless
//! of the order the listing arrived in.

use crate::models::BlobRef;

/// What the user asked for, validated once per invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResolutionQuery {
    /// Name prefix the listing was filtered by
    pub prefix: String,
    /// Exact file name under the prefix, disabling latest-selection
    pub exact_name: Option<String>,
    /// Enumerate the whole filtered set instead of picking one blob
    pub list_mode: bool,
}

impl ResolutionQuery {
    /// Open the most recently modified blob under `prefix`.
    pub fn latest(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), ..Self::default() }
    }

    /// Open exactly `prefix + "/" + name`.
    pub fn exact(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            exact_name: Some(name.into()),
            list_mode: false,
        }
    }

    /// Enumerate every blob under `prefix`.
    pub fn listing(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            exact_name: None,
            list_mode: true,
        }
    }
}

/// The resolver's decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionResult {
    /// Exactly one blob selected
    Single(BlobRef),
    /// The full filtered set, sorted by name ascending
    Many(Vec<BlobRef>),
    /// Nothing matched
    NotFound,
}

/// Turn a listing into exactly one decision.
///
/// - With an exact name: linear scan for `prefix + "/" + name` (the prefix
///   may or may not carry a trailing slash; an empty prefix means the name
///   stands alone). No ambiguity is possible.
/// - In list mode: the whole listing, re-sorted by name so the output is
///   reproducible whatever order the service returned.
/// - Otherwise: the blob with the greatest `last_modified`; ties broken by
///   the lexicographically greatest name.
pub fn resolve(listing: Vec<BlobRef>, query: &ResolutionQuery) -> ResolutionResult {
    if let Some(exact) = &query.exact_name {
        let target = join_name(&query.prefix, exact);
        return match listing.into_iter().find(|blob| blob.name == target) {
            Some(blob) => ResolutionResult::Single(blob),
            None => ResolutionResult::NotFound,
        };
    }

    if query.list_mode {
        if listing.is_empty() {
            return ResolutionResult::NotFound;
        }
        let mut listing = listing;
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        return ResolutionResult::Many(listing);
    }

    // Compare by (timestamp, name) so the winner depends only on listing
    // content, never on traversal order.
    match listing
        .into_iter()
        .max_by(|a, b| (a.last_modified, &a.name).cmp(&(b.last_modified, &b.name)))
    {
        Some(blob) => ResolutionResult::Single(blob),
        None => ResolutionResult::NotFound,
    }
}

fn join_name(prefix: &str, exact: &str) -> String {
    match prefix.trim_end_matches('/') {
        "" => exact.to_string(),
        trimmed => format!("{trimmed}/{exact}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::OffsetDateTime;

    fn blob(name: &str, modified_at: i64) -> BlobRef {
        BlobRef::new(
            "container",
            name,
            OffsetDateTime::from_unix_timestamp(modified_at).unwrap(),
            42,
        )
    }

    #[test]
    fn test_latest_picks_greatest_timestamp() {
        let listing = vec![blob("pfx/old", 100), blob("pfx/newest", 300), blob("pfx/mid", 200)];
        let result = resolve(listing, &ResolutionQuery::latest("pfx/"));
        assert!(matches!(result, ResolutionResult::Single(b) if b.name == "pfx/newest"));
    }

    #[test]
    fn test_latest_tie_breaks_by_greatest_name() {
        let listing = vec![blob("pfx/a", 300), blob("pfx/b", 300), blob("pfx/c", 100)];
        let result = resolve(listing, &ResolutionQuery::latest("pfx/"));
        assert!(matches!(result, ResolutionResult::Single(b) if b.name == "pfx/b"));
    }

    #[test]
    fn test_latest_of_empty_listing() {
        assert_eq!(resolve(vec![], &ResolutionQuery::latest("pfx/")), ResolutionResult::NotFound);
    }

    #[rstest]
    #[case("pfx", "b.txt", Some("pfx/b.txt"))]
    #[case("pfx/", "b.txt", Some("pfx/b.txt"))]
    #[case("pfx", "c.txt", None)]
    #[case("", "a.txt", None)]
    fn test_exact_name(#[case] prefix: &str, #[case] exact: &str, #[case] expected: Option<&str>) {
        let listing = vec![blob("pfx/a.txt", 100), blob("pfx/b.txt", 200)];
        let result = resolve(listing, &ResolutionQuery::exact(prefix, exact));
        match expected {
            Some(name) => assert!(matches!(result, ResolutionResult::Single(b) if b.name == name)),
            None => assert_eq!(result, ResolutionResult::NotFound),
        }
    }

    #[test]
    fn test_exact_name_with_empty_prefix() {
        let listing = vec![blob("a.txt", 100)];
        let result = resolve(listing, &ResolutionQuery::exact("", "a.txt"));
        assert!(matches!(result, ResolutionResult::Single(b) if b.name == "a.txt"));
    }

    #[test]
    fn test_list_mode_sorts_by_name() {
        let listing = vec![blob("z", 1), blob("a", 2), blob("m", 3)];
        let result = resolve(listing, &ResolutionQuery::listing(""));
        let ResolutionResult::Many(blobs) = result else {
            panic!("expected Many");
        };
        let names: Vec<&str> = blobs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["a", "m", "z"]);
    }

    #[test]
    fn test_list_mode_of_empty_listing() {
        assert_eq!(resolve(vec![], &ResolutionQuery::listing("pfx/")), ResolutionResult::NotFound);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        // Same listing content in two different arrival orders.
        let forwards = vec![blob("pfx/a", 300), blob("pfx/b", 300), blob("pfx/c", 100)];
        let backwards: Vec<BlobRef> = forwards.iter().rev().cloned().collect();
        let query = ResolutionQuery::latest("pfx/");
        assert_eq!(resolve(forwards.clone(), &query), resolve(backwards.clone(), &query));
        let query = ResolutionQuery::listing("pfx/");
        assert_eq!(resolve(forwards, &query), resolve(backwards, &query));
    }
}

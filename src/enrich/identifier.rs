//! Issue identifier extraction from free-form refs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::IssueIdentifier;

static LEADING_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*-[0-9]+").expect("static regex"));

/// Extract a leading `TEAM-number` identifier from a branch name or title.
///
/// The whole string is tried first, then the part after the last `/`, so
/// `feature/auth-142-fix` yields `AUTH-142`. The result is uppercase.
pub fn extract_identifier(text: &str) -> Option<IssueIdentifier> {
    leading(text).or_else(|| text.rsplit_once('/').and_then(|(_, tail)| leading(tail)))
}

fn leading(text: &str) -> Option<IssueIdentifier> {
    LEADING_IDENTIFIER.find(text).and_then(|m| IssueIdentifier::parse(m.as_str()).ok())
}

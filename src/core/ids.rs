//! Validated identifier newtypes.
//!
//! Every identifier that crosses a module boundary is wrapped in its own
//! type and can only be built through a validating constructor, so a
//! session id can never be passed where a step id is expected.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Error raised when an identifier fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("invalid {kind}: {value:?}")]
    Invalid { kind: &'static str, value: String },
}

/// Result type for identifier construction.
pub type IdResult<T> = Result<T, IdError>;

static ISSUE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*-[0-9]+$").expect("static regex"));

/// Team-scoped human readable issue code, e.g. `AUTH-142`.
///
/// Always stored uppercase, so equality is case-insensitive with respect
/// to the input it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueIdentifier(String);

impl IssueIdentifier {
    /// Parse and normalize an issue identifier.
    pub fn parse(value: &str) -> IdResult<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdError::Empty { kind: "issue identifier" });
        }
        if !ISSUE_IDENTIFIER.is_match(trimmed) {
            return Err(IdError::Invalid { kind: "issue identifier", value: value.to_string() });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The team key portion (`AUTH` in `AUTH-142`).
    pub fn team_key(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(team, _)| team)
    }

    /// The numeric portion (`142` in `AUTH-142`).
    pub fn number(&self) -> u64 {
        self.0.rsplit_once('-').and_then(|(_, n)| n.parse().ok()).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Declares a string newtype whose only invariant is "non-empty after trim".
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Build the identifier, rejecting empty or whitespace-only values.
            pub fn new(value: impl Into<String>) -> IdResult<Self> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(IdError::Empty { kind: $kind });
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> IdResult<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a spawned worker session.
    SessionId,
    "session id"
);
string_id!(
    /// Identifier of a workflow definition.
    WorkflowId,
    "workflow id"
);
string_id!(
    /// Identifier of a step, unique within its workflow.
    StepId,
    "step id"
);
string_id!(
    /// Identifier of a spec document in the spec store.
    SpecId,
    "spec id"
);

impl TryFrom<String> for IssueIdentifier {
    type Error = IdError;

    fn try_from(value: String) -> IdResult<Self> {
        Self::parse(&value)
    }
}

impl From<IssueIdentifier> for String {
    fn from(id: IssueIdentifier) -> Self {
        id.0
    }
}

impl fmt::Display for IssueIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pull request number on the code host. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct PrNumber(u64);

impl PrNumber {
    pub fn new(number: u64) -> IdResult<Self> {
        if number == 0 {
            return Err(IdError::Invalid { kind: "pull request number", value: "0".into() });
        }
        Ok(Self(number))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for PrNumber {
    type Error = IdError;

    fn try_from(value: u64) -> IdResult<Self> {
        Self::new(value)
    }
}

impl From<PrNumber> for u64 {
    fn from(number: PrNumber) -> Self {
        number.0
    }
}

impl fmt::Display for PrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a live workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(uuid::Uuid);

impl HandleId {
    /// Allocate a fresh random handle id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

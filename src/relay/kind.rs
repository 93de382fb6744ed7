//! Operation kinds carried by relayed messages.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Discriminant identifying which mutation a relayed message represents.
///
/// The set is open: kinds without a dedicated variant are kept verbatim in
/// [`OperationKind::Other`] so they can still be priced and logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    /// A batch of signed invocations.
    Invoke,
    /// A signed delegation plus a signed intention to revoke it.
    Revoke,
    /// Any other kind.
    Other(String),
}

impl OperationKind {
    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Invoke => "invoke",
            Self::Revoke => "revoke",
            Self::Other(kind) => kind,
        }
    }
}

impl FromStr for OperationKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "invoke" => Self::Invoke,
            "revoke" => Self::Revoke,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for OperationKind {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<String> for OperationKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OperationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

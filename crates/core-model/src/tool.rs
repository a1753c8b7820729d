use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identity of one filament channel (`T0`…`T7` conventionally, any `T<n>`
/// accepted). The handle is an opaque short string; ordering is numeric when
/// both sides parse as `T<n>` and lexical otherwise, so `T2 < T10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Build the conventional handle for a numeric tool index (`3` → `T3`).
    pub fn from_index(index: u32) -> Self {
        Self(format!("T{index}"))
    }

    /// Numeric index when the handle has the `T<digits>` shape.
    pub fn index(&self) -> Option<u32> {
        self.0.strip_prefix(['T', 't'])?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToolId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Ord for ToolId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.index(), other.index()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ToolId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

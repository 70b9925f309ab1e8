use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one digital input/output line.
///
/// Line identifiers are plain hardware indexes; any `u32` is structurally
/// valid. Whether a line actually exists is only discovered when the
/// registry first opens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(u32);

impl LineId {
    /// Create a line identifier from a raw hardware index.
    pub const fn new(index: u32) -> Self {
        LineId(index)
    }

    /// Get the raw hardware index.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Derived display name used when no alias has been configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatehouse_core::LineId;
    ///
    /// assert_eq!(LineId::new(14).default_alias(), "gpio14");
    /// ```
    #[must_use]
    pub fn default_alias(&self) -> String {
        format!("gpio{}", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LineId {
    fn from(index: u32) -> Self {
        LineId(index)
    }
}

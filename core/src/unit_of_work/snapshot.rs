//! Snapshot slots recorded by operations.

use serde::{Deserialize, Serialize};

/// A recorded state capture, or the shared sentinel used by transactions
/// that do not track changes.
///
/// Non-tracking transactions (silent, remote, throwaway) still record
/// operations so adapter hooks can be dispatched, but never pay for a real
/// capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Snapshot<S> {
    /// Placeholder recorded by non-tracking transactions.
    Untracked,
    /// A full capture of the entity's state.
    Captured(S),
}

impl<S> Snapshot<S> {
    /// Returns the captured state, or `None` for the sentinel.
    pub fn captured(&self) -> Option<&S> {
        match self {
            Self::Captured(s) => Some(s),
            Self::Untracked => None,
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self, Self::Captured(_))
    }
}

//! Handles - external correlators for live speech and offered prompts
//!
//! A handle is minted fresh (new uuid) every time a fragment starts running
//! or is offered as a prompt, and dies with that run or offer. Callers hold
//! handles, never indices; validation compares handle ids against the node's
//! live set, so a handle from a previous run can never act on a later one.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::dialogue::NodeId;

/// Identity of a single handle issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub Uuid);

impl HandleId {
    /// Mint a fresh handle identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Correlator for a running (or manually advanceable) fragment
///
/// Carried by `SpeechStarted`; the UI passes it back to request a skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechHandle {
    /// Owning node
    pub node: NodeId,
    /// Index of the fragment within the node
    pub fragment_index: usize,
    /// Identity of this issue
    pub id: HandleId,
    /// Resolved skippable value at start time
    pub skippable: bool,
}

impl SpeechHandle {
    /// Issue a fresh handle for a fragment that is about to run
    pub fn new(node: NodeId, fragment_index: usize, skippable: bool) -> Self {
        Self {
            node,
            fragment_index,
            id: HandleId::new(),
            skippable,
        }
    }
}

/// Correlator for one offered prompt option
///
/// Carried by `PromptAdded`; the UI passes it back to select that option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptHandle {
    /// Owning node
    pub node: NodeId,
    /// Index of the fragment within the node
    pub fragment_index: usize,
    /// Identity of this offer
    pub id: HandleId,
}

impl PromptHandle {
    /// Issue a fresh handle for an offered prompt
    pub fn new(node: NodeId, fragment_index: usize) -> Self {
        Self {
            node,
            fragment_index,
            id: HandleId::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_issue_gets_a_distinct_id() {
        let node = NodeId::new();
        let first = SpeechHandle::new(node, 0, true);
        let second = SpeechHandle::new(node, 0, true);
        assert_ne!(first.id, second.id);

        let offer_a = PromptHandle::new(node, 1);
        let offer_b = PromptHandle::new(node, 1);
        assert_ne!(offer_a.id, offer_b.id);
    }
}

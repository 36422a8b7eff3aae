//! Error types for playback and asset resolution

use thiserror::Error;

use crate::content::CharacterId;
use crate::dialogue::NodeId;
use crate::events::ConversationTag;

/// Result alias for fallible playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Errors surfaced by the public playback API
///
/// Internal eligibility checks (conditions, activation limits) are ordinary
/// control flow and never produce errors; these variants cover misuse of the
/// API surface itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// No node with this id is registered
    #[error("unknown dialogue node {0}")]
    UnknownNode(NodeId),

    /// The handle does not match any live speech or outstanding prompt
    #[error("handle does not match any live speech or outstanding prompt")]
    StaleHandle,

    /// Prompt selection sent to a talk node
    #[error("node {0} is not a player prompt node")]
    NotAPromptNode(NodeId),

    /// The selected prompt was valid when offered but can no longer run
    #[error("selected prompt can no longer run")]
    PromptUnavailable,

    /// Skip was requested in a state where the guard rules refuse it
    #[error("skip is not available in the current playback state")]
    SkipUnavailable,

    /// A conversation is already open
    #[error("conversation '{0}' is already open")]
    ConversationBusy(ConversationTag),

    /// No conversation is open
    #[error("no conversation is open")]
    NoConversation,
}

/// Errors from character/asset collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    /// No profile is registered for this character
    #[error("no character profile registered for '{0}'")]
    UnknownCharacter(CharacterId),
}

//! Broadcast events emitted during playback
//!
//! One struct per event, carrying everything a presentation layer needs
//! without reaching back into the node. Every payload snapshots the active
//! conversation tag at emit time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::content::{AudioCue, CharacterId, MoodTag};
use crate::handles::{PromptHandle, SpeechHandle};

/// Names the conversation a broadcast belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationTag(pub String);

impl ConversationTag {
    /// Wrap a conversation name
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl From<&str> for ConversationTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for ConversationTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl fmt::Display for ConversationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fragment began speaking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechStarted {
    pub conversation: Option<ConversationTag>,
    /// Correlator for this run; pass back to request a skip
    pub handle: SpeechHandle,
    pub speaker: Option<CharacterId>,
    pub directed_at: Option<CharacterId>,
    pub mood: Option<MoodTag>,
    pub dialogue_text: String,
    pub title_text: String,
    /// Effective duration; `None` means untimed
    pub speech_time: Option<f32>,
    /// Voice-over cue for the host to play
    pub audio: Option<AudioCue>,
    /// Resolved skippable value for this run
    pub skippable: bool,
}

/// A fragment's speech finished; padding (if any) is starting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechEnded {
    pub conversation: Option<ConversationTag>,
    pub handle: SpeechHandle,
    /// Padding that will elapse before the fragment completes
    pub padding_time: f32,
}

/// A fragment's padding elapsed; the fragment is fully complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddingOver {
    pub conversation: Option<ConversationTag>,
    pub handle: SpeechHandle,
}

/// A prompt option is being offered to the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAdded {
    pub conversation: Option<ConversationTag>,
    /// Correlator for this offer; pass back to select it
    pub handle: PromptHandle,
    pub speaker: Option<CharacterId>,
    pub directed_at: Option<CharacterId>,
    pub mood: Option<MoodTag>,
    pub dialogue_text: String,
    /// Short display text for the prompt list
    pub title_text: String,
}

/// All prompt options for this entry have been offered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptsReady {
    pub conversation: Option<ConversationTag>,
}

/// A prompt option was selected and its fragment is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSelected {
    pub conversation: Option<ConversationTag>,
    pub handle: PromptHandle,
}

/// A conversation opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationOpened {
    pub conversation: ConversationTag,
    pub opened_at: DateTime<Utc>,
}

/// A conversation closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationClosed {
    pub conversation: ConversationTag,
    pub closed_at: DateTime<Utc>,
}

/// Every broadcast the runtime can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DialogueEvent {
    SpeechStarted(SpeechStarted),
    SpeechEnded(SpeechEnded),
    PaddingOver(PaddingOver),
    PromptAdded(PromptAdded),
    PromptsReady(PromptsReady),
    PromptSelected(PromptSelected),
    ConversationOpened(ConversationOpened),
    ConversationClosed(ConversationClosed),
}

impl DialogueEvent {
    /// Dotted discriminator for logs and host-side routing
    pub fn event_type(&self) -> &'static str {
        match self {
            DialogueEvent::SpeechStarted(_) => "speech.started",
            DialogueEvent::SpeechEnded(_) => "speech.ended",
            DialogueEvent::PaddingOver(_) => "padding.over",
            DialogueEvent::PromptAdded(_) => "prompt.added",
            DialogueEvent::PromptsReady(_) => "prompts.ready",
            DialogueEvent::PromptSelected(_) => "prompt.selected",
            DialogueEvent::ConversationOpened(_) => "conversation.opened",
            DialogueEvent::ConversationClosed(_) => "conversation.closed",
        }
    }

    /// The conversation this event belongs to, if any
    pub fn conversation(&self) -> Option<&ConversationTag> {
        match self {
            DialogueEvent::SpeechStarted(e) => e.conversation.as_ref(),
            DialogueEvent::SpeechEnded(e) => e.conversation.as_ref(),
            DialogueEvent::PaddingOver(e) => e.conversation.as_ref(),
            DialogueEvent::PromptAdded(e) => e.conversation.as_ref(),
            DialogueEvent::PromptsReady(e) => e.conversation.as_ref(),
            DialogueEvent::PromptSelected(e) => e.conversation.as_ref(),
            DialogueEvent::ConversationOpened(e) => Some(&e.conversation),
            DialogueEvent::ConversationClosed(e) => Some(&e.conversation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types_are_stable() {
        let ready = DialogueEvent::PromptsReady(PromptsReady { conversation: None });
        assert_eq!(ready.event_type(), "prompts.ready");

        let opened = DialogueEvent::ConversationOpened(ConversationOpened {
            conversation: ConversationTag::from("tavern"),
            opened_at: Utc::now(),
        });
        assert_eq!(opened.event_type(), "conversation.opened");
        assert_eq!(opened.conversation().map(|t| t.0.as_str()), Some("tavern"));
    }

    #[test]
    fn test_events_round_trip_through_json() {
        let ready = DialogueEvent::PromptsReady(PromptsReady {
            conversation: Some(ConversationTag::from("tavern")),
        });
        let json = serde_json::to_string(&ready).unwrap();
        let back: DialogueEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ready);
    }
}

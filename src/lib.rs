//! Fragment sequencing and playback for node-based dialogue
//!
//! This crate drives authored dialogue at runtime. A [`DialogueNode`] owns an
//! ordered list of [`Fragment`]s and plays exactly one at a time through a
//! speech phase and a padding phase, both on the host-driven clock. It
//! provides:
//! - Talk nodes with run-all, run-until-failure, and select-one sequencing
//! - Player-prompt nodes that offer eligible fragments as selectable options
//! - Condition and activation-limit gating at node and fragment level
//! - Skip and manual-advance rules with per-fragment overrides
//! - Broadcast events for UI, audio, and logging listeners
//! - Output pins for wiring nodes into a host graph
//!
//! The host owns the frame loop: it calls [`DialogueRuntime::tick`] with
//! elapsed seconds and reacts to events; the runtime never spawns threads or
//! sleeps on its own.

pub mod assets;
pub mod broadcast;
pub mod broker;
pub mod condition;
pub mod content;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod fragment;
pub mod graph;
pub mod handles;
pub mod runtime;
pub mod settings;
pub mod time;

// Re-export main types
pub use assets::{CharacterProfile, CharacterSource, InMemoryCharacterSource, preload_characters};
pub use broadcast::{BroadcastRouter, ConversationListener, ListenerResult, RecordingListener};
pub use broker::{Broker, DefaultBroker};
pub use condition::{Condition, CountAtLeast, Facts, FlagClear, FlagSet, Unbound, all_pass};
pub use content::{AudioCue, CharacterId, MoodTag, SpeechContent, TimeMode};
pub use dialogue::{DialogueNode, NodeId, NodeKind, Sequencing};
pub use error::{AssetError, PlaybackError, PlaybackResult};
pub use events::{
    ConversationClosed, ConversationOpened, ConversationTag, DialogueEvent, PaddingOver,
    PromptAdded, PromptSelected, PromptsReady, SpeechEnded, SpeechStarted,
};
pub use fragment::{Fragment, FragmentId, FragmentTag, RunState};
pub use graph::{GraphSink, NullGraph, OutputPin, RecordingGraph};
pub use handles::{HandleId, PromptHandle, SpeechHandle};
pub use runtime::DialogueRuntime;
pub use settings::{MissingAudioPolicy, PlaybackSettings};
pub use time::{TimerId, TimerQueue, TimerService, TimerTask};

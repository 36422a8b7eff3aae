//! Listener registration and event fan-out
//!
//! Presentation layers implement [`ConversationListener`] for the events
//! they care about; every method defaults to a no-op. The router delivers
//! each event to all listeners in registration order, and one listener
//! failing never starves the rest.

use tracing::{error, warn};

use crate::events::{
    ConversationClosed, ConversationOpened, DialogueEvent, PaddingOver, PromptAdded,
    PromptSelected, PromptsReady, SpeechEnded, SpeechStarted,
};

/// What a listener method may return; errors are logged, not propagated
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives playback broadcasts
///
/// Implement only the methods you need; the rest default to no-ops.
#[allow(unused_variables)]
pub trait ConversationListener: Send + Sync {
    /// A fragment began speaking
    fn on_speech_started(&mut self, event: &SpeechStarted) -> ListenerResult {
        Ok(())
    }

    /// Speech finished; padding is starting
    fn on_speech_ended(&mut self, event: &SpeechEnded) -> ListenerResult {
        Ok(())
    }

    /// Padding elapsed; the fragment is complete
    fn on_padding_over(&mut self, event: &PaddingOver) -> ListenerResult {
        Ok(())
    }

    /// A prompt option was offered
    fn on_prompt_added(&mut self, event: &PromptAdded) -> ListenerResult {
        Ok(())
    }

    /// All prompt options for this entry were offered
    fn on_prompts_ready(&mut self, event: &PromptsReady) -> ListenerResult {
        Ok(())
    }

    /// A prompt option was selected
    fn on_prompt_selected(&mut self, event: &PromptSelected) -> ListenerResult {
        Ok(())
    }

    /// A conversation opened
    fn on_conversation_opened(&mut self, event: &ConversationOpened) -> ListenerResult {
        Ok(())
    }

    /// A conversation closed
    fn on_conversation_closed(&mut self, event: &ConversationClosed) -> ListenerResult {
        Ok(())
    }
}

/// Fans events out to listeners in registration order
#[derive(Default)]
pub struct BroadcastRouter {
    listeners: Vec<Box<dyn ConversationListener>>,
}

impl BroadcastRouter {
    /// A router with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener; delivery order is registration order
    pub fn register(&mut self, listener: Box<dyn ConversationListener>) {
        self.listeners.push(listener);
    }

    /// How many listeners are registered
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver an event to every listener
    pub fn broadcast(&mut self, event: &DialogueEvent) {
        if self.listeners.is_empty() {
            warn!(
                event = event.event_type(),
                "dialogue event broadcast with no listeners registered"
            );
            return;
        }
        for listener in &mut self.listeners {
            let result = match event {
                DialogueEvent::SpeechStarted(e) => listener.on_speech_started(e),
                DialogueEvent::SpeechEnded(e) => listener.on_speech_ended(e),
                DialogueEvent::PaddingOver(e) => listener.on_padding_over(e),
                DialogueEvent::PromptAdded(e) => listener.on_prompt_added(e),
                DialogueEvent::PromptsReady(e) => listener.on_prompts_ready(e),
                DialogueEvent::PromptSelected(e) => listener.on_prompt_selected(e),
                DialogueEvent::ConversationOpened(e) => listener.on_conversation_opened(e),
                DialogueEvent::ConversationClosed(e) => listener.on_conversation_closed(e),
            };
            if let Err(err) = result {
                error!(event = event.event_type(), %err, "listener failed, continuing delivery");
            }
        }
    }
}

/// Captures every event in order; clones share the same log
///
/// Register one clone with the runtime and keep another to assert on what
/// was broadcast.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: std::sync::Arc<std::sync::Mutex<Vec<DialogueEvent>>>,
}

impl RecordingListener {
    /// An empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<DialogueEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Everything received so far, in order
    pub fn events(&self) -> Vec<DialogueEvent> {
        self.log().clone()
    }

    /// The `event_type` discriminators received so far, in order
    pub fn event_types(&self) -> Vec<&'static str> {
        self.log().iter().map(|e| e.event_type()).collect()
    }

    /// Drop everything recorded so far
    pub fn clear(&self) {
        self.log().clear();
    }
}

impl ConversationListener for RecordingListener {
    fn on_speech_started(&mut self, event: &SpeechStarted) -> ListenerResult {
        self.log().push(DialogueEvent::SpeechStarted(event.clone()));
        Ok(())
    }

    fn on_speech_ended(&mut self, event: &SpeechEnded) -> ListenerResult {
        self.log().push(DialogueEvent::SpeechEnded(event.clone()));
        Ok(())
    }

    fn on_padding_over(&mut self, event: &PaddingOver) -> ListenerResult {
        self.log().push(DialogueEvent::PaddingOver(event.clone()));
        Ok(())
    }

    fn on_prompt_added(&mut self, event: &PromptAdded) -> ListenerResult {
        self.log().push(DialogueEvent::PromptAdded(event.clone()));
        Ok(())
    }

    fn on_prompts_ready(&mut self, event: &PromptsReady) -> ListenerResult {
        self.log().push(DialogueEvent::PromptsReady(event.clone()));
        Ok(())
    }

    fn on_prompt_selected(&mut self, event: &PromptSelected) -> ListenerResult {
        self.log().push(DialogueEvent::PromptSelected(event.clone()));
        Ok(())
    }

    fn on_conversation_opened(&mut self, event: &ConversationOpened) -> ListenerResult {
        self.log()
            .push(DialogueEvent::ConversationOpened(event.clone()));
        Ok(())
    }

    fn on_conversation_closed(&mut self, event: &ConversationClosed) -> ListenerResult {
        self.log()
            .push(DialogueEvent::ConversationClosed(event.clone()));
        Ok(())
    }
}

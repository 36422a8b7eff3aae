//! Dialogue runtime - owns the nodes, the clock, and the listener set
//!
//! The runtime is the host-facing surface. It registers nodes, drives the
//! timer queue from the host's frame loop via [`DialogueRuntime::tick`],
//! routes timer callbacks back into the owning node, and validates the
//! handles that skips and prompt selections arrive with.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, error, warn};

use crate::broadcast::{BroadcastRouter, ConversationListener};
use crate::broker::{Broker, DefaultBroker};
use crate::condition::Facts;
use crate::dialogue::{DialogueNode, NodeId, PlayContext};
use crate::error::{PlaybackError, PlaybackResult};
use crate::events::{ConversationClosed, ConversationOpened, ConversationTag, DialogueEvent};
use crate::fragment::{FragmentId, FragmentTag};
use crate::graph::{GraphSink, NullGraph};
use crate::handles::{PromptHandle, SpeechHandle};
use crate::settings::PlaybackSettings;
use crate::time::{TimerQueue, TimerService, TimerTask};

/// The conversation currently holding the stage
struct Conversation {
    tag: ConversationTag,
    opened_at: DateTime<Utc>,
}

/// Host-facing playback engine for a set of dialogue nodes
pub struct DialogueRuntime {
    nodes: HashMap<NodeId, DialogueNode>,
    timers: Box<dyn TimerService>,
    router: BroadcastRouter,
    graph: Box<dyn GraphSink>,
    settings: PlaybackSettings,
    broker: Box<dyn Broker>,
    facts: Facts,
    conversation: Option<Conversation>,
    tagged_fragments: HashMap<FragmentTag, (NodeId, FragmentId)>,
}

impl DialogueRuntime {
    /// A runtime with default settings, a fresh clock, and no graph wiring
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            timers: Box::new(TimerQueue::new()),
            router: BroadcastRouter::new(),
            graph: Box::new(NullGraph),
            settings: PlaybackSettings::default(),
            broker: Box::new(DefaultBroker),
            facts: Facts::new(),
            conversation: None,
            tagged_fragments: HashMap::new(),
        }
    }

    /// Replace the playback settings
    pub fn with_settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Wire output pins into a graph sink
    pub fn with_graph(mut self, graph: Box<dyn GraphSink>) -> Self {
        self.graph = graph;
        self
    }

    /// Swap in a different timer service
    pub fn with_timers(mut self, timers: Box<dyn TimerService>) -> Self {
        self.timers = timers;
        self
    }

    /// Swap in a different content broker
    pub fn with_broker(mut self, broker: Box<dyn Broker>) -> Self {
        self.broker = broker;
        self
    }

    /// Subscribe a listener to every dialogue event
    pub fn register_listener(&mut self, listener: Box<dyn ConversationListener>) {
        self.router.register(listener);
    }

    /// Add a node to the runtime and index its tagged fragments
    pub fn register_node(&mut self, node: DialogueNode) -> NodeId {
        let id = node.id();
        for fragment in node.fragments() {
            if let Some(tag) = fragment.tag() {
                match self.tagged_fragments.entry(tag.clone()) {
                    Entry::Occupied(existing) => {
                        let (owner, _) = existing.get();
                        warn!(tag = %tag, existing = %owner, node = %id, "duplicate fragment tag ignored");
                    }
                    Entry::Vacant(slot) => {
                        slot.insert((id, fragment.guid()));
                    }
                }
            }
        }
        debug!(node = %id, fragments = node.fragments().len(), "node registered");
        self.nodes.insert(id, node);
        id
    }

    /// Enter a node: gate it, then play or prompt
    pub fn execute(&mut self, node_id: NodeId) -> PlaybackResult<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(PlaybackError::UnknownNode(node_id))?;
        let mut ctx = PlayContext {
            timers: self.timers.as_mut(),
            router: &mut self.router,
            graph: self.graph.as_mut(),
            settings: &self.settings,
            broker: self.broker.as_ref(),
            facts: &self.facts,
            conversation: self.conversation.as_ref().map(|c| &c.tag),
        };
        node.execute_input(&mut ctx);
        Ok(())
    }

    /// Advance the clock and deliver every timer that comes due
    ///
    /// Completions can schedule follow-up work at the same instant (zero
    /// padding, auto-advance into a zero-length fragment), so delivery loops
    /// until no more timers are due at the new time.
    pub fn tick(&mut self, dt: f32) {
        let mut due = self.timers.advance(dt);
        while !due.is_empty() {
            for (_, task) in due {
                self.dispatch(task);
            }
            due = self.timers.advance(0.0);
        }
    }

    fn dispatch(&mut self, task: TimerTask) {
        let node_id = match task {
            TimerTask::SpeechComplete { node, .. } | TimerTask::PaddingComplete { node, .. } => {
                node
            }
        };
        let Some(node) = self.nodes.get_mut(&node_id) else {
            error!(node = %node_id, "timer fired for an unknown node");
            return;
        };
        let mut ctx = PlayContext {
            timers: self.timers.as_mut(),
            router: &mut self.router,
            graph: self.graph.as_mut(),
            settings: &self.settings,
            broker: self.broker.as_ref(),
            facts: &self.facts,
            conversation: self.conversation.as_ref().map(|c| &c.tag),
        };
        match task {
            TimerTask::SpeechComplete { fragment, .. } => node.on_speech_complete(fragment, &mut ctx),
            TimerTask::PaddingComplete { fragment, .. } => node.on_padding_complete(fragment, &mut ctx),
        }
    }

    /// Run the fragment behind a prompt the player picked
    pub fn run_prompt(&mut self, handle: &PromptHandle) -> PlaybackResult<()> {
        let node = self
            .nodes
            .get_mut(&handle.node)
            .ok_or(PlaybackError::UnknownNode(handle.node))?;
        let mut ctx = PlayContext {
            timers: self.timers.as_mut(),
            router: &mut self.router,
            graph: self.graph.as_mut(),
            settings: &self.settings,
            broker: self.broker.as_ref(),
            facts: &self.facts,
            conversation: self.conversation.as_ref().map(|c| &c.tag),
        };
        node.run_prompt(handle, &mut ctx)
    }

    /// Skip the node's current fragment or advance it past a manual stop
    pub fn skip(&mut self, node_id: NodeId) -> PlaybackResult<()> {
        let node = self
            .nodes
            .get_mut(&node_id)
            .ok_or(PlaybackError::UnknownNode(node_id))?;
        let mut ctx = PlayContext {
            timers: self.timers.as_mut(),
            router: &mut self.router,
            graph: self.graph.as_mut(),
            settings: &self.settings,
            broker: self.broker.as_ref(),
            facts: &self.facts,
            conversation: self.conversation.as_ref().map(|c| &c.tag),
        };
        node.skip(&mut ctx)
    }

    /// Skip via the handle the UI got from `SpeechStarted`
    ///
    /// The handle must still be the node's live one; a handle from an
    /// earlier run of the same fragment is refused.
    pub fn request_skip(&mut self, handle: &SpeechHandle) -> PlaybackResult<()> {
        let live_matches = {
            let node = self
                .nodes
                .get(&handle.node)
                .ok_or(PlaybackError::UnknownNode(handle.node))?;
            node.live_speech_handle()
                .is_some_and(|live| live.id == handle.id)
        };
        if live_matches {
            self.skip(handle.node)
        } else {
            error!(node = %handle.node, handle = %handle.id, "skip request with a stale handle");
            Err(PlaybackError::StaleHandle)
        }
    }

    /// Whether a skip of the node would be accepted right now
    pub fn can_skip(&self, node_id: NodeId) -> bool {
        self.nodes
            .get(&node_id)
            .is_some_and(|node| node.can_skip(self.timers.as_ref(), &self.settings))
    }

    /// Mark a conversation as holding the stage
    ///
    /// Only one conversation may be open at a time; a second open is
    /// refused rather than queued.
    pub fn open_conversation(&mut self, tag: impl Into<ConversationTag>) -> PlaybackResult<()> {
        let tag = tag.into();
        if let Some(active) = &self.conversation {
            warn!(active = %active.tag, requested = %tag, "conversation already open");
            return Err(PlaybackError::ConversationBusy(active.tag.clone()));
        }
        let opened_at = Utc::now();
        debug!(conversation = %tag, "conversation opened");
        self.conversation = Some(Conversation {
            tag: tag.clone(),
            opened_at,
        });
        self.router
            .broadcast(&DialogueEvent::ConversationOpened(ConversationOpened {
                conversation: tag,
                opened_at,
            }));
        Ok(())
    }

    /// Release the stage and report which conversation held it
    pub fn close_conversation(&mut self) -> PlaybackResult<ConversationTag> {
        let Some(active) = self.conversation.take() else {
            warn!("no conversation to close");
            return Err(PlaybackError::NoConversation);
        };
        debug!(conversation = %active.tag, "conversation closed");
        self.router
            .broadcast(&DialogueEvent::ConversationClosed(ConversationClosed {
                conversation: active.tag.clone(),
                closed_at: Utc::now(),
            }));
        Ok(active.tag)
    }

    /// Tag of the open conversation, if any
    pub fn active_conversation(&self) -> Option<&ConversationTag> {
        self.conversation.as_ref().map(|c| &c.tag)
    }

    /// When the open conversation started
    pub fn conversation_opened_at(&self) -> Option<DateTime<Utc>> {
        self.conversation.as_ref().map(|c| c.opened_at)
    }

    /// Look up a registered node
    pub fn node(&self, id: NodeId) -> Option<&DialogueNode> {
        self.nodes.get(&id)
    }

    /// Where a tagged fragment lives
    pub fn find_tagged_fragment(&self, tag: &FragmentTag) -> Option<(NodeId, FragmentId)> {
        self.tagged_fragments.get(tag).copied()
    }

    /// The facts conditions evaluate against
    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    /// Mutable access for the host to record world state
    pub fn facts_mut(&mut self) -> &mut Facts {
        &mut self.facts
    }

    /// Current playback settings
    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Mutable access for the host to retune playback
    pub fn settings_mut(&mut self) -> &mut PlaybackSettings {
        &mut self.settings
    }

    /// Seconds of playback time elapsed so far
    pub fn now(&self) -> f64 {
        self.timers.now()
    }
}

impl Default for DialogueRuntime {
    fn default() -> Self {
        Self::new()
    }
}

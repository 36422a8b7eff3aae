//! Dialogue node - the playback orchestrator for a list of fragments
//!
//! A node owns ordered fragments and drives exactly one of them at a time
//! through Idle -> Running -> InPadding -> Idle. It decides entry
//! (conditions and activation limits), sequencing policy in talk mode,
//! prompt offers in player-prompt mode, and the skip/advance rules.
//!
//! Nodes never touch the clock or the outside world directly: every side
//! effect goes through the [`PlayContext`] the runtime hands in.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::broadcast::BroadcastRouter;
use crate::broker::Broker;
use crate::condition::{Condition, Facts, all_pass};
use crate::content::CharacterId;
use crate::error::PlaybackError;
use crate::events::{
    ConversationTag, DialogueEvent, PaddingOver, PromptAdded, PromptSelected, PromptsReady,
    SpeechEnded, SpeechStarted,
};
use crate::fragment::{Fragment, FragmentId, RunState};
use crate::graph::{GraphSink, OutputPin};
use crate::handles::{PromptHandle, SpeechHandle};
use crate::settings::{PlaybackSettings, resolve};
use crate::time::{TimerId, TimerService, TimerTask};

/// Identity of a dialogue node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Mint a fresh node identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of node this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Characters talk on their own; fragments sequence automatically
    Talk,
    /// Eligible fragments are offered to the player as selectable prompts
    PlayerPrompt,
}

/// How a talk node walks its fragment list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sequencing {
    /// Run every eligible fragment, skipping ineligible ones
    RunAll,
    /// Run until the first ineligible fragment is hit
    RunUntilFailure,
    /// Run only the first eligible fragment
    SelectOne,
}

/// The single live fragment of a node
#[derive(Debug)]
struct ActiveFragment {
    index: usize,
    handle: SpeechHandle,
    speech_timer: Option<TimerId>,
    padding_timer: Option<TimerId>,
}

/// What the node is doing right now
///
/// `AwaitingAdvance` keeps the finished fragment's index and handle so a
/// manual advance knows where to continue from and handle validation keeps
/// working until the node actually moves on.
#[derive(Debug)]
enum Activity {
    Idle,
    Playing(ActiveFragment),
    AwaitingAdvance { index: usize, handle: SpeechHandle },
}

/// Borrowed collaborators for one playback call
///
/// The runtime splits its own fields into this bundle so node methods can
/// schedule timers, broadcast events, and fire pins without owning any of
/// the machinery.
pub(crate) struct PlayContext<'a> {
    pub(crate) timers: &'a mut dyn TimerService,
    pub(crate) router: &'a mut BroadcastRouter,
    pub(crate) graph: &'a mut dyn GraphSink,
    pub(crate) settings: &'a PlaybackSettings,
    pub(crate) broker: &'a dyn Broker,
    pub(crate) facts: &'a Facts,
    pub(crate) conversation: Option<&'a ConversationTag>,
}

/// A dialogue node and its playback state
#[derive(Debug)]
pub struct DialogueNode {
    id: NodeId,
    kind: NodeKind,
    sequencing: Sequencing,
    conditions: Vec<Box<dyn Condition>>,
    activation_limit: u32,
    skippable: Option<bool>,
    auto_advance: Option<bool>,
    fragments: Vec<Fragment>,

    // Transient playback state
    activation_count: u32,
    activity: Activity,
    offered_prompts: Vec<PromptHandle>,
}

impl DialogueNode {
    /// A talk node with the given sequencing policy and no fragments yet
    pub fn talk(sequencing: Sequencing) -> Self {
        Self::new(NodeKind::Talk, sequencing)
    }

    /// A player-prompt node
    pub fn player_prompt() -> Self {
        Self::new(NodeKind::PlayerPrompt, Sequencing::SelectOne)
    }

    fn new(kind: NodeKind, sequencing: Sequencing) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            sequencing,
            conditions: Vec::new(),
            activation_limit: 0,
            skippable: None,
            auto_advance: None,
            fragments: Vec::new(),
            activation_count: 0,
            activity: Activity::Idle,
            offered_prompts: Vec::new(),
        }
    }

    /// Append a fragment; playback order is append order
    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Add an entry condition
    pub fn with_condition(mut self, condition: Box<dyn Condition>) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Cap how many times this node may be entered; 0 is unlimited
    pub fn with_activation_limit(mut self, limit: u32) -> Self {
        self.activation_limit = limit;
        self
    }

    /// Node-level skippable default for fragments that don't override
    pub fn with_skippable(mut self, skippable: bool) -> Self {
        self.skippable = Some(skippable);
        self
    }

    /// Node-level auto-advance default for fragments that don't override
    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = Some(auto_advance);
        self
    }

    /// Node identity
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Talk-mode sequencing policy
    pub fn sequencing(&self) -> Sequencing {
        self.sequencing
    }

    /// How many times this node has been entered
    pub fn activation_count(&self) -> u32 {
        self.activation_count
    }

    /// Entry cap; 0 is unlimited
    pub fn activation_limit(&self) -> u32 {
        self.activation_limit
    }

    /// The fragments in playback order
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Find a fragment by its guid
    pub fn fragment_by_guid(&self, guid: FragmentId) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.guid() == guid)
    }

    /// Index of the fragment currently running or in padding
    pub fn running_fragment(&self) -> Option<usize> {
        match &self.activity {
            Activity::Playing(active) => Some(active.index),
            _ => None,
        }
    }

    /// Index of the fragment waiting for a manual advance
    pub fn awaiting_advance(&self) -> Option<usize> {
        match &self.activity {
            Activity::AwaitingAdvance { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// True when nothing is running and nothing awaits a manual advance
    pub fn is_idle(&self) -> bool {
        matches!(self.activity, Activity::Idle)
    }

    /// Prompt handles still outstanding from the latest offer
    pub fn offered_prompts(&self) -> &[PromptHandle] {
        &self.offered_prompts
    }

    /// Unique characters referenced by this node's content
    pub fn referenced_characters(&self) -> Vec<CharacterId> {
        let mut seen = Vec::new();
        for fragment in &self.fragments {
            for id in [&fragment.content().speaker, &fragment.content().directed_at]
                .into_iter()
                .flatten()
            {
                if !seen.contains(id) {
                    seen.push(id.clone());
                }
            }
        }
        seen
    }

    /// True when neither the node nor any fragment can run again
    ///
    /// The node cap alone can exhaust entry; otherwise every fragment must
    /// have a non-zero limit that has been reached. One unlimited or
    /// unexhausted fragment keeps the node enterable.
    pub fn activation_limits_met(&self) -> bool {
        if self.activation_limit > 0 && self.activation_count >= self.activation_limit {
            return true;
        }
        self.fragments
            .iter()
            .all(|f| f.activation_limit() != 0 && f.is_activation_limit_met())
    }

    /// The live handle a skip request must match, if any
    pub(crate) fn live_speech_handle(&self) -> Option<&SpeechHandle> {
        match &self.activity {
            Activity::Playing(active) => Some(&active.handle),
            Activity::AwaitingAdvance { handle, .. } => Some(handle),
            Activity::Idle => None,
        }
    }

    /// Entry point: gate on conditions and limits, then play or prompt
    pub(crate) fn execute_input(&mut self, ctx: &mut PlayContext<'_>) {
        debug!(node = %self.id, kind = ?self.kind, "node entered");
        if !all_pass(&self.conditions, ctx.facts) {
            debug!(node = %self.id, "entry conditions failed");
            self.fire(ctx, OutputPin::Bypass);
            return;
        }
        if self.activation_limits_met() {
            debug!(node = %self.id, "activation limits met");
            self.fire(ctx, OutputPin::Bypass);
            return;
        }
        match self.kind {
            NodeKind::PlayerPrompt => self.broadcast_prompts(ctx),
            NodeKind::Talk => self.find_starting_fragment(ctx),
        }
    }

    /// Run the first eligible fragment, or bypass if none can start
    pub(crate) fn find_starting_fragment(&mut self, ctx: &mut PlayContext<'_>) {
        for index in 0..self.fragments.len() {
            if self.run_fragment(index, ctx) {
                self.activation_count += 1;
                return;
            }
        }
        debug!(node = %self.id, "no fragment could start");
        self.fire(ctx, OutputPin::Bypass);
    }

    /// Try to start one fragment; `false` means it was ineligible
    ///
    /// Ineligibility (conditions, activation limit) has no side effects.
    /// Starting broadcasts `SpeechStarted`, fires the optional start pin,
    /// and arms the speech timer; untimed fragments stay `Running` until an
    /// external skip completes them.
    pub(crate) fn run_fragment(&mut self, index: usize, ctx: &mut PlayContext<'_>) -> bool {
        match self.activity {
            Activity::Playing(_) => {
                error!(node = %self.id, fragment = index, "fragment start refused, another is still active");
                return false;
            }
            Activity::AwaitingAdvance { index: parked, .. } => {
                error!(
                    node = %self.id,
                    fragment = index,
                    parked,
                    "fragment start refused, a finished fragment is awaiting manual advance"
                );
                return false;
            }
            Activity::Idle => {}
        }
        let Some(fragment) = self.fragments.get(index) else {
            error!(node = %self.id, fragment = index, "fragment index out of range");
            return false;
        };
        if !all_pass(fragment.conditions(), ctx.facts) {
            debug!(node = %self.id, fragment = index, "fragment conditions failed");
            return false;
        }
        if fragment.is_activation_limit_met() {
            debug!(node = %self.id, fragment = index, "fragment activation limit met");
            return false;
        }

        let skippable = resolve(fragment.skippable(), self.skippable, ctx.settings.default_skippable);
        let speech_time = fragment.content().speech_time(ctx.settings, ctx.broker);
        let guid = fragment.guid();
        let uses_start_pin = fragment.uses_start_pin();
        let handle = SpeechHandle::new(self.id, index, skippable);

        let fragment = &mut self.fragments[index];
        fragment.increment_activations();
        let content = fragment.content();
        let event = SpeechStarted {
            conversation: ctx.conversation.cloned(),
            handle: handle.clone(),
            speaker: content.speaker.clone(),
            directed_at: content.directed_at.clone(),
            mood: content
                .mood
                .clone()
                .or_else(|| ctx.settings.default_mood.clone()),
            dialogue_text: content.dialogue_text.clone(),
            title_text: content.title_text.clone(),
            speech_time,
            audio: content.audio.clone(),
            skippable,
        };
        ctx.router.broadcast(&DialogueEvent::SpeechStarted(event));

        if uses_start_pin {
            self.fire(ctx, OutputPin::Start(guid));
        }

        let now = ctx.timers.now();
        let speech_timer = speech_time.map(|seconds| {
            ctx.timers.schedule(
                seconds,
                TimerTask::SpeechComplete {
                    node: self.id,
                    fragment: index,
                },
            )
        });
        self.fragments[index].set_running(now);
        debug!(node = %self.id, fragment = index, time = ?speech_time, "fragment running");
        self.activity = Activity::Playing(ActiveFragment {
            index,
            handle,
            speech_timer,
            padding_timer: None,
        });
        true
    }

    /// Speech finished: timer fired, or a skip completed it early
    pub(crate) fn on_speech_complete(&mut self, index: usize, ctx: &mut PlayContext<'_>) {
        let handle = {
            let Activity::Playing(active) = &mut self.activity else {
                error!(node = %self.id, fragment = index, "speech completion with nothing playing");
                return;
            };
            if active.index != index {
                error!(node = %self.id, fragment = index, running = active.index, "speech completion for the wrong fragment");
                return;
            }
            if let Some(timer) = active.speech_timer.take() {
                ctx.timers.cancel(timer);
            }
            active.handle.clone()
        };
        if self.fragments[index].run_state() != RunState::Running {
            error!(node = %self.id, fragment = index, state = ?self.fragments[index].run_state(), "speech completion outside the running phase");
            return;
        }

        let now = ctx.timers.now();
        self.fragments[index].set_in_padding(now);
        let padding = self.fragments[index].padding_to_next(ctx.settings);
        debug!(node = %self.id, fragment = index, padding, "speech finished");

        ctx.router.broadcast(&DialogueEvent::SpeechEnded(SpeechEnded {
            conversation: ctx.conversation.cloned(),
            handle,
            padding_time: padding,
        }));

        if self.fragments[index].uses_end_pin() {
            let guid = self.fragments[index].guid();
            self.fire(ctx, OutputPin::End(guid));
        }

        if padding > 0.0 {
            let timer = ctx.timers.schedule(
                padding,
                TimerTask::PaddingComplete {
                    node: self.id,
                    fragment: index,
                },
            );
            if let Activity::Playing(active) = &mut self.activity {
                active.padding_timer = Some(timer);
            }
        } else {
            self.on_padding_complete(index, ctx);
        }
    }

    /// Padding finished: the fragment completes and the node moves on
    pub(crate) fn on_padding_complete(&mut self, index: usize, ctx: &mut PlayContext<'_>) {
        let handle = {
            let Activity::Playing(active) = &mut self.activity else {
                error!(node = %self.id, fragment = index, "padding completion with nothing playing");
                return;
            };
            if active.index != index {
                error!(node = %self.id, fragment = index, running = active.index, "padding completion for the wrong fragment");
                return;
            }
            if let Some(timer) = active.padding_timer.take() {
                ctx.timers.cancel(timer);
            }
            active.handle.clone()
        };
        if self.fragments[index].run_state() != RunState::InPadding {
            error!(node = %self.id, fragment = index, state = ?self.fragments[index].run_state(), "padding completion outside the padding phase");
            return;
        }

        self.fragments[index].set_idle();
        self.activity = Activity::Idle;
        let auto_advance = resolve(
            self.fragments[index].auto_advance(),
            self.auto_advance,
            ctx.settings.default_auto_advance,
        );
        debug!(node = %self.id, fragment = index, auto_advance, "padding over");

        ctx.router.broadcast(&DialogueEvent::PaddingOver(PaddingOver {
            conversation: ctx.conversation.cloned(),
            handle: handle.clone(),
        }));

        if auto_advance {
            self.advance_from(index, ctx);
        } else {
            self.activity = Activity::AwaitingAdvance { index, handle };
        }
    }

    /// Continue past a completed fragment according to kind and policy
    pub(crate) fn advance_from(&mut self, index: usize, ctx: &mut PlayContext<'_>) {
        if self.kind == NodeKind::PlayerPrompt {
            let Some(fragment) = self.fragments.get(index) else {
                error!(node = %self.id, fragment = index, "advance from an unknown fragment");
                return;
            };
            self.fire(ctx, OutputPin::Prompt(fragment.guid()));
            return;
        }
        match self.sequencing {
            Sequencing::SelectOne => self.fire(ctx, OutputPin::Out),
            Sequencing::RunAll => {
                for next in index + 1..self.fragments.len() {
                    if self.run_fragment(next, ctx) {
                        return;
                    }
                }
                self.fire(ctx, OutputPin::Out);
            }
            Sequencing::RunUntilFailure => {
                let next = index + 1;
                if next < self.fragments.len() && self.run_fragment(next, ctx) {
                    return;
                }
                self.fire(ctx, OutputPin::Out);
            }
        }
    }

    /// Offer every eligible fragment as a prompt
    ///
    /// Zero eligible prompts bypasses the node. Exactly one eligible prompt
    /// runs immediately when the settings say so; otherwise the node waits
    /// for a selection.
    pub(crate) fn broadcast_prompts(&mut self, ctx: &mut PlayContext<'_>) {
        self.offered_prompts.clear();
        for index in 0..self.fragments.len() {
            let fragment = &self.fragments[index];
            if !all_pass(fragment.conditions(), ctx.facts) || fragment.is_activation_limit_met() {
                continue;
            }
            let handle = PromptHandle::new(self.id, index);
            let content = fragment.content();
            ctx.router.broadcast(&DialogueEvent::PromptAdded(PromptAdded {
                conversation: ctx.conversation.cloned(),
                handle: handle.clone(),
                speaker: content.speaker.clone(),
                directed_at: content.directed_at.clone(),
                mood: content
                    .mood
                    .clone()
                    .or_else(|| ctx.settings.default_mood.clone()),
                dialogue_text: content.dialogue_text.clone(),
                title_text: content.title_text.clone(),
            }));
            self.offered_prompts.push(handle);
        }
        ctx.router
            .broadcast(&DialogueEvent::PromptsReady(PromptsReady {
                conversation: ctx.conversation.cloned(),
            }));
        debug!(node = %self.id, prompts = self.offered_prompts.len(), "prompts broadcast");

        if self.offered_prompts.is_empty() {
            self.fire(ctx, OutputPin::Bypass);
        } else if self.offered_prompts.len() == 1 && ctx.settings.auto_select_sole_prompt {
            let handle = self.offered_prompts[0].clone();
            debug!(node = %self.id, "auto-selecting the sole prompt");
            if let Err(err) = self.run_prompt(&handle, ctx) {
                error!(node = %self.id, %err, "auto-selected prompt failed");
            }
        }
    }

    /// Run the fragment behind a selected prompt
    pub(crate) fn run_prompt(
        &mut self,
        handle: &PromptHandle,
        ctx: &mut PlayContext<'_>,
    ) -> Result<(), PlaybackError> {
        if self.kind != NodeKind::PlayerPrompt {
            error!(node = %self.id, "prompt selection on a talk node");
            return Err(PlaybackError::NotAPromptNode(self.id));
        }
        if !self.offered_prompts.iter().any(|offered| offered.id == handle.id) {
            error!(node = %self.id, handle = %handle.id, "prompt handle matches no outstanding offer");
            return Err(PlaybackError::StaleHandle);
        }
        if self.run_fragment(handle.fragment_index, ctx) {
            self.activation_count += 1;
            self.offered_prompts.clear();
            ctx.router
                .broadcast(&DialogueEvent::PromptSelected(PromptSelected {
                    conversation: ctx.conversation.cloned(),
                    handle: handle.clone(),
                }));
            Ok(())
        } else {
            error!(node = %self.id, fragment = handle.fragment_index, "selected prompt can no longer run");
            self.offered_prompts.clear();
            self.fire(ctx, OutputPin::Bypass);
            Err(PlaybackError::PromptUnavailable)
        }
    }

    /// Whether a skip would be accepted right now
    ///
    /// Three independent guards while a fragment plays: an unskippable
    /// fragment refuses while a timer is driving it; an auto-advancing
    /// fragment refuses when less than the configured remainder is left;
    /// any fragment refuses within the configured debounce of starting.
    /// A node awaiting manual advance always accepts.
    pub(crate) fn can_skip(&self, timers: &dyn TimerService, settings: &PlaybackSettings) -> bool {
        match &self.activity {
            Activity::Idle => false,
            Activity::AwaitingAdvance { .. } => true,
            Activity::Playing(active) => {
                let Some(fragment) = self.fragments.get(active.index) else {
                    return false;
                };
                let speech_remaining = active.speech_timer.and_then(|id| timers.remaining(id));
                let padding_remaining = active.padding_timer.and_then(|id| timers.remaining(id));
                let timer_pending = speech_remaining.is_some() || padding_remaining.is_some();

                let skippable =
                    resolve(fragment.skippable(), self.skippable, settings.default_skippable);
                if !skippable && timer_pending {
                    return false;
                }

                let auto_advance = resolve(
                    fragment.auto_advance(),
                    self.auto_advance,
                    settings.default_auto_advance,
                );
                if auto_advance && settings.min_remaining_to_skip > 0.0 && timer_pending {
                    let remaining =
                        speech_remaining.unwrap_or(0.0) + padding_remaining.unwrap_or(0.0);
                    if remaining < settings.min_remaining_to_skip {
                        return false;
                    }
                }

                if settings.min_elapsed_to_skip > 0.0 {
                    if let Some(started) = fragment.start_time() {
                        if timers.now() - started < f64::from(settings.min_elapsed_to_skip) {
                            return false;
                        }
                    }
                }
                true
            }
        }
    }

    /// Skip the current fragment, or advance a node waiting on input
    ///
    /// One skip completes the whole fragment: speech first if it is still
    /// running, then padding if any is pending.
    pub(crate) fn skip(&mut self, ctx: &mut PlayContext<'_>) -> Result<(), PlaybackError> {
        if !self.can_skip(&*ctx.timers, ctx.settings) {
            debug!(node = %self.id, "skip rejected");
            return Err(PlaybackError::SkipUnavailable);
        }
        if let Activity::AwaitingAdvance { index, .. } = self.activity {
            debug!(node = %self.id, fragment = index, "manual advance");
            self.activity = Activity::Idle;
            self.advance_from(index, ctx);
            return Ok(());
        }
        let index = match &self.activity {
            Activity::Playing(active) => active.index,
            _ => return Err(PlaybackError::SkipUnavailable),
        };
        debug!(node = %self.id, fragment = index, "skip accepted");
        if self.fragments[index].run_state() == RunState::Running {
            self.on_speech_complete(index, ctx);
        }
        // The first phase may have armed a padding timer; finish that too,
        // unless completion already moved the node to another fragment
        if let Activity::Playing(active) = &self.activity {
            if active.index == index && active.padding_timer.is_some() {
                self.on_padding_complete(index, ctx);
            }
        }
        Ok(())
    }

    fn fire(&self, ctx: &mut PlayContext<'_>, pin: OutputPin) {
        debug!(node = %self.id, pin = %pin, "output pin fired");
        ctx.graph.trigger(self.id, pin);
    }
}

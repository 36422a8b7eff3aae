//! Fragments - the unit of playback inside a dialogue node
//!
//! A fragment pairs authored speech content with its own gates (conditions,
//! activation limit), timing overrides, and optional graph pins. Run state
//! is transient: it exists only while the owning node drives playback and is
//! never part of the authored data.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::condition::Condition;
use crate::content::{SpeechContent, TimeMode};
use crate::settings::PlaybackSettings;

/// Stable identity of a fragment, minted at authoring time
///
/// Pin names and handle correlation key off this guid, so it must survive
/// whatever serialization the host applies to its graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentId(pub Uuid);

impl FragmentId {
    /// Mint a fresh fragment identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FragmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optional searchable label for a fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentTag(pub String);

impl FragmentTag {
    /// Wrap a fragment label
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl From<&str> for FragmentTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl fmt::Display for FragmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback phase of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// Not playing
    Idle,
    /// Speech is underway
    Running,
    /// Speech finished; post-speech padding is elapsing
    InPadding,
}

/// One unit of speech owned by a dialogue node
#[derive(Debug)]
pub struct Fragment {
    guid: FragmentId,
    tag: Option<FragmentTag>,
    content: SpeechContent,
    conditions: Vec<Box<dyn Condition>>,
    activation_limit: u32,
    padding: Option<f32>,
    skippable: Option<bool>,
    auto_advance: Option<bool>,
    uses_start_pin: bool,
    uses_end_pin: bool,

    // Transient playback state
    activation_count: u32,
    run_state: RunState,
    start_time: Option<f64>,
    end_time: Option<f64>,
}

impl Fragment {
    /// A fragment around authored content, with a fresh guid and no gates
    pub fn new(content: SpeechContent) -> Self {
        Self {
            guid: FragmentId::new(),
            tag: None,
            content,
            conditions: Vec::new(),
            activation_limit: 0,
            padding: None,
            skippable: None,
            auto_advance: None,
            uses_start_pin: false,
            uses_end_pin: false,
            activation_count: 0,
            run_state: RunState::Idle,
            start_time: None,
            end_time: None,
        }
    }

    /// Attach a searchable tag
    pub fn with_tag(mut self, tag: impl Into<FragmentTag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Add an eligibility condition
    pub fn with_condition(mut self, condition: Box<dyn Condition>) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Cap how many times this fragment may run; 0 is unlimited
    pub fn with_activation_limit(mut self, limit: u32) -> Self {
        self.activation_limit = limit;
        self
    }

    /// Override the post-speech padding for this fragment
    pub fn with_padding(mut self, seconds: f32) -> Self {
        self.padding = Some(seconds);
        self
    }

    /// Override skippable for this fragment
    pub fn with_skippable(mut self, skippable: bool) -> Self {
        self.skippable = Some(skippable);
        self
    }

    /// Override auto-advance for this fragment
    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = Some(auto_advance);
        self
    }

    /// Give this fragment a `Start_<guid>` pin on the node
    pub fn with_start_pin(mut self) -> Self {
        self.uses_start_pin = true;
        self
    }

    /// Give this fragment an `End_<guid>` pin on the node
    pub fn with_end_pin(mut self) -> Self {
        self.uses_end_pin = true;
        self
    }

    /// Stable fragment identity
    pub fn guid(&self) -> FragmentId {
        self.guid
    }

    /// Searchable tag, if one was authored
    pub fn tag(&self) -> Option<&FragmentTag> {
        self.tag.as_ref()
    }

    /// The authored speech payload
    pub fn content(&self) -> &SpeechContent {
        &self.content
    }

    /// Eligibility conditions in authored order
    pub fn conditions(&self) -> &[Box<dyn Condition>] {
        &self.conditions
    }

    /// Activation cap; 0 is unlimited
    pub fn activation_limit(&self) -> u32 {
        self.activation_limit
    }

    /// How many times this fragment has run
    pub fn activation_count(&self) -> u32 {
        self.activation_count
    }

    /// Skippable override
    pub fn skippable(&self) -> Option<bool> {
        self.skippable
    }

    /// Auto-advance override
    pub fn auto_advance(&self) -> Option<bool> {
        self.auto_advance
    }

    /// Whether the node exposes a start pin for this fragment
    pub fn uses_start_pin(&self) -> bool {
        self.uses_start_pin
    }

    /// Whether the node exposes an end pin for this fragment
    pub fn uses_end_pin(&self) -> bool {
        self.uses_end_pin
    }

    /// Current playback phase
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Clock time speech last started
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// Clock time speech last ended
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    /// True once a non-zero activation limit has been reached
    pub fn is_activation_limit_met(&self) -> bool {
        self.activation_limit != 0 && self.activation_count >= self.activation_limit
    }

    /// Padding to apply after this fragment's speech
    ///
    /// Untimed fragments take no padding at all. An unset or negative
    /// authored value falls back to the project default.
    pub fn padding_to_next(&self, settings: &PlaybackSettings) -> f32 {
        if self.content.resolved_time_mode(settings) == TimeMode::None {
            return 0.0;
        }
        match self.padding {
            Some(padding) if padding >= 0.0 => padding,
            _ => settings.default_padding,
        }
    }

    pub(crate) fn increment_activations(&mut self) {
        self.activation_count += 1;
    }

    pub(crate) fn set_running(&mut self, now: f64) {
        self.run_state = RunState::Running;
        self.start_time = Some(now);
        self.end_time = None;
    }

    pub(crate) fn set_in_padding(&mut self, now: f64) {
        self.run_state = RunState::InPadding;
        self.end_time = Some(now);
    }

    pub(crate) fn set_idle(&mut self) {
        self.run_state = RunState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::SpeechContent;

    fn fragment() -> Fragment {
        Fragment::new(SpeechContent::text("test line"))
    }

    #[test]
    fn test_zero_activation_limit_is_unlimited() {
        let mut fragment = fragment();
        for _ in 0..100 {
            fragment.increment_activations();
        }
        assert!(!fragment.is_activation_limit_met());
    }

    #[test]
    fn test_activation_limit_met_at_limit() {
        let mut fragment = fragment().with_activation_limit(2);
        assert!(!fragment.is_activation_limit_met());
        fragment.increment_activations();
        assert!(!fragment.is_activation_limit_met());
        fragment.increment_activations();
        assert!(fragment.is_activation_limit_met());
    }

    #[test]
    fn test_padding_falls_back_to_default() {
        let settings = PlaybackSettings::default();
        assert_eq!(fragment().padding_to_next(&settings), 0.25);
        assert_eq!(fragment().with_padding(-1.0).padding_to_next(&settings), 0.25);
        assert_eq!(fragment().with_padding(0.6).padding_to_next(&settings), 0.6);
        assert_eq!(fragment().with_padding(0.0).padding_to_next(&settings), 0.0);
    }

    #[test]
    fn test_untimed_fragments_take_no_padding() {
        let settings = PlaybackSettings::default();
        let untimed = Fragment::new(
            SpeechContent::text("wait here").with_time_mode(TimeMode::None),
        )
        .with_padding(1.5);
        assert_eq!(untimed.padding_to_next(&settings), 0.0);
    }

    #[test]
    fn test_transient_state_transitions() {
        let mut fragment = fragment();
        assert_eq!(fragment.run_state(), RunState::Idle);

        fragment.set_running(10.0);
        assert_eq!(fragment.run_state(), RunState::Running);
        assert_eq!(fragment.start_time(), Some(10.0));
        assert_eq!(fragment.end_time(), None);

        fragment.set_in_padding(11.5);
        assert_eq!(fragment.run_state(), RunState::InPadding);
        assert_eq!(fragment.end_time(), Some(11.5));

        fragment.set_idle();
        assert_eq!(fragment.run_state(), RunState::Idle);
    }
}

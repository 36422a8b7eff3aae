//! Project-level playback settings
//!
//! One settings value is shared by every node the runtime drives. Hosts load
//! it from their own config files (the struct is serde-friendly); the crate
//! itself never touches the filesystem.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::content::TimeMode;

/// What to do when audio time is requested but no usable audio length exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingAudioPolicy {
    /// Quietly fall back to the text-time computation
    FallbackToText,
    /// Fall back, logging a warning
    Warn,
    /// Fall back, logging an error
    Error,
}

/// Tunable defaults and guard thresholds for dialogue playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Resolution of `TimeMode::Default`; must not itself be `Default`
    pub default_time_mode: TimeMode,

    /// Skippable fallback when neither fragment nor node overrides
    pub default_skippable: bool,

    /// Auto-advance fallback when neither fragment nor node overrides
    pub default_auto_advance: bool,

    /// Padding applied when a fragment does not set its own
    pub default_padding: f32,

    /// Speech rate used by the text-time computation
    pub text_words_per_minute: u32,

    /// Floor for text-derived speech times
    pub minimum_text_time: f32,

    /// Floor for audio-derived speech times
    pub minimum_audio_time: f32,

    /// Absolute floor for any timed fragment
    pub minimum_speech_time: f32,

    /// Skip guard: refuse when an auto-advancing fragment has less than this
    /// much time left (0 disables the guard)
    pub min_remaining_to_skip: f32,

    /// Skip guard: refuse within this long of the fragment starting
    /// (0 disables the guard)
    pub min_elapsed_to_skip: f32,

    /// Run a lone eligible prompt immediately instead of waiting for selection
    pub auto_select_sole_prompt: bool,

    /// Severity policy for audio-timed fragments with no usable audio
    pub missing_audio: MissingAudioPolicy,

    /// Mood applied to broadcasts when the content sets none
    pub default_mood: Option<crate::content::MoodTag>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            default_time_mode: TimeMode::Text,
            default_skippable: true,
            default_auto_advance: true,
            default_padding: 0.25,
            text_words_per_minute: 120,
            minimum_text_time: 1.0,
            minimum_audio_time: 0.5,
            minimum_speech_time: 0.25,
            min_remaining_to_skip: 0.0,
            min_elapsed_to_skip: 0.0,
            auto_select_sole_prompt: false,
            missing_audio: MissingAudioPolicy::Warn,
            default_mood: None,
        }
    }
}

impl PlaybackSettings {
    /// The mode `TimeMode::Default` resolves to, guarding against a config
    /// that circularly sets the default to `Default`
    pub fn resolved_default_time_mode(&self) -> TimeMode {
        match self.default_time_mode {
            TimeMode::Default => {
                warn!("default_time_mode is set to Default, falling back to Text");
                TimeMode::Text
            }
            mode => mode,
        }
    }
}

/// Resolve a tri-state override chain: fragment override, then node override,
/// then the global default
pub fn resolve<T: Copy>(fragment: Option<T>, node: Option<T>, default: T) -> T {
    fragment.or(node).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_fragment_over_node() {
        assert!(!resolve(Some(false), Some(true), true));
        assert!(resolve(Some(true), Some(false), false));
    }

    #[test]
    fn test_resolve_falls_back_to_node_then_default() {
        assert!(resolve(None, Some(true), false));
        assert!(!resolve(None, None, false));
        assert!(resolve::<bool>(None, None, true));
    }

    #[test]
    fn test_defaults_match_production_values() {
        let settings = PlaybackSettings::default();
        assert_eq!(settings.default_padding, 0.25);
        assert_eq!(settings.text_words_per_minute, 120);
        assert_eq!(settings.minimum_text_time, 1.0);
        assert_eq!(settings.minimum_audio_time, 0.5);
        assert_eq!(settings.minimum_speech_time, 0.25);
        assert!(settings.default_skippable);
        assert!(settings.default_auto_advance);
        assert!(!settings.auto_select_sole_prompt);
    }

    #[test]
    fn test_circular_default_time_mode_falls_back_to_text() {
        let settings = PlaybackSettings {
            default_time_mode: TimeMode::Default,
            ..PlaybackSettings::default()
        };
        assert_eq!(settings.resolved_default_time_mode(), TimeMode::Text);
    }
}

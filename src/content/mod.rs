//! Speech content and timing
//!
//! One `SpeechContent` is the authored payload of a fragment: who speaks, to
//! whom, the text, optional audio, and how long the speech runs. Timing is
//! computed here against the project settings and the host [`Broker`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, warn};

use crate::broker::Broker;
use crate::settings::{MissingAudioPolicy, PlaybackSettings};

/// Identifies a character by its authored asset key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub String);

impl CharacterId {
    /// Wrap an authored character key
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for CharacterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mood label attached to speech for portrait/voice selection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoodTag(pub String);

impl MoodTag {
    /// Wrap a mood label
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl From<&str> for MoodTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl fmt::Display for MoodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a voice-over asset
///
/// The runtime never plays audio; it only measures it for timing and hands
/// the cue to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioCue {
    /// Asset key or path in the host's audio system
    pub asset: String,
    /// Authored length in seconds, when the pipeline baked one in
    pub cached_length: Option<f32>,
}

impl AudioCue {
    /// Reference an audio asset by key
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            cached_length: None,
        }
    }

    /// Attach a baked-in length
    pub fn with_cached_length(mut self, seconds: f32) -> Self {
        self.cached_length = Some(seconds);
        self
    }
}

/// How a fragment's speech duration is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeMode {
    /// Use the project default mode
    Default,
    /// Untimed; the fragment runs until skipped
    None,
    /// Derive from word count and words-per-minute
    Text,
    /// Derive from the audio cue length
    Audio,
    /// Use the authored manual time
    Manual,
}

/// The authored payload of one fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechContent {
    /// Who speaks
    pub speaker: Option<CharacterId>,
    /// Who the line is directed at
    pub directed_at: Option<CharacterId>,
    /// Mood of the delivery
    pub mood: Option<MoodTag>,
    /// The spoken line
    pub dialogue_text: String,
    /// Short display text (prompt lists, journals)
    pub title_text: String,
    /// Optional voice-over
    pub audio: Option<AudioCue>,
    /// Duration mode
    pub time_mode: TimeMode,
    /// Authored duration for `TimeMode::Manual`
    pub manual_time: Option<f32>,
    /// Word count baked in by the authoring pipeline
    pub cached_word_count: Option<u32>,
}

impl SpeechContent {
    /// Content with just a spoken line; everything else defaulted
    pub fn text(dialogue_text: impl Into<String>) -> Self {
        Self {
            speaker: None,
            directed_at: None,
            mood: None,
            dialogue_text: dialogue_text.into(),
            title_text: String::new(),
            audio: None,
            time_mode: TimeMode::Default,
            manual_time: None,
            cached_word_count: None,
        }
    }

    /// Set the speaker
    pub fn with_speaker(mut self, speaker: impl Into<CharacterId>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    /// Set who the line is directed at
    pub fn with_directed_at(mut self, listener: impl Into<CharacterId>) -> Self {
        self.directed_at = Some(listener.into());
        self
    }

    /// Set the mood
    pub fn with_mood(mut self, mood: impl Into<MoodTag>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    /// Set the short display text
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title_text = title.into();
        self
    }

    /// Attach a voice-over cue
    pub fn with_audio(mut self, audio: AudioCue) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Set the duration mode
    pub fn with_time_mode(mut self, mode: TimeMode) -> Self {
        self.time_mode = mode;
        self
    }

    /// Set the manual duration (implies `TimeMode::Manual`)
    pub fn with_manual_time(mut self, seconds: f32) -> Self {
        self.manual_time = Some(seconds);
        self.time_mode = TimeMode::Manual;
        self
    }

    /// Bake in a word count
    pub fn with_cached_word_count(mut self, words: u32) -> Self {
        self.cached_word_count = Some(words);
        self
    }

    /// The time mode after resolving `Default` through settings
    pub fn resolved_time_mode(&self, settings: &PlaybackSettings) -> TimeMode {
        match self.time_mode {
            TimeMode::Default => settings.resolved_default_time_mode(),
            mode => mode,
        }
    }

    /// Effective speech duration in seconds; `None` means untimed
    ///
    /// Timed modes are floored by their per-mode minimum and by
    /// `minimum_speech_time`, so accidental zero-length lines still give
    /// listeners a readable beat.
    pub fn speech_time(&self, settings: &PlaybackSettings, broker: &dyn Broker) -> Option<f32> {
        match self.resolved_time_mode(settings) {
            TimeMode::None => None,
            TimeMode::Manual => Some(
                self.manual_time
                    .unwrap_or(0.0)
                    .max(settings.minimum_speech_time),
            ),
            TimeMode::Audio => Some(self.audio_time(settings, broker)),
            // resolved_time_mode never returns Default
            TimeMode::Text | TimeMode::Default => Some(self.text_time(settings, broker)),
        }
    }

    fn text_time(&self, settings: &PlaybackSettings, broker: &dyn Broker) -> f32 {
        let words = self
            .cached_word_count
            .unwrap_or_else(|| broker.word_count(&self.dialogue_text));
        let words_per_minute = settings.text_words_per_minute.max(1) as f32;
        (words as f32 / words_per_minute * 60.0)
            .max(settings.minimum_text_time)
            .max(settings.minimum_speech_time)
    }

    fn audio_time(&self, settings: &PlaybackSettings, broker: &dyn Broker) -> f32 {
        match &self.audio {
            Some(cue) => match broker.audio_length(cue) {
                Some(length) => length
                    .max(settings.minimum_audio_time)
                    .max(settings.minimum_speech_time),
                None => {
                    self.log_missing_audio(settings, &cue.asset);
                    self.text_time(settings, broker)
                }
            },
            None => {
                self.log_missing_audio(settings, "<no cue>");
                self.text_time(settings, broker)
            }
        }
    }

    fn log_missing_audio(&self, settings: &PlaybackSettings, asset: &str) {
        match settings.missing_audio {
            MissingAudioPolicy::FallbackToText => {
                debug!(asset, "audio length unavailable, using text time");
            }
            MissingAudioPolicy::Warn => {
                warn!(asset, "audio length unavailable, using text time");
            }
            MissingAudioPolicy::Error => {
                error!(asset, "audio length unavailable, using text time");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::DefaultBroker;

    fn settings() -> PlaybackSettings {
        PlaybackSettings::default()
    }

    #[test]
    fn test_text_time_floors_short_lines() {
        let content = SpeechContent::text("Hi.").with_time_mode(TimeMode::Text);
        // 1 word at 120 wpm is 0.5s, floored to minimum_text_time
        assert_eq!(content.speech_time(&settings(), &DefaultBroker), Some(1.0));
    }

    #[test]
    fn test_text_time_scales_with_word_count() {
        let line = "one two three four five six seven eight nine ten";
        let content = SpeechContent::text(line).with_time_mode(TimeMode::Text);
        // 10 words at 120 wpm is 5 seconds
        assert_eq!(content.speech_time(&settings(), &DefaultBroker), Some(5.0));
    }

    #[test]
    fn test_cached_word_count_wins_over_recount() {
        let content = SpeechContent::text("short")
            .with_time_mode(TimeMode::Text)
            .with_cached_word_count(240);
        assert_eq!(content.speech_time(&settings(), &DefaultBroker), Some(120.0));
    }

    #[test]
    fn test_manual_time_floors_to_minimum_speech_time() {
        let content = SpeechContent::text("beat").with_manual_time(0.05);
        assert_eq!(content.speech_time(&settings(), &DefaultBroker), Some(0.25));

        let content = SpeechContent::text("beat").with_manual_time(3.0);
        assert_eq!(content.speech_time(&settings(), &DefaultBroker), Some(3.0));
    }

    #[test]
    fn test_none_mode_is_untimed() {
        let content = SpeechContent::text("wait for input").with_time_mode(TimeMode::None);
        assert_eq!(content.speech_time(&settings(), &DefaultBroker), None);
    }

    #[test]
    fn test_audio_time_uses_cached_length_with_floor() {
        let content = SpeechContent::text("line")
            .with_time_mode(TimeMode::Audio)
            .with_audio(AudioCue::new("vo/line").with_cached_length(2.25));
        assert_eq!(content.speech_time(&settings(), &DefaultBroker), Some(2.25));

        let blip = SpeechContent::text("line")
            .with_time_mode(TimeMode::Audio)
            .with_audio(AudioCue::new("vo/blip").with_cached_length(0.1));
        assert_eq!(blip.speech_time(&settings(), &DefaultBroker), Some(0.5));
    }

    #[test]
    fn test_missing_audio_falls_back_to_text_time() {
        let no_cue = SpeechContent::text("one two three four").with_time_mode(TimeMode::Audio);
        // 4 words at 120 wpm is 2 seconds
        assert_eq!(no_cue.speech_time(&settings(), &DefaultBroker), Some(2.0));

        let unknown_length = SpeechContent::text("one two three four")
            .with_time_mode(TimeMode::Audio)
            .with_audio(AudioCue::new("vo/unmeasured"));
        assert_eq!(
            unknown_length.speech_time(&settings(), &DefaultBroker),
            Some(2.0)
        );
    }

    #[test]
    fn test_default_mode_resolves_through_settings() {
        let content = SpeechContent::text("one two three four five six");
        assert_eq!(content.resolved_time_mode(&settings()), TimeMode::Text);

        let manual_default = PlaybackSettings {
            default_time_mode: TimeMode::None,
            ..PlaybackSettings::default()
        };
        assert_eq!(content.speech_time(&manual_default, &DefaultBroker), None);
    }
}

//! Host-provided measurement of dialogue text and audio
//!
//! Games override word counting (scripted markup, CJK text) and audio length
//! lookup by implementing [`Broker`]; the defaults are deterministic and
//! asset-free so the runtime works out of the box.

use crate::content::AudioCue;

/// Measurement seam for speech-time computation
pub trait Broker: Send + Sync {
    /// Count spoken words in dialogue text
    fn word_count(&self, text: &str) -> u32 {
        text.split_whitespace().count() as u32
    }

    /// Length of an audio cue in seconds, if it can be determined
    fn audio_length(&self, cue: &AudioCue) -> Option<f32> {
        cue.cached_length
    }
}

/// Stock broker: whitespace word counting, authored audio lengths only
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBroker;

impl Broker for DefaultBroker {}

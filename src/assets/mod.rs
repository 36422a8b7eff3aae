//! Character assets - resolving the people a node's speech refers to
//!
//! Content identifies characters by authored keys; presentation data lives
//! behind an async [`CharacterSource`] so hosts can back it with whatever
//! store they have. [`preload_characters`] warms a source ahead of playback
//! so portraits and names are on hand when `SpeechStarted` arrives.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::content::CharacterId;
use crate::dialogue::DialogueNode;
use crate::error::AssetError;

/// Presentation data for one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Authored key the content refers to
    pub id: CharacterId,
    /// Name shown in UI
    pub display_name: String,
    /// Portrait asset key, if the character has one
    pub portrait: Option<String>,
}

impl CharacterProfile {
    /// A profile with a display name and no portrait
    pub fn new(id: impl Into<CharacterId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            portrait: None,
        }
    }

    /// Attach a portrait asset key
    pub fn with_portrait(mut self, asset: impl Into<String>) -> Self {
        self.portrait = Some(asset.into());
        self
    }
}

/// Where character profiles come from
#[async_trait]
pub trait CharacterSource: Send + Sync {
    /// Resolve an authored character key to its profile
    async fn resolve(&self, id: &CharacterId) -> Result<CharacterProfile, AssetError>;
}

/// Character source backed by a shared in-memory map
#[derive(Clone)]
pub struct InMemoryCharacterSource {
    profiles: Arc<RwLock<HashMap<CharacterId, CharacterProfile>>>,
}

impl InMemoryCharacterSource {
    /// An empty source
    pub fn new() -> Self {
        Self {
            profiles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add or replace a profile
    pub async fn insert(&self, profile: CharacterProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile);
    }
}

impl Default for InMemoryCharacterSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CharacterSource for InMemoryCharacterSource {
    async fn resolve(&self, id: &CharacterId) -> Result<CharacterProfile, AssetError> {
        self.profiles
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AssetError::UnknownCharacter(id.clone()))
    }
}

/// Resolve every character a node mentions, ahead of playback
///
/// Unknown characters are logged and skipped rather than failing the whole
/// node; the caller gets whatever profiles were found.
pub async fn preload_characters(
    source: &dyn CharacterSource,
    node: &DialogueNode,
) -> Vec<CharacterProfile> {
    let mut profiles = Vec::new();
    for id in node.referenced_characters() {
        match source.resolve(&id).await {
            Ok(profile) => {
                debug!(character = %id, "character preloaded");
                profiles.push(profile);
            }
            Err(err) => {
                warn!(character = %id, %err, "character missing while preloading");
            }
        }
    }
    profiles
}

//! Shared non-node resources.
//!
//! Textures are immutable assets: every graph that references one holds the
//! same `Arc`, under the same id. Audio handles carry playback position and
//! are cloned per graph.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::value::{ResourceKind, ResourceRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Texture {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioHandle {
    pub event: String,
    pub position_ms: u32,
    pub playing: bool,
    pub paused: bool,
}

impl AudioHandle {
    pub fn playing(event: impl Into<String>, position_ms: u32) -> Self {
        AudioHandle {
            event: event.into(),
            position_ms,
            playing: true,
            paused: false,
        }
    }

    /// Whether the handle is audible right now.
    pub fn is_audible(&self) -> bool {
        self.playing && !self.paused
    }
}

/// Per-graph table of resources referenced by `Value::Resource`.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    next_id: u64,
    textures: BTreeMap<u64, Arc<Texture>>,
    audio: BTreeMap<u64, AudioHandle>,
}

impl ResourceTable {
    fn alloc(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_texture(&mut self, path: impl Into<String>) -> ResourceRef {
        let id = self.alloc();
        self.textures
            .insert(id, Arc::new(Texture { path: path.into() }));
        ResourceRef {
            kind: ResourceKind::Texture,
            id,
        }
    }

    /// Share a texture from another table under its original id.
    pub fn share_texture(&mut self, id: u64, texture: Arc<Texture>) -> ResourceRef {
        self.textures.entry(id).or_insert(texture);
        self.next_id = self.next_id.max(id + 1);
        ResourceRef {
            kind: ResourceKind::Texture,
            id,
        }
    }

    pub fn add_audio(&mut self, handle: AudioHandle) -> ResourceRef {
        let id = self.alloc();
        self.audio.insert(id, handle);
        ResourceRef {
            kind: ResourceKind::Audio,
            id,
        }
    }

    pub fn texture(&self, id: u64) -> Option<&Arc<Texture>> {
        self.textures.get(&id)
    }

    pub fn audio(&self, id: u64) -> Option<&AudioHandle> {
        self.audio.get(&id)
    }

    pub fn audio_mut(&mut self, id: u64) -> Option<&mut AudioHandle> {
        self.audio.get_mut(&id)
    }

    pub fn contains(&self, res: ResourceRef) -> bool {
        match res.kind {
            ResourceKind::Texture => self.textures.contains_key(&res.id),
            ResourceKind::Audio => self.audio.contains_key(&res.id),
        }
    }

    pub fn audio_count(&self) -> usize {
        self.audio.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_texture_keeps_id_and_allocation() {
        let mut a = ResourceTable::default();
        let tex = a.add_texture("objects/spring");
        let shared = a.texture(tex.id).cloned().unwrap();

        let mut b = ResourceTable::default();
        let again = b.share_texture(tex.id, Arc::clone(&shared));
        assert_eq!(again, tex);
        assert!(Arc::ptr_eq(b.texture(tex.id).unwrap(), &shared));

        let fresh = b.add_texture("objects/other");
        assert_ne!(fresh.id, tex.id);
    }

    #[test]
    fn audio_handles_are_independent() {
        let mut table = ResourceTable::default();
        let a = table.add_audio(AudioHandle::playing("event:/wind", 120));
        table.audio_mut(a.id).unwrap().paused = true;
        assert!(!table.audio(a.id).unwrap().is_audible());
        assert_eq!(table.audio_count(), 1);
    }
}

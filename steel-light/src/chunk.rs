//! The interface between the light engine and the chunks it lights.
//!
//! Chunk loading, block registries and serialization live elsewhere. A chunk
//! implementation only has to answer opacity and emission queries and embed a
//! [`ChunkLightState`] the engine can read and write.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::RwLock;

use crate::{
    config::WorldBounds,
    nibble::{MAX_LIGHT_LEVEL, NibbleArray, SwmrNibbleArray},
};

/// The two independently computed light fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Light coming down from the open sky.
    Sky,
    /// Light emitted by blocks.
    Block,
}

/// A chunk column as seen by the light engine.
pub trait LightChunk: Send + Sync {
    /// How much light a voxel absorbs, 0 (transparent) to 15 (opaque).
    ///
    /// `x` and `z` are relative to the chunk, `y` is a world coordinate.
    fn opacity(&self, x: usize, y: i32, z: usize) -> u8;

    /// Light emitted by a voxel, 0 to 15.
    fn emission(&self, x: usize, y: i32, z: usize) -> u8;

    /// Whether every voxel of the section is air-like (transparent and not emitting).
    fn is_section_empty(&self, section_y: i32) -> bool;

    /// Light storage of this column.
    fn light(&self) -> &ChunkLightState;
}

/// Source of loaded chunks, usually the world's chunk map.
pub trait ChunkSource: Send + Sync {
    /// Returns the chunk at the given chunk coordinates if it is loaded.
    fn chunk(&self, chunk_x: i32, chunk_z: i32) -> Option<Arc<dyn LightChunk>>;
}

/// Per-section emptiness flags of one column.
#[derive(Debug)]
pub struct EmptinessMap {
    min_section: i32,
    flags: RwLock<Box<[bool]>>,
}

impl EmptinessMap {
    /// Creates a map marking every section empty.
    #[must_use]
    pub fn new(bounds: WorldBounds) -> Self {
        Self {
            min_section: bounds.min_section,
            flags: RwLock::new(vec![true; bounds.section_count()].into_boxed_slice()),
        }
    }

    /// Whether the section is marked empty. Sections outside the world count as empty.
    #[must_use]
    pub fn is_empty(&self, section_y: i32) -> bool {
        usize::try_from(section_y - self.min_section)
            .ok()
            .and_then(|index| self.flags.read().get(index).copied())
            .unwrap_or(true)
    }

    /// Marks one section. Returns whether the flag changed.
    pub fn set(&self, section_y: i32, empty: bool) -> bool {
        let Ok(index) = usize::try_from(section_y - self.min_section) else {
            return false;
        };
        let mut flags = self.flags.write();
        match flags.get_mut(index) {
            Some(flag) if *flag != empty => {
                *flag = empty;
                true
            }
            _ => false,
        }
    }

    /// Replaces all flags with a snapshot indexed from the lowest section.
    pub fn replace(&self, snapshot: &[bool]) {
        let mut flags = self.flags.write();
        debug_assert_eq!(flags.len(), snapshot.len());
        flags.copy_from_slice(snapshot);
    }

    /// Copies the flags out.
    #[must_use]
    pub fn snapshot(&self) -> Box<[bool]> {
        self.flags.read().clone()
    }

    /// The highest non-empty section, if any.
    #[must_use]
    pub fn highest_non_empty(&self) -> Option<i32> {
        let flags = self.flags.read();
        flags
            .iter()
            .rposition(|empty| !empty)
            .map(|index| self.min_section + index as i32)
    }
}

/// Sky light storage of a column.
#[derive(Debug)]
pub struct SkyLight {
    nibbles: Box<[SwmrNibbleArray]>,
    emptiness: EmptinessMap,
}

/// Light storage embedded in every chunk.
///
/// Holds one nibble array per light section per light type, the emptiness maps
/// and the lit flag. Only propagation passes write the nibble arrays.
#[derive(Debug)]
pub struct ChunkLightState {
    lit: AtomicBool,
    sky: Option<SkyLight>,
    block_nibbles: Box<[SwmrNibbleArray]>,
    block_emptiness: EmptinessMap,
}

impl ChunkLightState {
    /// Creates dark, unlit storage. With `has_sky_light` the virtual section above
    /// the world starts at full sky light.
    #[must_use]
    pub fn new(bounds: WorldBounds, has_sky_light: bool) -> Self {
        let count = bounds.light_section_count();
        let sky = has_sky_light.then(|| SkyLight {
            nibbles: (0..count)
                .map(|index| {
                    if index == count - 1 {
                        SwmrNibbleArray::new(NibbleArray::new_filled(MAX_LIGHT_LEVEL))
                    } else {
                        SwmrNibbleArray::default()
                    }
                })
                .collect(),
            emptiness: EmptinessMap::new(bounds),
        });

        Self {
            lit: AtomicBool::new(false),
            sky,
            block_nibbles: (0..count).map(|_| SwmrNibbleArray::default()).collect(),
            block_emptiness: EmptinessMap::new(bounds),
        }
    }

    /// Whether the column has been fully lit.
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::Acquire)
    }

    /// Sets the lit flag.
    pub fn set_lit(&self, lit: bool) {
        self.lit.store(lit, Ordering::Release);
    }

    /// Sky nibbles indexed by light section, `None` without sky light.
    #[must_use]
    pub fn sky_nibbles(&self) -> Option<&[SwmrNibbleArray]> {
        self.sky.as_ref().map(|sky| &*sky.nibbles)
    }

    /// Block nibbles indexed by light section.
    #[must_use]
    pub fn block_nibbles(&self) -> &[SwmrNibbleArray] {
        &self.block_nibbles
    }

    /// Sky emptiness map, `None` without sky light.
    #[must_use]
    pub fn sky_emptiness_map(&self) -> Option<&EmptinessMap> {
        self.sky.as_ref().map(|sky| &sky.emptiness)
    }

    /// Block emptiness map.
    #[must_use]
    pub fn block_emptiness_map(&self) -> &EmptinessMap {
        &self.block_emptiness
    }

    /// Nibbles of the given light type.
    #[must_use]
    pub fn nibbles(&self, light_type: LightType) -> Option<&[SwmrNibbleArray]> {
        match light_type {
            LightType::Sky => self.sky_nibbles(),
            LightType::Block => Some(self.block_nibbles()),
        }
    }

    /// Emptiness map of the given light type.
    #[must_use]
    pub fn emptiness_map(&self, light_type: LightType) -> Option<&EmptinessMap> {
        match light_type {
            LightType::Sky => self.sky_emptiness_map(),
            LightType::Block => Some(self.block_emptiness_map()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_layout() {
        let bounds = WorldBounds::new(0, 3);
        let state = ChunkLightState::new(bounds, true);

        assert!(!state.is_lit());
        let sky = state.sky_nibbles().map(<[_]>::len);
        assert_eq!(sky, Some(6));
        assert_eq!(state.block_nibbles().len(), 6);

        let top = state.nibbles(LightType::Sky).map(|n| n[5].get_visible(0, 0, 0));
        assert_eq!(top, Some(15));
        assert_eq!(state.block_nibbles()[5].get_visible(0, 0, 0), 0);
    }

    #[test]
    fn test_no_sky() {
        let state = ChunkLightState::new(WorldBounds::new(0, 3), false);
        assert!(state.sky_nibbles().is_none());
        assert!(state.sky_emptiness_map().is_none());
        assert!(state.emptiness_map(LightType::Block).is_some());
    }

    #[test]
    fn test_emptiness_map() {
        let map = EmptinessMap::new(WorldBounds::new(-2, 3));
        assert_eq!(map.highest_non_empty(), None);

        assert!(map.set(1, false));
        assert!(!map.set(1, false));
        assert!(map.set(-2, false));
        assert_eq!(map.highest_non_empty(), Some(1));
        assert!(!map.is_empty(-2));
        assert!(map.is_empty(10));
        assert!(map.is_empty(-3));

        map.replace(&[true; 6]);
        assert_eq!(map.highest_non_empty(), None);
        assert_eq!(map.snapshot().len(), 6);
    }
}

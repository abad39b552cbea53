//! Reel symbols and the instance cache that owns them
//!
//! A symbol keeps its instance for its whole life and changes identity in
//! place. Everything that tracks a symbol (reel cells, the sticky overlay)
//! holds a [`SymbolHandle`], never a copy of the name.

use serde::{Deserialize, Serialize};

/// Stable reference to a live symbol instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolHandle {
    index: u32,
    generation: u32,
}

impl SymbolHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Where a symbol currently sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolPos {
    pub reel: u8,
    pub row: u8,
    pub layer: u8,
}

impl SymbolPos {
    pub fn new(reel: usize, row: usize, layer: usize) -> Self {
        Self {
            reel: reel as u8,
            row: row as u8,
            layer: layer as u8,
        }
    }
}

/// How an identity change is shown
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Transition {
    #[default]
    Instant,
    Animated { clip: String },
}

impl Transition {
    pub fn from_clip(clip: Option<&str>) -> Self {
        match clip {
            Some(clip) => Transition::Animated { clip: clip.into() },
            None => Transition::Instant,
        }
    }
}

/// A symbol on the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    name: String,
    position: SymbolPos,
    animation: Option<String>,
    mutation_count: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, position: SymbolPos) -> Self {
        Self {
            name: name.into(),
            position,
            animation: None,
            mutation_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> SymbolPos {
        self.position
    }

    /// Clip currently playing, if any
    pub fn animation(&self) -> Option<&str> {
        self.animation.as_deref()
    }

    /// Number of identity changes since the instance was placed
    pub fn mutation_count(&self) -> u32 {
        self.mutation_count
    }

    /// Change identity in place, returning the previous name
    pub fn mutate_to(&mut self, name: impl Into<String>, transition: Transition) -> String {
        if let Transition::Animated { clip } = transition {
            self.animation = Some(clip);
        }
        self.mutation_count += 1;
        std::mem::replace(&mut self.name, name.into())
    }

    pub fn play_animation(&mut self, clip: impl Into<String>) {
        self.animation = Some(clip.into());
    }

    pub fn stop_animation(&mut self) {
        self.animation = None;
    }

    fn reset(&mut self, name: String, position: SymbolPos) {
        self.name = name;
        self.position = position;
        self.animation = None;
        self.mutation_count = 0;
    }
}

struct SymbolSlot {
    symbol: Symbol,
    generation: u32,
    live: bool,
}

/// Instance cache for symbols
///
/// Released instances go back on a free list and are reused most recent
/// first. A handle is invalidated by its release.
#[derive(Default)]
pub struct SymbolArena {
    slots: Vec<SymbolSlot>,
    free: Vec<u32>,
    constructed: usize,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a symbol, reusing a cached instance when one is available
    pub fn alloc(&mut self, name: impl Into<String>, position: SymbolPos) -> SymbolHandle {
        let name = name.into();
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.symbol.reset(name, position);
            slot.live = true;
            return SymbolHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(SymbolSlot {
            symbol: Symbol::new(name, position),
            generation: 0,
            live: true,
        });
        self.constructed += 1;
        SymbolHandle {
            index,
            generation: 0,
        }
    }

    /// Return an instance to the cache; false if the handle was stale
    pub fn release(&mut self, handle: SymbolHandle) -> bool {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.live && slot.generation == handle.generation => {
                slot.live = false;
                slot.generation = slot.generation.wrapping_add(1);
                slot.symbol.stop_animation();
                self.free.push(handle.index);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, handle: SymbolHandle) -> Option<&Symbol> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.live && slot.generation == handle.generation)
            .map(|slot| &slot.symbol)
    }

    pub fn get_mut(&mut self, handle: SymbolHandle) -> Option<&mut Symbol> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.live && slot.generation == handle.generation)
            .map(|slot| &mut slot.symbol)
    }

    pub fn is_live(&self, handle: SymbolHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn cached_count(&self) -> usize {
        self.free.len()
    }

    /// Instances ever constructed (reuse does not count)
    pub fn constructed(&self) -> usize {
        self.constructed
    }
}

impl std::fmt::Debug for SymbolArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolArena")
            .field("live", &self.live_count())
            .field("cached", &self.cached_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutate_keeps_instance() {
        let mut symbol = Symbol::new("M1", SymbolPos::new(0, 1, 0));
        let previous = symbol.mutate_to(
            "TW",
            Transition::Animated {
                clip: "transform".into(),
            },
        );

        assert_eq!(previous, "M1");
        assert_eq!(symbol.name(), "TW");
        assert_eq!(symbol.animation(), Some("transform"));
        assert_eq!(symbol.mutation_count(), 1);
        assert_eq!(symbol.position(), SymbolPos::new(0, 1, 0));
    }

    #[test]
    fn test_arena_reuses_last_released() {
        let mut arena = SymbolArena::new();
        let a = arena.alloc("A", SymbolPos::new(0, 0, 0));
        let b = arena.alloc("B", SymbolPos::new(0, 1, 0));

        assert!(arena.release(a));
        assert!(arena.release(b));
        assert_eq!(arena.cached_count(), 2);

        let c = arena.alloc("C", SymbolPos::new(1, 0, 0));
        assert_eq!(c.index(), b.index());
        assert_eq!(arena.constructed(), 2);
        assert_eq!(arena.get(c).map(Symbol::name), Some("C"));
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut arena = SymbolArena::new();
        let a = arena.alloc("A", SymbolPos::new(0, 0, 0));

        assert!(arena.release(a));
        assert!(!arena.release(a));
        assert!(arena.get(a).is_none());

        let reused = arena.alloc("B", SymbolPos::new(0, 0, 0));
        assert_eq!(reused.index(), a.index());
        assert!(arena.get(a).is_none());
        assert!(arena.is_live(reused));
    }
}

//! ReelGrid — reels, symbol placement and the sticky overlay
//!
//! Cells are addressed `(reel, row, layer)`. Layer 0 is the reel strip;
//! layer 1, when present, holds sticky symbols locked during a
//! reevaluation chain. Reads always reflect the current mutation state.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rf_stage::CellPos;
use thiserror::Error;

use crate::config::{Anchor, ReelLayout, SpinConfig};
use crate::symbol::{Symbol, SymbolArena, SymbolHandle, SymbolPos, Transition};

/// Layer holding the reel strip symbols
pub const MAIN_LAYER: usize = 0;
/// Layer holding sticky symbols
pub const STICKY_LAYER: usize = 1;

/// Grid addressing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("Reel {reel} out of range (grid has {reels} reels)")]
    ReelOutOfRange { reel: usize, reels: usize },

    #[error("Row {row} out of range (reels have {rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("Layer {layer} out of range (grid has {layers} layers)")]
    LayerOutOfRange { layer: usize, layers: usize },

    #[error("Grid has no sticky overlay layer")]
    NoOverlay,

    #[error("Symbol handle is stale or not placed on the grid")]
    StaleHandle,

    #[error("Reel {reel} expects {expected} symbols, got {found}")]
    RowCountMismatch {
        reel: usize,
        expected: usize,
        found: usize,
    },
}

/// One reel column
#[derive(Debug, Clone)]
pub struct Reel {
    index: usize,
    /// `[layer][row]`
    cells: Vec<Vec<Option<SymbolHandle>>>,
    stopped: bool,
    provisional_stop: bool,
    layout: ReelLayout,
}

impl Reel {
    fn new(index: usize, rows: usize, layers: usize, layout: ReelLayout) -> Self {
        Self {
            index,
            cells: vec![vec![None; rows]; layers],
            stopped: true,
            provisional_stop: false,
            layout,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rows(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Stopped early for a relocation flight, to be restored afterwards
    pub fn is_provisionally_stopped(&self) -> bool {
        self.provisional_stop
    }

    pub fn stop_sound(&self) -> Option<&str> {
        self.layout.stop_sound.as_deref()
    }

    pub fn root(&self) -> Anchor {
        self.layout.root
    }

    pub fn spacing(&self) -> f32 {
        self.layout.spacing
    }

    pub fn handle(&self, layer: usize, row: usize) -> Option<SymbolHandle> {
        self.cells.get(layer).and_then(|l| l.get(row)).copied().flatten()
    }
}

#[derive(Debug, Default)]
struct StickyIndex {
    by_cell: BTreeMap<CellPos, SymbolHandle>,
    by_name: HashMap<String, BTreeSet<CellPos>>,
}

impl StickyIndex {
    fn insert(&mut self, cell: CellPos, name: &str, handle: SymbolHandle) {
        self.by_cell.insert(cell, handle);
        self.by_name.entry(name.to_string()).or_default().insert(cell);
    }

    fn remove(&mut self, cell: CellPos, name: &str) {
        self.by_cell.remove(&cell);
        self.unlink_name(cell, name);
    }

    fn rekey(&mut self, cell: CellPos, from: &str, to: &str) {
        self.unlink_name(cell, from);
        self.by_name.entry(to.to_string()).or_default().insert(cell);
    }

    fn unlink_name(&mut self, cell: CellPos, name: &str) {
        if let Some(cells) = self.by_name.get_mut(name) {
            cells.remove(&cell);
            if cells.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    fn cell_of(&self, handle: SymbolHandle) -> Option<CellPos> {
        self.by_cell
            .iter()
            .find_map(|(cell, h)| (*h == handle).then_some(*cell))
    }
}

/// Identity change of one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellChange {
    /// Previous identity; `None` when the cell was empty
    pub from: Option<String>,
    pub to: String,
}

/// The reel grid of one session
#[derive(Debug)]
pub struct ReelGrid {
    reels: Vec<Reel>,
    rows: usize,
    layers: usize,
    symbols: SymbolArena,
    sticky: StickyIndex,
}

impl ReelGrid {
    /// Build the grid with every strip cell holding the filler symbol
    pub fn new(config: &SpinConfig) -> Self {
        let reel_count = config.grid.reels as usize;
        let rows = config.grid.rows as usize;
        let layers = config.grid.layers.max(1) as usize;

        let mut symbols = SymbolArena::new();
        let reels = (0..reel_count)
            .map(|r| {
                let mut reel = Reel::new(r, rows, layers, config.layout_for(r));
                for row in 0..rows {
                    let handle = symbols.alloc(
                        config.filler_symbol.clone(),
                        SymbolPos::new(r, row, MAIN_LAYER),
                    );
                    reel.cells[MAIN_LAYER][row] = Some(handle);
                }
                reel
            })
            .collect();

        Self {
            reels,
            rows,
            layers,
            symbols,
            sticky: StickyIndex::default(),
        }
    }

    pub fn reel_count(&self) -> usize {
        self.reels.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn reels(&self) -> &[Reel] {
        &self.reels
    }

    pub fn reel(&self, reel: usize) -> Result<&Reel, GridError> {
        let reels = self.reels.len();
        self.reels
            .get(reel)
            .ok_or(GridError::ReelOutOfRange { reel, reels })
    }

    fn reel_mut(&mut self, reel: usize) -> Result<&mut Reel, GridError> {
        let reels = self.reels.len();
        self.reels
            .get_mut(reel)
            .ok_or(GridError::ReelOutOfRange { reel, reels })
    }

    fn check_cell(&self, reel: usize, row: usize, layer: usize) -> Result<(), GridError> {
        self.reel(reel)?;
        if row >= self.rows {
            return Err(GridError::RowOutOfRange {
                row,
                rows: self.rows,
            });
        }
        if layer >= self.layers {
            return Err(GridError::LayerOutOfRange {
                layer,
                layers: self.layers,
            });
        }
        Ok(())
    }

    pub fn symbols(&self) -> &SymbolArena {
        &self.symbols
    }

    pub fn symbol(&self, handle: SymbolHandle) -> Option<&Symbol> {
        self.symbols.get(handle)
    }

    pub fn symbol_mut(&mut self, handle: SymbolHandle) -> Option<&mut Symbol> {
        self.symbols.get_mut(handle)
    }

    /// Strip symbol at a cell
    pub fn symbol_at(&self, reel: usize, row: usize) -> Option<&Symbol> {
        self.handle_at(reel, row, MAIN_LAYER)
            .and_then(|h| self.symbols.get(h))
    }

    pub fn handle_at(&self, reel: usize, row: usize, layer: usize) -> Option<SymbolHandle> {
        self.reels.get(reel).and_then(|r| r.handle(layer, row))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════

    /// Occupied cells of a layer, top row first
    pub fn visible_symbols_at(&self, reel: usize, layer: usize) -> Result<Vec<&Symbol>, GridError> {
        self.check_cell(reel, 0, layer)?;
        Ok(self.reels[reel].cells[layer]
            .iter()
            .flatten()
            .filter_map(|h| self.symbols.get(*h))
            .collect())
    }

    /// Strip symbols, bottom row first
    pub fn visible_symbols_bottom_up_at(&self, reel: usize) -> Result<Vec<&Symbol>, GridError> {
        let mut symbols = self.visible_symbols_at(reel, MAIN_LAYER)?;
        symbols.reverse();
        Ok(symbols)
    }

    pub fn symbol_vertical_spacing_at(&self, reel: usize) -> Result<f32, GridError> {
        Ok(self.reel(reel)?.spacing())
    }

    pub fn reel_root_at(&self, reel: usize) -> Result<Anchor, GridError> {
        Ok(self.reel(reel)?.root())
    }

    /// Screen anchor of a cell
    pub fn cell_anchor(&self, reel: usize, row: usize) -> Result<Anchor, GridError> {
        self.check_cell(reel, row, MAIN_LAYER)?;
        let reel = &self.reels[reel];
        Ok(Anchor::new(
            reel.root().x,
            reel.root().y + reel.spacing() * row as f32,
        ))
    }

    /// Strip identities per reel, top row first; empty cells are ""
    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.reels
            .iter()
            .map(|reel| {
                reel.cells[MAIN_LAYER]
                    .iter()
                    .map(|h| {
                        h.and_then(|h| self.symbols.get(h))
                            .map(|s| s.name().to_string())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }

    pub fn all_stopped(&self) -> bool {
        self.reels.iter().all(Reel::is_stopped)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // REEL MOTION
    // ═══════════════════════════════════════════════════════════════════════

    /// Set every reel spinning
    pub fn begin_spin(&mut self) {
        for reel in &mut self.reels {
            reel.stopped = false;
            reel.provisional_stop = false;
        }
    }

    pub fn stop_reel(&mut self, reel: usize) -> Result<(), GridError> {
        let reel = self.reel_mut(reel)?;
        reel.stopped = true;
        reel.provisional_stop = false;
        Ok(())
    }

    /// Stop a reel early; returns false if it was already stopped
    pub fn provisionally_stop(&mut self, reel: usize) -> Result<bool, GridError> {
        let reel = self.reel_mut(reel)?;
        if reel.stopped {
            return Ok(false);
        }
        reel.stopped = true;
        reel.provisional_stop = true;
        Ok(true)
    }

    /// Undo a provisional stop; a real stop in the meantime wins
    pub fn restore_provisional(&mut self, reel: usize) -> Result<(), GridError> {
        let reel = self.reel_mut(reel)?;
        if reel.provisional_stop {
            reel.stopped = false;
            reel.provisional_stop = false;
        }
        Ok(())
    }

    pub fn set_stop_sound(&mut self, reel: usize, sound: Option<String>) -> Result<(), GridError> {
        self.reel_mut(reel)?.layout.stop_sound = sound;
        Ok(())
    }

    /// Land final identities on a reel's strip, top row first
    pub fn land_symbols(&mut self, reel: usize, names: &[String]) -> Result<(), GridError> {
        self.reel(reel)?;
        if names.len() != self.rows {
            return Err(GridError::RowCountMismatch {
                reel,
                expected: self.rows,
                found: names.len(),
            });
        }
        for (row, name) in names.iter().enumerate() {
            self.remove_symbol(reel, row, MAIN_LAYER)?;
            let handle = self
                .symbols
                .alloc(name.clone(), SymbolPos::new(reel, row, MAIN_LAYER));
            self.reels[reel].cells[MAIN_LAYER][row] = Some(handle);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MUTATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Change the identity of a strip cell, placing a symbol if it is empty
    ///
    /// A sticky symbol covering the cell follows the change.
    pub fn mutate_at(
        &mut self,
        reel: usize,
        row: usize,
        name: &str,
        transition: Transition,
    ) -> Result<CellChange, GridError> {
        self.check_cell(reel, row, MAIN_LAYER)?;

        let from = match self.reels[reel].cells[MAIN_LAYER][row] {
            Some(handle) => Some(self.mutate_symbol(handle, name, transition.clone())?),
            None => {
                let handle = self
                    .symbols
                    .alloc(name, SymbolPos::new(reel, row, MAIN_LAYER));
                self.reels[reel].cells[MAIN_LAYER][row] = Some(handle);
                None
            }
        };

        if let Some(sticky) = self.sticky.by_cell.get(&CellPos::new(reel, row)).copied() {
            self.mutate_symbol(sticky, name, transition)?;
        }

        Ok(CellChange {
            from,
            to: name.to_string(),
        })
    }

    /// Change the identity of any placed symbol, returning its previous name
    pub fn mutate_symbol(
        &mut self,
        handle: SymbolHandle,
        name: &str,
        transition: Transition,
    ) -> Result<String, GridError> {
        let symbol = self.symbols.get_mut(handle).ok_or(GridError::StaleHandle)?;
        let previous = symbol.mutate_to(name, transition);
        let pos = symbol.position();

        if pos.layer as usize == STICKY_LAYER {
            let cell = CellPos {
                reel: pos.reel,
                row: pos.row,
            };
            if self.sticky.by_cell.get(&cell) == Some(&handle) {
                self.sticky.rekey(cell, &previous, name);
            }
        }
        Ok(previous)
    }

    /// Remove a symbol from a cell, returning its identity
    ///
    /// The instance is back in the cache before the cell reads as empty.
    pub fn remove_symbol(
        &mut self,
        reel: usize,
        row: usize,
        layer: usize,
    ) -> Result<Option<String>, GridError> {
        self.check_cell(reel, row, layer)?;
        let Some(handle) = self.reels[reel].cells[layer][row] else {
            return Ok(None);
        };

        let name = self.symbols.get(handle).map(|s| s.name().to_string());
        if layer == STICKY_LAYER {
            if let Some(name) = &name {
                self.sticky.remove(CellPos::new(reel, row), name);
            }
        }
        self.symbols.release(handle);
        self.reels[reel].cells[layer][row] = None;
        Ok(name)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STICKY OVERLAY
    // ═══════════════════════════════════════════════════════════════════════

    /// Lock a symbol on the overlay, replacing any sticky already there
    pub fn create_sticky_symbol(
        &mut self,
        name: &str,
        row: usize,
        reel: usize,
    ) -> Result<SymbolHandle, GridError> {
        if self.layers <= STICKY_LAYER {
            return Err(GridError::NoOverlay);
        }
        self.check_cell(reel, row, STICKY_LAYER)?;
        self.remove_symbol(reel, row, STICKY_LAYER)?;

        let handle = self
            .symbols
            .alloc(name, SymbolPos::new(reel, row, STICKY_LAYER));
        self.reels[reel].cells[STICKY_LAYER][row] = Some(handle);
        self.sticky.insert(CellPos::new(reel, row), name, handle);
        Ok(handle)
    }

    /// Remove a placed symbol by handle and return it to the cache
    pub fn release_symbol_instance(&mut self, handle: SymbolHandle) -> Result<(), GridError> {
        let pos = self
            .symbols
            .get(handle)
            .map(Symbol::position)
            .ok_or(GridError::StaleHandle)?;
        let (reel, row, layer) = (pos.reel as usize, pos.row as usize, pos.layer as usize);

        if self.handle_at(reel, row, layer) != Some(handle) {
            return Err(GridError::StaleHandle);
        }
        self.remove_symbol(reel, row, layer)?;
        Ok(())
    }

    pub fn sticky_at(&self, reel: usize, row: usize) -> Option<&Symbol> {
        self.sticky
            .by_cell
            .get(&CellPos::new(reel, row))
            .and_then(|h| self.symbols.get(*h))
    }

    /// Cells holding a sticky symbol of the given identity
    pub fn stickies_named(&self, name: &str) -> Vec<CellPos> {
        self.sticky
            .by_name
            .get(name)
            .map(|cells| cells.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn sticky_count(&self) -> usize {
        self.sticky.by_cell.len()
    }

    pub fn sticky_cell_of(&self, handle: SymbolHandle) -> Option<CellPos> {
        self.sticky.cell_of(handle)
    }

    /// Drop every sticky symbol, returning how many were released
    pub fn clear_stickies(&mut self) -> usize {
        let cells: Vec<CellPos> = self.sticky.by_cell.keys().copied().collect();
        for cell in &cells {
            // Cells come from the index, so they are in range.
            let _ = self.remove_symbol(cell.reel as usize, cell.row as usize, STICKY_LAYER);
        }
        cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridSpec;

    fn grid_3x3() -> ReelGrid {
        ReelGrid::new(&SpinConfig::new("test", GridSpec::new(3, 3)))
    }

    fn names(symbols: Vec<&Symbol>) -> Vec<&str> {
        symbols.into_iter().map(Symbol::name).collect()
    }

    #[test]
    fn test_new_grid_is_filled() {
        let grid = grid_3x3();

        assert_eq!(grid.reels().len(), 3);
        assert_eq!(grid.symbols().live_count(), 9);
        assert!(grid.all_stopped());
        assert_eq!(names(grid.visible_symbols_at(1, MAIN_LAYER).unwrap()), ["BL"; 3]);
        assert!(grid.visible_symbols_at(1, STICKY_LAYER).unwrap().is_empty());
    }

    #[test]
    fn test_views_follow_landing() {
        let mut grid = grid_3x3();
        grid.land_symbols(0, &["A".into(), "B".into(), "C".into()])
            .unwrap();

        assert_eq!(names(grid.visible_symbols_at(0, MAIN_LAYER).unwrap()), ["A", "B", "C"]);
        assert_eq!(names(grid.visible_symbols_bottom_up_at(0).unwrap()), ["C", "B", "A"]);
        assert_eq!(grid.symbols().live_count(), 9);
        assert_eq!(grid.symbols().constructed(), 9);
    }

    #[test]
    fn test_landing_wrong_length() {
        let mut grid = grid_3x3();
        let err = grid.land_symbols(1, &["A".into()]).unwrap_err();
        assert_eq!(
            err,
            GridError::RowCountMismatch {
                reel: 1,
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn test_geometry() {
        let grid = grid_3x3();
        assert_eq!(grid.reel_root_at(1).unwrap(), Anchor::new(120.0, 0.0));
        assert_eq!(grid.symbol_vertical_spacing_at(1).unwrap(), 120.0);
        assert_eq!(grid.cell_anchor(1, 2).unwrap(), Anchor::new(120.0, 240.0));
        assert!(matches!(
            grid.reel_root_at(9),
            Err(GridError::ReelOutOfRange { reel: 9, reels: 3 })
        ));
    }

    #[test]
    fn test_mutate_in_place() {
        let mut grid = grid_3x3();
        let before = grid.handle_at(0, 1, MAIN_LAYER);

        let change = grid.mutate_at(0, 1, "TW", Transition::Instant).unwrap();

        assert_eq!(change.from.as_deref(), Some("BL"));
        assert_eq!(grid.handle_at(0, 1, MAIN_LAYER), before);
        assert_eq!(grid.symbol_at(0, 1).map(Symbol::name), Some("TW"));
    }

    #[test]
    fn test_mutate_empty_cell_places_symbol() {
        let mut grid = grid_3x3();
        grid.remove_symbol(2, 0, MAIN_LAYER).unwrap();
        assert!(grid.symbol_at(2, 0).is_none());

        let change = grid.mutate_at(2, 0, "WD", Transition::Instant).unwrap();
        assert_eq!(change.from, None);
        assert_eq!(grid.symbol_at(2, 0).map(Symbol::name), Some("WD"));
    }

    #[test]
    fn test_remove_releases_to_cache() {
        let mut grid = grid_3x3();
        let removed = grid.remove_symbol(0, 0, MAIN_LAYER).unwrap();

        assert_eq!(removed.as_deref(), Some("BL"));
        assert_eq!(grid.symbols().cached_count(), 1);
        assert_eq!(grid.remove_symbol(0, 0, MAIN_LAYER).unwrap(), None);
    }

    #[test]
    fn test_sticky_index_rekeyed_on_mutation() {
        let mut grid = grid_3x3();
        let handle = grid.create_sticky_symbol("WD", 1, 2).unwrap();

        assert_eq!(grid.stickies_named("WD"), vec![CellPos::new(2, 1)]);
        grid.mutate_symbol(handle, "TW", Transition::Instant).unwrap();

        assert!(grid.stickies_named("WD").is_empty());
        assert_eq!(grid.stickies_named("TW"), vec![CellPos::new(2, 1)]);
        assert_eq!(grid.sticky_at(2, 1).map(Symbol::name), Some("TW"));
        assert_eq!(grid.sticky_cell_of(handle), Some(CellPos::new(2, 1)));
    }

    #[test]
    fn test_mutating_cell_updates_covering_sticky() {
        let mut grid = grid_3x3();
        grid.create_sticky_symbol("WD", 0, 0).unwrap();

        grid.mutate_at(0, 0, "M1", Transition::Instant).unwrap();

        assert_eq!(grid.stickies_named("M1"), vec![CellPos::new(0, 0)]);
        assert!(grid.stickies_named("WD").is_empty());
    }

    #[test]
    fn test_release_symbol_instance() {
        let mut grid = grid_3x3();
        let handle = grid.create_sticky_symbol("WD", 0, 1).unwrap();

        grid.release_symbol_instance(handle).unwrap();

        assert_eq!(grid.sticky_count(), 0);
        assert!(grid.sticky_at(1, 0).is_none());
        assert_eq!(grid.release_symbol_instance(handle), Err(GridError::StaleHandle));
    }

    #[test]
    fn test_sticky_replaced_and_cleared() {
        let mut grid = grid_3x3();
        grid.create_sticky_symbol("WD", 0, 0).unwrap();
        grid.create_sticky_symbol("TW", 0, 0).unwrap();
        grid.create_sticky_symbol("WD", 2, 2).unwrap();

        assert_eq!(grid.sticky_count(), 2);
        assert_eq!(grid.stickies_named("WD"), vec![CellPos::new(2, 2)]);
        assert_eq!(grid.clear_stickies(), 2);
        assert_eq!(grid.sticky_count(), 0);
    }

    #[test]
    fn test_no_overlay_layer() {
        let mut spec = GridSpec::new(2, 2);
        spec.layers = 1;
        let mut grid = ReelGrid::new(&SpinConfig::new("flat", spec));
        assert_eq!(grid.create_sticky_symbol("WD", 0, 0), Err(GridError::NoOverlay));
    }

    #[test]
    fn test_provisional_stop() {
        let mut grid = grid_3x3();
        grid.begin_spin();
        assert!(!grid.all_stopped());

        assert!(grid.provisionally_stop(2).unwrap());
        assert!(grid.reels()[2].is_provisionally_stopped());
        grid.restore_provisional(2).unwrap();
        assert!(!grid.reels()[2].is_stopped());

        grid.stop_reel(1).unwrap();
        assert!(!grid.provisionally_stop(1).unwrap());
        grid.restore_provisional(1).unwrap();
        assert!(grid.reels()[1].is_stopped());
    }
}

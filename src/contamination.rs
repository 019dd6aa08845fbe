use contagion_common::{CellKey, GridParams, HeatmapCell, LatLng};
use log::trace;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};

use crate::agent::Agent;
use crate::stochastic::{amplify_by_level, chance, exposure_probability};
use crate::trajectory::TrajectoryStore;

/// Accumulated contamination of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ContaminationCell {
    pub location: LatLng,
    pub contamination_level: u32,
}

/// Sparse map from cell to contamination level. Cells appear on their first
/// deposit and are never removed or decayed during a run.
#[derive(Debug, Clone, Default)]
pub struct ContaminationGrid {
    grid: GridParams,
    cells: BTreeMap<CellKey, ContaminationCell>,
}

impl ContaminationGrid {
    pub fn new(grid: GridParams) -> Self {
        ContaminationGrid { grid, cells: BTreeMap::new() }
    }

    pub fn grid_params(&self) -> &GridParams {
        &self.grid
    }

    /// Replaces the quantization. Only allowed while no cell exists yet.
    pub(crate) fn reset_grid_params(&mut self, grid: GridParams) -> bool {
        if !self.cells.is_empty() {
            return false;
        }
        self.grid = grid;
        true
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, key: CellKey) -> Option<&ContaminationCell> {
        self.cells.get(&key)
    }

    pub fn level(&self, key: CellKey) -> u32 {
        self.cells.get(&key).map_or(0, |c| c.contamination_level)
    }

    pub fn level_at(&self, location: LatLng) -> u32 {
        self.level(self.grid.cell_key(location))
    }

    pub fn max_level(&self) -> u32 {
        self.cells.values().map(|c| c.contamination_level).max().unwrap_or(0)
    }

    /// Adds one unit of contamination, creating the cell if needed.
    pub fn contaminate(&mut self, key: CellKey) -> u32 {
        let grid = &self.grid;
        let cell = self.cells.entry(key).or_insert_with(|| ContaminationCell {
            location: grid.cell_center(key),
            contamination_level: 0,
        });
        cell.contamination_level = cell.contamination_level.saturating_add(1);
        cell.contamination_level
    }

    /// Distinct cells the agent occupied during the last `seconds`, most recent first.
    fn visited_cells(&self, store: &TrajectoryStore, id: &str, seconds: f64) -> Vec<CellKey> {
        let mut seen = HashSet::new();
        store
            .locations_in_last_time_interval(id, seconds)
            .into_iter()
            .map(|location| self.grid.cell_key(location))
            .filter(|key| seen.insert(*key))
            .collect()
    }

    /// Lets a contagious, non-quarantined agent contaminate the cells it
    /// visited during the last `seconds`. Returns how many cells were hit.
    pub fn deposit_from<R: Rng>(
        &mut self,
        agent: &Agent,
        store: &TrajectoryStore,
        seconds: f64,
        prob_contaminate: f64,
        rng: &mut R,
    ) -> usize {
        if !agent.stage().is_contagious() || agent.is_quarantined {
            return 0;
        }
        let visited = self.visited_cells(store, agent.id(), seconds);
        let p_visit = exposure_probability(prob_contaminate, seconds, visited.len());
        let mut hits = 0;
        for key in visited {
            if chance(rng, p_visit) {
                let level = self.contaminate(key);
                trace!("Agent {} contaminated cell {:?} (level {}).", agent.id(), key, level);
                hits += 1;
            }
        }
        hits
    }

    /// Checks whether an infectable, non-quarantined agent catches the disease
    /// from a contaminated cell it visited during the last `seconds`.
    /// Returns the first cell that infected it.
    pub fn pickup_for<R: Rng>(
        &self,
        agent: &Agent,
        store: &TrajectoryStore,
        seconds: f64,
        prob_catch: f64,
        rng: &mut R,
    ) -> Option<CellKey> {
        if !agent.stage().is_infectable() || agent.is_quarantined || self.cells.is_empty() {
            return None;
        }
        let visited = self.visited_cells(store, agent.id(), seconds);
        let p_visit = exposure_probability(prob_catch, seconds, visited.len());
        visited.into_iter().find(|key| {
            let level = self.level(*key);
            level > 0 && chance(&mut *rng, amplify_by_level(p_visit, level))
        })
    }

    /// Every cell ordered by key, with intensity scaled against the hottest cell.
    pub fn heatmap(&self) -> Vec<HeatmapCell> {
        let max = self.max_level().max(1) as f64;
        self.cells
            .iter()
            .map(|(key, cell)| HeatmapCell {
                key: *key,
                location: cell.location,
                level: cell.contamination_level,
                intensity: cell.contamination_level as f64 / max,
            })
            .collect()
    }

    /// The `n` most contaminated cells, hottest first.
    pub fn hottest(&self, n: usize) -> Vec<HeatmapCell> {
        let mut cells = self.heatmap();
        cells.sort_by(|a, b| b.level.cmp(&a.level).then(a.key.cmp(&b.key)));
        cells.truncate(n);
        cells
    }
}

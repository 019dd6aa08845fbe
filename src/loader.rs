//! Trajectory dataset loading and the data-readiness state machine.
//!
//! The JSON layout is the one produced by the trajectory preprocessing step:
//! ```json
//! {
//!   "gridparams": { "fixed-point-precision": 4, "cell-size-lat": 0.001, "cell-size-lng": 0.001 },
//!   "ranges": { "time-start": 1224730000, "time-end": 1224740000 },
//!   "trajectories": { "000": [[1224730000, 1224730060, 399841, 1163184], [399845, 1163190, 300]] }
//! }
//! ```
//! Records are either `[start, end, lat, lng]` spans or `[lat, lng, duration]`
//! stays; coordinates are fixed-point integers.

use anyhow::{Context, Result};
use contagion_common::{AgentId, GridParams};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::EngineError;
use crate::trajectory::{TimeRange, TrajectoryDataset, TrajectoryOptions, TrajectoryStore, WaypointRecord};

/// Readiness of externally loaded data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Tracks one load at a time. Every started load ends in exactly one of
/// `Loaded` or `Failed`.
#[derive(Debug, Default)]
pub struct DatasetLoader {
    state: LoadState,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            LoadState::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    /// Marks the start of a load. A load already in flight must finish first.
    pub fn begin(&mut self) -> Result<(), EngineError> {
        if self.is_loading() {
            return Err(EngineError::DataLoading);
        }
        self.state = LoadState::Loading;
        self.started_at = Some(Instant::now());
        self.finished_at = None;
        info!("Trajectory data load started.");
        Ok(())
    }

    /// Ends the load in flight, handing back the payload on success.
    pub fn finish<T>(&mut self, result: std::result::Result<T, String>) -> Result<Option<T>, EngineError> {
        if !self.is_loading() {
            return Err(EngineError::LoadNotInProgress);
        }
        match result {
            Ok(payload) => {
                self.state = LoadState::Loaded;
                self.finished_at = Some(Instant::now());
                info!("Trajectory data loaded in {:.3?}.", self.load_duration().unwrap_or_default());
                Ok(Some(payload))
            }
            Err(msg) => {
                warn!("Trajectory data load failed: {}", msg);
                self.state = LoadState::Failed(msg);
                self.finished_at = None;
                Ok(None)
            }
        }
    }

    /// Gives up on the load in flight; it ends as failed.
    pub fn abandon(&mut self) -> Result<(), EngineError> {
        self.finish::<()>(Err("load abandoned".to_string())).map(|_| ())
    }

    /// How long the last successful load took. `None` unless loaded.
    pub fn load_duration(&self) -> Option<Duration> {
        if !self.is_loaded() {
            return None;
        }
        Some(self.finished_at?.duration_since(self.started_at?))
    }
}

#[derive(Deserialize)]
struct RawRanges {
    #[serde(rename = "time-start")]
    time_start: f64,
    #[serde(rename = "time-end")]
    time_end: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecord {
    Span(f64, f64, f64, f64),
    Stay(f64, f64, f64),
    StayObject { lat: f64, lng: f64, duration: f64 },
}

impl RawRecord {
    fn decode(self, grid: &GridParams) -> WaypointRecord {
        match self {
            RawRecord::Span(start, end, lat, lng) => WaypointRecord::Span {
                start,
                end,
                location: grid.decode_location(lat, lng),
            },
            RawRecord::Stay(lat, lng, duration) | RawRecord::StayObject { lat, lng, duration } => {
                WaypointRecord::Stay { location: grid.decode_location(lat, lng), duration }
            }
        }
    }
}

#[derive(Deserialize)]
struct RawDataset {
    #[serde(default)]
    gridparams: GridParams,
    #[serde(default)]
    ranges: Option<RawRanges>,
    #[serde(default)]
    trajectories: BTreeMap<AgentId, Vec<RawRecord>>,
}

/// Debug subsetting applied while loading.
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    /// Keep only the first N trajectories in id order.
    pub keep_first_n: Option<usize>,
    /// Always kept, even when it would fall outside the first N.
    pub patient_zero: Option<AgentId>,
}

impl DatasetFilter {
    fn kept_ids<'a>(&self, ids: impl Iterator<Item = &'a AgentId>) -> Option<Vec<AgentId>> {
        let n = self.keep_first_n?;
        let all: Vec<&AgentId> = ids.collect();
        let mut keep: Vec<AgentId> = all.iter().take(n).map(|id| (*id).clone()).collect();
        if let Some(pz) = &self.patient_zero {
            if all.contains(&pz) && !keep.contains(pz) {
                if keep.is_empty() {
                    keep.push(pz.clone());
                } else {
                    keep[0] = pz.clone();
                }
            }
        }
        Some(keep)
    }
}

fn decode_dataset(raw: RawDataset, filter: &DatasetFilter) -> TrajectoryDataset {
    let grid = raw.gridparams;
    let mut trajectories = raw.trajectories;
    if let Some(keep) = filter.kept_ids(trajectories.keys()) {
        let before = trajectories.len();
        trajectories.retain(|id, _| keep.contains(id));
        debug!("Kept {} of {} trajectories.", trajectories.len(), before);
    }

    let entries: Vec<(AgentId, Vec<RawRecord>)> = trajectories.into_iter().collect();
    let trajectories: BTreeMap<AgentId, Vec<WaypointRecord>> = entries
        .into_par_iter()
        .map(|(id, records)| {
            let decoded = records.into_iter().map(|r| r.decode(&grid)).collect();
            (id, decoded)
        })
        .collect();

    TrajectoryDataset {
        time_range: raw.ranges.map(|r| TimeRange::new(r.time_start, r.time_end)),
        grid,
        trajectories,
    }
}

/// Parses a JSON dataset and decodes its fixed-point coordinates.
pub fn parse_dataset(json: &str, filter: &DatasetFilter) -> Result<TrajectoryDataset> {
    let raw: RawDataset = serde_json::from_str(json).context("Malformed trajectory dataset")?;
    Ok(decode_dataset(raw, filter))
}

pub fn read_dataset<P: AsRef<Path>>(path: P, filter: &DatasetFilter) -> Result<TrajectoryDataset> {
    let path_ref = path.as_ref();
    let json = std::fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read trajectory dataset '{}'", path_ref.display()))?;
    parse_dataset(&json, filter).with_context(|| format!("Invalid trajectory dataset '{}'", path_ref.display()))
}

/// Reads a dataset file and builds a ready-to-seek store from it.
pub fn load_store<P: AsRef<Path>>(
    path: P,
    filter: &DatasetFilter,
    options: TrajectoryOptions,
) -> Result<TrajectoryStore> {
    let dataset = read_dataset(path, filter)?;
    let store = TrajectoryStore::new(dataset, options);
    info!("Loaded {} trajectories.", store.len());
    Ok(store)
}

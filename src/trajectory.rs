//! Time-indexed agent positions.
//!
//! Each agent owns an immutable, start-sorted sequence of waypoints and a read
//! cursor. Seeking moves every cursor with a two-pointer scan, so monotonic
//! seeks cost amortized O(1) per agent. Windowed queries walk backwards from
//! the cursor without mutating it and stop at the first waypoint that ended
//! before the window opened.

use contagion_common::{AgentId, GridParams, LatLng};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// One record of a trajectory as it appears in a dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaypointRecord {
    /// Present at `location` during `[start, end)` (unix seconds).
    Span { start: f64, end: f64, location: LatLng },
    /// Present at `location` for `duration` seconds, starting when the previous record ends.
    Stay { location: LatLng, duration: f64 },
}

/// A normalized waypoint: the agent is at `location` during `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub start: f64,
    pub end: f64,
    pub location: LatLng,
}

impl Waypoint {
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }

    fn shifted(&self, offset: f64) -> Waypoint {
        Waypoint { start: self.start + offset, end: self.end + offset, location: self.location }
    }
}

/// Time span covered by a dataset. All zeros when the dataset does not say.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeRange {
    pub begin: f64,
    pub end: f64,
    pub span: f64,
}

impl TimeRange {
    pub fn new(begin: f64, end: f64) -> Self {
        TimeRange { begin, end, span: end - begin }
    }
}

/// Trajectory data after parsing and coordinate decoding.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryDataset {
    pub grid: GridParams,
    pub time_range: Option<TimeRange>,
    pub trajectories: BTreeMap<AgentId, Vec<WaypointRecord>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrajectoryOptions {
    /// Replay a trajectory from its first waypoint once it runs out.
    pub looping: bool,
    /// Interpolate positions between consecutive stops.
    pub interpolate: bool,
    /// Initial seek time. Defaults to the dataset's begin time.
    pub start_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    index: usize,
    lap: i64,
}

/// Waypoints of a single agent, sorted by start time.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    waypoints: Vec<Waypoint>,
    end: f64,
}

impl Trajectory {
    /// Normalizes raw records. `Stay` records begin where the previous record
    /// ended, or at `origin` for the first one. Records with non-finite times are dropped.
    pub fn from_records(records: &[WaypointRecord], origin: f64) -> Self {
        let mut waypoints = Vec::with_capacity(records.len());
        let mut previous_end = origin;
        for record in records {
            let waypoint = match *record {
                WaypointRecord::Span { start, end, location } => {
                    let end = if end >= start { end } else { start };
                    Waypoint { start, end, location }
                }
                WaypointRecord::Stay { location, duration } => {
                    let duration = if duration.is_finite() && duration > 0.0 { duration } else { 0.0 };
                    Waypoint { start: previous_end, end: previous_end + duration, location }
                }
            };
            if !waypoint.start.is_finite() || !waypoint.end.is_finite() {
                continue;
            }
            previous_end = waypoint.end;
            waypoints.push(waypoint);
        }
        waypoints.sort_by(|a, b| a.start.total_cmp(&b.start));
        let end = waypoints.iter().map(|w| w.end).fold(f64::NEG_INFINITY, f64::max);
        Trajectory { waypoints, end }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn begin(&self) -> Option<f64> {
        self.waypoints.first().map(|w| w.start)
    }

    pub fn end(&self) -> Option<f64> {
        if self.waypoints.is_empty() { None } else { Some(self.end) }
    }

    /// Length of one replay of a looping trajectory.
    pub fn period(&self) -> f64 {
        match self.begin() {
            Some(begin) => self.end - begin,
            None => 0.0,
        }
    }

    /// Splits an absolute time into (lap, time within the lap).
    fn lap_time(&self, time: f64, looping: bool) -> (i64, f64) {
        let period = self.period();
        let begin = match self.begin() {
            Some(begin) if looping && period > 0.0 && time >= begin => begin,
            _ => return (0, time),
        };
        let lap = ((time - begin) / period).floor();
        (lap as i64, time - lap * period)
    }

    fn local_time(&self, cursor: Cursor, time: f64) -> f64 {
        time - cursor.lap as f64 * self.period()
    }

    /// Two-pointer seek. Steps back while the query precedes the record, then
    /// forward while the record has ended. In a gap between records the
    /// cursor rests on the upcoming record.
    fn seek(&self, cursor: Cursor, time: f64, looping: bool) -> Cursor {
        let (lap, local) = self.lap_time(time, looping);
        let last = self.waypoints.len().saturating_sub(1);
        let mut index = if lap == cursor.lap { cursor.index.min(last) } else { 0 };
        while index > 0 && local < self.waypoints[index].start {
            index -= 1;
        }
        while index < last && local >= self.waypoints[index].end {
            index += 1;
        }
        Cursor { index, lap }
    }

    fn current(&self, cursor: Cursor, time: f64) -> Option<Waypoint> {
        let waypoint = self.waypoints.get(cursor.index)?;
        if waypoint.contains(self.local_time(cursor, time)) {
            Some(waypoint.shifted(cursor.lap as f64 * self.period()))
        } else {
            None
        }
    }

    fn position(&self, cursor: Cursor, time: f64, interpolate: bool, grid: &GridParams) -> Option<LatLng> {
        if let Some(waypoint) = self.current(cursor, time) {
            return Some(waypoint.location);
        }
        if !interpolate || cursor.index == 0 {
            return None;
        }
        let local = self.local_time(cursor, time);
        let next = &self.waypoints[cursor.index];
        let prev = &self.waypoints[cursor.index - 1];
        if local < prev.end || local >= next.start {
            return None;
        }
        // Moving further than one cell between stops: snap instead of sliding across unrelated cells.
        if grid.cell_distance(prev.location, next.location) > 1.0 {
            return Some(next.location);
        }
        let gap = next.start - prev.end;
        let fraction = if gap > 0.0 { (local - prev.end) / gap } else { 1.0 };
        Some(prev.location.lerp(next.location, fraction))
    }

    fn recent_locations(&self, cursor: Cursor, now: f64, window: f64, looping: bool) -> Vec<LatLng> {
        let since = now - window;
        let period = self.period();
        let last = self.waypoints.len().saturating_sub(1);
        let mut locations = Vec::new();
        let mut index = cursor.index;
        let mut lap = cursor.lap;
        while index < self.waypoints.len() {
            let waypoint = self.waypoints[index].shifted(lap as f64 * period);
            if waypoint.end <= since {
                break;
            }
            // A cursor resting in a gap points at a waypoint that has not started yet.
            if waypoint.start <= now {
                locations.push(waypoint.location);
                // One full pass covers every location; older laps only repeat them.
                if locations.len() == self.waypoints.len() {
                    break;
                }
            }
            if index > 0 {
                index -= 1;
            } else if looping && lap > 0 {
                lap -= 1;
                index = last;
            } else {
                break;
            }
        }
        locations
    }
}

/// Owns every agent's trajectory and read cursor.
#[derive(Debug, Clone)]
pub struct TrajectoryStore {
    grid: GridParams,
    time_range: TimeRange,
    options: TrajectoryOptions,
    start_time: f64,
    seek_unixtime: f64,
    ids: Vec<AgentId>,
    index_by_id: HashMap<AgentId, usize>,
    trajectories: Vec<Trajectory>,
    // None for agents without waypoints
    cursors: Vec<Option<Cursor>>,
}

impl TrajectoryStore {
    pub fn new(dataset: TrajectoryDataset, options: TrajectoryOptions) -> Self {
        let origin = dataset.time_range.map(|r| r.begin).unwrap_or(0.0);
        let start_time = options.start_time.unwrap_or(origin);

        let entries: Vec<(AgentId, Vec<WaypointRecord>)> = dataset.trajectories.into_iter().collect();
        let (ids, trajectories): (Vec<AgentId>, Vec<Trajectory>) = entries
            .into_par_iter()
            .map(|(id, records)| {
                let trajectory = Trajectory::from_records(&records, origin);
                (id, trajectory)
            })
            .unzip();

        let index_by_id = ids.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
        let cursors: Vec<Option<Cursor>> = trajectories
            .iter()
            .map(|t| if t.is_empty() { None } else { Some(Cursor::default()) })
            .collect();
        let without_waypoints = cursors.iter().filter(|c| c.is_none()).count();
        if without_waypoints > 0 {
            debug!("{} of {} trajectories have no waypoints.", without_waypoints, ids.len());
        }

        let mut store = TrajectoryStore {
            grid: dataset.grid,
            time_range: dataset.time_range.unwrap_or_default(),
            options,
            start_time,
            seek_unixtime: start_time,
            ids,
            index_by_id,
            trajectories,
            cursors,
        };
        store.seek(start_time);
        store
    }

    /// A store without any trajectories. Every query comes back empty.
    pub fn empty() -> Self {
        Self::new(TrajectoryDataset::default(), TrajectoryOptions::default())
    }

    pub fn grid_params(&self) -> &GridParams {
        &self.grid
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn options(&self) -> TrajectoryOptions {
        self.options
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn seek_unixtime(&self) -> f64 {
        self.seek_unixtime
    }

    /// Agent ids in ascending order.
    pub fn ids(&self) -> &[AgentId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn trajectory(&self, id: &str) -> Option<&Trajectory> {
        self.index_by_id.get(id).map(|&i| &self.trajectories[i])
    }

    pub fn initial_record(&self, id: &str) -> Option<Waypoint> {
        self.trajectory(id)?.waypoints.first().copied()
    }

    /// Moves every cursor so its waypoint contains (or precedes) `unixtime`.
    pub fn seek(&mut self, unixtime: f64) {
        if !unixtime.is_finite() {
            warn!("Ignoring seek to non-finite time {}.", unixtime);
            return;
        }
        let looping = self.options.looping;
        self.cursors
            .par_iter_mut()
            .zip(self.trajectories.par_iter())
            .for_each(|(cursor, trajectory)| {
                if let Some(c) = cursor {
                    *c = trajectory.seek(*c, unixtime, looping);
                }
            });
        self.seek_unixtime = unixtime;
    }

    pub fn advance(&mut self, seconds: f64) {
        self.seek(self.seek_unixtime + seconds);
    }

    fn cursor_of(&self, id: &str) -> Option<(usize, Cursor)> {
        let i = *self.index_by_id.get(id)?;
        self.cursors[i].map(|c| (i, c))
    }

    /// The waypoint active at the seek time, in absolute time.
    pub fn current_waypoint(&self, id: &str) -> Option<Waypoint> {
        let (i, cursor) = self.cursor_of(id)?;
        self.trajectories[i].current(cursor, self.seek_unixtime)
    }

    /// Position at the seek time; interpolated between stops when enabled.
    pub fn location_of(&self, id: &str) -> Option<LatLng> {
        let (i, cursor) = self.cursor_of(id)?;
        self.trajectories[i].position(cursor, self.seek_unixtime, self.options.interpolate, &self.grid)
    }

    /// Position of every agent at the seek time.
    pub fn locations(&self) -> BTreeMap<AgentId, Option<LatLng>> {
        self.ids.iter().map(|id| (id.clone(), self.location_of(id))).collect()
    }

    /// Locations of the waypoints overlapping `[now - window, now]`, most recent
    /// first. May repeat a location. Empty for unknown agents and agents without waypoints.
    pub fn locations_in_last_time_interval(&self, id: &str, window_seconds: f64) -> Vec<LatLng> {
        let Some((i, cursor)) = self.cursor_of(id) else {
            return Vec::new();
        };
        let window = if window_seconds > 0.0 { window_seconds } else { 0.0 };
        self.trajectories[i].recent_locations(cursor, self.seek_unixtime, window, self.options.looping)
    }

    /// [`TrajectoryStore::locations_in_last_time_interval`] for every agent.
    pub fn all_locations_in_last_time_interval(&self, window_seconds: f64) -> BTreeMap<AgentId, Vec<LatLng>> {
        self.ids
            .iter()
            .map(|id| (id.clone(), self.locations_in_last_time_interval(id, window_seconds)))
            .collect()
    }
}

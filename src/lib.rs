//! Agent-based epidemic simulation core: an infection state machine driven by
//! stochastic stage exits, environmental contamination of visited cells, and
//! time-indexed agent trajectories.

pub mod agent;
pub mod contamination;
pub mod engine;
pub mod error;
pub mod loader;
pub mod stochastic;
pub mod trajectory;

pub use agent::{Agent, HealthProblem};
pub use contamination::{ContaminationCell, ContaminationGrid};
pub use engine::{EngineBuilder, EpidemicEngine};
pub use error::EngineError;
pub use loader::{DatasetFilter, DatasetLoader, LoadState};
pub use trajectory::{TimeRange, Trajectory, TrajectoryDataset, TrajectoryOptions, TrajectoryStore, Waypoint, WaypointRecord};

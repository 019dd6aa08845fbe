pub mod config;
pub mod geo;
pub mod params;
pub mod snapshot;
pub mod stage;

/// Stable identifier of an agent (the trajectory id in a dataset).
pub type AgentId = String;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, SimulationSection, PopulationSection, TrajectorySection, OutputSection};
pub use geo::{CellKey, GridParams, LatLng};
pub use params::{ParamDef, ParamKey, ParamTable, ParamValue, ParameterStore, ValueType};
pub use snapshot::{AgentView, HeatmapCell, Snapshot, StageCounts};
pub use stage::{InfectionStage, StageFlags};

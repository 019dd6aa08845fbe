use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use crate::params::{ParamTable, ParamValue};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// Clock settings for a run
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationSection {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Simulated seconds per tick.
    pub tick_seconds: f64,
    /// Simulated seconds to run in total.
    pub total_seconds: f64,
    /// Unix time the run starts at. Defaults to the dataset's `time-start`.
    #[serde(default)]
    pub start_time: Option<f64>,
}

// Population generation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PopulationSection {
    /// Number of agents to create when no trajectory dataset is configured.
    #[serde(default = "default_population_size")]
    pub size: u32,
    /// Only keep the first N trajectories of the dataset (debugging aid).
    #[serde(default)]
    pub keep_first_n: Option<usize>,
    /// Agent that is always kept and always seeded as a patient zero.
    #[serde(default)]
    pub patient_zero: Option<String>,
}

impl Default for PopulationSection {
    fn default() -> Self {
        PopulationSection {
            size: default_population_size(),
            keep_first_n: None,
            patient_zero: None,
        }
    }
}

// Trajectory dataset settings
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TrajectorySection {
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Replay each trajectory from the start once it runs out.
    #[serde(default)]
    pub looping: bool,
    /// Interpolate positions between stops.
    #[serde(default)]
    pub interpolate: bool,
}

// Run reporting, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputSection {
    #[serde(default = "default_report_interval_ticks")]
    pub report_interval_ticks: u64,
    #[serde(default = "default_heatmap_top_n")]
    pub heatmap_top_n: usize,
}

impl Default for OutputSection {
    fn default() -> Self {
        OutputSection {
            report_interval_ticks: default_report_interval_ticks(),
            heatmap_top_n: default_heatmap_top_n(),
        }
    }
}

fn default_seed() -> u64 {
    42
}

fn default_population_size() -> u32 {
    100
}

fn default_report_interval_ticks() -> u64 {
    60
}

fn default_heatmap_top_n() -> usize {
    10
}

// Main run configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub simulation: SimulationSection,
    #[serde(default)]
    pub population: PopulationSection,
    #[serde(default)]
    pub trajectories: TrajectorySection,
    /// `NAME = value` overrides for the default parameter table.
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub output: OutputSection,
}

impl SimulationConfig {
    /// Loads the run configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read config file '{}'", path_ref.display()))?;
        let config = Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config in '{}'", path_ref.display()))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if !sim.tick_seconds.is_finite() || sim.tick_seconds <= 0.0 {
            anyhow::bail!("tick_seconds must be a positive number.");
        }
        if !sim.total_seconds.is_finite() || sim.total_seconds < 0.0 {
            anyhow::bail!("total_seconds must not be negative.");
        }
        if let Some(start) = sim.start_time {
            if !start.is_finite() {
                anyhow::bail!("start_time must be finite.");
            }
        }
        if self.output.report_interval_ticks == 0 {
            anyhow::bail!("report_interval_ticks must be greater than 0.");
        }
        // Surface unknown parameter names at load time.
        self.param_table()?;
        Ok(())
    }

    /// Default parameter table with this config's overrides applied.
    pub fn param_table(&self) -> Result<ParamTable> {
        let mut table = ParamTable::new();
        table.apply_overrides(&self.params)?;
        Ok(table)
    }

    /// Number of ticks needed to cover `total_seconds`.
    pub fn total_ticks(&self) -> u64 {
        (self.simulation.total_seconds / self.simulation.tick_seconds).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParamKey, ParameterStore};
    use std::io::Write;

    const MINIMAL: &str = r#"
[simulation]
tick_seconds = 60.0
total_seconds = 3600.0
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.population.size, 100);
        assert!(config.trajectories.path.is_none());
        assert!(!config.trajectories.looping);
        assert_eq!(config.output.report_interval_ticks, 60);
        assert_eq!(config.total_ticks(), 60);
    }

    #[test]
    fn params_section_overrides_defaults() {
        let text = format!("{}\n[params]\nPROB_CRITICAL_MORTALITY = 0.9\nBOOL_REINFECTION = 1\n", MINIMAL);
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        let table = config.param_table().unwrap();
        assert_eq!(table.value(ParamKey::ProbCriticalMortality), 0.9);
        assert!(table.flag(ParamKey::BoolReinfection));
    }

    #[test]
    fn params_accept_booleans_and_integers() {
        let text = format!("{}\n[params]\nBOOL_REINFECTION = true\nNUM_PATIENT_ZEROES = 3\n", MINIMAL);
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.params["BOOL_REINFECTION"], ParamValue::Flag(true));
        let table = config.param_table().unwrap();
        assert!(table.flag(ParamKey::BoolReinfection));
        assert_eq!(table.value(ParamKey::NumPatientZeroes), 3.0);

        let text = format!("{}\n[params]\nBOOL_REINFECTION = false\n", MINIMAL);
        let table = SimulationConfig::from_toml_str(&text).unwrap().param_table().unwrap();
        assert!(!table.flag(ParamKey::BoolReinfection));
    }

    #[test]
    fn rejects_unknown_parameter() {
        let text = format!("{}\n[params]\nPROB_EVERYTHING = 0.9\n", MINIMAL);
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn rejects_non_positive_tick() {
        let text = "[simulation]\ntick_seconds = 0.0\ntotal_seconds = 10.0\n";
        assert!(SimulationConfig::from_toml_str(text).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}\n[trajectories]\npath = \"data/trajectories.json\"\nlooping = true\n",
            MINIMAL
        )
        .unwrap();
        let config = SimulationConfig::load(file.path()).unwrap();
        assert_eq!(
            config.trajectories.path.as_deref(),
            Some(Path::new("data/trajectories.json"))
        );
        assert!(config.trajectories.looping);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(SimulationConfig::load("does/not/exist.toml").is_err());
    }
}

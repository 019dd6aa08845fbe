use serde::{Serialize, Deserialize};
use crate::geo::{CellKey, LatLng};
use crate::stage::InfectionStage;

/// Read-only view of one agent, ordered by id in agent listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub id: String,
    pub age: f64,
    pub health_problems: Vec<String>,
    pub complication_risk: f64,
    pub stage: InfectionStage,
    pub infected_at_sim_seconds: Option<f64>,
    pub outcome_at_sim_seconds: Option<f64>,
    pub is_quarantined: bool,
    pub days_infected: Option<i64>,
    pub days_until_outcome: Option<i64>,
}

/// One contaminated cell of the heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub key: CellKey,
    pub location: LatLng,
    pub level: u32,
    /// `level` scaled linearly against the most contaminated cell (0..=1).
    pub intensity: f64,
}

/// Number of agents in each stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    counts: [usize; 7],
}

impl StageCounts {
    pub fn from_stages<I: IntoIterator<Item = InfectionStage>>(stages: I) -> Self {
        let mut counts = StageCounts::default();
        for stage in stages {
            counts.counts[stage as usize] += 1;
        }
        counts
    }

    pub fn get(&self, stage: InfectionStage) -> usize {
        self.counts[stage as usize]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InfectionStage, usize)> + '_ {
        InfectionStage::ALL.iter().map(move |s| (*s, self.get(*s)))
    }
}

/// State of a run at a specific simulation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulation seconds elapsed since the run began.
    pub total_seconds: f64,
    pub stage_counts: StageCounts,
    pub heatmap: Vec<HeatmapCell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_stages() {
        let counts = StageCounts::from_stages([
            InfectionStage::Healthy,
            InfectionStage::Healthy,
            InfectionStage::Sick,
        ]);
        assert_eq!(counts.get(InfectionStage::Healthy), 2);
        assert_eq!(counts.get(InfectionStage::Sick), 1);
        assert_eq!(counts.get(InfectionStage::Dead), 0);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.iter().count(), 7);
    }
}

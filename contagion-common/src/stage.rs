use serde::{Deserialize, Serialize};
use std::fmt;

/// Point in the infection state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InfectionStage {
    Healthy,
    Latent,
    Asymptomatic,
    Sick,
    Critical,
    Dead,
    Recovered,
}

/// Fixed behaviour flags of a stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    pub infectable: bool,
    pub infected: bool,
    pub contagious: bool,
    pub symptomatic: bool,
    pub critical: bool,
}

struct StageInfo {
    name: &'static str,
    description: &'static str,
    flags: StageFlags,
}

const fn flags(infectable: bool, infected: bool, contagious: bool, symptomatic: bool, critical: bool) -> StageFlags {
    StageFlags { infectable, infected, contagious, symptomatic, critical }
}

// Indexed by discriminant.
static STAGE_TABLE: [StageInfo; 7] = [
    StageInfo {
        name: "Healthy",
        description: "Has not been infected, but can be",
        flags: flags(true, false, false, false, false),
    },
    StageInfo {
        name: "Latent",
        description: "Infected, but not contagious or sick yet",
        flags: flags(false, true, false, false, false),
    },
    StageInfo {
        name: "Asymptomatic",
        description: "Infected and spreading the virus, but showing no/weak symptoms",
        flags: flags(false, true, true, false, false),
    },
    StageInfo {
        name: "Sick",
        description: "Infected and spreading the virus, and showing symptoms",
        flags: flags(false, true, true, true, false),
    },
    StageInfo {
        name: "Critical",
        description: "Requires medical intervention for survival",
        flags: flags(false, true, true, true, true),
    },
    StageInfo {
        name: "Dead",
        description: "Patient has succumbed to the illness",
        flags: flags(false, true, false, false, true),
    },
    StageInfo {
        name: "Recovered",
        description: "Made full recovery, now immunocompetent, cannot be reinfected",
        flags: flags(false, true, false, false, false),
    },
];

impl InfectionStage {
    pub const ALL: [InfectionStage; 7] = [
        InfectionStage::Healthy,
        InfectionStage::Latent,
        InfectionStage::Asymptomatic,
        InfectionStage::Sick,
        InfectionStage::Critical,
        InfectionStage::Dead,
        InfectionStage::Recovered,
    ];

    fn info(self) -> &'static StageInfo {
        &STAGE_TABLE[self as usize]
    }

    pub fn flags(self) -> StageFlags {
        self.info().flags
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn description(self) -> &'static str {
        self.info().description
    }

    pub fn is_infectable(self) -> bool {
        self.flags().infectable
    }

    pub fn is_infected(self) -> bool {
        self.flags().infected
    }

    pub fn is_contagious(self) -> bool {
        self.flags().contagious
    }

    pub fn is_symptomatic(self) -> bool {
        self.flags().symptomatic
    }

    pub fn is_critical(self) -> bool {
        self.flags().critical
    }

    /// Stages that close an infection episode.
    pub fn is_outcome(self) -> bool {
        matches!(self, InfectionStage::Healthy | InfectionStage::Recovered | InfectionStage::Dead)
    }
}

impl fmt::Display for InfectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

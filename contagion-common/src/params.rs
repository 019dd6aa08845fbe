use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Read access to named simulation parameters.
///
/// The engine only ever reads through this trait. Range validation belongs to
/// the implementor; callers still clamp probabilities before drawing.
pub trait ParameterStore {
    /// Current numeric value of a parameter. Booleans are encoded as 0/1.
    fn value(&self, key: ParamKey) -> f64;

    /// Boolean view of a parameter; any non-zero value is `true`.
    fn flag(&self, key: ParamKey) -> bool {
        self.value(key) != 0.0
    }
}

/// Every parameter the simulation reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKey {
    MeanAgeAppInstalled,
    StdevAgeAppInstalled,
    ProbHealthIssues,
    ProbComplicationsAge50,
    ProbComplicationsAge90,
    HealthIssueRiskMultiplier,
    MeanInfectionLatencyDuration,
    MeanInfectionAsymptomaticDuration,
    MeanInfectionSicknessDuration,
    MeanInfectionCriticalDuration,
    ProbAsymptomaticInfection,
    ProbAsymptomaticRecovery,
    ProbSickBecomesCritical,
    ProbCriticalMortality,
    BoolReinfection,
    NumPatientZeroes,
    ProbContaminate,
    ProbCatchFromLocation,
}

/// A parameter value as written in a config file: a number or a boolean.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Flag(bool),
}

impl From<ParamValue> for f64 {
    fn from(value: ParamValue) -> f64 {
        match value {
            ParamValue::Number(n) => n,
            ParamValue::Flag(b) => if b { 1.0 } else { 0.0 },
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueType {
    Probability,
    Days,
    Years,
    Integer,
    Bool,
    Ratio,
}

/// Static description of one parameter.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub key: ParamKey,
    pub name: &'static str,
    pub description: &'static str,
    pub value_type: ValueType,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

impl ParamDef {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Step a UI slider would use: 1 for integers and booleans, 1% of the span otherwise.
    pub fn increment(&self) -> f64 {
        match self.value_type {
            ValueType::Integer | ValueType::Bool => 1.0,
            _ => self.span() / 100.0,
        }
    }
}

const fn def(
    key: ParamKey,
    name: &'static str,
    description: &'static str,
    value_type: ValueType,
    default: f64,
    min: f64,
    max: f64,
) -> ParamDef {
    ParamDef { key, name, description, value_type, default, min, max }
}

// Order matches the `ParamKey` discriminants.
static PARAM_DEFS: [ParamDef; 18] = [
    def(ParamKey::MeanAgeAppInstalled, "MEAN_AGE_APP_INSTALLED",
        "Mean age of people carrying a tracked device", ValueType::Years, 35.0, 13.0, 100.0),
    def(ParamKey::StdevAgeAppInstalled, "STDEV_AGE_APP_INSTALLED",
        "Standard deviation of the age of people carrying a tracked device", ValueType::Years, 15.0, 0.0, 50.0),
    def(ParamKey::ProbHealthIssues, "PROB_HEALTH_ISSUES",
        "Probability of having each known pre-existing condition", ValueType::Probability, 0.15, 0.0, 1.0),
    def(ParamKey::ProbComplicationsAge50, "PROB_COMPLICATIONS_AGE_50",
        "Probability of complications for a healthy 50 year old", ValueType::Probability, 0.05, 0.0, 1.0),
    def(ParamKey::ProbComplicationsAge90, "PROB_COMPLICATIONS_AGE_90",
        "Probability of complications for a healthy 90 year old", ValueType::Probability, 0.4, 0.0, 1.0),
    def(ParamKey::HealthIssueRiskMultiplier, "HEALTH_ISSUE_RISK_MULTIPLIER",
        "How strongly each pre-existing condition magnifies complication risk", ValueType::Ratio, 0.5, 0.0, 10.0),
    def(ParamKey::MeanInfectionLatencyDuration, "MEAN_INFECTION_LATENCY_DURATION",
        "Mean days between infection and becoming contagious", ValueType::Days, 5.0, 0.0, 3650.0),
    def(ParamKey::MeanInfectionAsymptomaticDuration, "MEAN_INFECTION_ASYMPTOMATIC_DURATION",
        "Mean days spent contagious without symptoms", ValueType::Days, 7.0, 0.0, 3650.0),
    def(ParamKey::MeanInfectionSicknessDuration, "MEAN_INFECTION_SICKNESS_DURATION",
        "Mean days spent sick", ValueType::Days, 10.0, 0.0, 3650.0),
    def(ParamKey::MeanInfectionCriticalDuration, "MEAN_INFECTION_CRITICAL_DURATION",
        "Mean days spent in critical condition", ValueType::Days, 8.0, 0.0, 3650.0),
    def(ParamKey::ProbAsymptomaticInfection, "PROB_ASYMPTOMATIC_INFECTION",
        "Probability that a latent infection turns asymptomatic instead of sick", ValueType::Probability, 0.4, 0.0, 1.0),
    def(ParamKey::ProbAsymptomaticRecovery, "PROB_ASYMPTOMATIC_RECOVERY",
        "Probability that an asymptomatic infection recovers without getting sick", ValueType::Probability, 0.7, 0.0, 1.0),
    def(ParamKey::ProbSickBecomesCritical, "PROB_SICK_BECOMES_CRITICAL",
        "Probability that a sick person becomes critical", ValueType::Probability, 0.15, 0.0, 1.0),
    def(ParamKey::ProbCriticalMortality, "PROB_CRITICAL_MORTALITY",
        "Probability that a critical person dies", ValueType::Probability, 0.3, 0.0, 1.0),
    def(ParamKey::BoolReinfection, "BOOL_REINFECTION",
        "Whether recovered people become susceptible again", ValueType::Bool, 0.0, 0.0, 1.0),
    def(ParamKey::NumPatientZeroes, "NUM_PATIENT_ZEROES",
        "Number of people infected at the start of the simulation", ValueType::Integer, 1.0, 0.0, 1000.0),
    def(ParamKey::ProbContaminate, "PROB_CONTAMINATE",
        "Probability that a contagious person contaminates a location after prolonged contact", ValueType::Probability, 0.5, 0.0, 1.0),
    def(ParamKey::ProbCatchFromLocation, "PROB_CATCH_FROM_LOCATION",
        "Probability of catching the disease after prolonged contact with a contaminated location", ValueType::Probability, 0.2, 0.0, 1.0),
];

impl ParamKey {
    pub const ALL: [ParamKey; 18] = [
        ParamKey::MeanAgeAppInstalled,
        ParamKey::StdevAgeAppInstalled,
        ParamKey::ProbHealthIssues,
        ParamKey::ProbComplicationsAge50,
        ParamKey::ProbComplicationsAge90,
        ParamKey::HealthIssueRiskMultiplier,
        ParamKey::MeanInfectionLatencyDuration,
        ParamKey::MeanInfectionAsymptomaticDuration,
        ParamKey::MeanInfectionSicknessDuration,
        ParamKey::MeanInfectionCriticalDuration,
        ParamKey::ProbAsymptomaticInfection,
        ParamKey::ProbAsymptomaticRecovery,
        ParamKey::ProbSickBecomesCritical,
        ParamKey::ProbCriticalMortality,
        ParamKey::BoolReinfection,
        ParamKey::NumPatientZeroes,
        ParamKey::ProbContaminate,
        ParamKey::ProbCatchFromLocation,
    ];

    pub fn def(self) -> &'static ParamDef {
        &PARAM_DEFS[self as usize]
    }

    /// Canonical upper-case name, e.g. `PROB_CRITICAL_MORTALITY`.
    pub fn name(self) -> &'static str {
        self.def().name
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ParamKey::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown simulation parameter '{}'", s))
    }
}

/// In-memory parameter store holding one value per key, initialised to defaults.
#[derive(Debug, Clone)]
pub struct ParamTable {
    values: Vec<f64>,
}

impl Default for ParamTable {
    fn default() -> Self {
        ParamTable {
            values: PARAM_DEFS.iter().map(|d| d.default).collect(),
        }
    }
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// All parameter keys in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = ParamKey> {
        ParamKey::ALL.into_iter()
    }

    pub fn get(&self, key: ParamKey) -> f64 {
        self.values[key as usize]
    }

    /// Looks a parameter up by its canonical name.
    pub fn value_by_name(&self, name: &str) -> Option<f64> {
        name.parse::<ParamKey>().ok().map(|key| self.get(key))
    }

    /// Sets a parameter, clamping it into the parameter's range.
    /// Integers and booleans are rounded. NaN leaves the value untouched.
    /// Returns the value actually stored.
    pub fn set(&mut self, key: ParamKey, value: f64) -> f64 {
        if value.is_nan() {
            return self.get(key);
        }
        let def = key.def();
        let mut clamped = value.clamp(def.min, def.max);
        if matches!(def.value_type, ValueType::Integer | ValueType::Bool) {
            clamped = clamped.round();
        }
        self.values[key as usize] = clamped;
        clamped
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: ParamKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    /// Applies `NAME = value` overrides, failing on unknown names.
    pub fn apply_overrides<V: Copy + Into<f64>>(&mut self, overrides: &BTreeMap<String, V>) -> Result<()> {
        for (name, value) in overrides {
            let key: ParamKey = name.parse()?;
            self.set(key, (*value).into());
        }
        Ok(())
    }
}

impl ParameterStore for ParamTable {
    fn value(&self, key: ParamKey) -> f64 {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_matches_keys() {
        for (i, key) in ParamKey::ALL.iter().enumerate() {
            assert_eq!(*key as usize, i);
            assert_eq!(PARAM_DEFS[i].key, *key);
        }
    }

    #[test]
    fn names_round_trip() {
        for key in ParamKey::ALL {
            assert_eq!(key.name().parse::<ParamKey>().unwrap(), key);
        }
        assert!("NOT_A_PARAM".parse::<ParamKey>().is_err());
    }

    #[test]
    fn defaults_lie_within_range() {
        for d in PARAM_DEFS.iter() {
            assert!(d.min <= d.default && d.default <= d.max, "{} out of range", d.name);
        }
    }

    #[test]
    fn set_clamps_into_range() {
        let mut table = ParamTable::new();
        assert_eq!(table.set(ParamKey::ProbCriticalMortality, 1.7), 1.0);
        assert_eq!(table.set(ParamKey::ProbCriticalMortality, -0.2), 0.0);
        assert_eq!(table.set(ParamKey::NumPatientZeroes, 2.6), 3.0);
        assert_eq!(table.set(ParamKey::BoolReinfection, 0.4), 0.0);
        assert_eq!(table.set(ParamKey::ProbContaminate, f64::NAN), 0.5);
    }

    #[test]
    fn overrides_resolve_names() {
        let mut table = ParamTable::new();
        let mut overrides = BTreeMap::new();
        overrides.insert("BOOL_REINFECTION".to_string(), 1.0);
        overrides.insert("PROB_CATCH_FROM_LOCATION".to_string(), 0.9);
        table.apply_overrides(&overrides).unwrap();
        assert!(table.flag(ParamKey::BoolReinfection));
        assert_eq!(table.value_by_name("PROB_CATCH_FROM_LOCATION"), Some(0.9));

        overrides.insert("TYPO".to_string(), 1.0);
        assert!(table.apply_overrides(&overrides).is_err());

        let mut flags = BTreeMap::new();
        flags.insert("BOOL_REINFECTION".to_string(), ParamValue::Flag(false));
        flags.insert("NUM_PATIENT_ZEROES".to_string(), ParamValue::Number(4.0));
        table.apply_overrides(&flags).unwrap();
        assert!(!table.flag(ParamKey::BoolReinfection));
        assert_eq!(table.value(ParamKey::NumPatientZeroes), 4.0);
    }

    #[test]
    fn increments_follow_value_type() {
        assert_eq!(ParamKey::NumPatientZeroes.def().increment(), 1.0);
        assert!((ParamKey::ProbContaminate.def().increment() - 0.01).abs() < 1e-12);
    }
}

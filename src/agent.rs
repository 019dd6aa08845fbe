use contagion_common::{AgentId, AgentView, InfectionStage, ParamKey, ParameterStore};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::stochastic::{chance, clamp_probability, SEC_PER_DAY};

pub const MIN_AGE: f64 = 13.0;
pub const MAX_AGE: f64 = 100.0;

// Anchor points of the baseline age-risk curve
const AGE_NO_RISK: f64 = 20.0;
const AGE_50: f64 = 50.0;
const AGE_90: f64 = 90.0;

/// Pre-existing conditions that raise the risk of complications.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthProblem {
    Asthma,
    Cancer,
    ChronicKidneyDisease,
    ChronicLungDisease,
    Diabetes,
    HeartDisease,
    Hypertension,
    Immunocompromised,
    LiverDisease,
    Obesity,
}

impl HealthProblem {
    pub const ALL: [HealthProblem; 10] = [
        HealthProblem::Asthma,
        HealthProblem::Cancer,
        HealthProblem::ChronicKidneyDisease,
        HealthProblem::ChronicLungDisease,
        HealthProblem::Diabetes,
        HealthProblem::HeartDisease,
        HealthProblem::Hypertension,
        HealthProblem::Immunocompromised,
        HealthProblem::LiverDisease,
        HealthProblem::Obesity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HealthProblem::Asthma => "Asthma",
            HealthProblem::Cancer => "Cancer",
            HealthProblem::ChronicKidneyDisease => "Chronic kidney disease",
            HealthProblem::ChronicLungDisease => "Chronic lung disease",
            HealthProblem::Diabetes => "Diabetes",
            HealthProblem::HeartDisease => "Heart disease",
            HealthProblem::Hypertension => "Hypertension",
            HealthProblem::Immunocompromised => "Immunocompromised",
            HealthProblem::LiverDisease => "Liver disease",
            HealthProblem::Obesity => "Obesity",
        }
    }
}

/// Complication risk of a person without health problems, interpolated
/// linearly between the age-20, age-50 and age-90 anchors and clipped to [0, 1].
pub fn base_age_risk(age: f64, risk_at_50: f64, risk_at_90: f64) -> f64 {
    let risk = if age < AGE_50 {
        risk_at_50 * (age - AGE_NO_RISK) / (AGE_50 - AGE_NO_RISK)
    } else {
        risk_at_50 + (risk_at_90 - risk_at_50) * (age - AGE_50) / (AGE_90 - AGE_50)
    };
    clamp_probability(risk)
}

/// Magnifies a base risk by the number of health problems. Strictly increasing
/// in `issues` (for a positive multiplier), asymptotic to 1.
pub fn magnify_by_health_issues(base_risk: f64, issues: usize, multiplier: f64) -> f64 {
    let multiplier = if multiplier.is_finite() { multiplier.max(0.0) } else { 0.0 };
    let base = clamp_probability(base_risk);
    clamp_probability(1.0 - (1.0 - base) / (1.0 + issues as f64 * multiplier))
}

pub fn complication_risk(age: f64, issues: usize, params: &dyn ParameterStore) -> f64 {
    let base = base_age_risk(
        age,
        params.value(ParamKey::ProbComplicationsAge50),
        params.value(ParamKey::ProbComplicationsAge90),
    );
    magnify_by_health_issues(base, issues, params.value(ParamKey::HealthIssueRiskMultiplier))
}

/// One simulated person.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    age: f64,
    health_problems: BTreeSet<HealthProblem>,
    complication_risk: f64,
    stage: InfectionStage,
    infected_at_sim_seconds: Option<f64>,
    outcome_at_sim_seconds: Option<f64>,
    pub is_quarantined: bool,
}

impl Agent {
    /// Creates a healthy agent. The age is clipped into [`MIN_AGE`, `MAX_AGE`]
    /// and the complication risk is derived once, here.
    pub fn new(
        id: impl Into<AgentId>,
        age: f64,
        health_problems: BTreeSet<HealthProblem>,
        params: &dyn ParameterStore,
    ) -> Self {
        let age = if age.is_nan() { MIN_AGE } else { age.clamp(MIN_AGE, MAX_AGE) };
        let complication_risk = complication_risk(age, health_problems.len(), params);
        Agent {
            id: id.into(),
            age,
            health_problems,
            complication_risk,
            stage: InfectionStage::Healthy,
            infected_at_sim_seconds: None,
            outcome_at_sim_seconds: None,
            is_quarantined: false,
        }
    }

    /// Samples age and health problems from the population parameters.
    pub fn sample<R: Rng>(id: impl Into<AgentId>, params: &dyn ParameterStore, rng: &mut R) -> Self {
        let mean = params.value(ParamKey::MeanAgeAppInstalled);
        let stdev = params.value(ParamKey::StdevAgeAppInstalled).max(0.0);
        let age = match Normal::new(mean, stdev) {
            Ok(dist) => dist.sample(rng),
            Err(_) => mean,
        };

        let p_issue = params.value(ParamKey::ProbHealthIssues);
        let health_problems = HealthProblem::ALL
            .into_iter()
            .filter(|_| chance(&mut *rng, p_issue))
            .collect();

        Agent::new(id, age, health_problems, params)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn health_problems(&self) -> &BTreeSet<HealthProblem> {
        &self.health_problems
    }

    pub fn complication_risk(&self) -> f64 {
        self.complication_risk
    }

    pub fn stage(&self) -> InfectionStage {
        self.stage
    }

    pub fn infected_at_sim_seconds(&self) -> Option<f64> {
        self.infected_at_sim_seconds
    }

    pub fn outcome_at_sim_seconds(&self) -> Option<f64> {
        self.outcome_at_sim_seconds
    }

    /// Whole days between infection and outcome.
    pub fn days_until_outcome(&self) -> Option<i64> {
        let infected = self.infected_at_sim_seconds?;
        let outcome = self.outcome_at_sim_seconds?;
        Some(((outcome - infected) / SEC_PER_DAY).floor() as i64)
    }

    /// Whole days since infection while the episode is unresolved,
    /// otherwise the same as [`Agent::days_until_outcome`].
    pub fn days_infected(&self, now_sim_seconds: f64) -> Option<i64> {
        if self.outcome_at_sim_seconds.is_some() {
            return self.days_until_outcome();
        }
        let infected = self.infected_at_sim_seconds?;
        Some(((now_sim_seconds - infected) / SEC_PER_DAY).floor() as i64)
    }

    /// Moves to `stage`. Reaching an outcome stage stamps the outcome time
    /// unless the current episode already has one.
    pub(crate) fn set_stage(&mut self, stage: InfectionStage, now_sim_seconds: f64) {
        self.stage = stage;
        if stage.is_outcome() && self.outcome_at_sim_seconds.is_none() {
            self.outcome_at_sim_seconds = Some(now_sim_seconds);
        }
    }

    /// Starts a new infection episode in `stage`.
    pub(crate) fn begin_episode(&mut self, stage: InfectionStage, now_sim_seconds: f64) {
        self.infected_at_sim_seconds = Some(now_sim_seconds);
        self.outcome_at_sim_seconds = None;
        self.set_stage(stage, now_sim_seconds);
    }

    pub fn view(&self, now_sim_seconds: f64) -> AgentView {
        AgentView {
            id: self.id.clone(),
            age: self.age,
            health_problems: self.health_problems.iter().map(|h| h.name().to_string()).collect(),
            complication_risk: self.complication_risk,
            stage: self.stage,
            infected_at_sim_seconds: self.infected_at_sim_seconds,
            outcome_at_sim_seconds: self.outcome_at_sim_seconds,
            is_quarantined: self.is_quarantined,
            days_infected: self.days_infected(now_sim_seconds),
            days_until_outcome: self.days_until_outcome(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use contagion_common::ParamTable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn problems(n: usize) -> BTreeSet<HealthProblem> {
        HealthProblem::ALL.into_iter().take(n).collect()
    }

    #[test]
    fn age_curve_anchors() {
        assert_eq!(base_age_risk(20.0, 0.1, 0.5), 0.0);
        assert_eq!(base_age_risk(15.0, 0.1, 0.5), 0.0);
        assert_relative_eq!(base_age_risk(35.0, 0.1, 0.5), 0.05);
        assert_relative_eq!(base_age_risk(50.0, 0.1, 0.5), 0.1);
        assert_relative_eq!(base_age_risk(70.0, 0.1, 0.5), 0.3);
        assert_relative_eq!(base_age_risk(90.0, 0.1, 0.5), 0.5);
        assert_eq!(base_age_risk(200.0, 0.1, 0.9), 1.0);
    }

    #[test]
    fn risk_grows_with_health_issues() {
        let mut prev = -1.0;
        for issues in 0..HealthProblem::ALL.len() {
            let risk = magnify_by_health_issues(0.2, issues, 0.5);
            assert!(risk > prev);
            assert!((0.0..=1.0).contains(&risk));
            prev = risk;
        }
        assert_relative_eq!(magnify_by_health_issues(0.2, 0, 0.5), 0.2);
    }

    #[test]
    fn risk_grows_with_age_beyond_fifty() {
        let params = ParamTable::new();
        for issues in [0, 2, 5] {
            let mut prev = -1.0;
            for age in (50..=100).step_by(5) {
                let risk = complication_risk(age as f64, issues, &params);
                assert!(risk >= prev);
                assert!((0.0..=1.0).contains(&risk));
                prev = risk;
            }
        }
    }

    #[test]
    fn new_agent_is_healthy_and_clipped() {
        let params = ParamTable::new();
        let agent = Agent::new("a", 250.0, problems(3), &params);
        assert_eq!(agent.age(), MAX_AGE);
        assert_eq!(agent.stage(), InfectionStage::Healthy);
        assert_eq!(agent.health_problems().len(), 3);
        assert!(agent.infected_at_sim_seconds().is_none());
        assert!(agent.outcome_at_sim_seconds().is_none());
        assert!(!agent.is_quarantined);
    }

    #[test]
    fn sampled_agents_stay_in_range() {
        let params = ParamTable::new();
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..200 {
            let agent = Agent::sample(format!("{:03}", i), &params, &mut rng);
            assert!((MIN_AGE..=MAX_AGE).contains(&agent.age()));
            assert!((0.0..=1.0).contains(&agent.complication_risk()));
        }
    }

    #[test]
    fn outcome_is_stamped_once_per_episode() {
        let params = ParamTable::new();
        let mut agent = Agent::new("a", 30.0, BTreeSet::new(), &params);
        agent.begin_episode(InfectionStage::Latent, 0.0);
        agent.set_stage(InfectionStage::Recovered, 2.0 * SEC_PER_DAY);
        agent.set_stage(InfectionStage::Recovered, 5.0 * SEC_PER_DAY);
        assert_eq!(agent.outcome_at_sim_seconds(), Some(2.0 * SEC_PER_DAY));
        assert_eq!(agent.days_until_outcome(), Some(2));
        assert_eq!(agent.days_infected(9.0 * SEC_PER_DAY), Some(2));

        agent.begin_episode(InfectionStage::Asymptomatic, 6.0 * SEC_PER_DAY);
        assert!(agent.outcome_at_sim_seconds().is_none());
        assert_eq!(agent.days_until_outcome(), None);
        assert_eq!(agent.days_infected(9.5 * SEC_PER_DAY), Some(3));
    }

    #[test]
    fn view_lists_sorted_problem_names() {
        let params = ParamTable::new();
        let set: BTreeSet<_> = [HealthProblem::Obesity, HealthProblem::Asthma].into_iter().collect();
        let view = Agent::new("z", 40.0, set, &params).view(0.0);
        assert_eq!(view.health_problems, vec!["Asthma".to_string(), "Obesity".to_string()]);
        assert_eq!(view.id, "z");
    }
}

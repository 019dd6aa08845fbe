//! The epidemic engine: owns the population, the simulation clock, the
//! contamination grid and (optionally) the trajectory store, and evolves all
//! of them one tick at a time.

use contagion_common::{
    AgentId, AgentView, GridParams, HeatmapCell, InfectionStage, ParamKey, ParameterStore, Snapshot, StageCounts,
};
use log::{debug, info, trace, warn};
use rand::prelude::*;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::time::Duration;

use crate::agent::Agent;
use crate::contamination::ContaminationGrid;
use crate::error::EngineError;
use crate::loader::{DatasetLoader, LoadState};
use crate::stochastic::{chance, magnify_risk, stage_exit_probability};
use crate::trajectory::TrajectoryStore;

/// Parameters read once at the start of every tick. A store that changes
/// between ticks therefore never affects a tick in progress.
#[derive(Debug, Clone, Copy)]
struct TickParams {
    latency_days: f64,
    asymptomatic_days: f64,
    sickness_days: f64,
    critical_days: f64,
    prob_asymptomatic_infection: f64,
    prob_asymptomatic_recovery: f64,
    prob_sick_becomes_critical: f64,
    prob_critical_mortality: f64,
    reinfection: bool,
    prob_contaminate: f64,
    prob_catch: f64,
}

impl TickParams {
    fn read(params: &dyn ParameterStore) -> Self {
        TickParams {
            latency_days: params.value(ParamKey::MeanInfectionLatencyDuration),
            asymptomatic_days: params.value(ParamKey::MeanInfectionAsymptomaticDuration),
            sickness_days: params.value(ParamKey::MeanInfectionSicknessDuration),
            critical_days: params.value(ParamKey::MeanInfectionCriticalDuration),
            prob_asymptomatic_infection: params.value(ParamKey::ProbAsymptomaticInfection),
            prob_asymptomatic_recovery: params.value(ParamKey::ProbAsymptomaticRecovery),
            prob_sick_becomes_critical: params.value(ParamKey::ProbSickBecomesCritical),
            prob_critical_mortality: params.value(ParamKey::ProbCriticalMortality),
            reinfection: params.flag(ParamKey::BoolReinfection),
            prob_contaminate: params.value(ParamKey::ProbContaminate),
            prob_catch: params.value(ParamKey::ProbCatchFromLocation),
        }
    }

    fn recovered_stage(&self) -> InfectionStage {
        if self.reinfection { InfectionStage::Healthy } else { InfectionStage::Recovered }
    }
}

/// Draws the stage an agent leaves for during a tick of `seconds`, if any.
/// Every branch probability names the bad outcome and is magnified by the
/// agent's complication risk.
fn next_stage<R: Rng>(agent: &Agent, seconds: f64, tick: &TickParams, rng: &mut R) -> Option<InfectionStage> {
    let risk = agent.complication_risk();
    let exits = |rng: &mut R, mean_days: f64| chance(rng, stage_exit_probability(seconds, mean_days));

    match agent.stage() {
        InfectionStage::Healthy | InfectionStage::Dead => None,
        InfectionStage::Recovered => tick.reinfection.then_some(InfectionStage::Healthy),
        InfectionStage::Latent => exits(rng, tick.latency_days).then(|| {
            if chance(rng, magnify_risk(1.0 - tick.prob_asymptomatic_infection, risk)) {
                InfectionStage::Sick
            } else {
                InfectionStage::Asymptomatic
            }
        }),
        InfectionStage::Asymptomatic => exits(rng, tick.asymptomatic_days).then(|| {
            if chance(rng, magnify_risk(1.0 - tick.prob_asymptomatic_recovery, risk)) {
                InfectionStage::Sick
            } else {
                tick.recovered_stage()
            }
        }),
        InfectionStage::Sick => exits(rng, tick.sickness_days).then(|| {
            if chance(rng, magnify_risk(tick.prob_sick_becomes_critical, risk)) {
                InfectionStage::Critical
            } else {
                tick.recovered_stage()
            }
        }),
        InfectionStage::Critical => exits(rng, tick.critical_days).then(|| {
            if chance(rng, magnify_risk(tick.prob_critical_mortality, risk)) {
                InfectionStage::Dead
            } else {
                tick.recovered_stage()
            }
        }),
    }
}

/// Infects an agent. Without a forced stage only a healthy agent is affected
/// and it becomes latent; a forced stage always starts a new episode.
fn infect_agent(agent: &mut Agent, forced: Option<InfectionStage>, now_sim_seconds: f64) -> bool {
    match forced {
        Some(stage) => {
            agent.begin_episode(stage, now_sim_seconds);
            true
        }
        None if agent.stage() == InfectionStage::Healthy => {
            agent.begin_episode(InfectionStage::Latent, now_sim_seconds);
            true
        }
        None => false,
    }
}

/// Collects the collaborators of an [`EpidemicEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    params: Option<Box<dyn ParameterStore>>,
    trajectories: Option<TrajectoryStore>,
    grid: Option<GridParams>,
    seed: u64,
    patient_zero: Option<AgentId>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(mut self, params: impl ParameterStore + 'static) -> Self {
        self.params = Some(Box::new(params));
        self
    }

    pub fn trajectories(mut self, store: TrajectoryStore) -> Self {
        self.trajectories = Some(store);
        self
    }

    /// Contamination grid quantization. Defaults to the trajectory store's.
    pub fn grid(mut self, grid: GridParams) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Agent seeded first by [`EpidemicEngine::infect_patient_zeroes`].
    pub fn patient_zero(mut self, id: impl Into<AgentId>) -> Self {
        self.patient_zero = Some(id.into());
        self
    }

    pub fn build(self) -> Result<EpidemicEngine, EngineError> {
        let params = self.params.ok_or(EngineError::MissingParameterStore)?;
        let grid = self
            .grid
            .or_else(|| self.trajectories.as_ref().map(|s| s.grid_params().clone()))
            .unwrap_or_default();
        Ok(EpidemicEngine {
            params,
            agents: Vec::new(),
            index: HashMap::new(),
            population_generated: false,
            trajectories: self.trajectories,
            contamination: ContaminationGrid::new(grid),
            loader: DatasetLoader::new(),
            total_seconds: 0.0,
            rng: StdRng::seed_from_u64(self.seed),
            patient_zero: self.patient_zero,
        })
    }
}

/// Owns every agent's infection state and the simulation clock.
pub struct EpidemicEngine {
    params: Box<dyn ParameterStore>,
    /// Sorted by id; this is the fixed per-tick iteration order.
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
    population_generated: bool,
    trajectories: Option<TrajectoryStore>,
    contamination: ContaminationGrid,
    loader: DatasetLoader,
    total_seconds: f64,
    rng: StdRng,
    patient_zero: Option<AgentId>,
}

impl EpidemicEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Creates one agent per id, sampling age and health problems.
    pub fn generate_population<I, S>(&mut self, ids: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<AgentId>,
    {
        if self.population_generated {
            return Err(EngineError::PopulationAlreadyGenerated);
        }
        let mut ids: Vec<AgentId> = ids.into_iter().map(Into::into).collect();
        ids.sort();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(EngineError::DuplicateAgent(pair[0].clone()));
        }

        let agents: Vec<Agent> = ids
            .into_iter()
            .map(|id| Agent::sample(id, self.params.as_ref(), &mut self.rng))
            .collect();
        self.index = agents.iter().enumerate().map(|(i, a)| (a.id().to_string(), i)).collect();
        self.agents = agents;
        self.population_generated = true;

        let with_problems = self.agents.iter().filter(|a| !a.health_problems().is_empty()).count();
        info!(
            "Generated population of {} agents ({} with health problems).",
            self.agents.len(),
            with_problems
        );
        Ok(())
    }

    /// Generates one agent per trajectory in the attached store.
    pub fn generate_population_from_trajectories(&mut self) -> Result<(), EngineError> {
        let ids: Vec<AgentId> = self.trajectory_ids().to_vec();
        if ids.is_empty() {
            warn!("No trajectories attached; generating an empty population.");
        }
        self.generate_population(ids)
    }

    pub fn population_generated(&self) -> bool {
        self.population_generated
    }

    fn require_population(&self) -> Result<(), EngineError> {
        if self.population_generated { Ok(()) } else { Err(EngineError::PopulationNotGenerated) }
    }

    fn index_of(&self, id: &str) -> Result<usize, EngineError> {
        self.require_population()?;
        self.index.get(id).copied().ok_or_else(|| EngineError::UnknownAgent(id.to_string()))
    }

    /// Infects an agent at the current simulation time. Returns whether the
    /// agent's state changed.
    pub fn infect(&mut self, id: &str, forced: Option<InfectionStage>) -> Result<bool, EngineError> {
        let i = self.index_of(id)?;
        let changed = infect_agent(&mut self.agents[i], forced, self.total_seconds);
        if changed {
            debug!("Agent {} infected ({}).", id, self.agents[i].stage());
        }
        Ok(changed)
    }

    /// Seeds `NUM_PATIENT_ZEROES` healthy agents as asymptomatic, starting
    /// with the configured patient zero. Returns the seeded ids.
    pub fn infect_patient_zeroes(&mut self) -> Result<Vec<AgentId>, EngineError> {
        self.require_population()?;
        let wanted = self.params.value(ParamKey::NumPatientZeroes).round().max(0.0) as usize;

        let mut chosen: Vec<usize> = Vec::with_capacity(wanted);
        if let Some(id) = &self.patient_zero {
            match self.index.get(id) {
                Some(&i) if self.agents[i].stage().is_infectable() => chosen.push(i),
                Some(_) => debug!("Patient zero {} is not infectable.", id),
                None => warn!("Patient zero {} is not part of the population.", id),
            }
        }
        let mut candidates: Vec<usize> = (0..self.agents.len())
            .filter(|i| self.agents[*i].stage().is_infectable() && !chosen.contains(i))
            .collect();
        candidates.shuffle(&mut self.rng);
        chosen.extend(candidates);
        chosen.truncate(wanted);

        let now = self.total_seconds;
        for &i in &chosen {
            infect_agent(&mut self.agents[i], Some(InfectionStage::Asymptomatic), now);
        }
        if chosen.len() < wanted {
            warn!("Only {} of {} patient zeroes could be seeded.", chosen.len(), wanted);
        }
        let ids: Vec<AgentId> = chosen.iter().map(|&i| self.agents[i].id().to_string()).collect();
        info!("Seeded patient zeroes: {:?}", ids);
        Ok(ids)
    }

    pub fn set_quarantined(&mut self, id: &str, quarantined: bool) -> Result<(), EngineError> {
        let i = self.index_of(id)?;
        self.agents[i].is_quarantined = quarantined;
        Ok(())
    }

    /// Advances the clock by `seconds` and runs one tick: for every agent in
    /// id order, stage progression, then contamination deposit, then pickup.
    pub fn advance(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.require_population()?;
        if self.loader.is_loading() {
            return Err(EngineError::DataLoading);
        }
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EngineError::InvalidAdvance(seconds));
        }

        self.total_seconds += seconds;
        if let Some(store) = self.trajectories.as_mut() {
            store.advance(seconds);
        }

        let tick = TickParams::read(self.params.as_ref());
        let now = self.total_seconds;
        let mut transitions = 0usize;
        let mut pickups = 0usize;

        for agent in self.agents.iter_mut() {
            if let Some(stage) = next_stage(agent, seconds, &tick, &mut self.rng) {
                trace!("Agent {}: {} -> {}", agent.id(), agent.stage(), stage);
                agent.set_stage(stage, now);
                transitions += 1;
            }

            let Some(store) = self.trajectories.as_ref() else {
                continue;
            };
            self.contamination.deposit_from(agent, store, seconds, tick.prob_contaminate, &mut self.rng);
            if let Some(key) = self.contamination.pickup_for(agent, store, seconds, tick.prob_catch, &mut self.rng) {
                if infect_agent(agent, None, now) {
                    trace!("Agent {} caught the disease at cell {:?}.", agent.id(), key);
                    pickups += 1;
                }
            }
        }

        trace!(
            "Tick of {:.1}s done at t={:.1}s: {} transitions, {} pickups, {} contaminated cells.",
            seconds,
            now,
            transitions,
            pickups,
            self.contamination.len()
        );
        Ok(())
    }

    /// Marks the start of an external trajectory load. Ticks are refused
    /// until it completes or is abandoned.
    pub fn begin_trajectory_load(&mut self) -> Result<(), EngineError> {
        self.loader.begin()
    }

    /// Ends the load in flight. On success the store replaces any attached
    /// one and is seeked to the current simulation time; on failure nothing
    /// else changes. Returns whether a store was attached.
    pub fn complete_trajectory_load(&mut self, result: Result<TrajectoryStore, String>) -> Result<bool, EngineError> {
        let Some(mut store) = self.loader.finish(result)? else {
            return Ok(false);
        };
        store.seek(store.start_time() + self.total_seconds);
        if !self.contamination.reset_grid_params(store.grid_params().clone()) {
            debug!("Keeping the grid quantization of the existing contamination cells.");
        }
        info!("Attached {} trajectories.", store.len());
        self.trajectories = Some(store);
        Ok(true)
    }

    pub fn abandon_trajectory_load(&mut self) -> Result<(), EngineError> {
        self.loader.abandon()
    }

    pub fn load_state(&self) -> &LoadState {
        self.loader.state()
    }

    pub fn load_duration(&self) -> Option<Duration> {
        self.loader.load_duration()
    }

    pub fn agent(&self, id: &str) -> Result<&Agent, EngineError> {
        let i = self.index_of(id)?;
        Ok(&self.agents[i])
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Read models of every agent, ordered by id.
    pub fn agent_list(&self) -> Result<Vec<AgentView>, EngineError> {
        self.require_population()?;
        Ok(self.agents.iter().map(|a| a.view(self.total_seconds)).collect())
    }

    pub fn heatmap_snapshot(&self) -> Vec<HeatmapCell> {
        self.contamination.heatmap()
    }

    pub fn stage_counts(&self) -> StageCounts {
        StageCounts::from_stages(self.agents.iter().map(|a| a.stage()))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            total_seconds: self.total_seconds,
            stage_counts: self.stage_counts(),
            heatmap: self.heatmap_snapshot(),
        }
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_seconds
    }

    pub fn contamination(&self) -> &ContaminationGrid {
        &self.contamination
    }

    pub fn trajectories(&self) -> Option<&TrajectoryStore> {
        self.trajectories.as_ref()
    }

    /// Ids of the attached trajectories; empty without a store.
    pub fn trajectory_ids(&self) -> &[AgentId] {
        self.trajectories.as_ref().map(|s| s.ids()).unwrap_or(&[])
    }

    pub fn params(&self) -> &dyn ParameterStore {
        self.params.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::{TrajectoryDataset, TrajectoryOptions, WaypointRecord};
    use contagion_common::{LatLng, ParamTable};
    use std::collections::BTreeMap;

    fn quiet_params() -> ParamTable {
        ParamTable::default()
            .with(ParamKey::MeanInfectionLatencyDuration, 3650.0)
            .with(ParamKey::MeanInfectionAsymptomaticDuration, 3650.0)
            .with(ParamKey::MeanInfectionSicknessDuration, 3650.0)
            .with(ParamKey::MeanInfectionCriticalDuration, 3650.0)
    }

    fn engine_with(params: ParamTable, n: usize, seed: u64) -> EpidemicEngine {
        let mut engine = EngineBuilder::new().params(params).seed(seed).build().unwrap();
        engine.generate_population((0..n).map(|i| format!("{:03}", i))).unwrap();
        engine
    }

    #[test]
    fn builder_requires_params() {
        assert!(matches!(EngineBuilder::new().build(), Err(EngineError::MissingParameterStore)));
    }

    #[test]
    fn preconditions_fail_fast() {
        let mut engine = EngineBuilder::new().params(quiet_params()).build().unwrap();
        assert_eq!(engine.advance(1.0), Err(EngineError::PopulationNotGenerated));
        assert_eq!(engine.infect("000", None), Err(EngineError::PopulationNotGenerated));
        assert_eq!(engine.agent_list().err(), Some(EngineError::PopulationNotGenerated));

        engine.generate_population(["b", "a"]).unwrap();
        assert_eq!(engine.generate_population(["c"]), Err(EngineError::PopulationAlreadyGenerated));
        assert_eq!(engine.infect("zzz", None), Err(EngineError::UnknownAgent("zzz".to_string())));
        assert_eq!(engine.set_quarantined("zzz", true), Err(EngineError::UnknownAgent("zzz".to_string())));
        assert_eq!(engine.advance(-1.0), Err(EngineError::InvalidAdvance(-1.0)));
        assert!(matches!(engine.advance(f64::NAN), Err(EngineError::InvalidAdvance(_))));

        let ids: Vec<_> = engine.agent_list().unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut engine = EngineBuilder::new().params(quiet_params()).build().unwrap();
        assert_eq!(engine.generate_population(["x", "y", "x"]), Err(EngineError::DuplicateAgent("x".to_string())));
        assert!(!engine.population_generated());
    }

    #[test]
    fn infect_is_noop_on_resolved_agents() {
        let mut engine = engine_with(quiet_params(), 3, 1);
        assert!(engine.infect("000", Some(InfectionStage::Recovered)).unwrap());
        assert!(engine.infect("001", Some(InfectionStage::Dead)).unwrap());
        engine.advance(100.0).unwrap();

        for id in ["000", "001"] {
            let before = engine.agent(id).unwrap().clone();
            assert!(!engine.infect(id, None).unwrap());
            let after = engine.agent(id).unwrap();
            assert_eq!(after.stage(), before.stage());
            assert_eq!(after.infected_at_sim_seconds(), before.infected_at_sim_seconds());
        }

        assert!(engine.infect("002", None).unwrap());
        let agent = engine.agent("002").unwrap();
        assert_eq!(agent.stage(), InfectionStage::Latent);
        assert_eq!(agent.infected_at_sim_seconds(), Some(100.0));
        assert_eq!(agent.outcome_at_sim_seconds(), None);
        // Already infected: nothing changes.
        assert!(!engine.infect("002", None).unwrap());
    }

    #[test]
    fn patient_zeroes_prefer_configured_agent() {
        let params = quiet_params().with(ParamKey::NumPatientZeroes, 3.0);
        let mut engine = EngineBuilder::new().params(params).patient_zero("007").seed(9).build().unwrap();
        engine.generate_population((0..20).map(|i| format!("{:03}", i))).unwrap();

        let seeded = engine.infect_patient_zeroes().unwrap();
        assert_eq!(seeded.len(), 3);
        assert_eq!(seeded[0], "007");
        assert_eq!(engine.stage_counts().get(InfectionStage::Asymptomatic), 3);
        assert_eq!(engine.agent("007").unwrap().infected_at_sim_seconds(), Some(0.0));
    }

    #[test]
    fn patient_zeroes_limited_by_population() {
        let params = quiet_params().with(ParamKey::NumPatientZeroes, 5.0);
        let mut engine = engine_with(params, 2, 3);
        assert_eq!(engine.infect_patient_zeroes().unwrap().len(), 2);
        assert!(engine.infect_patient_zeroes().unwrap().is_empty());
    }

    #[test]
    fn recovered_agents_return_to_healthy_with_reinfection() {
        let params = quiet_params().with(ParamKey::BoolReinfection, 1.0);
        let mut engine = engine_with(params, 1, 5);
        engine.infect("000", Some(InfectionStage::Recovered)).unwrap();
        engine.advance(10.0).unwrap();
        let agent = engine.agent("000").unwrap();
        assert_eq!(agent.stage(), InfectionStage::Healthy);
        // The episode's outcome was stamped on recovery and stays.
        assert_eq!(agent.outcome_at_sim_seconds(), Some(0.0));
    }

    #[test]
    fn short_stages_resolve_in_one_tick_each() {
        let params = ParamTable::default()
            .with(ParamKey::MeanInfectionLatencyDuration, 0.0)
            .with(ParamKey::MeanInfectionAsymptomaticDuration, 0.0)
            .with(ParamKey::MeanInfectionSicknessDuration, 0.0)
            .with(ParamKey::MeanInfectionCriticalDuration, 0.0);
        let mut engine = engine_with(params, 1, 11);
        engine.infect("000", None).unwrap();

        let mut ticks = 0;
        while !engine.agent("000").unwrap().stage().is_outcome() {
            engine.advance(60.0).unwrap();
            ticks += 1;
            assert!(ticks <= 4, "an episode resolves within four exits");
        }
        let agent = engine.agent("000").unwrap();
        assert_eq!(agent.outcome_at_sim_seconds(), Some(ticks as f64 * 60.0));
        assert_eq!(agent.days_until_outcome(), Some(0));
    }

    fn shared_cell_store() -> TrajectoryStore {
        let here = LatLng::new(40.0, 116.0);
        let mut trajectories = BTreeMap::new();
        for id in ["a", "b"] {
            trajectories.insert(id.to_string(), vec![WaypointRecord::Span { start: 0.0, end: 100_000.0, location: here }]);
        }
        let dataset = TrajectoryDataset { trajectories, ..Default::default() };
        TrajectoryStore::new(dataset, TrajectoryOptions::default())
    }

    #[test]
    fn contagious_agent_infects_cellmate_through_the_grid() {
        let params = quiet_params()
            .with(ParamKey::ProbContaminate, 1.0)
            .with(ParamKey::ProbCatchFromLocation, 1.0);
        let mut engine = EngineBuilder::new().params(params).trajectories(shared_cell_store()).seed(2).build().unwrap();
        engine.generate_population_from_trajectories().unwrap();
        engine.infect("a", Some(InfectionStage::Asymptomatic)).unwrap();

        // 300 seconds in a single cell makes both draws certain.
        engine.advance(300.0).unwrap();
        assert_eq!(engine.agent("b").unwrap().stage(), InfectionStage::Latent);
        let heatmap = engine.heatmap_snapshot();
        assert_eq!(heatmap.len(), 1);
        assert_eq!(heatmap[0].level, 1);
        assert_eq!(heatmap[0].intensity, 1.0);
    }

    #[test]
    fn quarantine_blocks_both_directions() {
        let params = quiet_params()
            .with(ParamKey::ProbContaminate, 1.0)
            .with(ParamKey::ProbCatchFromLocation, 1.0);
        let mut engine = EngineBuilder::new().params(params).trajectories(shared_cell_store()).build().unwrap();
        engine.generate_population_from_trajectories().unwrap();
        engine.infect("a", Some(InfectionStage::Asymptomatic)).unwrap();
        engine.set_quarantined("a", true).unwrap();
        engine.advance(300.0).unwrap();
        assert!(engine.heatmap_snapshot().is_empty());
        assert_eq!(engine.agent("b").unwrap().stage(), InfectionStage::Healthy);

        engine.set_quarantined("a", false).unwrap();
        engine.set_quarantined("b", true).unwrap();
        engine.advance(300.0).unwrap();
        assert_eq!(engine.heatmap_snapshot().len(), 1);
        assert_eq!(engine.agent("b").unwrap().stage(), InfectionStage::Healthy);
    }

    #[test]
    fn load_lifecycle_gates_ticks() {
        let mut engine = engine_with(quiet_params(), 2, 4);
        engine.advance(50.0).unwrap();

        engine.begin_trajectory_load().unwrap();
        assert_eq!(engine.advance(1.0), Err(EngineError::DataLoading));
        assert_eq!(engine.begin_trajectory_load(), Err(EngineError::DataLoading));

        assert!(!engine.complete_trajectory_load(Err("network down".to_string())).unwrap());
        assert_eq!(engine.load_state(), &LoadState::Failed("network down".to_string()));
        assert!(engine.trajectories().is_none());
        engine.advance(1.0).unwrap();

        engine.begin_trajectory_load().unwrap();
        assert!(engine.complete_trajectory_load(Ok(shared_cell_store())).unwrap());
        assert_eq!(engine.load_state(), &LoadState::Loaded);
        assert!(engine.load_duration().is_some());
        assert_eq!(engine.trajectories().unwrap().seek_unixtime(), 51.0);
        assert_eq!(engine.complete_trajectory_load(Ok(TrajectoryStore::empty())), Err(EngineError::LoadNotInProgress));

        engine.begin_trajectory_load().unwrap();
        engine.abandon_trajectory_load().unwrap();
        assert!(matches!(engine.load_state(), LoadState::Failed(_)));
        assert_eq!(engine.trajectory_ids().len(), 2);
    }

    #[test]
    fn snapshot_bundles_clock_and_counts() {
        let mut engine = engine_with(quiet_params(), 4, 8);
        engine.infect_patient_zeroes().unwrap();
        engine.advance(2.5).unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.total_seconds, 2.5);
        assert_eq!(snapshot.stage_counts.total(), 4);
        assert_eq!(snapshot.stage_counts.get(InfectionStage::Asymptomatic), 1);
        assert!(snapshot.heatmap.is_empty());
    }
}

use contagion_common::AgentId;

/// Failures of the simulation core. All of them indicate a caller bug;
/// missing optional data never produces one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("a parameter store must be set before the population is generated")]
    MissingParameterStore,
    #[error("the population has not been generated yet")]
    PopulationNotGenerated,
    #[error("the population has already been generated")]
    PopulationAlreadyGenerated,
    #[error("unknown agent id '{0}'")]
    UnknownAgent(AgentId),
    #[error("duplicate agent id '{0}'")]
    DuplicateAgent(AgentId),
    #[error("trajectory data is still loading")]
    DataLoading,
    #[error("no trajectory load is in progress")]
    LoadNotInProgress,
    #[error("cannot advance the clock by {0} seconds")]
    InvalidAdvance(f64),
}

//! Population environment interface.
//!
//! The trainer only talks to environments through [`PopulationEnv`]. The
//! [`GridPopulation`] reference environment is provided for demos and tests.
//! Which observation function the trainer uses is decided once, from the
//! configured [`EnvType`].

pub mod config;
pub mod grid;
pub mod types;
pub mod view;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::DdqnError;
use crate::AgentId;

pub use config::GridConfig;
pub use grid::GridPopulation;
pub use types::{ActionMap, Observation, RewardMap, Species, StepOutcome, ViewShape};

/// A simulated predator/prey population driven by per-agent discrete actions.
///
/// # Lifecycle
///
/// 1. [`PopulationEnv::reset`] starts a fresh population.
/// 2. Observations are read with [`PopulationEnv::render`] or [`PopulationEnv::get_obs`].
/// 3. [`PopulationEnv::step`] applies an [`ActionMap`] and hands out rewards.
/// 4. [`PopulationEnv::remove_dead_agents`] purges agents that died.
/// 5. Growth and crossover rules add new agents between steps.
pub trait PopulationEnv {
    /// Starts a new population.
    fn reset(&mut self);

    /// Layout of rendered observations.
    fn view_shape(&self) -> ViewShape;

    /// Number of discrete actions available to every agent.
    fn num_actions(&self) -> usize;

    /// Renders one observation per live agent, in a stable order.
    ///
    /// With `only_view` the observation is the spatial view alone; otherwise the
    /// agent's own attributes are appended.
    fn render(&self, only_view: bool) -> Vec<Observation>;

    /// Alternative observation function. Defaults to [`PopulationEnv::render`].
    fn get_obs(&self, only_view: bool) -> Vec<Observation> {
        self.render(only_view)
    }

    /// Applies one action per agent and advances the simulation one step.
    fn step(&mut self, actions: &ActionMap) -> StepOutcome;

    /// Removes agents that died and returns their identities.
    fn remove_dead_agents(&mut self) -> Vec<AgentId>;

    /// Each live prey reproduces with probability `prob`.
    fn increase_prey(&mut self, prob: f64);

    /// Each live predator reproduces with probability `prob`.
    fn increase_predator(&mut self, prob: f64);

    /// Pairs of prey within `scope` cells produce a child with probability `rate`.
    fn crossover_prey(&mut self, scope: usize, rate: f64);

    /// Pairs of predators within `scope` cells produce a child with probability `rate`.
    fn crossover_predator(&mut self, scope: usize, rate: f64);

    /// Writes a picture of the current state to `path`.
    fn dump_image(&self, path: &Path) -> std::io::Result<()>;

    /// Number of live predators.
    fn num_predators(&self) -> usize;

    /// Number of live prey.
    fn num_preys(&self) -> usize;

    /// Number of live agents.
    fn num_agents(&self) -> usize {
        self.num_predators() + self.num_preys()
    }
}

/// Observation function selected by [`EnvType`].
pub type ObserveFn<E> = fn(&E, bool) -> Vec<Observation>;

/// Environment flavour, parsed from the `env_type` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EnvType {
    /// Plain population dynamics, observed with `render`.
    SimplePopulationDynamics,
    /// Population dynamics with crossover, observed with `get_obs`.
    SimplePopulationDynamicsGa,
}

impl EnvType {
    /// Returns the observation function used for this environment flavour.
    pub fn observer<E: PopulationEnv>(self) -> ObserveFn<E> {
        match self {
            EnvType::SimplePopulationDynamics => E::render,
            EnvType::SimplePopulationDynamicsGa => E::get_obs,
        }
    }

    /// Whether crossover rules run alongside growth.
    pub fn uses_crossover(self) -> bool {
        matches!(self, EnvType::SimplePopulationDynamicsGa)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvType::SimplePopulationDynamics => "simple_population_dynamics",
            EnvType::SimplePopulationDynamicsGa => "simple_population_dynamics_ga",
        }
    }
}

impl FromStr for EnvType {
    type Err = DdqnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple_population_dynamics" => Ok(EnvType::SimplePopulationDynamics),
            "simple_population_dynamics_ga" => Ok(EnvType::SimplePopulationDynamicsGa),
            other => Err(DdqnError::UnknownEnvType(other.to_string())),
        }
    }
}

impl fmt::Display for EnvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How raw observations are fed to the Q-network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ObservationMode {
    /// Agent embedding ++ full observation, fed to an MLP.
    #[default]
    Dense,
    /// Spatial view verbatim, fed to a convolutional network. No embeddings.
    Conv,
}

impl ObservationMode {
    /// Value of the `only_view` flag passed to the observation function.
    pub fn only_view(self) -> bool {
        matches!(self, ObservationMode::Conv)
    }

    /// Whether agent embeddings are concatenated onto observations.
    pub fn uses_embeddings(self) -> bool {
        matches!(self, ObservationMode::Dense)
    }
}

impl FromStr for ObservationMode {
    type Err = DdqnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dense" => Ok(ObservationMode::Dense),
            "conv" => Ok(ObservationMode::Conv),
            other => Err(DdqnError::UnknownObsType(other.to_string())),
        }
    }
}

impl fmt::Display for ObservationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationMode::Dense => write!(f, "dense"),
            ObservationMode::Conv => write!(f, "conv"),
        }
    }
}

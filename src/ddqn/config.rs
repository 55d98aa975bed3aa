//! Training hyperparameters and run options.

use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::env::{EnvType, ObservationMode};
use crate::error::DdqnError;

/// Regression loss between `Q(s, a)` and the Double-Q target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LossKind {
    /// Mean squared error.
    #[default]
    Mse,
    /// Smooth L1 (Huber, β = 1).
    Huber,
}

/// Training hyperparameters for DDQN.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainingConfig {
    // --- Loop ---
    /// Number of episodes to train.
    pub episodes: usize,
    /// Maximum steps per episode.
    pub episode_step: usize,
    /// Steps run by the tester.
    pub test_step: usize,

    // --- Exploration ---
    /// Initial probability of acting greedily.
    pub min_greedy: f64,
    /// Final probability of acting greedily.
    pub max_greedy: f64,
    /// Steps to go from `min_greedy` to `max_greedy`.
    pub greedy_step: u64,

    // --- Learning ---
    /// Target sync cadence; syncs on steps where `i % update_period != 0`.
    pub update_period: usize,
    /// Maximum agents per batch (one optimizer step per batch).
    pub batch_size: usize,
    /// Discount factor γ.
    pub gamma: f64,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Regression loss.
    pub loss: LossKind,
    /// Agent embedding dimension `E`.
    pub agent_emb_dim: usize,
    /// Hidden layer widths of the Q-network.
    pub hidden_dims: Vec<usize>,

    // --- Environment ---
    /// Observation handling: `"dense"` or `"conv"`.
    pub obs_type: String,
    /// Environment flavour, see [`EnvType`].
    pub env_type: String,

    // --- Population rules ---
    /// Growth and crossover run on steps where `i % growth_period == 0`.
    pub growth_period: usize,
    /// Per-prey reproduction probability.
    pub prey_growth: f64,
    /// Per-predator reproduction probability.
    pub predator_growth: f64,
    /// Maximum distance between crossover parents.
    pub crossover_scope: usize,
    /// Per-pair crossover probability.
    pub crossover_rate: f64,
    /// Smallest viable predator or prey count.
    pub min_population: usize,
    /// Largest viable predator or prey count.
    pub max_population: usize,

    // --- Output ---
    /// Root directory for experiments.
    pub output_dir: PathBuf,
    /// Experiment number; outputs go to `<output_dir>/exp_<n>`.
    pub experiment_num: u32,
    /// Name of the tester's output directory.
    pub test_id: String,
    /// Dump an image of the environment every step.
    pub video: bool,
    /// Show a progress bar.
    pub progress: bool,

    /// Seed for network initialisation, embeddings and exploration.
    pub seed: u64,
}

impl TrainingConfig {
    /// Parsed [`TrainingConfig::env_type`].
    pub fn env_type(&self) -> Result<EnvType, DdqnError> {
        self.env_type.parse()
    }

    /// Parsed [`TrainingConfig::obs_type`].
    pub fn observation_mode(&self) -> Result<ObservationMode, DdqnError> {
        self.obs_type.parse()
    }

    /// Checks option ranges and the `env_type`/`obs_type` names.
    pub fn validate(&self) -> Result<(), DdqnError> {
        let invalid = |msg: String| -> Result<(), DdqnError> { Err(DdqnError::InvalidConfig(msg)) };

        self.env_type()?;
        self.observation_mode()?;

        if self.batch_size == 0 {
            return invalid("batch_size must be positive".into());
        }
        if self.update_period == 0 {
            return invalid("update_period must be positive".into());
        }
        if self.growth_period == 0 {
            return invalid("growth_period must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.min_greedy) || !(0.0..=1.0).contains(&self.max_greedy) {
            return invalid(format!(
                "greedy bounds must lie in [0, 1], got [{}, {}]",
                self.min_greedy, self.max_greedy
            ));
        }
        if self.min_greedy > self.max_greedy {
            return invalid(format!(
                "min_greedy {} exceeds max_greedy {}",
                self.min_greedy, self.max_greedy
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid(format!("gamma must lie in [0, 1], got {}", self.gamma));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!(
                "learning_rate must be positive and finite, got {}",
                self.learning_rate
            ));
        }
        if self.min_population > self.max_population {
            return invalid(format!(
                "min_population {} exceeds max_population {}",
                self.min_population, self.max_population
            ));
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            episode_step: 500,
            test_step: 1000,
            min_greedy: 0.3,
            max_greedy: 0.9,
            greedy_step: 10_000,
            update_period: 20,
            batch_size: 64,
            gamma: 0.99,
            learning_rate: 1e-3,
            loss: LossKind::Mse,
            agent_emb_dim: 5,
            hidden_dims: vec![32, 32],
            obs_type: "dense".to_string(),
            env_type: "simple_population_dynamics".to_string(),
            growth_period: 5,
            prey_growth: 0.006,
            predator_growth: 0.003,
            crossover_scope: 3,
            crossover_rate: 0.001,
            min_population: 2,
            max_population: 10_000,
            output_dir: PathBuf::from("results"),
            experiment_num: 0,
            test_id: "test".to_string(),
            video: false,
            progress: true,
            seed: 42,
        }
    }
}

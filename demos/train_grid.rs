//! Train a shared DDQN policy on the grid predator/prey population.
//!
//! ```text
//! cargo run --example train_grid -- --episodes 20 --episode-step 200 --test
//! RUST_LOG=popdyn=debug cargo run --example train_grid
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use popdyn::ddqn::LossKind;
use popdyn::env::{GridConfig, GridPopulation};
use popdyn::{DdqnTester, DdqnTrainer, TrainingConfig};

#[derive(Parser)]
#[command(name = "train_grid")]
#[command(version, about = "DDQN on a predator/prey grid", long_about = None)]
struct Cli {
    /// Number of training episodes
    #[arg(long, default_value = "100")]
    episodes: usize,

    /// Maximum steps per episode
    #[arg(long, default_value = "500")]
    episode_step: usize,

    /// Steps run by the tester
    #[arg(long, default_value = "1000")]
    test_step: usize,

    /// Initial probability of acting greedily
    #[arg(long, default_value = "0.3")]
    min_greedy: f64,

    /// Final probability of acting greedily
    #[arg(long, default_value = "0.9")]
    max_greedy: f64,

    /// Steps to go from min to max greedy probability
    #[arg(long, default_value = "10000")]
    greedy_step: u64,

    /// Discount factor
    #[arg(long, default_value = "0.99")]
    gamma: f64,

    /// Agents per optimizer step
    #[arg(long, default_value = "64")]
    batch_size: usize,

    /// Target network sync cadence
    #[arg(long, default_value = "20")]
    update_period: usize,

    /// Learning rate
    #[arg(long, default_value = "0.001")]
    lr: f64,

    /// Use the Huber loss instead of MSE
    #[arg(long)]
    huber: bool,

    /// Observation handling (dense, conv)
    #[arg(long, default_value = "dense")]
    obs_type: String,

    /// Environment flavour (simple_population_dynamics, simple_population_dynamics_ga)
    #[arg(long, default_value = "simple_population_dynamics")]
    env_type: String,

    /// Grid width and height
    #[arg(long, default_value = "40")]
    size: usize,

    /// Initial predators
    #[arg(long, default_value = "20")]
    predators: usize,

    /// Initial prey
    #[arg(long, default_value = "40")]
    preys: usize,

    /// Output root directory
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    /// Experiment number
    #[arg(long, default_value = "0")]
    experiment: u32,

    /// Dump a frame every step
    #[arg(long)]
    video: bool,

    /// Run the tester on the last checkpoint after training
    #[arg(long)]
    test: bool,

    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let run_test = cli.test;

    let device = if tch::Cuda::is_available() {
        tracing::info!("Using CUDA");
        tch::Device::Cuda(0)
    } else {
        tracing::info!("Using CPU");
        tch::Device::Cpu
    };

    let (grid, config) = cli.into_configs();

    let mut trainer = DdqnTrainer::new(
        GridPopulation::new(grid.clone(), config.seed)?,
        config.clone(),
        device,
    )?;
    let report = trainer.train()?;

    let curve = report.learning_curve();
    if let (Some(first), Some(last)) = (curve.first(), curve.last()) {
        tracing::info!(
            episodes = curve.len(),
            rounds = report.rounds,
            first_reward = first.1,
            last_reward = last.1,
            "Training finished"
        );
    }

    if run_test {
        if let Some(checkpoint) = report.checkpoints().last() {
            let seed = config.seed + 1;
            let mut tester = DdqnTester::new(GridPopulation::new(grid, seed)?, config, device)?;
            tester.load_checkpoint(checkpoint)?;
            let result = tester.run()?;
            tracing::info!(
                steps = result.steps,
                reward = result.total_reward,
                predators = result.final_predators,
                preys = result.final_preys,
                log = %result.log.display(),
                "Test finished"
            );
        }
    }

    Ok(())
}

impl Cli {
    fn into_configs(self) -> (GridConfig, TrainingConfig) {
        let grid = GridConfig {
            width: self.size,
            height: self.size,
            predators: self.predators,
            preys: self.preys,
            ..GridConfig::default()
        };
        let config = TrainingConfig {
            episodes: self.episodes,
            episode_step: self.episode_step,
            test_step: self.test_step,
            min_greedy: self.min_greedy,
            max_greedy: self.max_greedy,
            greedy_step: self.greedy_step,
            gamma: self.gamma,
            batch_size: self.batch_size,
            update_period: self.update_period,
            learning_rate: self.lr,
            loss: if self.huber { LossKind::Huber } else { LossKind::Mse },
            obs_type: self.obs_type,
            env_type: self.env_type,
            output_dir: self.output_dir,
            experiment_num: self.experiment,
            video: self.video,
            seed: self.seed,
            ..TrainingConfig::default()
        };
        (grid, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploration_and_discount_flags_reach_config() {
        let cli = Cli::try_parse_from([
            "train_grid",
            "--min-greedy",
            "0.1",
            "--max-greedy",
            "0.5",
            "--greedy-step",
            "200",
            "--gamma",
            "0.9",
            "--obs-type",
            "conv",
        ])
        .unwrap();
        let (_, config) = cli.into_configs();
        assert_eq!(config.min_greedy, 0.1);
        assert_eq!(config.max_greedy, 0.5);
        assert_eq!(config.greedy_step, 200);
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.obs_type, "conv");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_match_library_defaults() {
        let (grid, config) = Cli::try_parse_from(["train_grid"]).unwrap().into_configs();
        let defaults = TrainingConfig::default();
        assert_eq!(config.min_greedy, defaults.min_greedy);
        assert_eq!(config.max_greedy, defaults.max_greedy);
        assert_eq!(config.greedy_step, defaults.greedy_step);
        assert_eq!(config.gamma, defaults.gamma);
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn zero_size_grid_is_rejected() {
        let (grid, _) = Cli::try_parse_from(["train_grid", "--size", "0"])
            .unwrap()
            .into_configs();
        assert!(GridPopulation::new(grid, 0).is_err());
    }
}

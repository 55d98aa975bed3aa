//! Greedy evaluation of a trained Q-network.

use std::path::Path;

use tch::Device;

use super::batcher::ViewBatcher;
use super::config::TrainingConfig;
use super::embedding::EmbeddingTable;
use super::metrics::TestReport;
use super::network::{QArch, QNetwork};
use super::population::PopulationRules;
use super::selector::ActionSelector;
use super::trainer::dump_frame;
use crate::env::{ActionMap, ObservationMode, ObserveFn, PopulationEnv};
use crate::error::DdqnError;
use crate::output::{ensure_clean_dir, EpisodeLog, LogLine, RunLayout};

/// Runs the population with purely greedy actions and no learning.
pub struct DdqnTester<E: PopulationEnv> {
    env: E,
    config: TrainingConfig,
    network: QNetwork,
    embeddings: EmbeddingTable,
    batcher: ViewBatcher,
    rules: PopulationRules,
    observe: ObserveFn<E>,
    mode: ObservationMode,
    layout: RunLayout,
}

impl<E: PopulationEnv> DdqnTester<E> {
    pub fn new(env: E, config: TrainingConfig, device: Device) -> Result<Self, DdqnError> {
        config.validate()?;
        let env_type = config.env_type()?;
        let mode = config.observation_mode()?;

        tch::manual_seed(config.seed as i64);

        let shape = env.view_shape();
        let arch = QArch::for_observations(mode, shape, config.agent_emb_dim, &config.hidden_dims);

        Ok(Self {
            network: QNetwork::new(&arch, env.num_actions(), device),
            embeddings: EmbeddingTable::new(config.agent_emb_dim),
            batcher: ViewBatcher::new(
                config.batch_size,
                mode,
                shape.dim(mode.only_view()),
                device,
            ),
            rules: PopulationRules::from_config(&config, env_type),
            observe: env_type.observer::<E>(),
            mode,
            layout: RunLayout::new(&config.output_dir, config.experiment_num),
            env,
            config,
        })
    }

    /// Loads network weights saved by the trainer.
    pub fn load_checkpoint(&mut self, path: &Path) -> Result<(), DdqnError> {
        self.network.load(path)?;
        tracing::info!(path = %path.display(), "Loaded checkpoint");
        Ok(())
    }

    /// Resets the environment and runs up to `test_step` greedy steps.
    ///
    /// Stops early once the population leaves the viable range.
    pub fn run(&mut self) -> Result<TestReport, DdqnError> {
        self.env.reset();
        self.embeddings.clear();

        let image_dir = self.layout.test_image_dir(&self.config.test_id);
        let log_dir = self.layout.test_log_dir(&self.config.test_id);
        ensure_clean_dir(&image_dir)?;
        ensure_clean_dir(&log_dir)?;
        let mut log = EpisodeLog::create(log_dir.join("log.txt"))?;

        let only_view = self.mode.only_view();
        let mut total_reward = 0.0;
        let mut steps = 0;
        let mut terminated_early = false;

        for i in 0..self.config.test_step {
            if self.config.video {
                dump_frame(&self.env, &image_dir, i + 1);
            }

            let observations = (self.observe)(&self.env, only_view);
            let batches = self.batcher.batch(&mut self.embeddings, &observations)?;
            let mut actions = ActionMap::with_capacity(observations.len());
            for batch in &batches {
                let picked = ActionSelector::greedy(&self.network, &batch.view)?;
                actions.extend(batch.ids.iter().cloned().zip(picked));
            }

            let outcome = self.env.step(&actions);
            total_reward += f64::from(outcome.total_reward());
            steps += 1;

            log.record(&LogLine {
                episode: None,
                step: i,
                reward: total_reward,
                num_agents: self.env.num_agents(),
                num_preys: self.env.num_preys(),
                num_predators: self.env.num_predators(),
            })?;

            let dead = self.env.remove_dead_agents();
            self.embeddings.remove_all(&dead);
            self.rules.apply(&mut self.env, i);

            if !self.rules.viable(&self.env) {
                tracing::info!(
                    step = i,
                    predators = self.env.num_predators(),
                    preys = self.env.num_preys(),
                    "Population out of bounds, stopping test"
                );
                terminated_early = true;
                break;
            }
        }

        let log_path = log.path().to_path_buf();
        log.close()?;
        tracing::info!(steps, total_reward, "Test complete");

        Ok(TestReport {
            steps,
            total_reward,
            terminated_early,
            final_predators: self.env.num_predators(),
            final_preys: self.env.num_preys(),
            log: log_path,
        })
    }

    pub fn network(&self) -> &QNetwork {
        &self.network
    }

    pub fn env(&self) -> &E {
        &self.env
    }
}

//! DDQN training loop.
//!
//! Every agent of the population is driven by the same online network. One
//! training step observes the population, batches it, selects actions,
//! advances the environment and takes one optimizer step per batch against
//! Double-Q targets.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, nn::OptimizerConfig, Device, Tensor};

use super::batcher::{ViewBatch, ViewBatcher};
use super::config::TrainingConfig;
use super::embedding::EmbeddingTable;
use super::metrics::{EpisodeSummary, StepStats, TrainingReport};
use super::network::{QArch, QNetwork};
use super::population::PopulationRules;
use super::schedule::EpsilonSchedule;
use super::selector::ActionSelector;
use super::target::DoubleQ;
use crate::env::{ActionMap, ObservationMode, ObserveFn, PopulationEnv, RewardMap};
use crate::error::DdqnError;
use crate::output::{ensure_clean_dir, EpisodeLog, LogLine, RunLayout};

/// Whether the target network is synchronised after step `step`.
///
/// Synchronisation happens on steps where `step % update_period != 0`.
pub fn sync_due(step: usize, update_period: usize) -> bool {
    step % update_period != 0
}

/// Writes an environment frame, logging instead of failing.
pub(crate) fn dump_frame<E: PopulationEnv>(env: &E, dir: &Path, t: usize) {
    let path = RunLayout::frame_path(dir, t);
    if let Err(e) = env.dump_image(&path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to write frame");
    }
}

/// Double DQN trainer for a population environment.
pub struct DdqnTrainer<E: PopulationEnv> {
    env: E,
    config: TrainingConfig,
    device: Device,

    online: QNetwork,
    target: QNetwork,
    optimizer: nn::Optimizer,
    double_q: DoubleQ,

    embeddings: EmbeddingTable,
    batcher: ViewBatcher,
    selector: ActionSelector,
    schedule: EpsilonSchedule,
    rules: PopulationRules,

    observe: ObserveFn<E>,
    mode: ObservationMode,
    layout: RunLayout,
    progress: Option<ProgressBar>,

    /// Environment resets so far.
    rounds: usize,
    /// Steps since the last reset.
    timestep: usize,
}

impl<E: PopulationEnv> DdqnTrainer<E> {
    /// Builds the networks, optimizer and helpers for `env`.
    ///
    /// Fails on an invalid config, including unknown `env_type` or `obs_type`.
    pub fn new(env: E, config: TrainingConfig, device: Device) -> Result<Self, DdqnError> {
        config.validate()?;
        let env_type = config.env_type()?;
        let mode = config.observation_mode()?;

        tch::manual_seed(config.seed as i64);

        let shape = env.view_shape();
        let num_actions = env.num_actions();
        let arch = QArch::for_observations(mode, shape, config.agent_emb_dim, &config.hidden_dims);
        let online = QNetwork::new(&arch, num_actions, device);
        let mut target = QNetwork::new(&arch, num_actions, device);
        target.copy_from(&online)?;
        let optimizer = nn::Adam::default().build(online.var_store(), config.learning_rate)?;

        tracing::info!(
            env_type = %env_type,
            obs_type = %mode,
            input_dim = arch.input_dim(),
            num_actions,
            "Created DDQN trainer"
        );

        let progress = if config.progress {
            let total = (config.episodes * config.episode_step) as u64;
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        Ok(Self {
            double_q: DoubleQ::new(config.gamma, config.loss),
            embeddings: EmbeddingTable::new(config.agent_emb_dim),
            batcher: ViewBatcher::new(
                config.batch_size,
                mode,
                shape.dim(mode.only_view()),
                device,
            ),
            selector: ActionSelector::new(num_actions, config.seed),
            schedule: EpsilonSchedule::new(config.min_greedy, config.max_greedy, config.greedy_step),
            rules: PopulationRules::from_config(&config, env_type),
            observe: env_type.observer::<E>(),
            mode,
            layout: RunLayout::new(&config.output_dir, config.experiment_num),
            progress,
            rounds: 0,
            timestep: 0,
            env,
            config,
            device,
            online,
            target,
            optimizer,
        })
    }

    /// Runs every episode, saving a checkpoint after each one.
    ///
    /// The environment is reset before the first episode and before any
    /// episode whose population left the viable range.
    pub fn train(&mut self) -> Result<TrainingReport, DdqnError> {
        ensure_clean_dir(&self.layout.models_dir())?;
        let mut report = TrainingReport::default();

        for episode in 0..self.config.episodes {
            if episode == 0 || !self.rules.viable(&self.env) {
                self.begin_round()?;
            }
            let summary = self.run_episode(episode)?;
            tracing::info!("{summary}");
            report.episodes.push(summary);
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message("Training complete");
        }
        report.rounds = self.rounds;
        Ok(report)
    }

    fn run_episode(&mut self, episode: usize) -> Result<EpisodeSummary, DdqnError> {
        let round = self.round();
        let mut log = EpisodeLog::create(self.layout.episode_log_path(round, episode))?;

        let mut total_reward = 0.0;
        let mut loss_sum = 0.0;
        let mut steps = 0;
        let mut target_syncs = 0;
        let mut terminated_early = false;

        for i in 0..self.config.episode_step {
            let stats = self.step(i)?;
            steps += 1;
            total_reward += stats.reward;
            loss_sum += stats.loss;
            target_syncs += usize::from(stats.synced);

            log.record(&LogLine {
                episode: Some(episode),
                step: i,
                reward: total_reward,
                num_agents: self.env.num_agents(),
                num_preys: self.env.num_preys(),
                num_predators: self.env.num_predators(),
            })?;

            if let Some(pb) = &self.progress {
                pb.inc(1);
                pb.set_message(format!(
                    "episode {episode:03} step {i:03} reward {total_reward:5.3} eps_greedy {:5.3}",
                    stats.epsilon
                ));
            }

            if !self.rules.viable(&self.env) {
                tracing::info!(
                    episode,
                    step = i,
                    predators = self.env.num_predators(),
                    preys = self.env.num_preys(),
                    "Population out of bounds, ending episode"
                );
                terminated_early = true;
                break;
            }
        }

        let log_path = log.path().to_path_buf();
        log.close()?;
        let checkpoint = self.save_checkpoint(episode)?;

        Ok(EpisodeSummary {
            episode,
            round,
            steps,
            total_reward,
            mean_loss: if steps > 0 { loss_sum / steps as f64 } else { 0.0 },
            epsilon: self.schedule.value(),
            terminated_early,
            target_syncs,
            checkpoint,
            log: log_path,
        })
    }

    /// Resets the environment and starts a new round of output directories.
    ///
    /// Embeddings are dropped since a reset replaces every agent.
    pub fn begin_round(&mut self) -> Result<(), DdqnError> {
        self.env.reset();
        self.embeddings.clear();
        ensure_clean_dir(&self.layout.image_dir(self.rounds))?;
        ensure_clean_dir(&self.layout.log_dir(self.rounds))?;
        tracing::info!(
            round = self.rounds,
            predators = self.env.num_predators(),
            preys = self.env.num_preys(),
            "Environment reset"
        );
        self.rounds += 1;
        self.timestep = 0;
        Ok(())
    }

    /// One environment step with learning. `i` is the step index within the episode.
    pub fn step(&mut self, i: usize) -> Result<StepStats, DdqnError> {
        let epsilon = self.schedule.advance();
        if self.config.video {
            dump_frame(&self.env, &self.layout.image_dir(self.round()), self.timestep + 1);
        }

        let only_view = self.mode.only_view();
        let observations = (self.observe)(&self.env, only_view);
        let batches = self.batcher.batch(&mut self.embeddings, &observations)?;

        let mut actions = ActionMap::with_capacity(observations.len());
        let mut chosen = Vec::with_capacity(batches.len());
        for batch in &batches {
            let picked = self.selector.select(&self.online, &batch.view, epsilon)?;
            actions.extend(batch.ids.iter().cloned().zip(picked.iter().copied()));
            chosen.push(picked);
        }

        let outcome = self.env.step(&actions);
        let next = (self.observe)(&self.env, only_view);
        let next_by_id: HashMap<&str, &[f32]> = next
            .iter()
            .map(|(id, obs)| (id.as_str(), obs.as_slice()))
            .collect();

        let mut loss_sum = 0.0;
        for (batch, picked) in batches.iter().zip(&chosen) {
            loss_sum += self.learn(batch, picked, &outcome.rewards, &next_by_id)?;
        }

        let dead = self.env.remove_dead_agents();
        self.embeddings.remove_all(&dead);

        let synced = sync_due(i, self.config.update_period);
        if synced {
            self.target.copy_from(&self.online)?;
        }

        self.rules.apply(&mut self.env, i);
        self.timestep += 1;

        let stats = StepStats {
            epsilon,
            batches: batches.len(),
            agents: observations.len(),
            reward: f64::from(outcome.total_reward()),
            loss: if batches.is_empty() {
                0.0
            } else {
                loss_sum / batches.len() as f64
            },
            deaths: dead.len(),
            synced,
        };
        tracing::debug!(
            step = i,
            agents = stats.agents,
            batches = stats.batches,
            reward = stats.reward,
            loss = stats.loss,
            deaths = stats.deaths,
            "Training step"
        );
        Ok(stats)
    }

    /// One optimizer step on a batch; returns the loss.
    fn learn(
        &mut self,
        batch: &ViewBatch,
        picked: &[usize],
        rewards: &RewardMap,
        next: &HashMap<&str, &[f32]>,
    ) -> Result<f64, DdqnError> {
        let successor = self.batcher.successor(&mut self.embeddings, &batch.ids, next)?;
        let rewards: Vec<f32> = batch
            .ids
            .iter()
            .map(|id| rewards.get(id).copied().unwrap_or(0.0))
            .collect();
        let rewards = Tensor::from_slice(&rewards).to_device(self.device);
        let actions: Vec<i64> = picked.iter().map(|&a| a as i64).collect();
        let actions = Tensor::from_slice(&actions).to_device(self.device);

        let targets = self
            .double_q
            .targets(&self.online, &self.target, &successor, &rewards);
        let loss = self
            .double_q
            .loss(&self.online, &batch.view, &actions, &targets);

        self.optimizer.zero_grad();
        loss.backward();
        self.optimizer.step();

        Ok(f64::try_from(&loss)?)
    }

    /// Saves the online network as `models/model_<episode>.pt`.
    ///
    /// Checkpoints are never overwritten.
    pub fn save_checkpoint(&self, episode: usize) -> Result<PathBuf, DdqnError> {
        let path = self.layout.checkpoint_path(episode);
        if path.exists() {
            return Err(DdqnError::CheckpointExists(path));
        }
        let dir = self.layout.models_dir();
        fs::create_dir_all(&dir).map_err(|e| DdqnError::io(&dir, e))?;
        self.online.save(&path)?;
        tracing::info!(episode, path = %path.display(), "Saved checkpoint");
        Ok(path)
    }

    /// Index of the current round, used for the image and log directories.
    pub fn round(&self) -> usize {
        self.rounds.saturating_sub(1)
    }

    /// Current greedy probability.
    pub fn epsilon(&self) -> f64 {
        self.schedule.value()
    }

    pub fn online(&self) -> &QNetwork {
        &self.online
    }

    pub fn target(&self) -> &QNetwork {
        &self.target
    }

    /// Whether the target network currently equals the online network.
    pub fn targets_in_sync(&self) -> bool {
        self.target.same_parameters(&self.online)
    }

    pub fn embeddings(&self) -> &EmbeddingTable {
        &self.embeddings
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }
}

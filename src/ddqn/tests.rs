//! Scenario tests for the trainer and tester, driven by a scripted environment.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use tch::Device;

use super::*;
use crate::env::{ActionMap, Observation, PopulationEnv, StepOutcome, ViewShape};
use crate::error::DdqnError;
use crate::output::{read_population_history, LogLine};
use crate::AgentId;

/// Deterministic population: fixed agents, optional prey extinction and one newborn.
struct ScriptedEnv {
    initial: (usize, usize),
    predators: Vec<AgentId>,
    preys: Vec<AgentId>,
    dying: Vec<AgentId>,
    resets: usize,
    steps: usize,
    /// All prey die during this step (1-based, counted since the last reset).
    extinction_at: Option<usize>,
    /// A prey called `newborn` appears during this step.
    birth_at: Option<usize>,
    acted: Vec<usize>,
    get_obs_calls: Cell<usize>,
    last_only_view: Cell<Option<bool>>,
}

impl ScriptedEnv {
    fn new(predators: usize, preys: usize) -> Self {
        Self {
            initial: (predators, preys),
            predators: Vec::new(),
            preys: Vec::new(),
            dying: Vec::new(),
            resets: 0,
            steps: 0,
            extinction_at: None,
            birth_at: None,
            acted: Vec::new(),
            get_obs_calls: Cell::new(0),
            last_only_view: Cell::new(None),
        }
    }

    fn observe(&self, only_view: bool) -> Vec<Observation> {
        self.last_only_view.set(Some(only_view));
        let dim = self.view_shape().dim(only_view);
        self.predators
            .iter()
            .chain(&self.preys)
            .enumerate()
            .map(|(k, id)| (id.clone(), vec![0.1 * k as f32; dim]))
            .collect()
    }
}

impl PopulationEnv for ScriptedEnv {
    fn reset(&mut self) {
        let round = self.resets;
        self.predators = (0..self.initial.0)
            .map(|k| format!("r{round}-predator-{k}"))
            .collect();
        self.preys = (0..self.initial.1)
            .map(|k| format!("r{round}-prey-{k}"))
            .collect();
        self.dying.clear();
        self.resets += 1;
        self.steps = 0;
    }

    fn view_shape(&self) -> ViewShape {
        ViewShape {
            channels: 1,
            side: 2,
            extra: 1,
        }
    }

    fn num_actions(&self) -> usize {
        3
    }

    fn render(&self, only_view: bool) -> Vec<Observation> {
        self.observe(only_view)
    }

    fn get_obs(&self, only_view: bool) -> Vec<Observation> {
        self.get_obs_calls.set(self.get_obs_calls.get() + 1);
        self.observe(only_view)
    }

    fn step(&mut self, actions: &ActionMap) -> StepOutcome {
        self.steps += 1;
        self.acted.push(actions.len());
        let mut outcome = StepOutcome::default();
        for id in actions.keys() {
            outcome.rewards.insert(id.clone(), 0.1);
        }
        if self.extinction_at == Some(self.steps) {
            outcome.killed = std::mem::take(&mut self.preys);
            self.dying.extend(outcome.killed.iter().cloned());
        }
        if self.birth_at == Some(self.steps) {
            self.preys.push("newborn".to_string());
        }
        outcome
    }

    fn remove_dead_agents(&mut self) -> Vec<AgentId> {
        std::mem::take(&mut self.dying)
    }

    fn increase_prey(&mut self, _prob: f64) {}

    fn increase_predator(&mut self, _prob: f64) {}

    fn crossover_prey(&mut self, _scope: usize, _rate: f64) {}

    fn crossover_predator(&mut self, _scope: usize, _rate: f64) {}

    fn dump_image(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, format!("step {}", self.steps))
    }

    fn num_predators(&self) -> usize {
        self.predators.len()
    }

    fn num_preys(&self) -> usize {
        self.preys.len()
    }
}

fn config(dir: &Path) -> TrainingConfig {
    TrainingConfig {
        episodes: 2,
        episode_step: 5,
        test_step: 4,
        update_period: 2,
        batch_size: 2,
        agent_emb_dim: 3,
        hidden_dims: vec![8],
        prey_growth: 0.0,
        predator_growth: 0.0,
        output_dir: dir.to_path_buf(),
        progress: false,
        ..TrainingConfig::default()
    }
}

fn trainer(env: ScriptedEnv, cfg: TrainingConfig) -> DdqnTrainer<ScriptedEnv> {
    DdqnTrainer::new(env, cfg, Device::Cpu).unwrap()
}

#[test]
fn trains_two_episodes_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = trainer(ScriptedEnv::new(3, 3), config(tmp.path()));

    let report = t.train().unwrap();

    assert_eq!(report.episodes.len(), 2);
    assert_eq!(report.rounds, 1);
    assert_eq!(t.env().resets, 1);
    for (episode, summary) in report.episodes.iter().enumerate() {
        assert_eq!(summary.steps, 5);
        assert!(!summary.terminated_early);
        assert!(summary.checkpoint.is_file());
        assert_eq!(summary.checkpoint, t.layout().checkpoint_path(episode));
        assert!(summary.mean_loss.is_finite());

        let history = read_population_history(&summary.log).unwrap();
        assert_eq!(history, vec![(3, 3); 5]);
    }
    // Steps 1 and 3 of each episode sync the target network.
    assert_eq!(report.episodes[0].target_syncs, 2);
    assert!((report.episodes[1].total_reward - 3.0).abs() < 1e-4);
    assert!(t.layout().episode_log_path(0, 1).is_file());
}

#[test]
fn every_agent_acts_in_bounded_chunks() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = trainer(ScriptedEnv::new(3, 2), config(tmp.path()));
    t.begin_round().unwrap();

    let stats = t.step(0).unwrap();
    assert_eq!(stats.agents, 5);
    assert_eq!(stats.batches, 3);
    assert_eq!(t.env().acted, vec![5]);
    assert!((stats.reward - 0.5).abs() < 1e-6);
    assert_eq!(t.embeddings().len(), 5);
}

#[test]
fn target_syncs_when_step_is_not_a_multiple_of_period() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = trainer(ScriptedEnv::new(3, 3), config(tmp.path()));
    assert!(t.targets_in_sync());
    t.begin_round().unwrap();

    assert!(!t.step(0).unwrap().synced);
    assert!(!t.targets_in_sync());
    assert!(t.step(1).unwrap().synced);
    assert!(t.targets_in_sync());
    assert!(!t.step(2).unwrap().synced);
    assert!(!t.targets_in_sync());
}

#[test]
fn prey_extinction_ends_episode_and_resets() {
    let tmp = tempfile::tempdir().unwrap();
    let mut env = ScriptedEnv::new(3, 3);
    env.extinction_at = Some(3);
    let mut t = trainer(env, config(tmp.path()));

    let report = t.train().unwrap();

    assert_eq!(report.rounds, 2);
    assert_eq!(t.env().resets, 2);
    let first = &report.episodes[0];
    assert!(first.terminated_early);
    assert_eq!(first.steps, 3);
    assert_eq!(first.round, 0);
    let history = read_population_history(&first.log).unwrap();
    assert_eq!(history, vec![(3, 3), (3, 3), (0, 3)]);

    let second = &report.episodes[1];
    assert_eq!(second.round, 1);
    assert_eq!(second.log, t.layout().episode_log_path(1, 1));
    assert!(second.checkpoint.is_file());
}

#[test]
fn dead_agents_lose_their_embeddings() {
    let tmp = tempfile::tempdir().unwrap();
    let mut env = ScriptedEnv::new(3, 3);
    env.extinction_at = Some(1);
    let mut t = trainer(env, config(tmp.path()));
    t.begin_round().unwrap();

    let stats = t.step(0).unwrap();
    assert_eq!(stats.deaths, 3);
    assert_eq!(t.embeddings().len(), 3);
    assert!(!t.embeddings().contains("r0-prey-0"));
    assert!(t.embeddings().contains("r0-predator-0"));
}

#[test]
fn newborn_gets_embedding_when_first_observed() {
    let tmp = tempfile::tempdir().unwrap();
    let mut env = ScriptedEnv::new(2, 2);
    env.birth_at = Some(1);
    let mut t = trainer(env, config(tmp.path()));
    t.begin_round().unwrap();

    t.step(0).unwrap();
    assert!(!t.embeddings().contains("newborn"));
    assert_eq!(t.embeddings().len(), 4);

    let stats = t.step(1).unwrap();
    assert_eq!(stats.agents, 5);
    assert!(t.embeddings().contains("newborn"));
}

#[test]
fn reset_clears_embeddings() {
    let tmp = tempfile::tempdir().unwrap();
    let mut t = trainer(ScriptedEnv::new(2, 2), config(tmp.path()));
    t.begin_round().unwrap();
    t.step(0).unwrap();
    assert_eq!(t.embeddings().len(), 4);

    t.begin_round().unwrap();
    assert!(t.embeddings().is_empty());
    assert_eq!(t.round(), 1);
}

#[test]
fn epsilon_climbs_every_step() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainingConfig {
        min_greedy: 0.2,
        max_greedy: 0.6,
        greedy_step: 4,
        ..config(tmp.path())
    };
    let mut t = trainer(ScriptedEnv::new(2, 2), cfg);
    t.begin_round().unwrap();

    assert!((t.step(0).unwrap().epsilon - 0.3).abs() < 1e-9);
    for i in 1..6 {
        t.step(i).unwrap();
    }
    assert!((t.epsilon() - 0.6).abs() < 1e-9);
}

#[test]
fn ga_flavour_observes_with_get_obs() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainingConfig {
        env_type: "simple_population_dynamics_ga".to_string(),
        ..config(tmp.path())
    };
    let mut t = trainer(ScriptedEnv::new(2, 2), cfg);
    t.begin_round().unwrap();
    t.step(0).unwrap();
    assert_eq!(t.env().get_obs_calls.get(), 2);
}

#[test]
fn conv_mode_feeds_views_without_embeddings() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainingConfig {
        obs_type: "conv".to_string(),
        ..config(tmp.path())
    };
    let mut t = trainer(ScriptedEnv::new(2, 2), cfg);
    assert_eq!(t.online().arch().input_dim(), 4);
    t.begin_round().unwrap();

    let stats = t.step(0).unwrap();
    assert!(stats.loss.is_finite());
    assert_eq!(t.env().last_only_view.get(), Some(true));
    assert_eq!(t.env().get_obs_calls.get(), 0);
    assert!(t.embeddings().is_empty());
}

#[test]
fn video_writes_one_frame_per_step() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainingConfig {
        video: true,
        ..config(tmp.path())
    };
    let mut t = trainer(ScriptedEnv::new(2, 2), cfg);
    t.begin_round().unwrap();
    t.step(0).unwrap();
    t.step(1).unwrap();

    let frames = t.layout().image_dir(0);
    assert_eq!(fs::read_to_string(frames.join("1.ppm")).unwrap(), "step 0");
    assert_eq!(fs::read_to_string(frames.join("2.ppm")).unwrap(), "step 1");
}

#[test]
fn checkpoints_are_write_once() {
    let tmp = tempfile::tempdir().unwrap();
    let t = trainer(ScriptedEnv::new(2, 2), config(tmp.path()));

    let path = t.save_checkpoint(0).unwrap();
    assert!(path.is_file());
    assert!(matches!(
        t.save_checkpoint(0),
        Err(DdqnError::CheckpointExists(p)) if p == path
    ));
}

#[test]
fn unknown_env_type_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainingConfig {
        env_type: "battle".to_string(),
        ..config(tmp.path())
    };
    let err = DdqnTrainer::new(ScriptedEnv::new(2, 2), cfg, Device::Cpu).err();
    assert!(matches!(err, Some(DdqnError::UnknownEnvType(name)) if name == "battle"));
}

#[test]
fn unknown_obs_type_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainingConfig {
        obs_type: "pixels".to_string(),
        ..config(tmp.path())
    };
    let err = DdqnTester::new(ScriptedEnv::new(2, 2), cfg, Device::Cpu).err();
    assert!(matches!(err, Some(DdqnError::UnknownObsType(_))));
}

#[test]
fn tester_replays_checkpoint_greedily() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = TrainingConfig {
        episodes: 1,
        ..config(tmp.path())
    };
    let mut t = trainer(ScriptedEnv::new(2, 3), cfg.clone());
    let report = t.train().unwrap();

    let mut tester = DdqnTester::new(ScriptedEnv::new(2, 3), cfg, Device::Cpu).unwrap();
    assert!(!tester.network().same_parameters(t.online()));
    tester.load_checkpoint(&report.episodes[0].checkpoint).unwrap();
    assert!(tester.network().same_parameters(t.online()));

    let result = tester.run().unwrap();
    assert_eq!(result.steps, 4);
    assert!(!result.terminated_early);
    assert_eq!((result.final_predators, result.final_preys), (2, 3));
    assert_eq!(tester.env().acted, vec![5; 4]);

    let text = fs::read_to_string(&result.log).unwrap();
    let first = LogLine::parse(text.lines().next().unwrap()).unwrap();
    assert_eq!(first.episode, None);
    assert_eq!(read_population_history(&result.log).unwrap().len(), 4);
}

#[test]
fn tester_stops_when_population_collapses() {
    let tmp = tempfile::tempdir().unwrap();
    let mut env = ScriptedEnv::new(2, 3);
    env.extinction_at = Some(2);
    let mut tester = DdqnTester::new(env, config(tmp.path()), Device::Cpu).unwrap();

    let result = tester.run().unwrap();
    assert_eq!(result.steps, 2);
    assert!(result.terminated_early);
    assert_eq!(result.final_preys, 0);
}

//! Step, episode and run summaries returned by the trainer and tester.

use std::fmt;
use std::path::PathBuf;

/// What happened during one training step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepStats {
    /// Greedy probability used for this step.
    pub epsilon: f64,
    /// Number of chunks (and optimizer steps).
    pub batches: usize,
    /// Agents that acted.
    pub agents: usize,
    /// Sum of rewards handed out by the environment.
    pub reward: f64,
    /// Mean loss over the chunks, 0 when no agent acted.
    pub loss: f64,
    /// Agents removed after the transition.
    pub deaths: usize,
    /// Whether the target network was synchronised after this step.
    pub synced: bool,
}

/// Summary of one training episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    /// Environment round (number of resets so far) this episode ran in.
    pub round: usize,
    pub steps: usize,
    pub total_reward: f64,
    pub mean_loss: f64,
    /// Greedy probability at the end of the episode.
    pub epsilon: f64,
    /// Stopped before `episode_step` because the population left its bounds.
    pub terminated_early: bool,
    pub target_syncs: usize,
    pub checkpoint: PathBuf,
    pub log: PathBuf,
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "episode {:03} round {} steps {} reward {:.3} loss {:.4} eps_greedy {:.3}{}",
            self.episode,
            self.round,
            self.steps,
            self.total_reward,
            self.mean_loss,
            self.epsilon,
            if self.terminated_early {
                " (population out of bounds)"
            } else {
                ""
            }
        )
    }
}

/// Result of [`super::DdqnTrainer::train`].
#[derive(Debug, Clone, Default)]
pub struct TrainingReport {
    pub episodes: Vec<EpisodeSummary>,
    /// Number of environment resets.
    pub rounds: usize,
}

impl TrainingReport {
    /// `(episode, total_reward)` pairs, in order.
    pub fn learning_curve(&self) -> Vec<(usize, f64)> {
        self.episodes
            .iter()
            .map(|e| (e.episode, e.total_reward))
            .collect()
    }

    pub fn checkpoints(&self) -> Vec<PathBuf> {
        self.episodes.iter().map(|e| e.checkpoint.clone()).collect()
    }
}

/// Result of [`super::DdqnTester::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub steps: usize,
    pub total_reward: f64,
    pub terminated_early: bool,
    pub final_predators: usize,
    pub final_preys: usize,
    pub log: PathBuf,
}

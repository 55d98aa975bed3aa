//! Double Deep Q-Learning over a fluctuating population of agents.
//!
//! The [`DdqnTrainer`] drives every live agent with one shared
//! [`QNetwork`]: observations are batched with per-agent embeddings,
//! actions are chosen ε-greedily, and each batch takes one Adam step
//! against Double-Q targets. The [`DdqnTester`] replays a checkpoint
//! greedily without learning.

pub mod batcher;
pub mod config;
pub mod embedding;
pub mod metrics;
pub mod network;
pub mod population;
pub mod schedule;
pub mod selector;
pub mod target;
pub mod tester;
pub mod trainer;

#[cfg(test)]
mod tests;

pub use batcher::{SuccessorBatch, ViewBatch, ViewBatcher};
pub use config::{LossKind, TrainingConfig};
pub use embedding::EmbeddingTable;
pub use metrics::{EpisodeSummary, StepStats, TestReport, TrainingReport};
pub use network::{QArch, QNetwork};
pub use population::PopulationRules;
pub use schedule::EpsilonSchedule;
pub use selector::ActionSelector;
pub use target::DoubleQ;
pub use tester::DdqnTester;
pub use trainer::{sync_due, DdqnTrainer};

//! popdyn - Double Deep Q-Learning for predator/prey population dynamics
//!
//! One shared Q-network controls every agent of a fluctuating population.
//! Agents are batched into fixed-shape tensors together with a per-agent
//! random embedding, acted on epsilon-greedily, and trained with Double-Q
//! targets against a periodically synchronized target network.

pub mod ddqn;
pub mod env;
pub mod error;
pub mod output;

pub use ddqn::{DdqnTester, DdqnTrainer, TrainingConfig};
pub use env::{EnvType, ObservationMode, PopulationEnv};
pub use error::DdqnError;

/// Identifier type used for agents.
pub type AgentId = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> AgentId {
    uuid::Uuid::new_v4().to_string()
}

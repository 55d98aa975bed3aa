//! Core types shared between the trainer and population environments.

use std::collections::HashMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::AgentId;

/// One agent's raw observation, in the order the environment produced it.
pub type Observation = (AgentId, Vec<f32>);

/// Discrete action chosen for each agent during a step.
pub type ActionMap = HashMap<AgentId, usize>;

/// Scalar reward produced for each agent during a step.
pub type RewardMap = HashMap<AgentId, f32>;

/// Population an agent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Species {
    Predator,
    Prey,
}

impl Species {
    /// Index of this species' channel in a rendered view (0=Predator, 1=Prey).
    pub fn index(&self) -> usize {
        match self {
            Species::Predator => 0,
            Species::Prey => 1,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Species::Predator => write!(f, "predator"),
            Species::Prey => write!(f, "prey"),
        }
    }
}

/// Layout of a rendered observation.
///
/// The spatial part holds `channels × side × side` values in channel-major
/// order. Dense observations append `extra` per-agent attributes after it;
/// view-only observations stop at the spatial part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewShape {
    pub channels: usize,
    pub side: usize,
    pub extra: usize,
}

impl ViewShape {
    /// Number of values in the spatial part.
    pub fn spatial_dim(&self) -> usize {
        self.channels * self.side * self.side
    }

    /// Observation dimension `D` for the given rendering mode.
    pub fn dim(&self, only_view: bool) -> usize {
        if only_view {
            self.spatial_dim()
        } else {
            self.spatial_dim() + self.extra
        }
    }
}

/// Result of one environment transition.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Reward per agent; agents absent from the map count as reward 0.
    pub rewards: RewardMap,
    /// Agents that died during this transition.
    pub killed: Vec<AgentId>,
}

impl StepOutcome {
    /// Sum of all rewards handed out in this transition.
    pub fn total_reward(&self) -> f32 {
        self.rewards.values().sum()
    }
}

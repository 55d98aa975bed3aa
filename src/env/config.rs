//! Configuration for the grid population environment.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::DdqnError;

/// Configuration for [`super::GridPopulation`].
///
/// Controls grid geometry, initial population, observation window and
/// reward values.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridConfig {
    // --- Geometry ---
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,

    // --- Initial population ---
    /// Predators placed on reset.
    pub predators: usize,
    /// Prey placed on reset.
    pub preys: usize,

    // --- Observation ---
    /// Radius r of the square `(2r+1)²` view window around each agent.
    pub view_radius: usize,

    // --- Dynamics ---
    /// Health a predator starts with and is restored to after eating.
    pub predator_health: u32,
    /// Chebyshev distance within which a predator catches a prey.
    pub catch_radius: usize,

    // --- Rewards ---
    /// Reward for a predator that ate this step.
    pub hunt_reward: f32,
    /// Reward for a prey that was eaten.
    pub eaten_penalty: f32,
    /// Reward for a predator that starved.
    pub starve_penalty: f32,
    /// Reward for a prey that survived the step.
    pub survive_reward: f32,
}

impl GridConfig {
    /// Number of view channels: predator counts, prey counts, out-of-bounds mask.
    pub const VIEW_CHANNELS: usize = 3;

    /// Number of per-agent attributes: `[is_predator, health_fraction]`.
    pub const AGENT_FEATURE_DIM: usize = 2;

    /// Number of actions: up, down, left, right.
    pub const NUM_ACTIONS: usize = 4;

    /// Side length of the view window.
    pub fn view_side(&self) -> usize {
        2 * self.view_radius + 1
    }

    /// Checks geometry, radii and rewards.
    pub fn validate(&self) -> Result<(), DdqnError> {
        let invalid = |msg: String| -> Result<(), DdqnError> { Err(DdqnError::InvalidConfig(msg)) };

        if self.width == 0 || self.height == 0 {
            return invalid(format!(
                "grid must be non-empty, got {}x{}",
                self.width, self.height
            ));
        }
        let extent = self.width.max(self.height);
        if self.view_radius > extent {
            return invalid(format!(
                "view_radius {} exceeds grid extent {extent}",
                self.view_radius
            ));
        }
        if self.catch_radius > extent {
            return invalid(format!(
                "catch_radius {} exceeds grid extent {extent}",
                self.catch_radius
            ));
        }
        if self.predator_health == 0 {
            return invalid("predator_health must be positive".into());
        }
        let rewards = [
            self.hunt_reward,
            self.eaten_penalty,
            self.starve_penalty,
            self.survive_reward,
        ];
        if rewards.iter().any(|r| !r.is_finite()) {
            return invalid("rewards must be finite".into());
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 40,
            predators: 20,
            preys: 40,
            view_radius: 3,
            predator_health: 30,
            catch_radius: 1,
            hunt_reward: 1.0,
            eaten_penalty: -1.0,
            starve_penalty: -1.0,
            survive_reward: 0.01,
        }
    }
}

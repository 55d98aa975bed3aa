//! Observation rendering for the grid environment.
//!
//! Builds per-agent observation vectors from an occupancy grid: the local
//! window around the agent plus, in dense mode, the agent's own attributes.

use super::config::GridConfig;
use super::grid::Creature;
use super::types::{Observation, Species};

/// Per-cell predator and prey counts for the whole grid.
pub struct Occupancy {
    width: usize,
    height: usize,
    counts: Vec<[u32; 2]>,
}

impl Occupancy {
    /// Counts live creatures per cell.
    pub fn build(creatures: &[Creature], config: &GridConfig) -> Self {
        let mut counts = vec![[0u32; 2]; config.width * config.height];
        for c in creatures.iter().filter(|c| c.alive) {
            counts[c.y * config.width + c.x][c.species.index()] += 1;
        }
        Self {
            width: config.width,
            height: config.height,
            counts,
        }
    }

    /// Counts at `(x, y)`, or `None` outside the grid.
    pub fn at(&self, x: i64, y: i64) -> Option<[u32; 2]> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.counts[y as usize * self.width + x as usize])
    }
}

/// Builds observation vectors for creatures.
pub struct ViewRenderer;

impl ViewRenderer {
    /// Builds the observation vector for one creature.
    ///
    /// Layout:
    /// ```text
    /// [predators(side²)] ++ [prey(side²)] ++ [out_of_bounds(side²)] ++ [is_predator, health]
    /// ```
    /// The trailing attributes are omitted when `only_view` is set.
    pub fn render(
        creature: &Creature,
        occupancy: &Occupancy,
        config: &GridConfig,
        only_view: bool,
    ) -> Vec<f32> {
        let side = config.view_side();
        let r = config.view_radius as i64;
        let plane = side * side;
        let mut obs = vec![0.0f32; GridConfig::VIEW_CHANNELS * plane];

        for dy in -r..=r {
            for dx in -r..=r {
                let cell = ((dy + r) as usize) * side + (dx + r) as usize;
                match occupancy.at(creature.x as i64 + dx, creature.y as i64 + dy) {
                    Some([predators, preys]) => {
                        obs[cell] = predators as f32;
                        obs[plane + cell] = preys as f32;
                    }
                    None => obs[2 * plane + cell] = 1.0,
                }
            }
        }

        if !only_view {
            let is_predator = matches!(creature.species, Species::Predator);
            obs.push(if is_predator { 1.0 } else { 0.0 });
            obs.push(creature.health as f32 / config.predator_health.max(1) as f32);
        }
        obs
    }

    /// Builds observations for all live creatures, in storage order.
    pub fn render_all(
        creatures: &[Creature],
        config: &GridConfig,
        only_view: bool,
    ) -> Vec<Observation> {
        let occupancy = Occupancy::build(creatures, config);
        creatures
            .iter()
            .filter(|c| c.alive)
            .map(|c| (c.id.clone(), Self::render(c, &occupancy, config, only_view)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> GridConfig {
        GridConfig {
            width: 5,
            height: 5,
            view_radius: 1,
            ..GridConfig::default()
        }
    }

    fn creature(id: &str, species: Species, x: usize, y: usize) -> Creature {
        Creature {
            id: id.into(),
            species,
            x,
            y,
            health: 10,
            alive: true,
        }
    }

    #[test]
    fn render_counts_neighbours() {
        let config = small_config();
        let creatures = vec![
            creature("wolf", Species::Predator, 2, 2),
            creature("hare", Species::Prey, 3, 2),
        ];
        let occupancy = Occupancy::build(&creatures, &config);
        let obs = ViewRenderer::render(&creatures[0], &occupancy, &config, true);

        assert_eq!(obs.len(), 27);
        // Centre cell of the predator plane holds the wolf itself.
        assert_eq!(obs[4], 1.0);
        // Prey plane, cell (dx=+1, dy=0).
        assert_eq!(obs[9 + 5], 1.0);
        // No out-of-bounds cells in the middle of the grid.
        assert!(obs[18..27].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn render_marks_out_of_bounds() {
        let config = small_config();
        let creatures = vec![creature("hare", Species::Prey, 0, 0)];
        let occupancy = Occupancy::build(&creatures, &config);
        let obs = ViewRenderer::render(&creatures[0], &occupancy, &config, false);

        assert_eq!(obs.len(), 29);
        let bounds = &obs[18..27];
        // Top row and left column of the window are outside the grid.
        assert_eq!(bounds.iter().filter(|&&v| v == 1.0).count(), 5);
        assert_eq!(obs[27], 0.0);
    }

    #[test]
    fn render_all_skips_dead() {
        let config = small_config();
        let mut dead = creature("gone", Species::Prey, 1, 1);
        dead.alive = false;
        let creatures = vec![creature("wolf", Species::Predator, 2, 2), dead];
        let all = ViewRenderer::render_all(&creatures, &config, false);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "wolf");
    }
}

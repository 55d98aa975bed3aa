//! Grid predator/prey environment.
//!
//! Implements the simulation loop: move → hunt → starve → reward. Growth
//! and crossover are applied by the caller between steps.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::GridConfig;
use super::types::{ActionMap, Observation, Species, StepOutcome, ViewShape};
use super::view::ViewRenderer;
use super::PopulationEnv;
use crate::error::DdqnError;
use crate::{generate_id, AgentId};

/// State of a single agent on the grid.
#[derive(Debug, Clone)]
pub struct Creature {
    /// Unique identifier for this agent.
    pub id: AgentId,
    /// Predator or prey.
    pub species: Species,
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Remaining steps before a predator starves. Unused for prey.
    pub health: u32,
    /// False once the agent died; it stays stored until removed.
    pub alive: bool,
}

impl Creature {
    fn chebyshev(&self, other: &Creature) -> usize {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Moves one cell in the direction of `action`, clamped to the grid.
    ///
    /// - 0: up, 1: down, 2: left, 3: right. Anything else holds position.
    fn apply(&mut self, action: usize, config: &GridConfig) {
        match action {
            0 => self.y = self.y.saturating_sub(1),
            1 => self.y = (self.y + 1).min(config.height - 1),
            2 => self.x = self.x.saturating_sub(1),
            3 => self.x = (self.x + 1).min(config.width - 1),
            _ => {}
        }
    }
}

/// A predator/prey population on a bounded grid.
///
/// # Lifecycle
///
/// 1. Call [`GridPopulation::new`] with configuration and seed.
/// 2. Call [`PopulationEnv::reset`] to place the initial population.
/// 3. Repeatedly render, [`PopulationEnv::step`] and remove dead agents.
#[derive(Debug)]
pub struct GridPopulation {
    /// Environment configuration.
    pub config: GridConfig,
    /// Every stored agent, dead ones included until removed.
    pub creatures: Vec<Creature>,
    /// Steps since the last reset.
    pub t: u32,
    rng: StdRng,
    seed: u64,
    resets: u64,
}

impl GridPopulation {
    /// Creates a new environment. Call [`PopulationEnv::reset`] before use.
    ///
    /// Fails with [`DdqnError::InvalidConfig`] when `config` does not validate.
    pub fn new(config: GridConfig, seed: u64) -> Result<Self, DdqnError> {
        config.validate()?;
        Ok(Self {
            config,
            creatures: Vec::new(),
            t: 0,
            rng: StdRng::seed_from_u64(seed),
            seed,
            resets: 0,
        })
    }

    /// Number of resets performed so far.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Looks up a stored agent by identity.
    pub fn creature(&self, id: &str) -> Option<&Creature> {
        self.creatures.iter().find(|c| c.id == id)
    }

    /// Places a new agent and returns its identity.
    pub fn spawn(&mut self, species: Species, x: usize, y: usize) -> AgentId {
        let id = generate_id();
        self.creatures.push(Creature {
            id: id.clone(),
            species,
            x: x.min(self.config.width - 1),
            y: y.min(self.config.height - 1),
            health: self.config.predator_health,
            alive: true,
        });
        id
    }

    fn count(&self, species: Species) -> usize {
        self.creatures
            .iter()
            .filter(|c| c.alive && c.species == species)
            .count()
    }

    fn random_cell(&mut self) -> (usize, usize) {
        (
            self.rng.gen_range(0..self.config.width),
            self.rng.gen_range(0..self.config.height),
        )
    }

    fn neighbour_cell(&mut self, x: usize, y: usize) -> (usize, usize) {
        let dx = self.rng.gen_range(-1i64..=1);
        let dy = self.rng.gen_range(-1i64..=1);
        let nx = (x as i64 + dx).clamp(0, self.config.width as i64 - 1);
        let ny = (y as i64 + dy).clamp(0, self.config.height as i64 - 1);
        (nx as usize, ny as usize)
    }

    fn grow(&mut self, species: Species, prob: f64) {
        let prob = prob.clamp(0.0, 1.0);
        let parents: Vec<(usize, usize)> = self
            .creatures
            .iter()
            .filter(|c| c.alive && c.species == species)
            .map(|c| (c.x, c.y))
            .collect();
        for (x, y) in parents {
            if self.rng.gen_bool(prob) {
                let (nx, ny) = self.neighbour_cell(x, y);
                self.spawn(species, nx, ny);
            }
        }
    }

    fn crossover(&mut self, species: Species, scope: usize, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        let parents: Vec<usize> = (0..self.creatures.len())
            .filter(|&i| self.creatures[i].alive && self.creatures[i].species == species)
            .collect();
        let mut used = HashSet::new();
        let mut children = Vec::new();

        for (a, &i) in parents.iter().enumerate() {
            if used.contains(&i) {
                continue;
            }
            for &j in &parents[a + 1..] {
                if used.contains(&j) {
                    continue;
                }
                let (pi, pj) = (&self.creatures[i], &self.creatures[j]);
                if pi.chebyshev(pj) <= scope && self.rng.gen_bool(rate) {
                    children.push(((pi.x + pj.x) / 2, (pi.y + pj.y) / 2));
                    used.insert(i);
                    used.insert(j);
                    break;
                }
            }
        }

        for (x, y) in children {
            self.spawn(species, x, y);
        }
    }
}

impl PopulationEnv for GridPopulation {
    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.resets));
        self.resets += 1;
        self.t = 0;
        self.creatures.clear();

        for _ in 0..self.config.predators {
            let (x, y) = self.random_cell();
            self.spawn(Species::Predator, x, y);
        }
        for _ in 0..self.config.preys {
            let (x, y) = self.random_cell();
            self.spawn(Species::Prey, x, y);
        }
    }

    fn view_shape(&self) -> ViewShape {
        ViewShape {
            channels: GridConfig::VIEW_CHANNELS,
            side: self.config.view_side(),
            extra: GridConfig::AGENT_FEATURE_DIM,
        }
    }

    fn num_actions(&self) -> usize {
        GridConfig::NUM_ACTIONS
    }

    fn render(&self, only_view: bool) -> Vec<Observation> {
        ViewRenderer::render_all(&self.creatures, &self.config, only_view)
    }

    fn step(&mut self, actions: &ActionMap) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        // 1. Move. Agents without an action hold position.
        for c in self.creatures.iter_mut().filter(|c| c.alive) {
            if let Some(&action) = actions.get(&c.id) {
                c.apply(action, &self.config);
            }
            outcome.rewards.insert(c.id.clone(), 0.0);
        }

        // 2. Hunt: each predator eats at most one prey within reach.
        let n = self.creatures.len();
        let mut fed = vec![false; n];
        for p in 0..n {
            if !self.creatures[p].alive || self.creatures[p].species != Species::Predator {
                continue;
            }
            let victim = (0..n).find(|&q| {
                let prey = &self.creatures[q];
                prey.alive
                    && prey.species == Species::Prey
                    && self.creatures[p].chebyshev(prey) <= self.config.catch_radius
            });
            if let Some(q) = victim {
                self.creatures[q].alive = false;
                fed[p] = true;
                let prey_id = self.creatures[q].id.clone();
                outcome.rewards.insert(prey_id.clone(), self.config.eaten_penalty);
                outcome.killed.push(prey_id);

                let predator = &mut self.creatures[p];
                predator.health = self.config.predator_health;
                outcome
                    .rewards
                    .insert(predator.id.clone(), self.config.hunt_reward);
            }
        }

        // 3. Starve and 4. reward survivors.
        for (c, was_fed) in self.creatures.iter_mut().zip(fed) {
            if !c.alive {
                continue;
            }
            match c.species {
                Species::Predator if !was_fed => {
                    c.health = c.health.saturating_sub(1);
                    if c.health == 0 {
                        c.alive = false;
                        outcome
                            .rewards
                            .insert(c.id.clone(), self.config.starve_penalty);
                        outcome.killed.push(c.id.clone());
                    }
                }
                Species::Prey => {
                    outcome
                        .rewards
                        .insert(c.id.clone(), self.config.survive_reward);
                }
                Species::Predator => {}
            }
        }

        self.t += 1;
        outcome
    }

    fn remove_dead_agents(&mut self) -> Vec<AgentId> {
        let mut dead = Vec::new();
        self.creatures.retain(|c| {
            if !c.alive {
                dead.push(c.id.clone());
            }
            c.alive
        });
        dead
    }

    fn increase_prey(&mut self, prob: f64) {
        self.grow(Species::Prey, prob);
    }

    fn increase_predator(&mut self, prob: f64) {
        self.grow(Species::Predator, prob);
    }

    fn crossover_prey(&mut self, scope: usize, rate: f64) {
        self.crossover(Species::Prey, scope, rate);
    }

    fn crossover_predator(&mut self, scope: usize, rate: f64) {
        self.crossover(Species::Predator, scope, rate);
    }

    /// Writes a binary PPM: prey green, predators red, both yellow.
    fn dump_image(&self, path: &Path) -> std::io::Result<()> {
        const SCALE: usize = 4;
        let (w, h) = (self.config.width, self.config.height);
        let mut cells = vec![[0u8; 3]; w * h];
        for c in self.creatures.iter().filter(|c| c.alive) {
            let px = &mut cells[c.y * w + c.x];
            match c.species {
                Species::Predator => px[0] = 255,
                Species::Prey => px[1] = 255,
            }
        }

        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", w * SCALE, h * SCALE)?;
        for y in 0..h * SCALE {
            for x in 0..w * SCALE {
                out.write_all(&cells[(y / SCALE) * w + x / SCALE])?;
            }
        }
        out.flush()
    }

    fn num_predators(&self) -> usize {
        self.count(Species::Predator)
    }

    fn num_preys(&self) -> usize {
        self.count(Species::Prey)
    }
}

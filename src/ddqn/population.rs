//! Population growth cadence and viability bounds.

use super::config::TrainingConfig;
use crate::env::{EnvType, PopulationEnv};

/// Environment-side population rules applied between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRules {
    pub growth_period: usize,
    pub prey_growth: f64,
    pub predator_growth: f64,
    /// `Some((scope, rate))` when the environment flavour uses crossover.
    pub crossover: Option<(usize, f64)>,
    pub min_population: usize,
    pub max_population: usize,
}

impl PopulationRules {
    pub fn from_config(config: &TrainingConfig, env_type: EnvType) -> Self {
        Self {
            growth_period: config.growth_period.max(1),
            prey_growth: config.prey_growth,
            predator_growth: config.predator_growth,
            crossover: env_type
                .uses_crossover()
                .then_some((config.crossover_scope, config.crossover_rate)),
            min_population: config.min_population,
            max_population: config.max_population,
        }
    }

    /// Applies growth (and crossover) on steps where `step % growth_period == 0`.
    ///
    /// Returns true when the rules ran.
    pub fn apply<E: PopulationEnv + ?Sized>(&self, env: &mut E, step: usize) -> bool {
        if step % self.growth_period != 0 {
            return false;
        }
        env.increase_prey(self.prey_growth);
        env.increase_predator(self.predator_growth);
        if let Some((scope, rate)) = self.crossover {
            env.crossover_prey(scope, rate);
            env.crossover_predator(scope, rate);
        }
        true
    }

    /// Both predator and prey counts lie within `[min_population, max_population]`.
    pub fn viable<E: PopulationEnv + ?Sized>(&self, env: &E) -> bool {
        let range = self.min_population..=self.max_population;
        range.contains(&env.num_predators()) && range.contains(&env.num_preys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{GridConfig, GridPopulation, Species};

    fn env(predators: usize, preys: usize) -> GridPopulation {
        let mut env = GridPopulation::new(
            GridConfig {
                predators,
                preys,
                ..GridConfig::default()
            },
            5,
        )
        .unwrap();
        env.reset();
        env
    }

    fn rules(env_type: EnvType) -> PopulationRules {
        PopulationRules::from_config(&TrainingConfig::default(), env_type)
    }

    #[test]
    fn viability_bounds_are_inclusive() {
        let r = rules(EnvType::SimplePopulationDynamics);
        assert!(r.viable(&env(2, 2)));
        assert!(!r.viable(&env(1, 5)));
        assert!(!r.viable(&env(5, 0)));

        let tight = PopulationRules {
            max_population: 4,
            ..r
        };
        assert!(tight.viable(&env(4, 4)));
        assert!(!tight.viable(&env(3, 5)));
    }

    #[test]
    fn growth_runs_on_period() {
        let r = PopulationRules {
            prey_growth: 1.0,
            predator_growth: 0.0,
            ..rules(EnvType::SimplePopulationDynamics)
        };
        let mut e = env(2, 3);
        assert!(!r.apply(&mut e, 3));
        assert_eq!(e.num_preys(), 3);
        assert!(r.apply(&mut e, 0));
        assert_eq!(e.num_preys(), 6);
        assert!(r.apply(&mut e, 5));
        assert_eq!(e.num_preys(), 12);
        assert_eq!(e.num_predators(), 2);
    }

    #[test]
    fn crossover_only_for_ga() {
        assert!(rules(EnvType::SimplePopulationDynamics).crossover.is_none());
        let ga = PopulationRules {
            prey_growth: 0.0,
            predator_growth: 0.0,
            crossover: Some((1, 1.0)),
            ..rules(EnvType::SimplePopulationDynamicsGa)
        };
        let mut e = env(0, 0);
        e.spawn(Species::Prey, 3, 3);
        e.spawn(Species::Prey, 3, 4);
        ga.apply(&mut e, 0);
        assert_eq!(e.num_preys(), 3);
    }
}

//! Epsilon-greedy action selection over batched Q-values.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tch::Tensor;

use super::network::QNetwork;
use crate::error::DdqnError;

/// Chooses one action per row of a batched observation tensor.
///
/// With probability `ε` the whole chunk acts greedily on the network's
/// Q-values; otherwise every row draws an independent uniform action.
/// A higher `ε` therefore means more exploitation.
pub struct ActionSelector {
    num_actions: usize,
    rng: StdRng,
}

impl ActionSelector {
    /// Creates a selector over `[0, num_actions)`.
    pub fn new(num_actions: usize, seed: u64) -> Self {
        Self {
            num_actions,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Epsilon-greedy selection for one chunk.
    pub fn select(
        &mut self,
        q: &QNetwork,
        view: &Tensor,
        epsilon: f64,
    ) -> Result<Vec<usize>, DdqnError> {
        if self.rng.gen::<f64>() < epsilon {
            Self::greedy(q, view)
        } else {
            let rows = view.size().first().copied().unwrap_or(0) as usize;
            Ok(self.random(rows))
        }
    }

    /// `argmax_a Q(s, a)` per row.
    pub fn greedy(q: &QNetwork, view: &Tensor) -> Result<Vec<usize>, DdqnError> {
        let best = tch::no_grad(|| q.forward(view).argmax(-1, false));
        let best: Vec<i64> = Vec::try_from(&best)?;
        Ok(best.into_iter().map(|a| a as usize).collect())
    }

    /// Uniform random action per row.
    pub fn random(&mut self, rows: usize) -> Vec<usize> {
        (0..rows)
            .map(|_| self.rng.gen_range(0..self.num_actions))
            .collect()
    }
}

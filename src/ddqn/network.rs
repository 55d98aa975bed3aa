//! Q-network using tch-rs (PyTorch bindings).
//!
//! Provides the shared action-value network used both as the online network
//! and, through [`QNetwork::copy_from`], as its delayed target copy.

use std::path::Path;

use tch::{nn, nn::Module, Device, Tensor};

use crate::env::{ObservationMode, ViewShape};
use crate::error::DdqnError;

/// Network architecture, chosen from the observation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QArch {
    /// `input_dim → hidden… → num_actions` with ReLU activations.
    Mlp { input_dim: usize, hidden: Vec<usize> },
    /// `[channels, side, side] → conv3x3(16) → conv3x3(32) → hidden… → num_actions`.
    Conv {
        channels: usize,
        side: usize,
        hidden: Vec<usize>,
    },
}

impl QArch {
    /// Architecture matching the environment's observations.
    ///
    /// Dense mode sees `embedding ++ observation`; conv mode sees the spatial view only.
    pub fn for_observations(
        mode: ObservationMode,
        shape: ViewShape,
        emb_dim: usize,
        hidden: &[usize],
    ) -> Self {
        match mode {
            ObservationMode::Dense => QArch::Mlp {
                input_dim: emb_dim + shape.dim(false),
                hidden: hidden.to_vec(),
            },
            ObservationMode::Conv => QArch::Conv {
                channels: shape.channels,
                side: shape.side,
                hidden: hidden.to_vec(),
            },
        }
    }

    /// Width of a flat input row.
    pub fn input_dim(&self) -> usize {
        match self {
            QArch::Mlp { input_dim, .. } => *input_dim,
            QArch::Conv { channels, side, .. } => channels * side * side,
        }
    }
}

/// Action-value network `Q: observation → [num_actions]`.
pub struct QNetwork {
    vs: nn::VarStore,
    net: nn::Sequential,
    arch: QArch,
    num_actions: usize,
}

impl QNetwork {
    /// Creates a freshly initialised network.
    pub fn new(arch: &QArch, num_actions: usize, device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let p = &vs.root();

        let (mut net, mut width) = match arch {
            QArch::Mlp { input_dim, .. } => (nn::seq(), *input_dim as i64),
            QArch::Conv { channels, side, .. } => {
                let (c, s) = (*channels as i64, *side as i64);
                let conv = nn::ConvConfig {
                    padding: 1,
                    ..Default::default()
                };
                let seq = nn::seq()
                    .add_fn(move |x| x.view([-1, c, s, s]))
                    .add(nn::conv2d(p / "c1", c, 16, 3, conv))
                    .add_fn(|x| x.relu())
                    .add(nn::conv2d(p / "c2", 16, 32, 3, conv))
                    .add_fn(|x| x.relu())
                    .add_fn(|x| x.flat_view());
                (seq, 32 * s * s)
            }
        };

        let hidden = match arch {
            QArch::Mlp { hidden, .. } | QArch::Conv { hidden, .. } => hidden,
        };
        for (i, &h) in hidden.iter().enumerate() {
            net = net
                .add(nn::linear(
                    p / format!("l{}", i + 1),
                    width,
                    h as i64,
                    Default::default(),
                ))
                .add_fn(|x| x.relu());
            width = h as i64;
        }
        net = net.add(nn::linear(
            p / "out",
            width,
            num_actions as i64,
            Default::default(),
        ));

        Self {
            vs,
            net,
            arch: arch.clone(),
            num_actions,
        }
    }

    /// Forward pass: `[n, input_dim] → [n, num_actions]`.
    pub fn forward(&self, obs: &Tensor) -> Tensor {
        self.net.forward(obs)
    }

    pub fn arch(&self) -> &QArch {
        &self.arch
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    /// Overwrites this network's parameters with `other`'s.
    pub fn copy_from(&mut self, other: &QNetwork) -> Result<(), DdqnError> {
        self.vs.copy(&other.vs)?;
        Ok(())
    }

    /// Returns true when every parameter equals the matching one in `other`.
    pub fn same_parameters(&self, other: &QNetwork) -> bool {
        let mine = self.vs.variables();
        let theirs = other.vs.variables();
        mine.len() == theirs.len()
            && mine
                .iter()
                .all(|(name, t)| theirs.get(name).is_some_and(|o| t.equal(o)))
    }

    /// Saves the parameters to `path`.
    pub fn save(&self, path: &Path) -> Result<(), DdqnError> {
        self.vs.save(path)?;
        Ok(())
    }

    /// Loads parameters from a file written by [`QNetwork::save`].
    pub fn load(&mut self, path: &Path) -> Result<(), DdqnError> {
        self.vs.load(path)?;
        Ok(())
    }

    /// Returns a reference to the variable store for optimization.
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Returns a mutable reference to the variable store.
    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}

//! Double-Q target construction and TD loss.

use tch::{Kind, Reduction, Tensor};

use super::batcher::SuccessorBatch;
use super::config::LossKind;
use super::network::QNetwork;

/// Builds Double DQN targets and the regression loss against them.
///
/// The online network picks the next action and the target network scores
/// it: `y = r + γ · alive · Q_target(s', argmax_a Q_online(s', a))`.
#[derive(Debug, Clone, Copy)]
pub struct DoubleQ {
    pub gamma: f64,
    pub loss: LossKind,
}

impl DoubleQ {
    pub fn new(gamma: f64, loss: LossKind) -> Self {
        Self { gamma, loss }
    }

    /// Bootstrapped targets, shape `[n]`, detached from the graph.
    pub fn targets(
        &self,
        online: &QNetwork,
        target: &QNetwork,
        successor: &SuccessorBatch,
        rewards: &Tensor,
    ) -> Tensor {
        tch::no_grad(|| {
            let best = online.forward(&successor.view).argmax(-1, false);
            let next_q = target
                .forward(&successor.view)
                .gather(1, &best.unsqueeze(-1), false)
                .squeeze_dim(-1);
            let bootstrap = (next_q * &successor.alive) * self.gamma;
            (rewards.to_kind(Kind::Float) + bootstrap).detach()
        })
    }

    /// Loss between `Q_online(s, a)` for the taken actions and `targets`.
    pub fn loss(
        &self,
        online: &QNetwork,
        view: &Tensor,
        actions: &Tensor,
        targets: &Tensor,
    ) -> Tensor {
        let taken = online
            .forward(view)
            .gather(1, &actions.unsqueeze(-1), false)
            .squeeze_dim(-1);
        match self.loss {
            LossKind::Mse => taken.mse_loss(targets, Reduction::Mean),
            LossKind::Huber => taken.smooth_l1_loss(targets, Reduction::Mean, 1.0),
        }
    }
}

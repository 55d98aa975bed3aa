//! Batching of agent observations into fixed-width tensors.

use std::collections::HashMap;

use tch::{Device, Kind, Tensor};

use super::embedding::EmbeddingTable;
use crate::env::{Observation, ObservationMode};
use crate::error::DdqnError;
use crate::AgentId;

/// One chunk of agents, stacked into a single tensor.
///
/// `ids[k]` is the agent whose features occupy row `k` of `view`.
#[derive(Debug)]
pub struct ViewBatch {
    pub ids: Vec<AgentId>,
    /// Shape `[n, E + D]` in dense mode, `[n, D]` in conv mode.
    pub view: Tensor,
}

impl ViewBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Post-transition rows for the agents of one [`ViewBatch`].
#[derive(Debug)]
pub struct SuccessorBatch {
    /// Shape matches the originating batch; rows of dead agents are zero.
    pub view: Tensor,
    /// `1.0` where the agent is still alive, `0.0` where it died.
    pub alive: Tensor,
}

/// Splits observations into chunks of at most `batch_size` agents.
#[derive(Debug, Clone)]
pub struct ViewBatcher {
    batch_size: usize,
    mode: ObservationMode,
    obs_dim: usize,
    device: Device,
}

impl ViewBatcher {
    /// Creates a batcher for observations of dimension `obs_dim`.
    pub fn new(batch_size: usize, mode: ObservationMode, obs_dim: usize, device: Device) -> Self {
        Self {
            batch_size: batch_size.max(1),
            mode,
            obs_dim,
            device,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Width of a batched row: `E + D` with embeddings, `D` otherwise.
    pub fn row_dim(&self, table: &EmbeddingTable) -> usize {
        if self.mode.uses_embeddings() {
            table.dim() + self.obs_dim
        } else {
            self.obs_dim
        }
    }

    /// Batches `observations` in input order.
    ///
    /// Embeddings are created for identities seen for the first time. The
    /// last chunk may be smaller than `batch_size`; no chunk is empty.
    pub fn batch(
        &self,
        table: &mut EmbeddingTable,
        observations: &[Observation],
    ) -> Result<Vec<ViewBatch>, DdqnError> {
        let row_dim = self.row_dim(table);
        observations
            .chunks(self.batch_size)
            .map(|chunk| {
                let mut flat = Vec::with_capacity(chunk.len() * row_dim);
                let mut ids = Vec::with_capacity(chunk.len());
                for (id, obs) in chunk {
                    self.check_dim(id, obs)?;
                    if self.mode.uses_embeddings() {
                        flat.extend_from_slice(table.get_or_create(id)?);
                    }
                    flat.extend_from_slice(obs);
                    ids.push(id.clone());
                }
                Ok(ViewBatch {
                    view: self.stack(&flat, ids.len(), row_dim),
                    ids,
                })
            })
            .collect()
    }

    /// Builds the post-transition rows for `ids`, matched by identity.
    ///
    /// Agents missing from `next` died during the transition: their row is
    /// zero and their `alive` flag is `0.0`.
    pub fn successor(
        &self,
        table: &mut EmbeddingTable,
        ids: &[AgentId],
        next: &HashMap<&str, &[f32]>,
    ) -> Result<SuccessorBatch, DdqnError> {
        let row_dim = self.row_dim(table);
        let mut flat = Vec::with_capacity(ids.len() * row_dim);
        let mut alive = Vec::with_capacity(ids.len());

        for id in ids {
            match next.get(id.as_str()) {
                Some(obs) => {
                    self.check_dim(id, obs)?;
                    if self.mode.uses_embeddings() {
                        flat.extend_from_slice(table.get_or_create(id)?);
                    }
                    flat.extend_from_slice(obs);
                    alive.push(1.0f32);
                }
                None => {
                    flat.resize(flat.len() + row_dim, 0.0);
                    alive.push(0.0);
                }
            }
        }

        Ok(SuccessorBatch {
            view: self.stack(&flat, ids.len(), row_dim),
            alive: Tensor::from_slice(&alive).to_device(self.device),
        })
    }

    fn check_dim(&self, id: &str, obs: &[f32]) -> Result<(), DdqnError> {
        if obs.len() != self.obs_dim {
            return Err(DdqnError::ObservationDim {
                id: id.to_string(),
                expected: self.obs_dim,
                got: obs.len(),
            });
        }
        Ok(())
    }

    fn stack(&self, flat: &[f32], rows: usize, row_dim: usize) -> Tensor {
        Tensor::from_slice(flat)
            .reshape([rows as i64, row_dim as i64])
            .to_kind(Kind::Float)
            .to_device(self.device)
    }
}

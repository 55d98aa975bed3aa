//! Per-agent random embeddings.

use std::collections::HashMap;

use tch::{Device, Kind, Tensor};

use crate::error::DdqnError;
use crate::AgentId;

/// Fixed random feature vector per live agent identity.
///
/// Entries are drawn from an isotropic standard normal the first time an
/// identity is seen and removed when the agent dies. They are never trained,
/// so two lookups of the same identity always return the same vector.
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    dim: usize,
    entries: HashMap<AgentId, Vec<f32>>,
}

impl EmbeddingTable {
    /// Creates an empty table of `dim`-dimensional embeddings.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: HashMap::new(),
        }
    }

    /// Embedding dimension `E`.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the embedding for `id`, sampling and storing a new one on first sight.
    pub fn get_or_create(&mut self, id: &str) -> Result<&[f32], DdqnError> {
        if !self.entries.contains_key(id) {
            let sample = Tensor::randn([self.dim as i64], (Kind::Float, Device::Cpu));
            let values = Vec::<f32>::try_from(&sample)?;
            self.entries.insert(id.to_string(), values);
        }
        Ok(self.entries[id].as_slice())
    }

    /// Returns the embedding for `id` if one exists.
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Removes the embeddings of the given identities.
    ///
    /// Identities without an entry are ignored. Returns how many entries were removed.
    pub fn remove_all<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter(|id| self.entries.remove(id.as_ref()).is_some())
            .count()
    }

    /// Drops every entry (used when the environment starts a new population).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut table = EmbeddingTable::new(5);
        let first = table.get_or_create("wolf-1").unwrap().to_vec();
        let second = table.get_or_create("wolf-1").unwrap().to_vec();
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_ids_get_distinct_vectors() {
        let mut table = EmbeddingTable::new(8);
        let a = table.get_or_create("a").unwrap().to_vec();
        let b = table.get_or_create("b").unwrap().to_vec();
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn remove_all_keeps_survivors() {
        let mut table = EmbeddingTable::new(4);
        for id in ["a", "b", "c"] {
            table.get_or_create(id).unwrap();
        }
        let survivor = table.get("b").unwrap().to_vec();

        let removed = table.remove_all(["a", "c"]);
        assert_eq!(removed, 2);
        assert!(!table.contains("a"));
        assert!(!table.contains("c"));
        assert_eq!(table.get("b").unwrap(), survivor.as_slice());
    }

    #[test]
    fn remove_all_ignores_missing() {
        let mut table = EmbeddingTable::new(4);
        table.get_or_create("a").unwrap();
        assert_eq!(table.remove_all(vec!["a".to_string()]), 1);
        assert_eq!(table.remove_all(vec!["a".to_string(), "ghost".to_string()]), 0);
        assert!(table.is_empty());
    }
}

//! Pairwise similarity over the stored embeddings.
//!
//! Keeps a dense pairwise matrix that is rebuilt lazily: mutations mark
//! the affected ids dirty and the next read recomputes only those rows
//! and columns. Iteration order is insertion order so results are
//! stable across runs.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::embedding::{dot, Embedding};

#[derive(Default)]
pub struct SimilarityIndex {
    embeddings: HashMap<Uuid, Embedding>,
    order: Vec<Uuid>,
    slot: HashMap<Uuid, usize>,
    matrix: Vec<Vec<f64>>,
    dirty: HashSet<Uuid>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert or replace an embedding. Only this id's rows go stale.
    pub fn insert(&mut self, id: Uuid, embedding: Embedding) {
        if !self.slot.contains_key(&id) {
            self.slot.insert(id, self.order.len());
            self.order.push(id);
            let n = self.order.len();
            for row in &mut self.matrix {
                row.push(0.0);
            }
            self.matrix.push(vec![0.0; n]);
        }
        self.embeddings.insert(id, embedding);
        self.dirty.insert(id);
    }

    pub fn remove(&mut self, id: Uuid) {
        let Some(idx) = self.slot.remove(&id) else {
            return;
        };
        self.embeddings.remove(&id);
        self.dirty.remove(&id);
        self.order.remove(idx);
        self.matrix.remove(idx);
        for row in &mut self.matrix {
            row.remove(idx);
        }
        for (i, other) in self.order.iter().enumerate() {
            self.slot.insert(*other, i);
        }
    }

    /// Similarity between two ids, or 0.0 when either embedding is
    /// missing. A known id compared against itself is 1.0.
    pub fn similarity(&mut self, a: Uuid, b: Uuid) -> f64 {
        self.refresh();
        match (self.slot.get(&a), self.slot.get(&b)) {
            (Some(&i), Some(&j)) => self.matrix[i][j],
            _ => 0.0,
        }
    }

    /// The `k` most similar ids to `id`, best first. Ties keep
    /// insertion order. The id itself is excluded.
    pub fn top_similar(&mut self, id: Uuid, k: usize) -> Vec<(Uuid, f64)> {
        self.refresh();
        let Some(&i) = self.slot.get(&id) else {
            return Vec::new();
        };
        let mut scored: Vec<(Uuid, f64)> = self
            .order
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, other)| (*other, self.matrix[i][j]))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// Every unordered pair with its similarity, in insertion order.
    pub fn all_pairs(&mut self) -> Vec<(Uuid, Uuid, f64)> {
        self.refresh();
        let mut pairs = Vec::new();
        for i in 0..self.order.len() {
            for j in (i + 1)..self.order.len() {
                pairs.push((self.order[i], self.order[j], self.matrix[i][j]));
            }
        }
        pairs
    }

    fn refresh(&mut self) {
        if self.dirty.is_empty() {
            return;
        }
        let dirty: Vec<usize> = self
            .dirty
            .drain()
            .filter_map(|id| self.slot.get(&id).copied())
            .collect();
        for &i in &dirty {
            let a = &self.embeddings[&self.order[i]];
            for j in 0..self.order.len() {
                let score = if i == j {
                    1.0
                } else {
                    dot(a, &self.embeddings[&self.order[j]])
                };
                self.matrix[i][j] = score;
                self.matrix[j][i] = score;
            }
        }
    }
}

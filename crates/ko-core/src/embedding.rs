//! Text embeddings: model seam, mean pooling, and L2 normalization.
//!
//! The transformer itself lives behind [`EncoderModel`] so the heavy
//! runtime stays out of this crate. Everything after the model's
//! hidden states (pooling, normalization, similarity) is pure math
//! and lives here.

use std::fmt;

use crate::constants::{EMBEDDING_DIM, EPSILON};
use crate::tokenizer::{encode, Encoding, Vocabulary};

/// A pooled, L2-normalized sentence embedding.
pub type Embedding = Vec<f32>;

#[derive(Debug)]
pub enum EmbeddingError {
    /// The model backend failed to produce hidden states.
    Model(String),
    /// The model returned vectors of the wrong width.
    DimensionMismatch { expected: usize, got: usize },
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model(msg) => write!(f, "model error: {msg}"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "expected {expected}-dim hidden states, got {got}")
            }
        }
    }
}

impl std::error::Error for EmbeddingError {}

/// The seam to a transformer backend. Takes a fixed-length encoding
/// and returns one hidden-state vector per sequence position.
pub trait EncoderModel {
    fn hidden_states(&self, encoding: &Encoding) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Tokenizes, runs the model, and pools the result.
pub struct Embedder<M: EncoderModel> {
    vocab: Vocabulary,
    model: M,
}

impl<M: EncoderModel> Embedder<M> {
    pub fn new(vocab: Vocabulary, model: M) -> Self {
        Self { vocab, model }
    }

    pub fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let encoding = encode(&self.vocab, text);
        let hidden = self.model.hidden_states(&encoding)?;
        for row in &hidden {
            if row.len() != EMBEDDING_DIM {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: EMBEDDING_DIM,
                    got: row.len(),
                });
            }
        }
        Ok(mean_pool(&hidden, &encoding.attention_mask))
    }
}

/// Average the hidden states over unmasked positions, then normalize
/// to unit length. A fully masked sequence pools to the zero vector.
pub fn mean_pool(hidden: &[Vec<f32>], attention_mask: &[i64]) -> Embedding {
    let mut pooled = vec![0.0f32; EMBEDDING_DIM];
    let mut count = 0u32;
    for (row, mask) in hidden.iter().zip(attention_mask) {
        if *mask != 1 {
            continue;
        }
        for (acc, v) in pooled.iter_mut().zip(row) {
            *acc += v;
        }
        count += 1;
    }
    if count > 0 {
        let inv = 1.0 / count as f32;
        for v in &mut pooled {
            *v *= inv;
        }
    }
    l2_normalize(&mut pooled);
    pooled
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if f64::from(norm) < EPSILON {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Dot product of two embeddings. Both are unit length, so this is
/// cosine similarity.
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

/// Deterministic stand-in model: each input id hashes to a fixed
/// pseudo-random unit direction. Texts sharing tokens pool to nearby
/// embeddings, which is enough structure for tests and offline runs.
pub struct SeededEncoder {
    seed: u64,
}

impl SeededEncoder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for SeededEncoder {
    fn default() -> Self {
        Self::new(42)
    }
}

impl EncoderModel for SeededEncoder {
    fn hidden_states(&self, encoding: &Encoding) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let rows = encoding
            .input_ids
            .iter()
            .map(|id| {
                let mut state = self.seed ^ (*id as u64).wrapping_mul(0x9e3779b97f4a7c15);
                (0..EMBEDDING_DIM)
                    .map(|_| {
                        // splitmix64 step per component
                        state = state.wrapping_add(0x9e3779b97f4a7c15);
                        let mut z = state;
                        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
                        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
                        z ^= z >> 31;
                        (z as f64 / u64::MAX as f64) as f32 - 0.5
                    })
                    .collect()
            })
            .collect();
        Ok(rows)
    }
}

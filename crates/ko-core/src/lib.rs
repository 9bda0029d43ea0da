//! ko-core: knowledge-object behavioral simulation.
//!
//! Pure math and state transitions, zero I/O. Knowledge objects carry a
//! memory record (observation and collision counters, affinity and
//! rivalry scores, a capped evolution log) and a physics record
//! (position, velocity, entropy, mass). Six behavioral traits are
//! derived from those records, and a force-field simulator turns the
//! whole graph into motion: entropy drift, semantic gravity over
//! embedding similarity, affinity attraction, rivalry repulsion, and
//! autonomous trait behaviors.
//!
//! Persistence lives in ko-store; the CLI and HTTP surface live in
//! ko-cli.

pub mod constants;
pub mod embedding;
pub mod ko;
pub mod memory;
pub mod physics;
pub mod similarity;
pub mod simulator;
pub mod spring;
pub mod time;
pub mod tokenizer;
pub mod traits;
pub mod vec2;

pub use embedding::{dot, Embedder, Embedding, EmbeddingError, EncoderModel, SeededEncoder};
pub use ko::{content_hash, KnowledgeObject, KoType};
pub use memory::{
    record_collision, record_drift, record_observation, CollisionOutcome, EventKind,
    EvolutionEvent, Memory,
};
pub use physics::Physics;
pub use similarity::SimilarityIndex;
pub use simulator::{Body, BodySnapshot, BodyState, Simulator};
pub use spring::{Spring, Spring2};
pub use tokenizer::{encode, Encoding, Vocabulary};
pub use traits::{derive_traits, Traits};
pub use vec2::Vec2;

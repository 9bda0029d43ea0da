/// Entropy floor — observation can never fully collapse a KO.
pub const ENTROPY_MIN: f64 = 0.1;

/// Entropy ceiling — freshly created KOs start here.
pub const ENTROPY_MAX: f64 = 1.0;

/// Entropy lost per observation (observation collapses the wavefunction).
pub const ENTROPY_OBSERVATION_DROP: f64 = 0.05;

/// Mass floor — every body weighs at least this much.
pub const MASS_MIN: f64 = 1.0;

/// Mass ceiling.
pub const MASS_MAX: f64 = 5.0;

/// Mass gained per observation.
pub const MASS_OBSERVATION_GAIN: f64 = 0.02;

/// Affinity gained by both sides of a synthesis collision.
pub const AFFINITY_SYNTHESIS_DELTA: f64 = 0.15;

/// Rivalry gained by both sides of a dismissed collision.
pub const RIVALRY_DISMISS_DELTA: f64 = 0.1;

/// Evolution log cap — oldest events dropped first.
pub const EVOLUTION_HISTORY_CAP: usize = 100;

/// Days without observation before a KO counts as forgotten.
pub const FORGOTTEN_AFTER_DAYS: f64 = 30.0;

/// Drift distance a barely-observed KO must travel to count as restless.
pub const RESTLESS_DRIFT_DISTANCE: f64 = 500.0;

/// Base per-tick noise scale, multiplied by entropy.
pub const DRIFT_BASE_NOISE: f64 = 0.00002;

/// Drift multipliers per trait.
pub const DRIFT_RESTLESS_FACTOR: f64 = 2.5;
pub const DRIFT_STABLE_FACTOR: f64 = 0.2;
pub const DRIFT_VOLATILE_BASE: f64 = 1.5;
pub const DRIFT_FORGOTTEN_FACTOR: f64 = 0.5;

/// Outward bias applied to forgotten bodies (push toward the periphery).
pub const FORGOTTEN_EDGE_BIAS: f64 = 0.000005;

/// Semantic gravity: above this similarity two KOs are redundant and repel.
pub const SIMILARITY_REDUNDANT: f64 = 0.9;

/// Semantic gravity: above this similarity two KOs attract.
pub const SIMILARITY_ATTRACT: f64 = 0.5;

pub const GRAVITY_REDUNDANT_FORCE: f64 = -0.00002;
pub const GRAVITY_ATTRACT_SCALE: f64 = 0.00001;
pub const GRAVITY_DISSIMILAR_FORCE: f64 = -0.000005;

/// Affinity attraction is suppressed below this separation (avoids oscillation).
pub const AFFINITY_MIN_SEPARATION: f64 = 50.0;
pub const AFFINITY_FORCE_SCALE: f64 = 0.00002;

/// Rivalry repulsion is suppressed beyond this separation (locality cutoff).
pub const RIVALRY_MAX_SEPARATION: f64 = 300.0;
pub const RIVALRY_FORCE_SCALE: f64 = 0.00003;

/// Magnetic bodies steer toward their strongest affinity when farther than this.
pub const MAGNETIC_MIN_SEPARATION: f64 = 100.0;
pub const MAGNETIC_FORCE_SCALE: f64 = 0.00005;

/// Emergent bodies steer toward the centroid when farther than this.
pub const EMERGENT_MIN_SEPARATION: f64 = 50.0;
pub const EMERGENT_FORCE_SCALE: f64 = 0.00002;

/// Per-tick probability of a volatile body firing a random impulse.
pub const VOLATILE_IMPULSE_PROBABILITY: f64 = 0.001;
pub const VOLATILE_IMPULSE_BASE: f64 = 0.002;
pub const VOLATILE_IMPULSE_SPREAD: f64 = 0.003;

/// Chain reaction: radius, per-neighbor probability, and impulse magnitude.
pub const CHAIN_REACTION_RADIUS: f64 = 150.0;
pub const CHAIN_REACTION_PROBABILITY: f64 = 0.3;
pub const CHAIN_REACTION_IMPULSE: f64 = 0.001;

/// Minimum ms between collision notifications for the same pair.
pub const COLLISION_COOLDOWN_MS: u64 = 2000;

/// Per-tick velocity damping (matter-style air friction).
pub const AIR_FRICTION: f64 = 0.03;

/// Default spawn region: positions land in (-extent/2, extent/2) per axis.
pub const SPAWN_EXTENT: f64 = 1000.0;

/// Spring smoothing parameters for authoritative position targets.
pub const SPRING_STIFFNESS: f64 = 170.0;
pub const SPRING_DAMPING: f64 = 26.0;
pub const SPRING_PRECISION: f64 = 0.01;

/// Embedding output dimension (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Token sequence length after padding/truncation.
pub const MAX_SEQUENCE_LENGTH: usize = 128;

/// Longest subword piece attempted during greedy WordPiece matching.
pub const MAX_PIECE_LENGTH: usize = 10;

/// Numerical epsilon for near-zero comparisons.
pub const EPSILON: f64 = 1e-10;

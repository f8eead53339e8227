//! Deterministic Simulation Testing (DST)
//!
//! `TigerStyle`: All test randomness is seeded, all faults are injectable,
//! every failing run replays exactly from its seed.
//!
//! - [`DeterministicRng`]: seeded ChaCha20 generator, forkable
//! - [`SimConfig`]: seed management (`DST_SEED` env var or random)
//! - [`FaultInjector`]: probabilistic fault injection for storage backends

pub mod config;
pub mod fault;
pub mod rng;

pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultInjectorBuilder, FaultType};
pub use rng::DeterministicRng;

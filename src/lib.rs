//! zkCLOB: client-side order authentication
//!
//! This is the root crate that provides benchmark and integration test access
//! to the member crates. For actual functionality, use them directly:
//!
//! - `zkclob-core`: Errors, config, order types, BabyJubjub and Pedersen-EdDSA, sequencer client
//! - `auth`: Wallet access, trading key derivation and signing, key info cache, identity registry
//! - `circuit-prover`: Artifact loading, proving toolkit, in-process and worker provers, proof pipeline
//! - `trading-engine`: Order submission state machine
//! - `order-cli`: Command line front end

// Re-export for benchmarks and integration tests
pub use auth;
pub use circuit_prover as prover;
pub use trading_engine as trading;
pub use zkclob_core as core;

//! Circuit Prover
//!
//! Loads the order-authentication circuit artifacts once per process and
//! turns signed orders into locally verified Groth16 proofs.
//!
//! ```text
//! OrderParams + wallet
//!       │  pipeline::ProofGenerator
//!       ▼
//! TradingKeyManager (derive, sign) ──► CircuitInputs
//!       │
//!       ├── artifacts::CircuitLoader (coalesced fetch, persistent store)
//!       ▼
//! prover::{WorkerProver ─fallback─► InProcessProver}
//!       │  toolkit::ProvingToolkit (witness, prove, verify)
//!       ▼
//! ProofData { proof, public_signals }
//! ```

pub mod artifacts;
pub mod pipeline;
pub mod prover;
pub mod toolkit;

pub use artifacts::{
    ArtifactSource, ArtifactStore, CircuitLoader, DiskArtifactStore, HttpArtifactSource,
    LoadStatus, MemoryArtifactStore, StoredArtifact,
};
pub use pipeline::{PipelineProgress, PipelineStage, ProofGenerator};
pub use prover::{InProcessProver, ProgressSink, ProofStage, Prover, WorkerProver};
pub use toolkit::{ProvingToolkit, SnarkjsToolkit};

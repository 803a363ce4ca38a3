//! Order proof pipeline.
//!
//! `prove(order, wallet, epoch)`: range-check, derive and sign, build the
//! circuit inputs, load artifacts, prove on the worker (or in-process when
//! the worker cannot start), verify locally, and parse the public outputs.

use auth::TradingKeyManager;
use auth::WalletSigner;
use std::sync::Arc;
use tracing::{info, warn};
use zkclob_core::config::Config;
use zkclob_core::curve::Point;
use zkclob_core::signing::{public_key_to_bits, signature_to_bits};
use zkclob_core::types::{CircuitInputs, OrderParams, ProofData};
use zkclob_core::{Error, Result};

use crate::artifacts::CircuitLoader;
use crate::prover::{InProcessProver, ProgressSink, ProofStage, Prover, WorkerProver};
use crate::toolkit::{ProvingToolkit, SnarkjsToolkit};

/// Coarse pipeline milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    DerivingKeys,
    SigningOrder,
    PreparingInputs,
    LoadingArtifacts,
    Proving(ProofStage),
    Complete,
}

impl PipelineStage {
    /// Overall percentage; proving stages are spread over 40..=88.
    pub fn progress(&self) -> u8 {
        match self {
            PipelineStage::DerivingKeys => 10,
            PipelineStage::SigningOrder => 20,
            PipelineStage::PreparingInputs => 30,
            PipelineStage::LoadingArtifacts => 35,
            PipelineStage::Proving(stage) => 40 + stage.progress() / 2,
            PipelineStage::Complete => 100,
        }
    }
}

pub type PipelineProgress = Arc<dyn Fn(PipelineStage) + Send + Sync>;

pub struct ProofGenerator {
    loader: Arc<CircuitLoader>,
    keys: Arc<TradingKeyManager>,
    worker: Option<Arc<WorkerProver>>,
    in_process: Arc<dyn Prover>,
}

impl ProofGenerator {
    pub fn new(
        loader: Arc<CircuitLoader>,
        keys: Arc<TradingKeyManager>,
        worker: Option<Arc<WorkerProver>>,
        in_process: Arc<dyn Prover>,
    ) -> Self {
        Self {
            loader,
            keys,
            worker,
            in_process,
        }
    }

    /// Worker and in-process provers sharing one toolkit.
    pub fn with_toolkit(
        loader: Arc<CircuitLoader>,
        keys: Arc<TradingKeyManager>,
        toolkit: Arc<dyn ProvingToolkit>,
        use_worker: bool,
    ) -> Self {
        let worker = use_worker.then(|| Arc::new(WorkerProver::new(Arc::clone(&toolkit))));
        Self::new(loader, keys, worker, Arc::new(InProcessProver::new(toolkit)))
    }

    /// snarkjs-backed generator wired from configuration.
    pub fn from_config(config: &Config, keys: Arc<TradingKeyManager>) -> Result<Self> {
        let loader = Arc::new(CircuitLoader::from_config(&config.circuits)?);
        let toolkit = Arc::new(SnarkjsToolkit::from_config(&config.prover)?);
        Ok(Self::with_toolkit(
            loader,
            keys,
            toolkit,
            config.prover.use_worker,
        ))
    }

    pub fn loader(&self) -> &Arc<CircuitLoader> {
        &self.loader
    }

    /// Warm up ahead of the first order: start the worker, or load the
    /// artifacts when proving in-process.
    pub async fn initialize(&self) -> Result<()> {
        if let Some(worker) = &self.worker {
            match worker.initialize().await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "Proof worker unavailable, proving in-process"),
            }
        }
        self.loader.load_artifacts().await.map(|_| ())
    }

    /// Prove that `wallet`'s trading key signed `order`.
    pub async fn prove(
        &self,
        order: &OrderParams,
        wallet: &dyn WalletSigner,
        epoch: u64,
        progress: Option<PipelineProgress>,
    ) -> Result<ProofData> {
        let report = |stage: PipelineStage| {
            if let Some(sink) = &progress {
                sink(stage);
            }
        };

        // Reject before any wallet prompt or proving work.
        order.check_ranges()?;

        report(PipelineStage::DerivingKeys);
        let key_info = self.keys.get_trading_key_info(wallet).await?;

        report(PipelineStage::SigningOrder);
        let signature = self.keys.sign_order_message(wallet, order).await?;

        report(PipelineStage::PreparingInputs);
        let public_key = Point::from_decimal_strings(&key_info.public_key)?;
        let signature_bits = signature_to_bits(&signature)?;
        let inputs = CircuitInputs::new(
            order,
            public_key_to_bits(&public_key),
            signature_bits.r8_bits,
            signature_bits.s_bits,
            epoch,
        )?;

        report(PipelineStage::LoadingArtifacts);
        let artifacts = self.loader.load_artifacts().await?;

        let proving_progress: Option<ProgressSink> = progress.clone().map(|sink| {
            Arc::new(move |stage: ProofStage| sink(PipelineStage::Proving(stage))) as ProgressSink
        });

        let proof = match &self.worker {
            Some(worker) => {
                match worker
                    .prove(&inputs, Arc::clone(&artifacts), proving_progress.clone())
                    .await
                {
                    Err(Error::WorkerUnavailable { message }) => {
                        warn!(reason = %message, "Proof worker unavailable, proving in-process");
                        self.in_process
                            .prove(&inputs, artifacts, proving_progress)
                            .await?
                    }
                    other => other?,
                }
            }
            None => {
                self.in_process
                    .prove(&inputs, artifacts, proving_progress)
                    .await?
            }
        };

        let outputs = proof.outputs()?;
        report(PipelineStage::Complete);

        info!(
            order_hash = %outputs.order_hash,
            nullifier = %outputs.nullifier,
            circuit_version = %outputs.circuit_version,
            "Order proof generated"
        );
        Ok(proof)
    }

    /// Tear down the worker, if any.
    pub fn terminate(&self) {
        if let Some(worker) = &self.worker {
            worker.terminate();
        }
    }
}

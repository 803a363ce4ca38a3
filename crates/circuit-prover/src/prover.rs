//! Proof generation capability.
//!
//! Both provers run the same routine over the same toolkit: witness,
//! Groth16 proof, then local verification. They differ only in where it
//! runs. [`WorkerProver`] owns a background task that can be torn down;
//! [`InProcessProver`] runs on the caller's task to completion.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zkclob_core::types::{CircuitArtifacts, CircuitInputs, ProofData};
use zkclob_core::{Error, Result};

use crate::toolkit::ProvingToolkit;

/// Progress milestones reported while proving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofStage {
    Starting,
    GeneratingWitness,
    WitnessComplete,
    GeneratingProof,
    ProofComplete,
    Verifying,
}

impl ProofStage {
    pub fn progress(&self) -> u8 {
        match self {
            ProofStage::Starting => 10,
            ProofStage::GeneratingWitness => 30,
            ProofStage::WitnessComplete => 50,
            ProofStage::GeneratingProof => 60,
            ProofStage::ProofComplete => 90,
            ProofStage::Verifying => 95,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProofStage::Starting => "starting",
            ProofStage::GeneratingWitness => "generating-witness",
            ProofStage::WitnessComplete => "witness-complete",
            ProofStage::GeneratingProof => "generating-proof",
            ProofStage::ProofComplete => "proof-complete",
            ProofStage::Verifying => "verifying",
        }
    }
}

impl std::fmt::Display for ProofStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ProgressSink = Arc<dyn Fn(ProofStage) + Send + Sync>;

#[async_trait]
pub trait Prover: Send + Sync {
    /// Prove and locally verify. A proof that fails verification is
    /// [`Error::ProofInvalid`], never a success.
    async fn prove(
        &self,
        inputs: &CircuitInputs,
        artifacts: Arc<CircuitArtifacts>,
        progress: Option<ProgressSink>,
    ) -> Result<ProofData>;
}

async fn run_proof(
    toolkit: &dyn ProvingToolkit,
    inputs: &serde_json::Value,
    artifacts: &CircuitArtifacts,
    progress: Option<&ProgressSink>,
) -> Result<ProofData> {
    let report = |stage: ProofStage| {
        debug!(stage = %stage, progress = stage.progress(), "Proof progress");
        if let Some(sink) = progress {
            sink(stage);
        }
    };

    report(ProofStage::Starting);

    report(ProofStage::GeneratingWitness);
    let witness = toolkit.calculate_witness(inputs, &artifacts.wasm).await?;
    report(ProofStage::WitnessComplete);

    report(ProofStage::GeneratingProof);
    let proof = toolkit.prove(&artifacts.zkey, &witness).await?;
    report(ProofStage::ProofComplete);

    report(ProofStage::Verifying);
    if !toolkit.verify(&artifacts.verification_key, &proof).await? {
        return Err(Error::ProofInvalid {
            message: "generated proof does not verify against the verification key".to_string(),
        });
    }

    Ok(proof)
}

/// Proves on the caller's task.
pub struct InProcessProver {
    toolkit: Arc<dyn ProvingToolkit>,
}

impl InProcessProver {
    pub fn new(toolkit: Arc<dyn ProvingToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl Prover for InProcessProver {
    async fn prove(
        &self,
        inputs: &CircuitInputs,
        artifacts: Arc<CircuitArtifacts>,
        progress: Option<ProgressSink>,
    ) -> Result<ProofData> {
        let inputs = serde_json::to_value(inputs)?;
        run_proof(self.toolkit.as_ref(), &inputs, &artifacts, progress.as_ref()).await
    }
}

struct ProofJob {
    inputs: serde_json::Value,
    artifacts: Arc<CircuitArtifacts>,
    progress: Option<ProgressSink>,
    reply: oneshot::Sender<Result<ProofData>>,
}

struct WorkerHandle {
    jobs: mpsc::Sender<ProofJob>,
    task: JoinHandle<()>,
}

/// Proves on a dedicated background task, one job at a time.
pub struct WorkerProver {
    toolkit: Arc<dyn ProvingToolkit>,
    worker: Mutex<Option<WorkerHandle>>,
    ready: AtomicBool,
}

impl WorkerProver {
    pub fn new(toolkit: Arc<dyn ProvingToolkit>) -> Self {
        Self {
            toolkit,
            worker: Mutex::new(None),
            ready: AtomicBool::new(false),
        }
    }

    /// Start the worker and initialise its toolkit.
    ///
    /// Fails with [`Error::WorkerUnavailable`] when the toolkit cannot be
    /// initialised; callers are expected to fall back to in-process proving.
    pub async fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let (init_tx, init_rx) = oneshot::channel();
        let (jobs_tx, jobs_rx) = mpsc::channel::<ProofJob>(1);
        let toolkit = Arc::clone(&self.toolkit);

        let task = tokio::spawn(async move {
            if let Err(e) = toolkit.init().await {
                let _ = init_tx.send(Err(e));
                return;
            }
            let _ = init_tx.send(Ok(()));
            worker_loop(toolkit, jobs_rx).await;
        });

        match init_rx.await {
            Ok(Ok(())) => {
                let previous = self
                    .lock_worker()
                    .replace(WorkerHandle { jobs: jobs_tx, task });
                if let Some(previous) = previous {
                    previous.task.abort();
                }
                self.ready.store(true, Ordering::SeqCst);
                info!("Proof worker ready");
                Ok(())
            }
            Ok(Err(e)) => Err(Error::WorkerUnavailable {
                message: format!("proving toolkit failed to initialise: {}", e),
            }),
            Err(_) => Err(Error::WorkerUnavailable {
                message: "proof worker exited during initialisation".to_string(),
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Tear the worker down, abandoning any job in flight.
    pub fn terminate(&self) {
        self.ready.store(false, Ordering::SeqCst);
        if let Some(worker) = self.lock_worker().take() {
            worker.task.abort();
            info!("Proof worker terminated");
        }
    }

    fn lock_worker(&self) -> std::sync::MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn job_sender(&self) -> Option<mpsc::Sender<ProofJob>> {
        self.lock_worker().as_ref().map(|worker| worker.jobs.clone())
    }
}

impl Drop for WorkerProver {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn worker_loop(toolkit: Arc<dyn ProvingToolkit>, mut jobs: mpsc::Receiver<ProofJob>) {
    while let Some(job) = jobs.recv().await {
        let result = run_proof(toolkit.as_ref(), &job.inputs, &job.artifacts, job.progress.as_ref()).await;
        if job.reply.send(result).is_err() {
            warn!("Proof requester went away before the result was ready");
        }
    }
}

#[async_trait]
impl Prover for WorkerProver {
    async fn prove(
        &self,
        inputs: &CircuitInputs,
        artifacts: Arc<CircuitArtifacts>,
        progress: Option<ProgressSink>,
    ) -> Result<ProofData> {
        self.initialize().await?;

        let jobs = self.job_sender().ok_or_else(|| Error::WorkerUnavailable {
            message: "proof worker is not running".to_string(),
        })?;

        let (reply, result) = oneshot::channel();
        let job = ProofJob {
            inputs: serde_json::to_value(inputs)?,
            artifacts,
            progress,
            reply,
        };

        jobs.send(job).await.map_err(|_| Error::WorkerUnavailable {
            message: "proof worker stopped accepting jobs".to_string(),
        })?;

        result.await.map_err(|_| Error::Cancelled {
            message: "proof worker terminated before finishing".to_string(),
        })?
    }
}

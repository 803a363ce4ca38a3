//! Proving toolkit seam.
//!
//! A [`ProvingToolkit`] computes witnesses, Groth16 proofs and verifications
//! for the order circuit. [`SnarkjsToolkit`] drives the `snarkjs` CLI in a
//! scratch directory per call.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;
use zkclob_core::config::ProverConfig;
use zkclob_core::types::{GrothProof, ProofData};
use zkclob_core::{Error, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvingToolkit: Send + Sync {
    /// Fails when the toolkit cannot be used at all.
    async fn init(&self) -> Result<()>;

    /// Run the witness program over JSON `inputs`, returning `.wtns` bytes.
    async fn calculate_witness(&self, inputs: &serde_json::Value, wasm: &[u8]) -> Result<Vec<u8>>;

    async fn prove(&self, zkey: &[u8], witness: &[u8]) -> Result<ProofData>;

    /// `Ok(false)` for a well-formed proof that does not verify.
    async fn verify(&self, verification_key: &serde_json::Value, proof: &ProofData) -> Result<bool>;
}

/// `snarkjs` command line backend.
#[derive(Debug, Clone)]
pub struct SnarkjsToolkit {
    /// Program followed by any leading arguments, e.g. `npx snarkjs`.
    command: Vec<String>,
    work_dir: Option<PathBuf>,
}

impl SnarkjsToolkit {
    pub fn new(command: &str, work_dir: Option<PathBuf>) -> Result<Self> {
        let command: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if command.is_empty() {
            return Err(Error::Config {
                message: "snarkjs command is empty".to_string(),
            });
        }
        Ok(Self { command, work_dir })
    }

    pub fn from_config(config: &ProverConfig) -> Result<Self> {
        Self::new(&config.snarkjs_bin, config.work_dir.clone())
    }

    fn scratch(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("zkclob-prove-");
        let dir = match &self.work_dir {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    async fn run(&self, args: &[&str], cwd: &Path) -> Result<Output> {
        debug!(command = %self.command.join(" "), args = ?args, "Running snarkjs");
        Command::new(&self.command[0])
            .args(&self.command[1..])
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| Error::Prover {
                message: format!("failed to run {}: {}", self.command[0], e),
            })
    }

    fn ensure_success(output: &Output, step: &str) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        Err(Error::Prover {
            message: format!(
                "snarkjs {} failed ({}): {}",
                step,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        })
    }
}

#[async_trait]
impl ProvingToolkit for SnarkjsToolkit {
    async fn init(&self) -> Result<()> {
        // Usage output exits non-zero on some versions; spawning is enough.
        self.run(&["--help"], &std::env::temp_dir()).await.map(|_| ())
    }

    async fn calculate_witness(&self, inputs: &serde_json::Value, wasm: &[u8]) -> Result<Vec<u8>> {
        let scratch = self.scratch()?;
        let dir = scratch.path();
        tokio::fs::write(dir.join("circuit.wasm"), wasm).await?;
        tokio::fs::write(dir.join("input.json"), serde_json::to_vec(inputs)?).await?;

        let output = self
            .run(&["wtns", "calculate", "circuit.wasm", "input.json", "witness.wtns"], dir)
            .await?;
        Self::ensure_success(&output, "wtns calculate")?;

        Ok(tokio::fs::read(dir.join("witness.wtns")).await?)
    }

    async fn prove(&self, zkey: &[u8], witness: &[u8]) -> Result<ProofData> {
        let scratch = self.scratch()?;
        let dir = scratch.path();
        tokio::fs::write(dir.join("circuit.zkey"), zkey).await?;
        tokio::fs::write(dir.join("witness.wtns"), witness).await?;

        let output = self
            .run(
                &["groth16", "prove", "circuit.zkey", "witness.wtns", "proof.json", "public.json"],
                dir,
            )
            .await?;
        Self::ensure_success(&output, "groth16 prove")?;

        let proof: GrothProof = serde_json::from_slice(&tokio::fs::read(dir.join("proof.json")).await?)?;
        let public_signals: Vec<String> =
            serde_json::from_slice(&tokio::fs::read(dir.join("public.json")).await?)?;

        Ok(ProofData {
            proof,
            public_signals,
        })
    }

    async fn verify(&self, verification_key: &serde_json::Value, proof: &ProofData) -> Result<bool> {
        let scratch = self.scratch()?;
        let dir = scratch.path();
        tokio::fs::write(dir.join("verification_key.json"), serde_json::to_vec(verification_key)?).await?;
        tokio::fs::write(dir.join("public.json"), serde_json::to_vec(&proof.public_signals)?).await?;
        tokio::fs::write(dir.join("proof.json"), serde_json::to_vec(&proof.proof)?).await?;

        let output = self
            .run(
                &["groth16", "verify", "verification_key.json", "public.json", "proof.json"],
                dir,
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(output.status.success() && stdout.contains("OK"))
    }
}

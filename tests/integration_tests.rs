//! Integration tests for component interactions.
//!
//! These tests drive a full order submission through the real key derivation,
//! signing, encoding and pipeline code, with in-memory stand-ins for the
//! wallet, proving toolkit, artifact host and sequencer.

use alloy_primitives::Address;
use async_trait::async_trait;
use auth::{derive_private_key, IdentityRegistry, KeyInfoCache, TradingKeyManager, WalletSigner};
use chrono::Utc;
use circuit_prover::artifacts::ArtifactNames;
use circuit_prover::{
    ArtifactSource, CircuitLoader, DiskArtifactStore, MemoryArtifactStore, ProofGenerator,
    ProvingToolkit,
};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trading_engine::{OrderSubmitter, SubmissionState};
use zkclob_core::api::{OrderBackend, SubmitOrderRequest, SubmitOrderResponse};
use zkclob_core::config::{KeysConfig, PairRegistry};
use zkclob_core::signing::{eddsa, pair_id_hash, public_key_to_bits, time_bucket};
use zkclob_core::types::{GrothProof, OrderRequest, OrderSide, ProofData};
use zkclob_core::{Error, Result};

/// Wallet that always returns the same signature.
struct FixedSignatureWallet {
    signature: Vec<u8>,
    prompts: AtomicUsize,
}

impl FixedSignatureWallet {
    fn new() -> Self {
        Self {
            signature: vec![0xab; 65],
            prompts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WalletSigner for FixedSignatureWallet {
    fn address(&self) -> Option<Address> {
        Some(Address::repeat_byte(0x11))
    }

    async fn sign_message(&self, _message: &str) -> Result<Vec<u8>> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self.signature.clone())
    }
}

/// Counts fetches per artifact name.
#[derive(Default)]
struct CountingSource {
    fetches: AtomicUsize,
}

#[async_trait]
impl ArtifactSource for CountingSource {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(match name {
            "verification_key.json" => br#"{"protocol":"groth16","curve":"bn128"}"#.to_vec(),
            "client.wasm" => vec![0x00, 0x61, 0x73, 0x6d],
            _ => vec![0x7a; 128],
        })
    }
}

/// Echoes parts of the circuit inputs back as public signals.
#[derive(Default)]
struct EchoToolkit {
    inputs: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl ProvingToolkit for EchoToolkit {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn calculate_witness(&self, inputs: &serde_json::Value, _wasm: &[u8]) -> Result<Vec<u8>> {
        self.inputs.lock().unwrap().push(inputs.clone());
        serde_json::to_vec(inputs).map_err(Error::from)
    }

    async fn prove(&self, _zkey: &[u8], witness: &[u8]) -> Result<ProofData> {
        let inputs: serde_json::Value = serde_json::from_slice(witness)?;
        let signal = |name: &str| inputs[name].as_str().unwrap_or_default().to_string();
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();

        Ok(ProofData {
            proof: GrothProof {
                pi_a: s(&["1", "2", "1"]),
                pi_b: vec![s(&["3", "4"]), s(&["5", "6"]), s(&["1", "0"])],
                pi_c: s(&["7", "8", "1"]),
                protocol: "groth16".to_string(),
                curve: "bn128".to_string(),
            },
            public_signals: vec!["1".to_string(), signal("structHash"), signal("nonce")],
        })
    }

    async fn verify(&self, _vk: &serde_json::Value, _proof: &ProofData) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Default)]
struct RecordingBackend {
    requests: Mutex<Vec<SubmitOrderRequest>>,
}

#[async_trait]
impl OrderBackend for RecordingBackend {
    async fn submit_order(&self, request: &SubmitOrderRequest) -> Result<SubmitOrderResponse> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(SubmitOrderResponse {
            order_id: requests.len() as u64,
        })
    }
}

struct Stack {
    submitter: OrderSubmitter,
    keys: Arc<TradingKeyManager>,
    identity: Arc<IdentityRegistry>,
    toolkit: Arc<EchoToolkit>,
    backend: Arc<RecordingBackend>,
    source: Arc<CountingSource>,
}

fn stack(key_cache: KeyInfoCache, use_worker: bool) -> Stack {
    let keys = Arc::new(TradingKeyManager::new(Arc::new(key_cache)));
    let source = Arc::new(CountingSource::default());
    let loader = Arc::new(CircuitLoader::new(
        source.clone(),
        Arc::new(MemoryArtifactStore::new()),
        ArtifactNames::default(),
    ));
    let toolkit = Arc::new(EchoToolkit::default());
    let generator = Arc::new(ProofGenerator::with_toolkit(
        loader,
        Arc::clone(&keys),
        toolkit.clone(),
        use_worker,
    ));
    let backend = Arc::new(RecordingBackend::default());
    let identity = Arc::new(IdentityRegistry::new());

    Stack {
        submitter: OrderSubmitter::new(
            generator,
            Arc::clone(&keys),
            Arc::clone(&identity),
            backend.clone(),
            PairRegistry::default(),
        ),
        keys,
        identity,
        toolkit,
        backend,
        source,
    }
}

async fn make_ready(stack: &Stack, wallet: &FixedSignatureWallet) {
    let address = format!("{:#x}", Address::repeat_byte(0x11));
    stack.identity.mark_verified(&address);
    stack.keys.get_trading_key_info(wallet).await.unwrap();
}

fn market_buy() -> OrderRequest {
    OrderRequest::market("HYPE-USDC", OrderSide::Buy, Decimal::new(500, 1))
}

/// The HYPE-USDC market buy reaches the sequencer with the expected fields.
#[tokio::test]
async fn test_end_to_end_market_buy() {
    for use_worker in [true, false] {
        let stack = stack(KeyInfoCache::memory(), use_worker);
        let wallet = FixedSignatureWallet::new();
        make_ready(&stack, &wallet).await;

        let before = time_bucket(Utc::now());
        let receipt = stack
            .submitter
            .submit_order(&market_buy(), &wallet)
            .await
            .unwrap();
        let after = time_bucket(Utc::now());

        assert_eq!(receipt.tx_hash, format!("0x{:064x}", 1));
        assert!(matches!(stack.submitter.state(), SubmissionState::Complete { .. }));

        let requests = stack.backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.pair_id, 1);
        assert_eq!(request.side, 1);
        assert_eq!(request.price_tick, 0);
        assert_eq!(request.amount, 50_000_000);
        assert!(u64::from(request.time_bucket) >= before && u64::from(request.time_bucket) <= after);
        assert!(request.nonce < 1_000_000);
        assert_eq!(request.order_hash, receipt.order_hash);
        assert_eq!(request.pk_hash, pair_id_hash("HYPE-USDC"));

        // The circuit saw the same order and the public key derived from the wallet.
        let inputs = stack.toolkit.inputs.lock().unwrap();
        let inputs = &inputs[0];
        assert_eq!(inputs["side"], "1");
        assert_eq!(inputs["price_tick"], "0");
        assert_eq!(inputs["amount"], "50000000");
        assert_eq!(inputs["nonce"], request.nonce.to_string());
        assert_eq!(receipt.nullifier, request.nonce.to_string());

        let mut key = [0u8; 32];
        derive_private_key(&[0xab; 65], &mut key).unwrap();
        let expected_bits: Vec<&str> = public_key_to_bits(&eddsa::public_key(&key))
            .iter()
            .map(|bit| if *bit { "1" } else { "0" })
            .collect();
        assert_eq!(inputs["A_bits"], serde_json::json!(expected_bits));
        assert_eq!(inputs["R8_bits"].as_array().unwrap().len(), 256);
        assert_eq!(inputs["S_bits"].as_array().unwrap().len(), 256);
    }
}

/// Two submissions share one artifact fetch and one derived public key.
#[tokio::test]
async fn test_repeat_submissions_reuse_artifacts_and_keys() {
    let stack = stack(KeyInfoCache::memory(), true);
    let wallet = FixedSignatureWallet::new();
    make_ready(&stack, &wallet).await;

    stack.submitter.submit_order(&market_buy(), &wallet).await.unwrap();
    stack.submitter.reset();
    stack.submitter.submit_order(&market_buy(), &wallet).await.unwrap();

    assert_eq!(stack.source.fetches.load(Ordering::SeqCst), 3);

    let inputs = stack.toolkit.inputs.lock().unwrap();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0]["A_bits"], inputs[1]["A_bits"]);
    // One prompt for the initial key info, then one per signed order.
    assert_eq!(wallet.prompts.load(Ordering::SeqCst), 3);
}

/// Key info persisted to disk satisfies the readiness guard after a restart.
#[tokio::test]
async fn test_key_info_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let keys_config = KeysConfig {
        cache_path: Some(dir.path().join("keys.json")),
    };
    let wallet = FixedSignatureWallet::new();

    let first = stack(KeyInfoCache::from_config(&keys_config), false);
    make_ready(&first, &wallet).await;
    drop(first);

    let second = stack(KeyInfoCache::from_config(&keys_config), false);
    second
        .identity
        .mark_verified(&format!("{:#x}", Address::repeat_byte(0x11)));
    assert!(second.submitter.can_submit(&wallet).await);

    second.submitter.submit_order(&market_buy(), &wallet).await.unwrap();
    // Initial derivation plus the order signature; no re-derivation for key info.
    assert_eq!(wallet.prompts.load(Ordering::SeqCst), 2);
}

/// Artifacts stored on disk are served without touching the network.
#[tokio::test]
async fn test_disk_artifact_cache_cold_start() {
    let dir = tempfile::tempdir().unwrap();

    let warm_source = Arc::new(CountingSource::default());
    let warm = CircuitLoader::new(
        warm_source.clone(),
        Arc::new(DiskArtifactStore::new(dir.path())),
        ArtifactNames::default(),
    );
    let fetched = warm.load_artifacts().await.unwrap();
    assert_eq!(warm_source.fetches.load(Ordering::SeqCst), 3);

    let cold_source = Arc::new(CountingSource::default());
    let cold = CircuitLoader::new(
        cold_source.clone(),
        Arc::new(DiskArtifactStore::new(dir.path())),
        ArtifactNames::default(),
    );
    let cached = cold.load_artifacts().await.unwrap();
    assert_eq!(cold_source.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(cached.wasm, fetched.wasm);
    assert_eq!(cached.zkey, fetched.zkey);
    assert_eq!(cached.verification_key, fetched.verification_key);
}

/// Precondition failures never reach the prover or the sequencer.
#[tokio::test]
async fn test_unverified_wallet_is_rejected_before_proving() {
    let stack = stack(KeyInfoCache::memory(), true);
    let wallet = FixedSignatureWallet::new();
    stack.keys.get_trading_key_info(&wallet).await.unwrap();

    let result = stack.submitter.submit_order(&market_buy(), &wallet).await;
    assert!(matches!(result, Err(Error::Precondition { .. })));
    assert!(stack.toolkit.inputs.lock().unwrap().is_empty());
    assert!(stack.backend.requests.lock().unwrap().is_empty());
    assert_eq!(stack.source.fetches.load(Ordering::SeqCst), 0);
}

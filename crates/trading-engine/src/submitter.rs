//! Order submission orchestrator.

use auth::trading_keys::wallet_address;
use auth::{IdentityRegistry, TradingKeyManager, WalletSigner};
use chrono::Utc;
use circuit_prover::{PipelineProgress, PipelineStage, ProofGenerator};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use zkclob_core::api::{OrderBackend, SubmitOrderRequest};
use zkclob_core::config::PairRegistry;
use zkclob_core::signing::{epoch, random_nonce};
use zkclob_core::types::{OrderParams, OrderRequest};
use zkclob_core::{Error, Result};

use crate::state::{OrderReceipt, SubmissionState};

/// State shared with progress callbacks of the running attempt.
struct Tracker {
    state: watch::Sender<SubmissionState>,
    /// Bumped by every new attempt and by `reset`; updates from an older
    /// attempt are dropped.
    attempt: AtomicU64,
    /// Ticket of the call holding the submit slot; zero when free.
    slot: AtomicU64,
    tickets: AtomicU64,
}

/// Exclusive right to run one submission, released on drop.
struct Claim<'a> {
    slot: &'a AtomicU64,
    ticket: u64,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.ticket, 0, Ordering::SeqCst, Ordering::SeqCst);
    }
}

impl Tracker {
    fn claim(&self) -> Option<Claim<'_>> {
        let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
        self.slot
            .compare_exchange(0, ticket, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        Some(Claim {
            slot: &self.slot,
            ticket,
        })
    }

    fn is_claimed(&self) -> bool {
        self.slot.load(Ordering::SeqCst) != 0
    }

    fn begin(&self) -> u64 {
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(SubmissionState::Preparing {
            progress: SubmissionState::PREPARING_PROGRESS,
        });
        attempt
    }

    fn advance(&self, attempt: u64, next: SubmissionState) -> bool {
        self.state.send_if_modified(|current| {
            if self.attempt.load(Ordering::SeqCst) != attempt || !current.can_advance_to(&next) {
                return false;
            }
            *current = next;
            true
        })
    }

    fn fail(&self, attempt: u64, error: &Error) {
        let progress = self.state.borrow().progress();
        self.advance(
            attempt,
            SubmissionState::Error {
                message: error.to_string(),
                progress,
            },
        );
    }
}

/// Drives one order at a time from request to backend acceptance.
pub struct OrderSubmitter {
    generator: Arc<ProofGenerator>,
    keys: Arc<TradingKeyManager>,
    identity: Arc<IdentityRegistry>,
    backend: Arc<dyn OrderBackend>,
    pairs: PairRegistry,
    tracker: Arc<Tracker>,
}

impl OrderSubmitter {
    pub fn new(
        generator: Arc<ProofGenerator>,
        keys: Arc<TradingKeyManager>,
        identity: Arc<IdentityRegistry>,
        backend: Arc<dyn OrderBackend>,
        pairs: PairRegistry,
    ) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            generator,
            keys,
            identity,
            backend,
            pairs,
            tracker: Arc::new(Tracker {
                state,
                attempt: AtomicU64::new(0),
                slot: AtomicU64::new(0),
                tickets: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.tracker.state.borrow().clone()
    }

    /// Watch state transitions and progress.
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.tracker.state.subscribe()
    }

    pub fn is_idle(&self) -> bool {
        matches!(*self.tracker.state.borrow(), SubmissionState::Idle)
    }

    pub fn is_processing(&self) -> bool {
        self.tracker.state.borrow().is_processing()
    }

    pub fn is_complete(&self) -> bool {
        matches!(*self.tracker.state.borrow(), SubmissionState::Complete { .. })
    }

    pub fn has_error(&self) -> bool {
        matches!(*self.tracker.state.borrow(), SubmissionState::Error { .. })
    }

    /// Return to `idle`, abandoning any attempt still in flight.
    pub fn reset(&self) {
        self.tracker.attempt.fetch_add(1, Ordering::SeqCst);
        self.tracker.slot.store(0, Ordering::SeqCst);
        self.tracker.state.send_replace(SubmissionState::Idle);
    }

    /// Whether `submit_order` would pass its guards for this wallet.
    pub async fn can_submit(&self, wallet: &dyn WalletSigner) -> bool {
        if self.tracker.is_claimed() {
            return false;
        }
        match wallet_address(wallet) {
            Ok(address) => self.check_preconditions(&address).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn check_preconditions(&self, address: &str) -> Result<()> {
        if self.is_processing() {
            return Err(busy());
        }
        if !self.identity.is_verified(address) {
            return Err(Error::Precondition {
                message: "KYC verification required".to_string(),
            });
        }
        if !self.keys.has_trading_keys(address).await {
            return Err(Error::Precondition {
                message: "Trading keys not initialized".to_string(),
            });
        }
        Ok(())
    }

    /// Prove and submit an order.
    ///
    /// Guard failures return [`Error::Precondition`] without touching the
    /// proof pipeline or the state. Any later failure is recorded in the
    /// `error` state and returned; calling again starts a fresh attempt.
    pub async fn submit_order(
        &self,
        request: &OrderRequest,
        wallet: &dyn WalletSigner,
    ) -> Result<OrderReceipt> {
        let address = wallet_address(wallet).map_err(|_| Error::Precondition {
            message: "Wallet not connected".to_string(),
        })?;
        let _claim = self.tracker.claim().ok_or_else(busy)?;
        self.check_preconditions(&address).await?;

        let attempt = self.tracker.begin();
        info!(
            attempt,
            pair = %request.pair_id,
            side = %request.side,
            kind = %request.order_type,
            "Submitting order"
        );

        match self.run(attempt, request, wallet).await {
            Ok(receipt) => {
                if !self.tracker.advance(
                    attempt,
                    SubmissionState::Complete {
                        receipt: receipt.clone(),
                    },
                ) {
                    warn!(attempt, "Order accepted after the submission was reset");
                }
                info!(
                    tx_hash = %receipt.tx_hash,
                    order_hash = %receipt.order_hash,
                    nullifier = %receipt.nullifier,
                    "Order submitted"
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!(attempt, error = %e, "Order submission failed");
                self.tracker.fail(attempt, &e);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        attempt: u64,
        request: &OrderRequest,
        wallet: &dyn WalletSigner,
    ) -> Result<OrderReceipt> {
        let pair_id = self.pairs.pair_id(&request.pair_id)?;
        let now = Utc::now();
        let nonce = random_nonce(&mut rand::thread_rng());
        let params = OrderParams::from_request(request, now, nonce)?;

        self.tracker.advance(
            attempt,
            SubmissionState::GeneratingProof {
                progress: SubmissionState::PROVING_PROGRESS,
            },
        );

        let tracker = Arc::clone(&self.tracker);
        let progress: PipelineProgress = Arc::new(move |stage: PipelineStage| {
            tracker.advance(
                attempt,
                SubmissionState::GeneratingProof {
                    progress: proving_progress(stage),
                },
            );
        });

        let proof = self
            .generator
            .prove(&params, wallet, epoch(now), Some(progress))
            .await?;
        let outputs = proof.outputs()?;

        self.tracker.advance(
            attempt,
            SubmissionState::Submitting {
                progress: SubmissionState::SUBMITTING_PROGRESS,
            },
        );

        let submission = SubmitOrderRequest::new(pair_id, &params, &outputs)?;
        let response = self.backend.submit_order(&submission).await?;

        Ok(OrderReceipt {
            tx_hash: response.tx_hash(),
            order_hash: outputs.order_hash,
            nullifier: outputs.nullifier,
        })
    }
}

fn busy() -> Error {
    Error::Precondition {
        message: "An order submission is already in progress".to_string(),
    }
}

/// Map pipeline progress onto the proving band `[20, 80)`.
fn proving_progress(stage: PipelineStage) -> u8 {
    let band = SubmissionState::SUBMITTING_PROGRESS - SubmissionState::PROVING_PROGRESS;
    let scaled = u16::from(stage.progress()) * u16::from(band) / 100;
    SubmissionState::PROVING_PROGRESS + (scaled as u8).min(band - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use async_trait::async_trait;
    use auth::{KeyInfoCache, TradingWallet};
    use circuit_prover::artifacts::ArtifactNames;
    use circuit_prover::{ArtifactSource, CircuitLoader, MemoryArtifactStore, ProvingToolkit};
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use zkclob_core::api::SubmitOrderResponse;
    use zkclob_core::types::{GrothProof, OrderSide, ProofData};

    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    struct StaticSource;

    #[async_trait]
    impl ArtifactSource for StaticSource {
        async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
            Ok(match name {
                "verification_key.json" => br#"{"protocol":"groth16"}"#.to_vec(),
                _ => vec![0u8; 8],
            })
        }
    }

    /// Toolkit returning a fixed proof; counts witness calls.
    struct FixedToolkit {
        valid: bool,
        witness_calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ProvingToolkit for FixedToolkit {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn calculate_witness(&self, _inputs: &serde_json::Value, _wasm: &[u8]) -> Result<Vec<u8>> {
            self.witness_calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(b"wtns".to_vec())
        }

        async fn prove(&self, _zkey: &[u8], _witness: &[u8]) -> Result<ProofData> {
            let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
            Ok(ProofData {
                proof: GrothProof {
                    pi_a: s(&["1", "2", "1"]),
                    pi_b: vec![s(&["3", "4"]), s(&["5", "6"]), s(&["1", "0"])],
                    pi_c: s(&["7", "8", "1"]),
                    protocol: "groth16".to_string(),
                    curve: "bn128".to_string(),
                },
                public_signals: s(&["1", "1234", "5678"]),
            })
        }

        async fn verify(&self, _vk: &serde_json::Value, _proof: &ProofData) -> Result<bool> {
            Ok(self.valid)
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        requests: Mutex<Vec<SubmitOrderRequest>>,
        reject_with: Option<u16>,
    }

    #[async_trait]
    impl OrderBackend for RecordingBackend {
        async fn submit_order(&self, request: &SubmitOrderRequest) -> Result<SubmitOrderResponse> {
            self.requests.lock().unwrap().push(request.clone());
            match self.reject_with {
                Some(status) => Err(Error::Submission {
                    message: format!("Failed to submit order: {} - nullifier already seen", status),
                    status: Some(status),
                }),
                None => Ok(SubmitOrderResponse { order_id: 42 }),
            }
        }
    }

    struct Disconnected;

    #[async_trait]
    impl WalletSigner for Disconnected {
        fn address(&self) -> Option<Address> {
            None
        }

        async fn sign_message(&self, _message: &str) -> Result<Vec<u8>> {
            panic!("disconnected wallet prompted")
        }
    }

    struct Harness {
        submitter: OrderSubmitter,
        toolkit: Arc<FixedToolkit>,
        backend: Arc<RecordingBackend>,
        keys: Arc<TradingKeyManager>,
        identity: Arc<IdentityRegistry>,
        wallet: TradingWallet,
    }

    fn harness(valid_proof: bool, reject_with: Option<u16>) -> Harness {
        harness_with_delay(valid_proof, reject_with, Duration::ZERO)
    }

    fn harness_with_delay(valid_proof: bool, reject_with: Option<u16>, delay: Duration) -> Harness {
        let toolkit = Arc::new(FixedToolkit {
            valid: valid_proof,
            witness_calls: AtomicUsize::new(0),
            delay,
        });
        let keys = Arc::new(TradingKeyManager::new(Arc::new(KeyInfoCache::memory())));
        let loader = Arc::new(CircuitLoader::new(
            Arc::new(StaticSource),
            Arc::new(MemoryArtifactStore::new()),
            ArtifactNames::default(),
        ));
        let generator = Arc::new(ProofGenerator::with_toolkit(
            loader,
            Arc::clone(&keys),
            toolkit.clone(),
            false,
        ));
        let backend = Arc::new(RecordingBackend {
            reject_with,
            ..Default::default()
        });
        let identity = Arc::new(IdentityRegistry::new());

        Harness {
            submitter: OrderSubmitter::new(
                generator,
                Arc::clone(&keys),
                Arc::clone(&identity),
                backend.clone(),
                PairRegistry::default(),
            ),
            toolkit,
            backend,
            keys,
            identity,
            wallet: TradingWallet::from_private_key(TEST_PRIVATE_KEY).unwrap(),
        }
    }

    async fn ready(h: &Harness) {
        h.identity.mark_verified(&h.wallet.address_lower());
        h.keys.get_trading_key_info(&h.wallet).await.unwrap();
    }

    fn market_buy() -> OrderRequest {
        OrderRequest::market("HYPE-USDC", OrderSide::Buy, Decimal::new(500, 1))
    }

    #[tokio::test]
    async fn test_submit_order_completes() {
        let h = harness(true, None);
        ready(&h).await;
        assert!(h.submitter.can_submit(&h.wallet).await);

        let receipt = h.submitter.submit_order(&market_buy(), &h.wallet).await.unwrap();
        assert_eq!(receipt.tx_hash, format!("0x{:064x}", 42));
        assert_eq!(receipt.order_hash, "1234");
        assert_eq!(receipt.nullifier, "5678");
        assert!(h.submitter.is_complete());
        assert_eq!(h.submitter.state().progress(), 100);

        let requests = h.backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].pair_id, 1);
        assert_eq!(requests[0].side, 1);
        assert_eq!(requests[0].price_tick, 0);
        assert_eq!(requests[0].amount, 50_000_000);
        assert_eq!(requests[0].order_hash, "1234");
    }

    #[tokio::test]
    async fn test_guards_fail_fast() {
        let h = harness(true, None);

        match h.submitter.submit_order(&market_buy(), &Disconnected).await {
            Err(Error::Precondition { message }) => assert_eq!(message, "Wallet not connected"),
            other => panic!("expected precondition error, got {:?}", other),
        }

        match h.submitter.submit_order(&market_buy(), &h.wallet).await {
            Err(Error::Precondition { message }) => assert_eq!(message, "KYC verification required"),
            other => panic!("expected precondition error, got {:?}", other),
        }

        h.identity.mark_verified(&h.wallet.address_lower());
        match h.submitter.submit_order(&market_buy(), &h.wallet).await {
            Err(Error::Precondition { message }) => assert_eq!(message, "Trading keys not initialized"),
            other => panic!("expected precondition error, got {:?}", other),
        }

        assert!(!h.submitter.can_submit(&h.wallet).await);
        assert!(h.submitter.is_idle());
        assert_eq!(h.toolkit.witness_calls.load(Ordering::SeqCst), 0);
        assert!(h.backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_proof_ends_in_error_without_submission() {
        let h = harness(false, None);
        ready(&h).await;

        let result = h.submitter.submit_order(&market_buy(), &h.wallet).await;
        assert!(matches!(result, Err(Error::ProofInvalid { .. })));
        assert!(h.submitter.has_error());
        assert!(h.backend.requests.lock().unwrap().is_empty());
        // Error and retry are allowed from here.
        assert!(h.submitter.can_submit(&h.wallet).await);
    }

    #[tokio::test]
    async fn test_backend_rejection_is_surfaced_and_retryable() {
        let h = harness(true, Some(409));
        ready(&h).await;

        let err = h.submitter.submit_order(&market_buy(), &h.wallet).await.unwrap_err();
        assert!(err.is_retryable());
        let state = h.submitter.state();
        let message = state.error_message().unwrap();
        assert!(message.contains("409"));
        assert!(message.contains("nullifier already seen"));
        assert!(state.progress() >= SubmissionState::SUBMITTING_PROGRESS);
    }

    #[tokio::test]
    async fn test_unknown_pair_is_invalid_order() {
        let h = harness(true, None);
        ready(&h).await;

        let request = OrderRequest::market("DOGE-USDC", OrderSide::Sell, Decimal::ONE);
        let result = h.submitter.submit_order(&request, &h.wallet).await;
        assert!(matches!(result, Err(Error::InvalidOrder { .. })));
        assert_eq!(h.toolkit.witness_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let h = harness(true, None);
        ready(&h).await;

        let mut updates = h.submitter.subscribe();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let collector_seen = Arc::clone(&seen);
        let collector = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let state = updates.borrow_and_update().clone();
                let done = !state.is_processing();
                collector_seen.lock().unwrap().push(state.progress());
                if done {
                    break;
                }
            }
        });

        h.submitter.submit_order(&market_buy(), &h.wallet).await.unwrap();
        collector.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.last(), Some(&100));
        for pair in seen.windows(2) {
            assert!(pair[0] <= pair[1], "progress went backwards: {:?}", seen);
        }
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let h = harness(true, None);
        ready(&h).await;

        h.submitter.submit_order(&market_buy(), &h.wallet).await.unwrap();
        assert!(h.submitter.is_complete());

        h.submitter.reset();
        assert!(h.submitter.is_idle());
        assert_eq!(h.submitter.state().progress(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_admit_one() {
        let h = harness_with_delay(true, None, Duration::from_millis(50));
        ready(&h).await;

        let order = market_buy();
        let (first, second) = tokio::join!(
            h.submitter.submit_order(&order, &h.wallet),
            h.submitter.submit_order(&order, &h.wallet),
        );

        assert!(first.is_ok());
        match second {
            Err(Error::Precondition { message }) => {
                assert_eq!(message, "An order submission is already in progress")
            }
            other => panic!("expected precondition error, got {:?}", other),
        }
        assert_eq!(h.toolkit.witness_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.requests.lock().unwrap().len(), 1);
        assert!(h.submitter.can_submit(&h.wallet).await);
    }

    #[test]
    fn test_claim_is_exclusive_until_released() {
        let h = harness(true, None);
        let tracker = &h.submitter.tracker;

        let first = tracker.claim().unwrap();
        assert!(tracker.claim().is_none());
        drop(first);
        let second = tracker.claim().unwrap();

        // Reset frees the slot; the stale claim must not release a newer one.
        h.submitter.reset();
        let third = tracker.claim().unwrap();
        drop(second);
        assert!(tracker.claim().is_none());
        drop(third);
        assert!(tracker.claim().is_some());
    }

    #[test]
    fn test_proving_progress_stays_in_band() {
        assert_eq!(proving_progress(PipelineStage::DerivingKeys), 26);
        assert_eq!(proving_progress(PipelineStage::Complete), 79);
        assert!(proving_progress(PipelineStage::SigningOrder) < proving_progress(PipelineStage::PreparingInputs));
    }
}

//! Clients for external services.

pub mod sequencer;

pub use sequencer::{
    tx_hash_from_order_id, OrderBackend, SequencerClient, SubmitOrderRequest, SubmitOrderResponse,
};

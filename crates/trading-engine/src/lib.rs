//! Trading Engine
//!
//! Order submission for the zkCLOB: guards, proof generation, backend
//! submission and the observable submission state machine.

pub mod state;
pub mod submitter;

pub use state::{OrderReceipt, SubmissionState};
pub use submitter::OrderSubmitter;

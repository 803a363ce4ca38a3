//! Submission state machine.
//!
//! `idle -> preparing -> generating-proof -> submitting -> complete`, with
//! `error` reachable from every non-terminal state.

use serde::{Deserialize, Serialize};

/// Result of an accepted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    /// Display transaction hash built from the backend order id.
    pub tx_hash: String,
    pub order_hash: String,
    pub nullifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Preparing { progress: u8 },
    GeneratingProof { progress: u8 },
    Submitting { progress: u8 },
    Complete { receipt: OrderReceipt },
    Error { message: String, progress: u8 },
}

impl SubmissionState {
    pub const PREPARING_PROGRESS: u8 = 10;
    pub const PROVING_PROGRESS: u8 = 20;
    pub const SUBMITTING_PROGRESS: u8 = 80;

    pub fn progress(&self) -> u8 {
        match self {
            SubmissionState::Idle => 0,
            SubmissionState::Preparing { progress }
            | SubmissionState::GeneratingProof { progress }
            | SubmissionState::Submitting { progress }
            | SubmissionState::Error { progress, .. } => *progress,
            SubmissionState::Complete { .. } => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Preparing { .. } => "preparing",
            SubmissionState::GeneratingProof { .. } => "generating-proof",
            SubmissionState::Submitting { .. } => "submitting",
            SubmissionState::Complete { .. } => "complete",
            SubmissionState::Error { .. } => "error",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            SubmissionState::Preparing { .. }
                | SubmissionState::GeneratingProof { .. }
                | SubmissionState::Submitting { .. }
        )
    }

    pub fn receipt(&self) -> Option<&OrderReceipt> {
        match self {
            SubmissionState::Complete { receipt } => Some(receipt),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SubmissionState::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Position along the happy path; `None` for `error`.
    fn rank(&self) -> Option<u8> {
        match self {
            SubmissionState::Idle => Some(0),
            SubmissionState::Preparing { .. } => Some(1),
            SubmissionState::GeneratingProof { .. } => Some(2),
            SubmissionState::Submitting { .. } => Some(3),
            SubmissionState::Complete { .. } => Some(4),
            SubmissionState::Error { .. } => None,
        }
    }

    /// Whether an in-flight attempt may move from `self` to `next`.
    ///
    /// Stages only move forward, progress never decreases, and `complete`
    /// and `error` are terminal until a new attempt starts.
    pub fn can_advance_to(&self, next: &SubmissionState) -> bool {
        if !self.is_processing() {
            return false;
        }
        match next.rank() {
            None => true,
            Some(rank) => {
                self.rank().is_some_and(|current| rank >= current) && next.progress() >= self.progress()
            }
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> OrderReceipt {
        OrderReceipt {
            tx_hash: format!("0x{:064x}", 7),
            order_hash: "1234".to_string(),
            nullifier: "5678".to_string(),
        }
    }

    #[test]
    fn test_progress_per_state() {
        assert_eq!(SubmissionState::Idle.progress(), 0);
        assert_eq!(SubmissionState::Preparing { progress: 10 }.progress(), 10);
        assert_eq!(SubmissionState::Complete { receipt: receipt() }.progress(), 100);
        assert_eq!(
            SubmissionState::Error {
                message: "boom".to_string(),
                progress: 42
            }
            .progress(),
            42
        );
    }

    #[test]
    fn test_forward_only_transitions() {
        let preparing = SubmissionState::Preparing { progress: 10 };
        let proving = SubmissionState::GeneratingProof { progress: 20 };

        assert!(preparing.can_advance_to(&proving));
        assert!(!proving.can_advance_to(&preparing));
        assert!(proving.can_advance_to(&SubmissionState::GeneratingProof { progress: 55 }));
        assert!(!proving.can_advance_to(&SubmissionState::GeneratingProof { progress: 15 }));
        assert!(proving.can_advance_to(&SubmissionState::Error {
            message: "failed".to_string(),
            progress: 20
        }));
    }

    #[test]
    fn test_terminal_states_do_not_advance() {
        let complete = SubmissionState::Complete { receipt: receipt() };
        assert!(!complete.can_advance_to(&SubmissionState::Submitting { progress: 90 }));
        assert!(!SubmissionState::Idle.can_advance_to(&SubmissionState::Preparing { progress: 10 }));
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let json = serde_json::to_value(SubmissionState::GeneratingProof { progress: 35 }).unwrap();
        assert_eq!(json["status"], "generating-proof");
        assert_eq!(json["progress"], 35);

        let json = serde_json::to_value(SubmissionState::Complete { receipt: receipt() }).unwrap();
        assert_eq!(json["receipt"]["orderHash"], "1234");
    }
}

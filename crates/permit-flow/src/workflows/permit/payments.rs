use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, ActorRole, Department, DocumentRef, Payment, PaymentState,
};

/// Failures of the settlement state machine and its card-network seam.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("payment is already verified; no further mutation is permitted")]
    AlreadyPaid,
    #[error("no proof has been submitted for this payment")]
    NoProofSubmitted,
    #[error("a manual proof is under review; resolve it before capturing")]
    ProofUnderReview,
    #[error("officer '{0}' is not a cashier/bank verifier")]
    UnauthorizedVerifier(String),
    #[error("payment gateway failure: {0}")]
    Gateway(#[from] GatewayError),
}

/// Error surfaced by the card/PayPal network collaborator. Captures are
/// never retried internally; the caller retries with a fresh nonce.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("capture timed out before the network answered")]
    Timeout,
    #[error("nonce was already presented; a capture is never replayed")]
    DuplicateNonce,
    #[error("network declined the capture: {0}")]
    Declined(String),
}

/// Successful synchronous capture acknowledgement from the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    pub transaction_id: String,
    pub captured_at: DateTime<Utc>,
}

/// Card/PayPal network collaborator. Duplicate-nonce rejection is the
/// gateway's responsibility, not the service's.
pub trait CardGateway: Send + Sync {
    fn capture(
        &self,
        payment: &Payment,
        nonce: &str,
        device_fingerprint: &str,
    ) -> Result<CaptureReceipt, GatewayError>;
}

impl Payment {
    /// Attach (or replace) an unresolved proof, moving the row to
    /// `PendingVerification`. Clears any prior rejection so the claim check
    /// stops surfacing it.
    pub fn submit_proof(&mut self, proof: DocumentRef) -> Result<(), PaymentError> {
        match self.state {
            PaymentState::Paid => Err(PaymentError::AlreadyPaid),
            PaymentState::Issued | PaymentState::PendingVerification => {
                self.proof = Some(proof);
                self.reject_reason = None;
                self.state = PaymentState::PendingVerification;
                Ok(())
            }
        }
    }

    /// Manual verification for the bank-deposit and cashier channels.
    /// Only a Treasury verifier may mark a row paid.
    pub fn verify(&mut self, verifier: &Actor, at: DateTime<Utc>) -> Result<(), PaymentError> {
        if verifier.role != ActorRole::Assessor(Department::Trsy) {
            return Err(PaymentError::UnauthorizedVerifier(
                verifier.officer_id.clone(),
            ));
        }

        match self.state {
            PaymentState::Paid => Err(PaymentError::AlreadyPaid),
            PaymentState::Issued => Err(PaymentError::NoProofSubmitted),
            PaymentState::PendingVerification => {
                self.state = PaymentState::Paid;
                self.paid_at = Some(at);
                self.reject_reason = None;
                Ok(())
            }
        }
    }

    /// Send an illegible or mismatched proof back for resubmission. The
    /// row returns to `Issued` and keeps the reason until a new proof lands.
    pub fn reject(&mut self, reason: &str) -> Result<(), PaymentError> {
        match self.state {
            PaymentState::Paid => Err(PaymentError::AlreadyPaid),
            PaymentState::Issued => Err(PaymentError::NoProofSubmitted),
            PaymentState::PendingVerification => {
                self.state = PaymentState::Issued;
                self.proof = None;
                self.reject_reason = Some(reason.to_string());
                Ok(())
            }
        }
    }

    /// Guard the capture edge: only an `Issued` row may go straight to
    /// `Paid` through the card network.
    pub fn ensure_capturable(&self) -> Result<(), PaymentError> {
        match self.state {
            PaymentState::Paid => Err(PaymentError::AlreadyPaid),
            PaymentState::PendingVerification => Err(PaymentError::ProofUnderReview),
            PaymentState::Issued => Ok(()),
        }
    }

    /// Apply a successful network capture. Called only after the gateway
    /// acknowledged, so the row and the receipt commit together.
    pub fn mark_captured(&mut self, receipt: CaptureReceipt) -> Result<(), PaymentError> {
        self.ensure_capturable()?;
        self.state = PaymentState::Paid;
        self.paid_at = Some(receipt.captured_at);
        self.transaction_id = Some(receipt.transaction_id);
        self.reject_reason = None;
        Ok(())
    }
}

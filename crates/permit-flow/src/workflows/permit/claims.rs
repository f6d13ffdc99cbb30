use serde::Serialize;

use super::domain::{ClaimAppointment, Payment, PaymentState, PermitApplication};

/// Outcome of a claim-readiness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ClaimStatus {
    /// Every payment row is paid; the permit is collectible on this date.
    Ready(ClaimAppointment),
    /// Settlement is still in flight. `rejection` carries the first
    /// recorded rejection reason so the client can prompt resubmission
    /// instead of silently waiting.
    Pending {
        outstanding: usize,
        rejection: Option<String>,
    },
    /// Treasury has not issued a tax order yet.
    NoPaymentsIssued,
}

#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("appointment book unavailable: {0}")]
    BookUnavailable(String),
}

/// External scheduling collaborator that owns appointment slots and the
/// certificate artifact.
pub trait AppointmentBook: Send + Sync {
    fn reserve(&self, application: &PermitApplication) -> Result<ClaimAppointment, ClaimError>;
}

/// Where an application's settlement stands, reduced from its payment rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementProgress {
    NoneIssued,
    Outstanding {
        count: usize,
        rejection: Option<String>,
    },
    FullyPaid,
}

/// Pure reduction; the service decides whether to reserve an appointment.
pub fn settlement_progress(payments: &[Payment]) -> SettlementProgress {
    if payments.is_empty() {
        return SettlementProgress::NoneIssued;
    }

    let unpaid: Vec<&Payment> = payments
        .iter()
        .filter(|payment| payment.state != PaymentState::Paid)
        .collect();
    if unpaid.is_empty() {
        return SettlementProgress::FullyPaid;
    }

    let rejection = unpaid
        .iter()
        .find_map(|payment| payment.reject_reason.clone());

    SettlementProgress::Outstanding {
        count: unpaid.len(),
        rejection,
    }
}

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApprovalLedger, Department, DocumentRef, Payment, PaymentId,
    PaymentSchedule, PaymentState, TaxAssessment,
};

/// Treasury's issuance request: the entered amounts and the scanned tax
/// order document that must accompany them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxOrderRequest {
    pub quarterly: bool,
    /// One amount for a lump sum, exactly four for a quarterly schedule.
    pub amounts_centavos: Vec<u64>,
    pub document: Option<DocumentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentError {
    #[error("mandatory departments still pending: {}", .pending.iter().map(|d| d.code()).collect::<Vec<_>>().join(", "))]
    IncompleteLedger { pending: Vec<Department> },
    #[error("a proof-of-tax-order document must accompany issuance")]
    MissingDocument,
    #[error("a quarterly schedule takes exactly four amounts, got {0}")]
    QuarterCount(usize),
    #[error("a lump sum takes exactly one amount, got {0}")]
    LumpSumCount(usize),
    #[error("entered amounts sum to {entered_centavos}, ledger total is {expected_centavos}")]
    TotalMismatch {
        expected_centavos: u64,
        entered_centavos: u64,
    },
    #[error("a tax order was already issued for this application")]
    AlreadyIssued,
}

/// Derive the assessment for a complete ledger, validating Treasury's
/// entered amounts against the billable fee total.
pub fn compute_assessment(
    ledger: &ApprovalLedger,
    mandatory: &BTreeSet<Department>,
    request: &TaxOrderRequest,
) -> Result<TaxAssessment, AssessmentError> {
    if !ledger.is_complete(mandatory) {
        return Err(AssessmentError::IncompleteLedger {
            pending: ledger.pending_departments(mandatory),
        });
    }

    let document = request
        .document
        .clone()
        .ok_or(AssessmentError::MissingDocument)?;

    let total_centavos = ledger.billable_total_centavos();
    let entered_centavos: u64 = request.amounts_centavos.iter().sum();
    if entered_centavos != total_centavos {
        return Err(AssessmentError::TotalMismatch {
            expected_centavos: total_centavos,
            entered_centavos,
        });
    }

    let schedule = if request.quarterly {
        match <[u64; 4]>::try_from(request.amounts_centavos.as_slice()) {
            Ok(quarters) => PaymentSchedule::Quarterly(quarters),
            Err(_) => return Err(AssessmentError::QuarterCount(request.amounts_centavos.len())),
        }
    } else {
        match request.amounts_centavos.as_slice() {
            [amount] => PaymentSchedule::LumpSum(*amount),
            other => return Err(AssessmentError::LumpSumCount(other.len())),
        }
    };

    Ok(TaxAssessment {
        total_centavos,
        schedule,
        document,
    })
}

/// Materialize the payment rows a schedule issues: one for a lump sum,
/// four independent rows for a quarterly schedule.
pub fn payments_for_assessment(
    assessment: &TaxAssessment,
    application_id: &ApplicationId,
    issued_at: DateTime<Utc>,
    mut next_payment_id: impl FnMut() -> PaymentId,
) -> Vec<Payment> {
    let mut blank = |quarter: Option<u8>, amount_centavos: u64| Payment {
        payment_id: next_payment_id(),
        application_id: application_id.clone(),
        quarter,
        amount_centavos,
        issued_at,
        state: PaymentState::Issued,
        proof: None,
        paid_at: None,
        transaction_id: None,
        reject_reason: None,
    };

    match &assessment.schedule {
        PaymentSchedule::LumpSum(amount) => vec![blank(None, *amount)],
        PaymentSchedule::Quarterly(quarters) => quarters
            .iter()
            .enumerate()
            .map(|(index, amount)| blank(Some(index as u8 + 1), *amount))
            .collect(),
    }
}

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::WorkflowConfig;

use super::assessment::{
    compute_assessment, payments_for_assessment, AssessmentError, TaxOrderRequest,
};
use super::claims::{
    settlement_progress, AppointmentBook, ClaimError, ClaimStatus, SettlementProgress,
};
use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationKind, ApprovalDecision, ApprovalLedger,
    BusinessAddress, Department, DocumentRef, Payment, PaymentId, PermitApplication,
    TaxAssessment, ZoneResolution,
};
use super::gating::{allowed_actions, ensure_allowed, Action, GatingContext, GatingError};
use super::ledger::{entry_from_decision, ApprovalError};
use super::payments::{CardGateway, PaymentError};
use super::repository::{PermitRepository, RepositoryError, ZoneLookup, ZoneLookupError};

/// Intake payload for a new permit/tax application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub kind: ApplicationKind,
    pub owner: String,
    pub address: BusinessAddress,
    pub tin: String,
}

/// Result of a Treasury issuance: the derived assessment and the payment
/// rows it materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedTaxOrder {
    pub assessment: TaxAssessment,
    pub payments: Vec<Payment>,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static PAYMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("bp-{id:06}"))
}

fn next_payment_id() -> PaymentId {
    let id = PAYMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PaymentId(format!("pay-{id:06}"))
}

/// One logical owner per application id: payment resolution and the claim
/// check run under the application's lock so a stale read across a
/// quarterly schedule can never produce a premature claim.
#[derive(Default)]
struct ApplicationLocks {
    inner: Mutex<HashMap<ApplicationId, Arc<Mutex<()>>>>,
}

impl ApplicationLocks {
    fn handle(&self, id: &ApplicationId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().expect("application lock map poisoned");
        map.entry(id.clone()).or_default().clone()
    }

    /// Drop the map entry once an application has no further transitions.
    /// Outstanding handles stay valid through their own `Arc` clones.
    fn release(&self, id: &ApplicationId) {
        let mut map = self.inner.lock().expect("application lock map poisoned");
        map.remove(id);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        let map = self.inner.lock().expect("application lock map poisoned");
        map.len()
    }
}

/// Service composing the ledger, gating policy, assessment calculator,
/// payment channels, and claim scheduler over the repository and the
/// external collaborators.
pub struct PermitWorkflowService<R, G, B, Z> {
    repository: Arc<R>,
    gateway: Arc<G>,
    appointments: Arc<B>,
    zones: Arc<Z>,
    workflow: WorkflowConfig,
    locks: ApplicationLocks,
}

impl<R, G, B, Z> PermitWorkflowService<R, G, B, Z>
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    pub fn new(
        repository: Arc<R>,
        gateway: Arc<G>,
        appointments: Arc<B>,
        zones: Arc<Z>,
        workflow: WorkflowConfig,
    ) -> Self {
        Self {
            repository,
            gateway,
            appointments,
            zones,
            workflow,
            locks: ApplicationLocks::default(),
        }
    }

    fn mandatory(&self) -> &BTreeSet<Department> {
        &self.workflow.mandatory_departments
    }

    #[cfg(test)]
    pub(super) fn tracked_application_locks(&self) -> usize {
        self.locks.tracked()
    }

    fn application(&self, id: &ApplicationId) -> Result<PermitApplication, PermitServiceError> {
        Ok(self
            .repository
            .fetch_application(id)?
            .ok_or(RepositoryError::NotFound)?)
    }

    fn gating_snapshot(
        &self,
        id: &ApplicationId,
    ) -> Result<(PermitApplication, ApprovalLedger, bool), PermitServiceError> {
        let application = self.application(id)?;
        let ledger = self.repository.ledger(id)?;
        let issued = !self.repository.payments(id)?.is_empty();
        Ok((application, ledger, issued))
    }

    /// Register a new application; ownership stays with its creator until
    /// the approvals close it.
    pub fn register(
        &self,
        intake: NewApplication,
    ) -> Result<PermitApplication, PermitServiceError> {
        let application = PermitApplication {
            application_id: next_application_id(),
            kind: intake.kind,
            owner: intake.owner,
            address: intake.address,
            tin: intake.tin,
            submitted_at: Utc::now(),
            tracking_number: None,
            completed: false,
        };

        let stored = self.repository.insert_application(application)?;
        info!(
            application_id = %stored.application_id.0,
            kind = stored.kind.label(),
            "application registered"
        );
        Ok(stored)
    }

    pub fn get(&self, id: &ApplicationId) -> Result<PermitApplication, PermitServiceError> {
        self.application(id)
    }

    /// Full ordered ledger snapshot; absent departments are pending.
    pub fn ledger(&self, id: &ApplicationId) -> Result<ApprovalLedger, PermitServiceError> {
        self.application(id)?;
        Ok(self.repository.ledger(id)?)
    }

    /// The actions `actor` may perform next on this application.
    pub fn allowed_actions(
        &self,
        id: &ApplicationId,
        role: &ActorRole,
    ) -> Result<BTreeSet<Action>, PermitServiceError> {
        let (application, ledger, issued) = self.gating_snapshot(id)?;
        let ctx = GatingContext {
            ledger: &ledger,
            mandatory: self.mandatory(),
            tracking_number_assigned: application.tracking_number.is_some(),
            tax_order_issued: issued,
        };
        Ok(allowed_actions(&ctx, role))
    }

    /// Record a department's one-shot decision. The conditional insert in
    /// the repository is what makes concurrent duplicates impossible; the
    /// gating check only rejects the obvious cases early.
    pub fn submit_approval(
        &self,
        id: &ApplicationId,
        department: Department,
        actor: &Actor,
        decision: ApprovalDecision,
    ) -> Result<ApprovalLedger, PermitServiceError> {
        let (application, ledger, issued) = self.gating_snapshot(id)?;

        // A terminal entry for this department is a duplicate, not a
        // gating refusal; the gating table has already withdrawn
        // SubmitAssessment for it and would mask the real cause.
        if ledger.has_entry(department) {
            return Err(ApprovalError::DuplicateApproval(department).into());
        }

        let ctx = GatingContext {
            ledger: &ledger,
            mandatory: self.mandatory(),
            tracking_number_assigned: application.tracking_number.is_some(),
            tax_order_issued: issued,
        };
        ensure_allowed(&ctx, &actor.role, Action::SubmitAssessment)?;

        let entry = entry_from_decision(department, actor, decision, Utc::now())?;
        let snapshot = self
            .repository
            .insert_approval(id, entry)
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    PermitServiceError::Approval(ApprovalError::DuplicateApproval(department))
                }
                other => PermitServiceError::Repository(other),
            })?;

        info!(
            application_id = %id.0,
            department = department.code(),
            "approval recorded"
        );
        Ok(snapshot)
    }

    /// Fire Safety's one-time tracking-number assignment.
    pub fn assign_tracking_number(
        &self,
        id: &ApplicationId,
        actor: &Actor,
        tracking_number: String,
    ) -> Result<PermitApplication, PermitServiceError> {
        let (application, ledger, issued) = self.gating_snapshot(id)?;
        let ctx = GatingContext {
            ledger: &ledger,
            mandatory: self.mandatory(),
            tracking_number_assigned: application.tracking_number.is_some(),
            tax_order_issued: issued,
        };
        ensure_allowed(&ctx, &actor.role, Action::AssignTrackingNumber)?;

        let updated = self
            .repository
            .assign_tracking_number(id, tracking_number)
            .map_err(|err| match err {
                // Lost the race against another BFP submission.
                RepositoryError::Conflict => PermitServiceError::Gating(GatingError::Forbidden(
                    Action::AssignTrackingNumber,
                )),
                other => PermitServiceError::Repository(other),
            })?;
        Ok(updated)
    }

    /// Treasury issuance: derive the assessment from the complete ledger
    /// and materialize the payment rows, at most once per application.
    pub fn issue_tax_order(
        &self,
        id: &ApplicationId,
        actor: &Actor,
        request: TaxOrderRequest,
    ) -> Result<IssuedTaxOrder, PermitServiceError> {
        let (application, ledger, issued) = self.gating_snapshot(id)?;
        let ctx = GatingContext {
            ledger: &ledger,
            mandatory: self.mandatory(),
            tracking_number_assigned: application.tracking_number.is_some(),
            tax_order_issued: issued,
        };
        ensure_allowed(&ctx, &actor.role, Action::IssueTaxOrder)?;

        let assessment = compute_assessment(&ledger, self.mandatory(), &request)?;
        let rows = payments_for_assessment(&assessment, id, Utc::now(), next_payment_id);
        let payments = self
            .repository
            .insert_payments(id, rows)
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    PermitServiceError::Assessment(AssessmentError::AlreadyIssued)
                }
                other => PermitServiceError::Repository(other),
            })?;

        info!(
            application_id = %id.0,
            total_centavos = assessment.total_centavos,
            rows = payments.len(),
            "tax order issued"
        );
        Ok(IssuedTaxOrder {
            assessment,
            payments,
        })
    }

    fn resolve_payment<F>(
        &self,
        payment_id: &PaymentId,
        apply: F,
    ) -> Result<Payment, PermitServiceError>
    where
        F: FnOnce(&mut Payment) -> Result<(), PaymentError>,
    {
        let located = self
            .repository
            .fetch_payment(payment_id)?
            .ok_or(RepositoryError::NotFound)?;
        let handle = self.locks.handle(&located.application_id);
        let _guard = handle.lock().expect("application lock poisoned");

        // Re-read under the lock; the first fetch only located the owner.
        let mut payment = self
            .repository
            .fetch_payment(payment_id)?
            .ok_or(RepositoryError::NotFound)?;
        apply(&mut payment)?;
        self.repository.update_payment(payment.clone())?;
        Ok(payment)
    }

    /// Bank-deposit / cashier channels: attach or replace a proof.
    pub fn submit_proof(
        &self,
        payment_id: &PaymentId,
        proof: DocumentRef,
    ) -> Result<Payment, PermitServiceError> {
        self.resolve_payment(payment_id, |payment| payment.submit_proof(proof))
    }

    /// Mark a proof-backed payment paid; cashier/bank verifiers only.
    pub fn verify_payment(
        &self,
        payment_id: &PaymentId,
        verifier: &Actor,
    ) -> Result<Payment, PermitServiceError> {
        let payment =
            self.resolve_payment(payment_id, |payment| payment.verify(verifier, Utc::now()))?;
        info!(payment_id = %payment.payment_id.0, "payment verified");
        Ok(payment)
    }

    /// Send a proof back for resubmission, recording the reason.
    pub fn reject_payment(
        &self,
        payment_id: &PaymentId,
        reason: &str,
    ) -> Result<Payment, PermitServiceError> {
        self.resolve_payment(payment_id, |payment| payment.reject(reason))
    }

    /// Card/PayPal capture: a blocking network call. A gateway failure
    /// leaves the row untouched so the caller can retry with a fresh
    /// nonce; the gateway itself rejects nonce reuse.
    pub fn capture_payment(
        &self,
        payment_id: &PaymentId,
        nonce: &str,
        device_fingerprint: &str,
    ) -> Result<Payment, PermitServiceError> {
        let located = self
            .repository
            .fetch_payment(payment_id)?
            .ok_or(RepositoryError::NotFound)?;
        let handle = self.locks.handle(&located.application_id);
        let _guard = handle.lock().expect("application lock poisoned");

        let mut payment = self
            .repository
            .fetch_payment(payment_id)?
            .ok_or(RepositoryError::NotFound)?;
        payment.ensure_capturable().map_err(PermitServiceError::Payment)?;

        let receipt = self
            .gateway
            .capture(&payment, nonce, device_fingerprint)
            .map_err(|err| PermitServiceError::Payment(PaymentError::Gateway(err)))?;

        payment
            .mark_captured(receipt)
            .map_err(PermitServiceError::Payment)?;
        self.repository.update_payment(payment.clone())?;
        info!(payment_id = %payment.payment_id.0, "card capture settled");
        Ok(payment)
    }

    /// Claim readiness: ready iff every payment row is paid. Reserves the
    /// appointment on first readiness and returns the stored one afterward.
    pub fn check_ready_for_claim(
        &self,
        id: &ApplicationId,
    ) -> Result<ClaimStatus, PermitServiceError> {
        let application = self.application(id)?;
        let handle = self.locks.handle(id);
        let _guard = handle.lock().expect("application lock poisoned");

        let payments = self.repository.payments(id)?;
        match settlement_progress(&payments) {
            SettlementProgress::NoneIssued => Ok(ClaimStatus::NoPaymentsIssued),
            SettlementProgress::Outstanding { count, rejection } => Ok(ClaimStatus::Pending {
                outstanding: count,
                rejection,
            }),
            SettlementProgress::FullyPaid => {
                if let Some(existing) = self.repository.claim(id)? {
                    self.locks.release(id);
                    return Ok(ClaimStatus::Ready(existing));
                }

                let appointment = self.appointments.reserve(&application)?;
                let stored = match self.repository.insert_claim(appointment) {
                    Ok(stored) => stored,
                    // Lost a race with another checker; theirs stands.
                    Err(RepositoryError::Conflict) => self
                        .repository
                        .claim(id)?
                        .ok_or(RepositoryError::NotFound)?,
                    Err(other) => return Err(PermitServiceError::Repository(other)),
                };
                self.repository.mark_completed(id)?;
                self.locks.release(id);
                info!(application_id = %id.0, "permit released for claim");
                Ok(ClaimStatus::Ready(stored))
            }
        }
    }

    /// Passthrough to the zone-lookup collaborator.
    pub fn resolve_zone(
        &self,
        street: &str,
        barangay: &str,
    ) -> Result<ZoneResolution, PermitServiceError> {
        Ok(self.zones.resolve(street, barangay)?)
    }
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum PermitServiceError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    Gating(#[from] GatingError),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Zone(#[from] ZoneLookupError),
}

impl PermitServiceError {
    /// Machine-readable error kind carried in every error response body.
    pub fn kind(&self) -> &'static str {
        match self {
            PermitServiceError::Approval(ApprovalError::Unauthorized { .. }) => "unauthorized",
            PermitServiceError::Approval(ApprovalError::DuplicateApproval(_)) => {
                "duplicate_approval"
            }
            PermitServiceError::Approval(_) => "validation_error",
            PermitServiceError::Gating(GatingError::Forbidden(_)) => "forbidden",
            PermitServiceError::Assessment(AssessmentError::IncompleteLedger { .. }) => {
                "incomplete_ledger"
            }
            PermitServiceError::Assessment(AssessmentError::MissingDocument) => "missing_document",
            PermitServiceError::Assessment(AssessmentError::AlreadyIssued) => "already_issued",
            PermitServiceError::Assessment(_) => "validation_error",
            PermitServiceError::Payment(PaymentError::AlreadyPaid) => "already_paid",
            PermitServiceError::Payment(PaymentError::NoProofSubmitted) => "no_proof_submitted",
            PermitServiceError::Payment(PaymentError::ProofUnderReview) => "proof_under_review",
            PermitServiceError::Payment(PaymentError::UnauthorizedVerifier(_)) => "forbidden",
            PermitServiceError::Payment(PaymentError::Gateway(_)) => "payment_gateway_error",
            PermitServiceError::Claim(_) => "claim_unavailable",
            PermitServiceError::Repository(RepositoryError::Conflict) => "conflict",
            PermitServiceError::Repository(RepositoryError::NotFound) => "not_found",
            PermitServiceError::Repository(RepositoryError::Unavailable(_)) => {
                "repository_unavailable"
            }
            PermitServiceError::Zone(ZoneLookupError::UnknownBarangay(_)) => "unknown_barangay",
            PermitServiceError::Zone(ZoneLookupError::Unavailable(_)) => "zone_unavailable",
        }
    }
}

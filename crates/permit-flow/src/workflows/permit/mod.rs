//! Business-permit workflow: approval ledger, role gating, tax assessment,
//! payment settlement, and claim release.
//!
//! Data flows strictly downward (application, ledger, gating, assessment,
//! payments, claim) and each stage only reads upstream state and writes
//! its own. All transitions are driven by explicit calls; there is no
//! background scheduler.

pub mod assessment;
pub mod claims;
pub mod domain;
pub mod gating;
pub mod ledger;
pub mod payments;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use assessment::{AssessmentError, TaxOrderRequest};
pub use claims::{AppointmentBook, ClaimError, ClaimStatus};
pub use domain::{
    Actor, ActorRole, ApplicationId, ApplicationKind, Approval, ApprovalDecision,
    ApprovalLedger, BusinessAddress, ClaimAppointment, Department, DocumentRef, Payment,
    PaymentId, PaymentSchedule, PaymentState, PermitApplication, TaxAssessment, ZoneResolution,
};
pub use gating::{allowed_actions, Action, GatingContext, GatingError};
pub use ledger::ApprovalError;
pub use payments::{CaptureReceipt, CardGateway, GatewayError, PaymentError};
pub use repository::{PermitRepository, RepositoryError, ZoneLookup, ZoneLookupError};
pub use router::permit_router;
pub use service::{IssuedTaxOrder, NewApplication, PermitServiceError, PermitWorkflowService};

use super::domain::{
    ApplicationId, Approval, ApprovalLedger, ClaimAppointment, Payment, PaymentId,
    PermitApplication, ZoneResolution,
};

/// Storage abstraction for the permit workflow.
///
/// Every write that must happen at most once is expressed as a conditional
/// method (`..._if_absent` / set-if-unset) rather than read-then-write, so
/// the uniqueness guarantees hold under concurrent callers regardless of
/// the backing store.
pub trait PermitRepository: Send + Sync {
    fn insert_application(
        &self,
        application: PermitApplication,
    ) -> Result<PermitApplication, RepositoryError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<PermitApplication>, RepositoryError>;
    /// Conditional: fails with `Conflict` when a tracking number is set.
    fn assign_tracking_number(
        &self,
        id: &ApplicationId,
        tracking_number: String,
    ) -> Result<PermitApplication, RepositoryError>;
    fn mark_completed(&self, id: &ApplicationId) -> Result<(), RepositoryError>;

    /// Conditional insert keyed on (application, department); fails with
    /// `Conflict` when the department already holds a terminal entry.
    fn insert_approval(
        &self,
        id: &ApplicationId,
        approval: Approval,
    ) -> Result<ApprovalLedger, RepositoryError>;
    /// Full insertion-ordered snapshot; an application with no entries yet
    /// yields an empty ledger.
    fn ledger(&self, id: &ApplicationId) -> Result<ApprovalLedger, RepositoryError>;

    /// Conditional: fails with `Conflict` when a schedule was already
    /// issued for the application.
    fn insert_payments(
        &self,
        id: &ApplicationId,
        payments: Vec<Payment>,
    ) -> Result<Vec<Payment>, RepositoryError>;
    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError>;
    fn update_payment(&self, payment: Payment) -> Result<(), RepositoryError>;
    fn payments(&self, id: &ApplicationId) -> Result<Vec<Payment>, RepositoryError>;

    /// Conditional: at most one appointment per application.
    fn insert_claim(
        &self,
        appointment: ClaimAppointment,
    ) -> Result<ClaimAppointment, RepositoryError>;
    fn claim(&self, id: &ApplicationId) -> Result<Option<ClaimAppointment>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// External zone/geocoding collaborator; no zoning rules live in the
/// workflow itself.
pub trait ZoneLookup: Send + Sync {
    fn resolve(&self, street: &str, barangay: &str) -> Result<ZoneResolution, ZoneLookupError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ZoneLookupError {
    #[error("no zone mapped for barangay '{0}'")]
    UnknownBarangay(String),
    #[error("zone service unavailable: {0}")]
    Unavailable(String),
}

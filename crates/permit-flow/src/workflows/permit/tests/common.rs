use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::permit::claims::{AppointmentBook, ClaimError};
use crate::workflows::permit::domain::{
    Actor, ActorRole, ApplicationId, ApplicationKind, Approval, ApprovalDecision, ApprovalLedger,
    BusinessAddress, ClaimAppointment, Department, DocumentRef, Payment, PaymentId,
    PermitApplication, ZoneResolution,
};
use crate::workflows::permit::payments::{CaptureReceipt, CardGateway, GatewayError};
use crate::workflows::permit::repository::{
    PermitRepository, RepositoryError, ZoneLookup, ZoneLookupError,
};
use crate::workflows::permit::service::{NewApplication, PermitWorkflowService};

pub(super) fn intake() -> NewApplication {
    NewApplication {
        kind: ApplicationKind::NewBusiness,
        owner: "Maria Delgado".to_string(),
        address: BusinessAddress {
            street: "14 Rizal Avenue".to_string(),
            barangay: "Poblacion".to_string(),
        },
        tin: "412-880-192-000".to_string(),
    }
}

pub(super) fn assessor(department: Department) -> Actor {
    Actor {
        officer_id: format!("officer-{}", department.code().to_ascii_lowercase()),
        role: ActorRole::Assessor(department),
    }
}

pub(super) fn approve(fee_centavos: u64) -> ApprovalDecision {
    ApprovalDecision {
        approved: true,
        required: true,
        fee_centavos: Some(fee_centavos),
        remarks: None,
    }
}

pub(super) fn waive() -> ApprovalDecision {
    ApprovalDecision {
        approved: true,
        required: false,
        fee_centavos: None,
        remarks: Some("not applicable to this line of business".to_string()),
    }
}

pub(super) fn document(name: &str) -> DocumentRef {
    DocumentRef {
        name: name.to_string(),
        storage_key: format!("blob://permits/{name}"),
    }
}

pub(super) type TestService =
    PermitWorkflowService<MemoryRepository, RecordingGateway, FixedAppointmentBook, StaticZones>;

pub(super) struct TestHarness {
    pub(super) service: Arc<TestService>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) gateway: Arc<RecordingGateway>,
}

pub(super) fn harness() -> TestHarness {
    let repository = Arc::new(MemoryRepository::default());
    let gateway = Arc::new(RecordingGateway::default());
    let service = Arc::new(PermitWorkflowService::new(
        repository.clone(),
        gateway.clone(),
        Arc::new(FixedAppointmentBook::default()),
        Arc::new(StaticZones),
        WorkflowConfig::default(),
    ));
    TestHarness {
        service,
        repository,
        gateway,
    }
}

/// Register an application and record a terminal entry for every mandatory
/// department, each with the given fee.
pub(super) fn ledgered_application(
    harness: &TestHarness,
    fee_centavos: u64,
) -> (ApplicationId, ApprovalLedger) {
    let application = harness.service.register(intake()).expect("registers");
    let id = application.application_id.clone();

    let mut ledger = ApprovalLedger::default();
    for department in Department::ALL {
        ledger = harness
            .service
            .submit_approval(&id, department, &assessor(department), approve(fee_centavos))
            .expect("approval accepted");
    }
    (id, ledger)
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    applications: Mutex<HashMap<ApplicationId, PermitApplication>>,
    ledgers: Mutex<HashMap<ApplicationId, Vec<Approval>>>,
    payments: Mutex<Vec<Payment>>,
    claims: Mutex<HashMap<ApplicationId, ClaimAppointment>>,
}

impl PermitRepository for MemoryRepository {
    fn insert_application(
        &self,
        application: PermitApplication,
    ) -> Result<PermitApplication, RepositoryError> {
        let mut guard = self.applications.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.application_id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<PermitApplication>, RepositoryError> {
        let guard = self.applications.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn assign_tracking_number(
        &self,
        id: &ApplicationId,
        tracking_number: String,
    ) -> Result<PermitApplication, RepositoryError> {
        let mut guard = self.applications.lock().expect("repository mutex poisoned");
        let application = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if application.tracking_number.is_some() {
            return Err(RepositoryError::Conflict);
        }
        application.tracking_number = Some(tracking_number);
        Ok(application.clone())
    }

    fn mark_completed(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut guard = self.applications.lock().expect("repository mutex poisoned");
        let application = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        application.completed = true;
        Ok(())
    }

    fn insert_approval(
        &self,
        id: &ApplicationId,
        approval: Approval,
    ) -> Result<ApprovalLedger, RepositoryError> {
        let mut guard = self.ledgers.lock().expect("repository mutex poisoned");
        let entries = guard.entry(id.clone()).or_default();
        if entries
            .iter()
            .any(|entry| entry.department == approval.department)
        {
            return Err(RepositoryError::Conflict);
        }
        entries.push(approval);
        Ok(ApprovalLedger {
            entries: entries.clone(),
        })
    }

    fn ledger(&self, id: &ApplicationId) -> Result<ApprovalLedger, RepositoryError> {
        let guard = self.ledgers.lock().expect("repository mutex poisoned");
        Ok(ApprovalLedger {
            entries: guard.get(id).cloned().unwrap_or_default(),
        })
    }

    fn insert_payments(
        &self,
        id: &ApplicationId,
        payments: Vec<Payment>,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let mut guard = self.payments.lock().expect("repository mutex poisoned");
        if guard.iter().any(|payment| &payment.application_id == id) {
            return Err(RepositoryError::Conflict);
        }
        guard.extend(payments.clone());
        Ok(payments)
    }

    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.payments.lock().expect("repository mutex poisoned");
        Ok(guard.iter().find(|payment| &payment.payment_id == id).cloned())
    }

    fn update_payment(&self, payment: Payment) -> Result<(), RepositoryError> {
        let mut guard = self.payments.lock().expect("repository mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| existing.payment_id == payment.payment_id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = payment;
        Ok(())
    }

    fn payments(&self, id: &ApplicationId) -> Result<Vec<Payment>, RepositoryError> {
        let guard = self.payments.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|payment| &payment.application_id == id)
            .cloned()
            .collect())
    }

    fn insert_claim(
        &self,
        appointment: ClaimAppointment,
    ) -> Result<ClaimAppointment, RepositoryError> {
        let mut guard = self.claims.lock().expect("repository mutex poisoned");
        if guard.contains_key(&appointment.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(appointment.application_id.clone(), appointment.clone());
        Ok(appointment)
    }

    fn claim(&self, id: &ApplicationId) -> Result<Option<ClaimAppointment>, RepositoryError> {
        let guard = self.claims.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Gateway double: captures succeed with a deterministic transaction id,
/// nonce reuse is rejected, and nonces starting with `timeout-` simulate a
/// network timeout.
#[derive(Default)]
pub(super) struct RecordingGateway {
    seen_nonces: Mutex<HashSet<String>>,
}

impl RecordingGateway {
    pub(super) fn saw_nonce(&self, nonce: &str) -> bool {
        let seen = self.seen_nonces.lock().expect("gateway mutex poisoned");
        seen.contains(nonce)
    }
}

impl CardGateway for RecordingGateway {
    fn capture(
        &self,
        payment: &Payment,
        nonce: &str,
        _device_fingerprint: &str,
    ) -> Result<CaptureReceipt, GatewayError> {
        let mut seen = self.seen_nonces.lock().expect("gateway mutex poisoned");
        if !seen.insert(nonce.to_string()) {
            return Err(GatewayError::DuplicateNonce);
        }
        if nonce.starts_with("timeout-") {
            return Err(GatewayError::Timeout);
        }
        Ok(CaptureReceipt {
            transaction_id: format!("txn-{}-{nonce}", payment.payment_id.0),
            captured_at: Utc::now(),
        })
    }
}

#[derive(Default)]
pub(super) struct FixedAppointmentBook;

impl AppointmentBook for FixedAppointmentBook {
    fn reserve(&self, application: &PermitApplication) -> Result<ClaimAppointment, ClaimError> {
        Ok(ClaimAppointment {
            application_id: application.application_id.clone(),
            appointment_date: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            certificate: DocumentRef {
                name: format!("permit-{}.pdf", application.application_id.0),
                storage_key: format!("blob://certificates/{}", application.application_id.0),
            },
        })
    }
}

pub(super) struct StaticZones;

impl ZoneLookup for StaticZones {
    fn resolve(&self, _street: &str, barangay: &str) -> Result<ZoneResolution, ZoneLookupError> {
        if barangay.eq_ignore_ascii_case("poblacion") {
            Ok(ZoneResolution {
                zone_code: "C-1".to_string(),
                allowed_business_types: vec!["retail".to_string(), "restaurant".to_string()],
            })
        } else {
            Err(ZoneLookupError::UnknownBarangay(barangay.to_string()))
        }
    }
}

pub(super) fn test_router(harness: &TestHarness) -> axum::Router {
    crate::workflows::permit::router::permit_router(harness.service.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

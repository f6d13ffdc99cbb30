use chrono::{Datelike, Local, Utc, Weekday};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use permit_flow::workflows::permit::{
    AppointmentBook, ApplicationId, Approval, ApprovalLedger, CaptureReceipt, CardGateway,
    ClaimAppointment, ClaimError, DocumentRef, GatewayError, Payment, PaymentId,
    PermitApplication, PermitRepository, RepositoryError, ZoneLookup, ZoneLookupError,
    ZoneResolution,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Mutex-backed store; each map guards one record family so department
/// approvals and payment updates never contend with each other.
#[derive(Default)]
pub(crate) struct InMemoryPermitRepository {
    applications: Mutex<HashMap<ApplicationId, PermitApplication>>,
    ledgers: Mutex<HashMap<ApplicationId, ApprovalLedger>>,
    payments: Mutex<HashMap<ApplicationId, Vec<Payment>>>,
    claims: Mutex<HashMap<ApplicationId, ClaimAppointment>>,
}

impl PermitRepository for InMemoryPermitRepository {
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
        let ledger = guard.entry(id.clone()).or_default();
        if ledger.has_entry(approval.department) {
            return Err(RepositoryError::Conflict);
        }
        ledger.entries.push(approval);
        Ok(ledger.clone())
    }

    fn ledger(&self, id: &ApplicationId) -> Result<ApprovalLedger, RepositoryError> {
        let guard = self.ledgers.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned().unwrap_or_default())
    }

    fn insert_payments(
        &self,
        id: &ApplicationId,
        payments: Vec<Payment>,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let mut guard = self.payments.lock().expect("repository mutex poisoned");
        if guard.contains_key(id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(id.clone(), payments.clone());
        Ok(payments)
    }

    fn fetch_payment(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.payments.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .flatten()
            .find(|payment| &payment.payment_id == id)
            .cloned())
    }

    fn update_payment(&self, payment: Payment) -> Result<(), RepositoryError> {
        let mut guard = self.payments.lock().expect("repository mutex poisoned");
        let rows = guard
            .get_mut(&payment.application_id)
            .ok_or(RepositoryError::NotFound)?;
        let slot = rows
            .iter_mut()
            .find(|row| row.payment_id == payment.payment_id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = payment;
        Ok(())
    }

    fn payments(&self, id: &ApplicationId) -> Result<Vec<Payment>, RepositoryError> {
        let guard = self.payments.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned().unwrap_or_default())
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

/// Stand-in for the card acquirer: every nonce is remembered and a replay
/// is refused, which is the contract live gateways enforce server-side.
#[derive(Default)]
pub(crate) struct SimulatedCardGateway {
    seen_nonces: Mutex<HashSet<String>>,
    sequence: AtomicU64,
}

impl CardGateway for SimulatedCardGateway {
    fn capture(
        &self,
        payment: &Payment,
        nonce: &str,
        device_fingerprint: &str,
    ) -> Result<CaptureReceipt, GatewayError> {
        if nonce.trim().is_empty() {
            return Err(GatewayError::Declined("missing payment nonce".to_string()));
        }
        if device_fingerprint.trim().is_empty() {
            return Err(GatewayError::Declined(
                "missing device fingerprint".to_string(),
            ));
        }

        let mut seen = self.seen_nonces.lock().expect("gateway mutex poisoned");
        if !seen.insert(nonce.to_string()) {
            return Err(GatewayError::DuplicateNonce);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(CaptureReceipt {
            transaction_id: format!("sim-{}-{sequence:06}", payment.payment_id.0),
            captured_at: Utc::now(),
        })
    }
}

/// Books the first business day at least `lead_days` out. One slot per
/// application; the certificate key is derived from the application id.
pub(crate) struct DeterministicAppointmentBook {
    lead_days: u32,
}

impl Default for DeterministicAppointmentBook {
    fn default() -> Self {
        Self { lead_days: 5 }
    }
}

impl AppointmentBook for DeterministicAppointmentBook {
    fn reserve(&self, application: &PermitApplication) -> Result<ClaimAppointment, ClaimError> {
        let mut date = Local::now().date_naive() + chrono::Duration::days(self.lead_days as i64);
        while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date += chrono::Duration::days(1);
        }

        Ok(ClaimAppointment {
            application_id: application.application_id.clone(),
            appointment_date: date,
            certificate: DocumentRef {
                name: format!("permit-{}.pdf", application.application_id.0),
                storage_key: format!("blob://certificates/{}.pdf", application.application_id.0),
            },
        })
    }
}

/// Static barangay-to-zone table standing in for the city GIS service.
pub(crate) struct StaticZoneDirectory {
    zones: HashMap<&'static str, ZoneResolution>,
}

impl Default for StaticZoneDirectory {
    fn default() -> Self {
        let mut zones = HashMap::new();
        zones.insert(
            "poblacion",
            ZoneResolution {
                zone_code: "C-1".to_string(),
                allowed_business_types: vec![
                    "retail".to_string(),
                    "restaurant".to_string(),
                    "services".to_string(),
                ],
            },
        );
        zones.insert(
            "san isidro",
            ZoneResolution {
                zone_code: "R-2".to_string(),
                allowed_business_types: vec!["home-office".to_string(), "sari-sari".to_string()],
            },
        );
        zones.insert(
            "bagong silang",
            ZoneResolution {
                zone_code: "I-1".to_string(),
                allowed_business_types: vec![
                    "light-manufacturing".to_string(),
                    "warehouse".to_string(),
                ],
            },
        );
        Self { zones }
    }
}

impl ZoneLookup for StaticZoneDirectory {
    fn resolve(&self, _street: &str, barangay: &str) -> Result<ZoneResolution, ZoneLookupError> {
        self.zones
            .get(barangay.trim().to_lowercase().as_str())
            .cloned()
            .ok_or_else(|| ZoneLookupError::UnknownBarangay(barangay.to_string()))
    }
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::claims::{AppointmentBook, ClaimStatus};
use super::domain::{
    Actor, ActorRole, ApplicationId, ApprovalDecision, Department, DocumentRef, PaymentId,
};
use super::payments::CardGateway;
use super::repository::{PermitRepository, ZoneLookup};
use super::service::{NewApplication, PermitServiceError, PermitWorkflowService};
use super::assessment::TaxOrderRequest;

/// Router builder exposing the workflow's HTTP boundary.
pub fn permit_router<R, G, B, Z>(service: Arc<PermitWorkflowService<R, G, B, Z>>) -> Router
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    Router::new()
        .route("/api/v1/permits", post(register_handler::<R, G, B, Z>))
        .route(
            "/api/v1/permits/:application_id",
            get(application_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/permits/:application_id/ledger",
            get(ledger_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/permits/:application_id/approvals",
            post(approval_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/permits/:application_id/actions",
            post(actions_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/permits/:application_id/tracking-number",
            post(tracking_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/permits/:application_id/tax-order",
            post(tax_order_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/permits/:application_id/claim",
            get(claim_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/payments/:payment_id/proof",
            post(proof_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/payments/:payment_id/verify",
            post(verify_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/payments/:payment_id/reject",
            post(reject_handler::<R, G, B, Z>),
        )
        .route(
            "/api/v1/payments/:payment_id/capture",
            post(capture_handler::<R, G, B, Z>),
        )
        .route("/api/v1/zone/resolve", post(zone_handler::<R, G, B, Z>))
        .with_state(service)
}

impl IntoResponse for PermitServiceError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            "unauthorized" | "forbidden" => StatusCode::FORBIDDEN,
            "duplicate_approval" | "already_paid" | "already_issued" | "proof_under_review"
            | "no_proof_submitted" | "incomplete_ledger" | "conflict" => StatusCode::CONFLICT,
            "validation_error" | "missing_document" | "unknown_barangay" => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            "not_found" => StatusCode::NOT_FOUND,
            "payment_gateway_error" | "zone_unavailable" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = axum::Json(json!({
            "kind": self.kind(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

fn unknown_department(code: &str) -> Response {
    let body = axum::Json(json!({
        "kind": "validation_error",
        "error": format!("unknown department code '{code}'"),
    }));
    (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
}

/// Actor fields shared by the assessor-facing endpoints; auth is out of
/// scope, so the role tag rides along with the request.
#[derive(Debug, Deserialize)]
struct OfficerDto {
    officer_id: String,
    department: String,
}

impl OfficerDto {
    fn actor(&self) -> Result<Actor, Response> {
        let department = Department::from_code(&self.department)
            .ok_or_else(|| unknown_department(&self.department))?;
        Ok(Actor {
            officer_id: self.officer_id.clone(),
            role: ActorRole::Assessor(department),
        })
    }
}

async fn register_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    axum::Json(intake): axum::Json<NewApplication>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.register(intake) {
        Ok(application) => (StatusCode::CREATED, axum::Json(application)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn application_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn ledger_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.ledger(&ApplicationId(application_id)) {
        Ok(ledger) => {
            let payload = json!({
                "entries": ledger.entries,
                "billable_total_centavos": ledger.billable_total_centavos(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ApprovalRequestBody {
    #[serde(flatten)]
    officer: OfficerDto,
    approved: bool,
    required: bool,
    fee_centavos: Option<u64>,
    remarks: Option<String>,
}

async fn approval_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<ApprovalRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    let actor = match body.officer.actor() {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let department = match actor.role.department() {
        Some(department) => department,
        None => return unknown_department(&body.officer.department),
    };
    let decision = ApprovalDecision {
        approved: body.approved,
        required: body.required,
        fee_centavos: body.fee_centavos,
        remarks: body.remarks,
    };

    match service.submit_approval(&ApplicationId(application_id), department, &actor, decision) {
        Ok(ledger) => {
            let payload = json!({
                "entries": ledger.entries,
                "billable_total_centavos": ledger.billable_total_centavos(),
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ActionsRequestBody {
    /// Absent department means the applicant role.
    department: Option<String>,
}

async fn actions_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<ActionsRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    let role = match body.department.as_deref() {
        Some(code) => match Department::from_code(code) {
            Some(department) => ActorRole::Assessor(department),
            None => return unknown_department(code),
        },
        None => ActorRole::Applicant,
    };

    match service.allowed_actions(&ApplicationId(application_id), &role) {
        Ok(actions) => {
            let labels: Vec<&'static str> = actions.iter().map(|action| action.label()).collect();
            (StatusCode::OK, axum::Json(json!({ "actions": labels }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct TrackingRequestBody {
    #[serde(flatten)]
    officer: OfficerDto,
    tracking_number: String,
}

async fn tracking_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<TrackingRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    let actor = match body.officer.actor() {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match service.assign_tracking_number(
        &ApplicationId(application_id),
        &actor,
        body.tracking_number,
    ) {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct TaxOrderRequestBody {
    #[serde(flatten)]
    officer: OfficerDto,
    quarterly: bool,
    amounts_centavos: Vec<u64>,
    document: Option<DocumentRef>,
}

async fn tax_order_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(application_id): Path<String>,
    axum::Json(body): axum::Json<TaxOrderRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    let actor = match body.officer.actor() {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let request = TaxOrderRequest {
        quarterly: body.quarterly,
        amounts_centavos: body.amounts_centavos,
        document: body.document,
    };

    match service.issue_tax_order(&ApplicationId(application_id), &actor, request) {
        Ok(issued) => (StatusCode::CREATED, axum::Json(issued)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn claim_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.check_ready_for_claim(&ApplicationId(application_id)) {
        Ok(ClaimStatus::Ready(appointment)) => {
            let payload = json!({
                "ready": true,
                "appointment": appointment,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(ClaimStatus::Pending {
            outstanding,
            rejection,
        }) => {
            let payload = json!({
                "ready": false,
                "outstanding": outstanding,
                "rejection": rejection,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(ClaimStatus::NoPaymentsIssued) => {
            let payload = json!({
                "ready": false,
                "outstanding": 0,
                "rejection": serde_json::Value::Null,
                "tax_order_issued": false,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ProofRequestBody {
    document: DocumentRef,
}

async fn proof_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(payment_id): Path<String>,
    axum::Json(body): axum::Json<ProofRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.submit_proof(&PaymentId(payment_id), body.document) {
        Ok(payment) => (StatusCode::OK, axum::Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn verify_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(payment_id): Path<String>,
    axum::Json(officer): axum::Json<OfficerDto>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    let actor = match officer.actor() {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match service.verify_payment(&PaymentId(payment_id), &actor) {
        Ok(payment) => (StatusCode::OK, axum::Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct RejectRequestBody {
    reason: String,
}

async fn reject_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(payment_id): Path<String>,
    axum::Json(body): axum::Json<RejectRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.reject_payment(&PaymentId(payment_id), &body.reason) {
        Ok(payment) => (StatusCode::OK, axum::Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CaptureRequestBody {
    nonce: String,
    device_fingerprint: String,
}

async fn capture_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    Path(payment_id): Path<String>,
    axum::Json(body): axum::Json<CaptureRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.capture_payment(&PaymentId(payment_id), &body.nonce, &body.device_fingerprint) {
        Ok(payment) => (StatusCode::OK, axum::Json(payment)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ZoneRequestBody {
    street: String,
    barangay: String,
}

async fn zone_handler<R, G, B, Z>(
    State(service): State<Arc<PermitWorkflowService<R, G, B, Z>>>,
    axum::Json(body): axum::Json<ZoneRequestBody>,
) -> Response
where
    R: PermitRepository + 'static,
    G: CardGateway + 'static,
    B: AppointmentBook + 'static,
    Z: ZoneLookup + 'static,
{
    match service.resolve_zone(&body.street, &body.barangay) {
        Ok(resolution) => (StatusCode::OK, axum::Json(resolution)).into_response(),
        Err(err) => err.into_response(),
    }
}

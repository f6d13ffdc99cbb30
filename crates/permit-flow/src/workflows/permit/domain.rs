use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for permit/tax applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for issued payment rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

/// The four application kinds the back office processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationKind {
    NewBusiness,
    Renewal,
    Building,
    RealEstateTax,
}

impl ApplicationKind {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationKind::NewBusiness => "new_business",
            ApplicationKind::Renewal => "renewal",
            ApplicationKind::Building => "building",
            ApplicationKind::RealEstateTax => "real_estate_tax",
        }
    }
}

/// Closed set of compliance departments acting on an application.
///
/// Keeping this a tagged enum (rather than the string codes the portal UI
/// shows) makes an unknown department unrepresentable in the core.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Department {
    /// Planning and Zoning Office.
    Pzo,
    /// Office of the Local Building Official.
    Olbo,
    /// City Health Office (sanitary).
    Cho,
    /// City Environment and Natural Resources Office.
    Cenro,
    /// Office of the City Market Administrator.
    Ocma,
    /// Bureau of Fire Protection.
    Bfp,
    /// City Treasury.
    Trsy,
}

impl Department {
    pub const ALL: [Department; 7] = [
        Department::Pzo,
        Department::Olbo,
        Department::Cho,
        Department::Cenro,
        Department::Ocma,
        Department::Bfp,
        Department::Trsy,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            Department::Pzo => "PZO",
            Department::Olbo => "OLBO",
            Department::Cho => "CHO",
            Department::Cenro => "CENRO",
            Department::Ocma => "OCMA",
            Department::Bfp => "BFP",
            Department::Trsy => "TRSY",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Department::ALL
            .iter()
            .copied()
            .find(|department| department.code().eq_ignore_ascii_case(code.trim()))
    }
}

/// Role tag carried by every actor; auth mechanics live outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRole {
    /// A department assessor; Treasury is `Assessor(Department::Trsy)`.
    Assessor(Department),
    /// The business owner interacting with the payment channels.
    Applicant,
}

impl ActorRole {
    pub fn department(&self) -> Option<Department> {
        match self {
            ActorRole::Assessor(department) => Some(*department),
            ActorRole::Applicant => None,
        }
    }
}

/// An identified actor performing a workflow command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub officer_id: String,
    pub role: ActorRole,
}

/// Street-level address; the zone-lookup collaborator resolves it further.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessAddress {
    pub street: String,
    pub barangay: String,
}

/// Opaque reference to an uploaded document held by the external file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub name: String,
    pub storage_key: String,
}

/// The aggregate representing one permit/tax application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitApplication {
    pub application_id: ApplicationId,
    pub kind: ApplicationKind,
    pub owner: String,
    pub address: BusinessAddress,
    pub tin: String,
    pub submitted_at: DateTime<Utc>,
    /// Assigned once by the Fire Safety department.
    pub tracking_number: Option<String>,
    pub completed: bool,
}

/// A department's decision as submitted; validated before it becomes an
/// [`Approval`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    /// `false` waives the check for this application; the department is
    /// still terminal and contributes a zero fee.
    pub required: bool,
    pub fee_centavos: Option<u64>,
    pub remarks: Option<String>,
}

/// A recorded, terminal department entry. At most one exists per
/// (application, department); once written it is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub department: Department,
    pub approved: bool,
    pub required: bool,
    pub fee_centavos: u64,
    pub remarks: Option<String>,
    pub officer_id: String,
    pub approved_at: DateTime<Utc>,
}

impl Approval {
    /// Whether this entry contributes to the tax assessment total.
    pub fn billable(&self) -> bool {
        self.approved && self.required
    }
}

/// Insertion-ordered snapshot of the per-application approval entries.
/// Departments absent from the snapshot are still pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLedger {
    pub entries: Vec<Approval>,
}

impl ApprovalLedger {
    pub fn get(&self, department: Department) -> Option<&Approval> {
        self.entries
            .iter()
            .find(|entry| entry.department == department)
    }

    pub fn has_entry(&self, department: Department) -> bool {
        self.get(department).is_some()
    }

    /// Sum of fees over approved, required entries.
    pub fn billable_total_centavos(&self) -> u64 {
        self.entries
            .iter()
            .filter(|entry| entry.billable())
            .map(|entry| entry.fee_centavos)
            .sum()
    }

    /// The completeness predicate: every mandatory department holds a
    /// terminal entry. Waivers count; a count threshold never does.
    pub fn is_complete(&self, mandatory: &BTreeSet<Department>) -> bool {
        mandatory
            .iter()
            .all(|department| self.has_entry(*department))
    }

    pub fn pending_departments(&self, mandatory: &BTreeSet<Department>) -> Vec<Department> {
        mandatory
            .iter()
            .copied()
            .filter(|department| !self.has_entry(*department))
            .collect()
    }
}

/// Payment schedule fixed by Treasury at issuance time. Quarterly amounts
/// are Treasury-entered, not auto-divided; each quarter can differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentSchedule {
    LumpSum(u64),
    Quarterly([u64; 4]),
}

/// The tax order of payment derived from a complete ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxAssessment {
    pub total_centavos: u64,
    pub schedule: PaymentSchedule,
    pub document: DocumentRef,
}

/// Settlement lifecycle of one payment row. `Paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    Issued,
    PendingVerification,
    Paid,
}

impl PaymentState {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentState::Issued => "issued",
            PaymentState::PendingVerification => "pending_verification",
            PaymentState::Paid => "paid",
        }
    }
}

/// One issued payment row; quarterly schedules produce four, lump sums one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub application_id: ApplicationId,
    /// 1-based quarter index; `None` for a lump sum.
    pub quarter: Option<u8>,
    pub amount_centavos: u64,
    pub issued_at: DateTime<Utc>,
    pub state: PaymentState,
    pub proof: Option<DocumentRef>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Gateway transaction id for card/PayPal captures.
    pub transaction_id: Option<String>,
    /// Reason recorded by the last rejection; cleared on resubmission.
    pub reject_reason: Option<String>,
}

/// Scheduled permit release granted only after full payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimAppointment {
    pub application_id: ApplicationId,
    pub appointment_date: NaiveDate,
    pub certificate: DocumentRef,
}

/// Result of the external zone-lookup collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneResolution {
    pub zone_code: String,
    pub allowed_business_types: Vec<String>,
}

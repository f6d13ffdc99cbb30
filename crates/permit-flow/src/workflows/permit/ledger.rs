use chrono::{DateTime, Utc};

use super::domain::{Actor, ActorRole, Approval, ApprovalDecision, Department};

/// Violations raised while turning a submitted decision into a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("officer '{officer_id}' may not decide for department {department}", department = .department.code())]
    Unauthorized {
        officer_id: String,
        department: Department,
    },
    #[error("department {department} already holds a terminal entry", department = .0.code())]
    DuplicateApproval(Department),
    #[error("a disapproval must carry remarks for the applicant")]
    MissingRemarks,
    #[error("an approved, required check must carry an assessed fee")]
    MissingFee,
}

/// Validate a decision against the submitting actor and produce the
/// immutable entry to insert. Duplicate detection is *not* done here: the
/// repository's conditional insert is the only authority on that, so two
/// concurrent submissions can never both commit.
pub fn entry_from_decision(
    department: Department,
    actor: &Actor,
    decision: ApprovalDecision,
    approved_at: DateTime<Utc>,
) -> Result<Approval, ApprovalError> {
    if actor.role != ActorRole::Assessor(department) {
        return Err(ApprovalError::Unauthorized {
            officer_id: actor.officer_id.clone(),
            department,
        });
    }

    if !decision.approved
        && decision
            .remarks
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
    {
        return Err(ApprovalError::MissingRemarks);
    }

    let fee_centavos = if decision.approved && decision.required {
        decision.fee_centavos.ok_or(ApprovalError::MissingFee)?
    } else {
        // Waived or disapproved entries never contribute to the assessment.
        0
    };

    Ok(Approval {
        department,
        approved: decision.approved,
        required: decision.required,
        fee_centavos,
        remarks: decision.remarks,
        officer_id: actor.officer_id.clone(),
        approved_at,
    })
}

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{ActorRole, ApprovalLedger, Department};

/// Workflow actions an actor may be offered next.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Action {
    ViewApprovalTable,
    SubmitAssessment,
    AssignTrackingNumber,
    IssueTaxOrder,
    GoBack,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Action::ViewApprovalTable => "view_approval_table",
            Action::SubmitAssessment => "submit_assessment",
            Action::AssignTrackingNumber => "assign_tracking_number",
            Action::IssueTaxOrder => "issue_tax_order",
            Action::GoBack => "go_back",
        }
    }
}

/// Everything the gating rules read; the policy itself stays a pure function.
#[derive(Debug, Clone)]
pub struct GatingContext<'a> {
    pub ledger: &'a ApprovalLedger,
    pub mandatory: &'a BTreeSet<Department>,
    pub tracking_number_assigned: bool,
    pub tax_order_issued: bool,
}

impl GatingContext<'_> {
    fn complete(&self) -> bool {
        self.ledger.is_complete(self.mandatory)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatingError {
    #[error("action {action} is not available to this role at this stage", action = .0.label())]
    Forbidden(Action),
}

/// The set of actions `role` may perform next, in rule priority order.
pub fn allowed_actions(ctx: &GatingContext<'_>, role: &ActorRole) -> BTreeSet<Action> {
    let mut actions = BTreeSet::new();

    // Deferring is always a ledger no-op, for any role.
    actions.insert(Action::GoBack);

    let department = match role.department() {
        Some(department) => department,
        None => return actions,
    };

    actions.insert(Action::ViewApprovalTable);

    if !ctx.ledger.has_entry(department) && !ctx.complete() {
        actions.insert(Action::SubmitAssessment);
    }

    if department == Department::Bfp && !ctx.tracking_number_assigned {
        actions.insert(Action::AssignTrackingNumber);
    }

    if department == Department::Trsy && ctx.complete() && !ctx.tax_order_issued {
        actions.insert(Action::IssueTaxOrder);
    }

    actions
}

/// Reject any command outside the allowed set; never silently ignore it.
pub fn ensure_allowed(
    ctx: &GatingContext<'_>,
    role: &ActorRole,
    action: Action,
) -> Result<(), GatingError> {
    if allowed_actions(ctx, role).contains(&action) {
        Ok(())
    } else {
        Err(GatingError::Forbidden(action))
    }
}

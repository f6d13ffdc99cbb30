use super::common::*;

use chrono::NaiveDate;

use crate::workflows::permit::assessment::TaxOrderRequest;
use crate::workflows::permit::claims::{settlement_progress, ClaimStatus, SettlementProgress};
use crate::workflows::permit::domain::{ApplicationId, Department, Payment};
use crate::workflows::permit::repository::PermitRepository;

fn issued_quarterly(harness: &TestHarness) -> (ApplicationId, Vec<Payment>) {
    let (id, ledger) = ledgered_application(harness, 30_000);
    let quarter = ledger.billable_total_centavos() / 4;
    let issued = harness
        .service
        .issue_tax_order(
            &id,
            &assessor(Department::Trsy),
            TaxOrderRequest {
                quarterly: true,
                amounts_centavos: vec![quarter; 4],
                document: Some(document("tax-order.pdf")),
            },
        )
        .expect("issuance succeeds");
    (id, issued.payments)
}

#[test]
fn progress_reductions_cover_the_three_shapes() {
    let harness = harness();
    let (id, payments) = issued_quarterly(&harness);

    assert_eq!(settlement_progress(&[]), SettlementProgress::NoneIssued);
    assert_eq!(
        settlement_progress(&payments),
        SettlementProgress::Outstanding {
            count: 4,
            rejection: None,
        }
    );

    for (index, payment) in payments.iter().enumerate() {
        harness
            .service
            .capture_payment(&payment.payment_id, &format!("nonce-q{index}"), "fp-kiosk")
            .expect("capture succeeds");
    }
    let settled = harness.repository.payments(&id).expect("payments load");
    assert_eq!(settlement_progress(&settled), SettlementProgress::FullyPaid);
}

#[test]
fn no_tax_order_means_no_payments_issued() {
    let harness = harness();
    let application = harness.service.register(intake()).expect("registers");

    let status = harness
        .service
        .check_ready_for_claim(&application.application_id)
        .expect("check succeeds");
    assert_eq!(status, ClaimStatus::NoPaymentsIssued);
}

#[test]
fn a_pending_check_surfaces_the_latest_rejection_reason() {
    let harness = harness();
    let (id, payments) = issued_quarterly(&harness);

    // Three quarters settle; the fourth is rejected back to the applicant.
    for (index, payment) in payments.iter().take(3).enumerate() {
        harness
            .service
            .capture_payment(&payment.payment_id, &format!("nonce-q{index}"), "fp-kiosk")
            .expect("capture succeeds");
    }
    let fourth = &payments[3];
    harness
        .service
        .submit_proof(&fourth.payment_id, document("q4-slip.jpg"))
        .expect("proof accepted");
    harness
        .service
        .reject_payment(&fourth.payment_id, "illegible receipt")
        .expect("rejection recorded");

    match harness.service.check_ready_for_claim(&id).expect("check") {
        ClaimStatus::Pending {
            outstanding,
            rejection,
        } => {
            assert_eq!(outstanding, 1);
            assert_eq!(rejection.as_deref(), Some("illegible receipt"));
        }
        other => panic!("expected pending, got {other:?}"),
    }
}

#[test]
fn full_settlement_reserves_an_appointment_and_completes_the_application() {
    let harness = harness();
    let (id, payments) = issued_quarterly(&harness);

    for (index, payment) in payments.iter().enumerate() {
        harness
            .service
            .capture_payment(&payment.payment_id, &format!("nonce-q{index}"), "fp-kiosk")
            .expect("capture succeeds");
    }

    let appointment = match harness.service.check_ready_for_claim(&id).expect("check") {
        ClaimStatus::Ready(appointment) => appointment,
        other => panic!("expected ready, got {other:?}"),
    };
    assert_eq!(
        appointment.appointment_date,
        NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date")
    );
    assert_eq!(appointment.application_id, id);

    let application = harness
        .repository
        .fetch_application(&id)
        .expect("fetch succeeds")
        .expect("row present");
    assert!(application.completed);
}

#[test]
fn repeated_checks_return_the_stored_appointment() {
    let harness = harness();
    let (id, payments) = issued_quarterly(&harness);
    for (index, payment) in payments.iter().enumerate() {
        harness
            .service
            .capture_payment(&payment.payment_id, &format!("nonce-q{index}"), "fp-kiosk")
            .expect("capture succeeds");
    }

    let first = harness.service.check_ready_for_claim(&id).expect("check");
    let second = harness.service.check_ready_for_claim(&id).expect("check");
    assert_eq!(first, second);
}

#[test]
fn releasing_the_permit_drops_its_serialization_lock() {
    let harness = harness();
    let (id, payments) = issued_quarterly(&harness);

    for (index, payment) in payments.iter().enumerate() {
        harness
            .service
            .capture_payment(&payment.payment_id, &format!("nonce-q{index}"), "fp-kiosk")
            .expect("capture succeeds");
    }
    assert!(harness.service.tracked_application_locks() > 0);

    harness.service.check_ready_for_claim(&id).expect("check");
    assert_eq!(harness.service.tracked_application_locks(), 0);

    // A post-completion check is answered from the stored claim and stays
    // out of the lock map as well.
    harness.service.check_ready_for_claim(&id).expect("recheck");
    assert_eq!(harness.service.tracked_application_locks(), 0);
}

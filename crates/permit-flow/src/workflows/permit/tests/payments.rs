use super::common::*;

use crate::workflows::permit::assessment::TaxOrderRequest;
use crate::workflows::permit::domain::{Department, Payment, PaymentState};
use crate::workflows::permit::payments::{GatewayError, PaymentError};
use crate::workflows::permit::repository::PermitRepository;
use crate::workflows::permit::service::PermitServiceError;

fn issued_lump_sum(harness: &TestHarness, fee_centavos: u64) -> Payment {
    let (id, _ledger) = ledgered_application(harness, fee_centavos);
    let issued = harness
        .service
        .issue_tax_order(
            &id,
            &assessor(Department::Trsy),
            TaxOrderRequest {
                quarterly: false,
                amounts_centavos: vec![fee_centavos * 7],
                document: Some(document("tax-order.pdf")),
            },
        )
        .expect("issuance succeeds");
    issued.payments.into_iter().next().expect("one row")
}

#[test]
fn proof_moves_an_issued_row_to_pending_verification() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);

    let updated = harness
        .service
        .submit_proof(&payment.payment_id, document("deposit-slip.jpg"))
        .expect("proof accepted");
    assert_eq!(updated.state, PaymentState::PendingVerification);
    assert!(updated.proof.is_some());
}

#[test]
fn resubmission_replaces_an_unresolved_proof() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);

    harness
        .service
        .submit_proof(&payment.payment_id, document("blurry.jpg"))
        .expect("first proof accepted");
    let updated = harness
        .service
        .submit_proof(&payment.payment_id, document("retake.jpg"))
        .expect("replacement accepted");
    assert_eq!(
        updated.proof.expect("proof present").name,
        "retake.jpg"
    );
    assert_eq!(updated.state, PaymentState::PendingVerification);
}

#[test]
fn verification_requires_a_submitted_proof() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);

    match harness
        .service
        .verify_payment(&payment.payment_id, &assessor(Department::Trsy))
    {
        Err(PermitServiceError::Payment(PaymentError::NoProofSubmitted)) => {}
        other => panic!("expected no-proof error, got {other:?}"),
    }
}

#[test]
fn only_a_treasury_verifier_may_mark_paid() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);
    harness
        .service
        .submit_proof(&payment.payment_id, document("deposit-slip.jpg"))
        .expect("proof accepted");

    match harness
        .service
        .verify_payment(&payment.payment_id, &assessor(Department::Cho))
    {
        Err(PermitServiceError::Payment(PaymentError::UnauthorizedVerifier(_))) => {}
        other => panic!("expected unauthorized verifier, got {other:?}"),
    }
}

#[test]
fn rejection_returns_the_row_to_issued_with_the_reason() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);
    harness
        .service
        .submit_proof(&payment.payment_id, document("deposit-slip.jpg"))
        .expect("proof accepted");

    let rejected = harness
        .service
        .reject_payment(&payment.payment_id, "illegible receipt")
        .expect("rejection recorded");
    assert_eq!(rejected.state, PaymentState::Issued);
    assert_eq!(rejected.reject_reason.as_deref(), Some("illegible receipt"));
    assert!(rejected.proof.is_none());

    // The resubmission loop clears the recorded reason.
    let resubmitted = harness
        .service
        .submit_proof(&payment.payment_id, document("retake.jpg"))
        .expect("resubmission accepted");
    assert!(resubmitted.reject_reason.is_none());
}

#[test]
fn a_paid_row_is_terminal() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);
    harness
        .service
        .submit_proof(&payment.payment_id, document("deposit-slip.jpg"))
        .expect("proof accepted");
    let paid = harness
        .service
        .verify_payment(&payment.payment_id, &assessor(Department::Trsy))
        .expect("verification succeeds");
    assert_eq!(paid.state, PaymentState::Paid);
    assert!(paid.paid_at.is_some());

    match harness
        .service
        .submit_proof(&payment.payment_id, document("late.jpg"))
    {
        Err(PermitServiceError::Payment(PaymentError::AlreadyPaid)) => {}
        other => panic!("expected already paid, got {other:?}"),
    }
    match harness
        .service
        .reject_payment(&payment.payment_id, "too late")
    {
        Err(PermitServiceError::Payment(PaymentError::AlreadyPaid)) => {}
        other => panic!("expected already paid, got {other:?}"),
    }
    match harness
        .service
        .capture_payment(&payment.payment_id, "nonce-late", "fp-1")
    {
        Err(PermitServiceError::Payment(PaymentError::AlreadyPaid)) => {}
        other => panic!("expected already paid, got {other:?}"),
    }
}

#[test]
fn capture_settles_an_issued_row_directly() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);

    let captured = harness
        .service
        .capture_payment(&payment.payment_id, "nonce-1", "fp-device")
        .expect("capture succeeds");
    assert_eq!(captured.state, PaymentState::Paid);
    assert!(captured
        .transaction_id
        .as_deref()
        .expect("transaction recorded")
        .starts_with("txn-"));
}

#[test]
fn capture_is_refused_while_a_manual_proof_is_under_review() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);
    harness
        .service
        .submit_proof(&payment.payment_id, document("deposit-slip.jpg"))
        .expect("proof accepted");

    match harness
        .service
        .capture_payment(&payment.payment_id, "nonce-2", "fp-device")
    {
        Err(PermitServiceError::Payment(PaymentError::ProofUnderReview)) => {}
        other => panic!("expected proof-under-review, got {other:?}"),
    }
}

#[test]
fn gateway_timeout_leaves_the_row_untouched() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);

    match harness
        .service
        .capture_payment(&payment.payment_id, "timeout-1", "fp-device")
    {
        Err(PermitServiceError::Payment(PaymentError::Gateway(GatewayError::Timeout))) => {}
        other => panic!("expected gateway timeout, got {other:?}"),
    }

    // The nonce is burned at the gateway even though the capture never landed.
    assert!(harness.gateway.saw_nonce("timeout-1"));

    let untouched = harness
        .repository
        .fetch_payment(&payment.payment_id)
        .expect("fetch succeeds")
        .expect("row present");
    assert_eq!(untouched.state, PaymentState::Issued);
    assert!(untouched.transaction_id.is_none());

    // A fresh nonce then settles exactly once.
    let captured = harness
        .service
        .capture_payment(&payment.payment_id, "nonce-after-timeout", "fp-device")
        .expect("fresh nonce capture");
    assert_eq!(captured.state, PaymentState::Paid);
}

#[test]
fn the_gateway_refuses_a_replayed_nonce() {
    let harness = harness();
    let payment = issued_lump_sum(&harness, 10_000);

    harness
        .service
        .capture_payment(&payment.payment_id, "timeout-replayed", "fp-device")
        .expect_err("first attempt times out");
    match harness
        .service
        .capture_payment(&payment.payment_id, "timeout-replayed", "fp-device")
    {
        Err(PermitServiceError::Payment(PaymentError::Gateway(
            GatewayError::DuplicateNonce,
        ))) => {}
        other => panic!("expected duplicate nonce, got {other:?}"),
    }
}

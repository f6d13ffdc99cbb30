use crate::infra::{
    DeterministicAppointmentBook, InMemoryPermitRepository, SimulatedCardGateway,
    StaticZoneDirectory,
};
use clap::Args;
use std::sync::Arc;

use permit_flow::config::WorkflowConfig;
use permit_flow::error::AppError;
use permit_flow::workflows::permit::{
    Actor, ActorRole, ApplicationKind, ApprovalDecision, BusinessAddress, ClaimStatus, Department,
    DocumentRef, NewApplication, PermitWorkflowService, TaxOrderRequest,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Business owner printed on the walked-through application.
    #[arg(long, default_value = "Maria Delgado")]
    pub(crate) owner: String,
    /// Barangay used for the zone check and the business address.
    #[arg(long, default_value = "Poblacion")]
    pub(crate) barangay: String,
    /// Issue one lump-sum payment instead of the quarterly schedule.
    #[arg(long)]
    pub(crate) lump_sum: bool,
}

fn assessor(department: Department) -> Actor {
    Actor {
        officer_id: format!("officer-{}", department.code().to_ascii_lowercase()),
        role: ActorRole::Assessor(department),
    }
}

fn peso(centavos: u64) -> String {
    format!("P{}.{:02}", centavos / 100, centavos % 100)
}

/// Walks one application through every stage and prints what each
/// department sees along the way.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        owner,
        barangay,
        lump_sum,
    } = args;

    let service = Arc::new(PermitWorkflowService::new(
        Arc::new(InMemoryPermitRepository::default()),
        Arc::new(SimulatedCardGateway::default()),
        Arc::new(DeterministicAppointmentBook::default()),
        Arc::new(StaticZoneDirectory::default()),
        WorkflowConfig::default(),
    ));

    println!("Business permit walkthrough");

    let street = "14 Rizal Avenue".to_string();
    match service.resolve_zone(&street, &barangay) {
        Ok(zone) => println!(
            "- Zone check: {} maps to {} ({})",
            barangay,
            zone.zone_code,
            zone.allowed_business_types.join(", ")
        ),
        Err(err) => println!("- Zone check unavailable: {err}"),
    }

    let application = service.register(NewApplication {
        kind: ApplicationKind::NewBusiness,
        owner,
        address: BusinessAddress {
            street,
            barangay,
        },
        tin: "412-880-192-000".to_string(),
    })?;
    let id = application.application_id.clone();
    println!("- Registered application {}", id.0);

    let fees = [
        (Department::Pzo, Some(30_000)),
        (Department::Olbo, Some(45_000)),
        (Department::Cho, Some(25_000)),
        (Department::Cenro, None),
        (Department::Ocma, Some(20_000)),
        (Department::Bfp, Some(50_000)),
        (Department::Trsy, Some(15_000)),
    ];

    println!("\nApproval ledger");
    for (department, fee) in fees {
        let decision = match fee {
            Some(fee_centavos) => ApprovalDecision {
                approved: true,
                required: true,
                fee_centavos: Some(fee_centavos),
                remarks: None,
            },
            None => ApprovalDecision {
                approved: true,
                required: false,
                fee_centavos: None,
                remarks: Some("no environmental impact for this line of business".to_string()),
            },
        };
        service.submit_approval(&id, department, &assessor(department), decision)?;
        match fee {
            Some(fee_centavos) => {
                println!("- {} approved, fee {}", department.code(), peso(fee_centavos))
            }
            None => println!("- {} waived", department.code()),
        }
    }

    let tracked =
        service.assign_tracking_number(&id, &assessor(Department::Bfp), "FSIC-2026-0041".into())?;
    println!(
        "- BFP tracking number {}",
        tracked.tracking_number.as_deref().unwrap_or("-")
    );

    let ledger = service.ledger(&id)?;
    let total = ledger.billable_total_centavos();
    println!("- Billable total {}", peso(total));

    let request = if lump_sum {
        TaxOrderRequest {
            quarterly: false,
            amounts_centavos: vec![total],
            document: Some(tax_order_document(&id.0)),
        }
    } else {
        // Even quarters with the remainder folded into the first.
        let quarter = total / 4;
        let first = total - quarter * 3;
        TaxOrderRequest {
            quarterly: true,
            amounts_centavos: vec![first, quarter, quarter, quarter],
            document: Some(tax_order_document(&id.0)),
        }
    };
    let issued = service.issue_tax_order(&id, &assessor(Department::Trsy), request)?;

    println!("\nTax order ({} rows)", issued.payments.len());
    for payment in &issued.payments {
        let quarter = payment
            .quarter
            .map(|q| format!("Q{q}"))
            .unwrap_or_else(|| "full".to_string());
        println!(
            "- {} [{}] {}",
            payment.payment_id.0,
            quarter,
            peso(payment.amount_centavos)
        );
    }

    println!("\nSettlement");
    for (index, payment) in issued.payments.iter().enumerate() {
        if index % 2 == 0 {
            // Over-the-counter channel with one bounced proof.
            service.submit_proof(
                &payment.payment_id,
                DocumentRef {
                    name: "deposit-slip-blurry.jpg".to_string(),
                    storage_key: format!("blob://proofs/{}-1.jpg", payment.payment_id.0),
                },
            )?;
            service.reject_payment(&payment.payment_id, "illegible receipt")?;
            service.submit_proof(
                &payment.payment_id,
                DocumentRef {
                    name: "deposit-slip.jpg".to_string(),
                    storage_key: format!("blob://proofs/{}-2.jpg", payment.payment_id.0),
                },
            )?;
            let paid = service.verify_payment(&payment.payment_id, &assessor(Department::Trsy))?;
            println!(
                "- {} settled over the counter (resubmitted once), state {}",
                paid.payment_id.0,
                paid.state.label()
            );
        } else {
            let paid = service.capture_payment(
                &payment.payment_id,
                &format!("demo-nonce-{index}"),
                "demo-kiosk",
            )?;
            println!(
                "- {} settled by card, transaction {}",
                paid.payment_id.0,
                paid.transaction_id.as_deref().unwrap_or("-")
            );
        }
    }

    match service.check_ready_for_claim(&id)? {
        ClaimStatus::Ready(appointment) => {
            println!(
                "\nPermit ready: claim on {} (certificate {})",
                appointment.appointment_date, appointment.certificate.storage_key
            );
        }
        ClaimStatus::Pending {
            outstanding,
            rejection,
        } => {
            println!("\nPermit not ready: {outstanding} payment(s) outstanding");
            if let Some(reason) = rejection {
                println!("  Last rejection: {reason}");
            }
        }
        ClaimStatus::NoPaymentsIssued => println!("\nPermit not ready: no tax order issued"),
    }

    Ok(())
}

fn tax_order_document(application_id: &str) -> DocumentRef {
    DocumentRef {
        name: format!("tax-order-{application_id}.pdf"),
        storage_key: format!("blob://tax-orders/{application_id}.pdf"),
    }
}

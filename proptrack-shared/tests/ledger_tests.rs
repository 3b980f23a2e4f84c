/// Payment ledger transaction: reconciliation, receipts, scoping, idempotency

mod common;

use common::{ctx, money, TestContext};
use proptrack_shared::auth::capability;
use proptrack_shared::models::charge::{ChargeStatus, CreateCharge};
use proptrack_shared::models::contact::{ContactKind, CreateContact};
use proptrack_shared::models::invoice::CreateInvoice;
use proptrack_shared::models::payment::{PaymentMethod, PaymentStatus};
use proptrack_shared::pagination::PageRequest;
use proptrack_shared::services::ledger::NewPayment;
use proptrack_shared::services::{RequestContext, ServiceError};
use uuid::Uuid;

struct Ledger {
    t: TestContext,
    admin: RequestContext,
    org_id: Uuid,
}

async fn ledger() -> Ledger {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "org-a").await;
    Ledger {
        admin: ctx(owner, org_id),
        t,
        org_id,
    }
}

async fn charge(l: &Ledger, cents: i64) -> Uuid {
    l.t.services
        .billing
        .create_charge(
            &l.admin,
            CreateCharge {
                contact_id: None,
                description: "October rent".to_string(),
                amount: money(cents),
                due_date: None,
            },
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_final_payment_settles_charge_with_one_receipt() {
    let l = ledger().await;
    let charge_id = charge(&l, 10000).await;

    let first = l
        .t
        .services
        .ledger
        .create_payment(&l.admin, NewPayment::new(money(6000), PaymentMethod::Ach).for_charge(charge_id))
        .await
        .unwrap();
    assert_eq!(first.charge.as_ref().unwrap().status, ChargeStatus::Pending);

    let receipts_before = l.t.store.row_counts().await.receipts;

    let second = l
        .t
        .services
        .ledger
        .create_payment(&l.admin, NewPayment::new(money(4000), PaymentMethod::Card).for_charge(charge_id))
        .await
        .unwrap();

    assert_eq!(second.payment.status, PaymentStatus::Completed);
    assert_eq!(second.payment.amount, money(4000));
    assert_eq!(second.charge.as_ref().unwrap().status, ChargeStatus::Paid);
    assert_eq!(second.receipt.payment_id, second.payment.id);
    assert_eq!(second.receipt.url, format!("/receipts/{}", second.payment.id));
    assert_eq!(l.t.store.row_counts().await.receipts, receipts_before + 1);

    let summary = l.t.services.billing.get_charge(&l.admin, charge_id).await.unwrap();
    assert_eq!(summary.charge.status, ChargeStatus::Paid);
    assert_eq!(summary.settled, money(10000));
    assert_eq!(summary.outstanding, money(0));
}

#[tokio::test]
async fn test_payment_after_paid_keeps_charge_paid() {
    let l = ledger().await;
    let charge_id = charge(&l, 5000).await;

    for cents in [5000, 1000] {
        let details = l
            .t
            .services
            .ledger
            .create_payment(&l.admin, NewPayment::new(money(cents), PaymentMethod::Cash).for_charge(charge_id))
            .await
            .unwrap();
        assert_eq!(details.charge.unwrap().status, ChargeStatus::Paid);
    }

    let summary = l.t.services.billing.get_charge(&l.admin, charge_id).await.unwrap();
    assert_eq!(summary.settled, money(6000));
    assert_eq!(summary.outstanding, money(0));
}

#[tokio::test]
async fn test_payment_joins_contact_and_invoice() {
    let l = ledger().await;
    let contact = l
        .t
        .services
        .billing
        .create_contact(
            &l.admin,
            CreateContact {
                name: "Jordan Tenant".to_string(),
                email: Some("jordan@example.com".to_string()),
                phone: None,
                kind: ContactKind::Tenant,
            },
        )
        .await
        .unwrap();
    let invoice = l
        .t
        .services
        .billing
        .create_invoice(
            &l.admin,
            CreateInvoice {
                contact_id: Some(contact.id),
                number: "INV-1001".to_string(),
                amount: money(125000),
                due_date: None,
            },
        )
        .await
        .unwrap();

    let details = l
        .t
        .services
        .ledger
        .create_payment(
            &l.admin,
            NewPayment::new(money(125000), PaymentMethod::Check)
                .for_invoice(invoice.id)
                .from_contact(contact.id),
        )
        .await
        .unwrap();

    assert_eq!(details.contact.map(|c| c.id), Some(contact.id));
    assert_eq!(details.invoice.map(|i| i.id), Some(invoice.id));
    assert!(details.charge.is_none());
}

#[tokio::test]
async fn test_charge_from_another_org_is_not_found_and_nothing_is_written() {
    let l = ledger().await;
    let foreign_charge = charge(&l, 10000).await;

    let other_owner = l.t.create_user("other@example.com").await;
    let other_org = l.t.create_org(other_owner, "org-b").await;
    let before = l.t.store.row_counts().await;

    let result = l
        .t
        .services
        .ledger
        .create_payment(
            &ctx(other_owner, other_org),
            NewPayment::new(money(10000), PaymentMethod::Ach).for_charge(foreign_charge),
        )
        .await;

    assert!(matches!(result, Err(ServiceError::NotFound("charge"))));
    assert_eq!(l.t.store.row_counts().await, before);

    let summary = l.t.services.billing.get_charge(&l.admin, foreign_charge).await.unwrap();
    assert_eq!(summary.charge.status, ChargeStatus::Pending);
}

#[tokio::test]
async fn test_idempotency_key_returns_the_original_payment() {
    let l = ledger().await;
    let charge_id = charge(&l, 10000).await;
    let request = NewPayment::new(money(2500), PaymentMethod::Card)
        .for_charge(charge_id)
        .with_idempotency_key("checkout-42");

    let first = l
        .t
        .services
        .ledger
        .create_payment(&l.admin, request.clone())
        .await
        .unwrap();
    let replay = l
        .t
        .services
        .ledger
        .create_payment(&l.admin, request)
        .await
        .unwrap();

    assert_eq!(first.payment.id, replay.payment.id);
    assert_eq!(first.receipt.id, replay.receipt.id);

    let counts = l.t.store.row_counts().await;
    assert_eq!(counts.payments, 1);
    assert_eq!(counts.receipts, 1);
}

#[tokio::test]
async fn test_resubmission_without_key_records_a_duplicate() {
    let l = ledger().await;
    let charge_id = charge(&l, 10000).await;
    let request = NewPayment::new(money(5000), PaymentMethod::Ach).for_charge(charge_id);

    l.t.services.ledger.create_payment(&l.admin, request.clone()).await.unwrap();
    let second = l.t.services.ledger.create_payment(&l.admin, request).await.unwrap();

    // Both count toward the charge
    assert_eq!(second.charge.unwrap().status, ChargeStatus::Paid);
    assert_eq!(l.t.store.row_counts().await.payments, 2);
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let l = ledger().await;

    for cents in [0, -100] {
        let result = l
            .t
            .services
            .ledger
            .create_payment(&l.admin, NewPayment::new(money(cents), PaymentMethod::Cash))
            .await;
        assert!(matches!(result, Err(ServiceError::Validation { field: "amount", .. })));
    }
    assert_eq!(l.t.store.row_counts().await.payments, 0);
}

#[tokio::test]
async fn test_amount_beyond_storable_range_is_rejected() {
    let l = ledger().await;

    let result = l
        .t
        .services
        .ledger
        .create_payment(
            &l.admin,
            NewPayment::new(money(100_000_000_000_000_000), PaymentMethod::Ach),
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Validation { field: "amount", .. })));

    let result = l
        .t
        .services
        .billing
        .create_charge(
            &l.admin,
            CreateCharge {
                contact_id: None,
                description: "Portfolio buyout".to_string(),
                amount: money(100_000_000_000_000),
                due_date: None,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Validation { field: "amount", .. })));

    // The largest storable amount still goes through
    let charge_id = charge(&l, 99_999_999_999_999).await;
    let payment = l
        .t
        .services
        .ledger
        .create_payment(
            &l.admin,
            NewPayment::new(money(99_999_999_999_999), PaymentMethod::Ach).for_charge(charge_id),
        )
        .await
        .unwrap();
    assert_eq!(payment.charge.unwrap().status, ChargeStatus::Paid);
    assert_eq!(l.t.store.row_counts().await.payments, 1);
}

#[tokio::test]
async fn test_payments_require_their_capabilities() {
    let l = ledger().await;
    let (reader, _) = l
        .t
        .member_with(l.org_id, l.admin.caller.unwrap(), "reader@example.com", &[capability::PAYMENTS_READ])
        .await;
    let reader_ctx = ctx(reader, l.org_id);

    let result = l
        .t
        .services
        .ledger
        .create_payment(&reader_ctx, NewPayment::new(money(100), PaymentMethod::Cash))
        .await;
    assert!(matches!(result, Err(ServiceError::Denied(_))));

    l.t.services
        .ledger
        .create_payment(&l.admin, NewPayment::new(money(100), PaymentMethod::Cash))
        .await
        .unwrap();
    let page = l
        .t
        .services
        .ledger
        .list_payments(&reader_ctx, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert!(page.data.iter().all(|p| p.org_id == l.org_id));
}

#[tokio::test]
async fn test_concurrent_submissions_with_one_key_record_one_payment() {
    let l = ledger().await;
    let charge_id = charge(&l, 10000).await;
    let request = NewPayment::new(money(10000), PaymentMethod::Card)
        .for_charge(charge_id)
        .with_idempotency_key("checkout-race");

    let attempts = (0..4).map(|_| l.t.services.ledger.create_payment(&l.admin, request.clone()));
    let results = futures::future::join_all(attempts).await;

    let ids: Vec<Uuid> = results
        .into_iter()
        .map(|r| r.unwrap().payment.id)
        .collect();
    assert!(ids.iter().all(|id| *id == ids[0]));

    let counts = l.t.store.row_counts().await;
    assert_eq!(counts.payments, 1);
    assert_eq!(counts.receipts, 1);
}

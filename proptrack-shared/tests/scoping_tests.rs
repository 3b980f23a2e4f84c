/// Org scoping of list and lookup operations, and pagination

mod common;

use common::{ctx, money, TestContext};
use proptrack_shared::models::charge::{ChargeFilter, ChargeStatus, CreateCharge};
use proptrack_shared::models::document::{CreateDocument, DocumentFilter, UpdateDocument};
use proptrack_shared::models::work_order::{
    CreateWorkOrder, UpdateWorkOrder, WorkOrderFilter, WorkOrderPriority, WorkOrderStatus,
};
use proptrack_shared::pagination::PageRequest;
use proptrack_shared::services::{RequestContext, ServiceError};

fn document(title: &str, category: &str) -> CreateDocument {
    CreateDocument {
        title: title.to_string(),
        category: category.to_string(),
        url: format!("https://files.example.com/{}.pdf", title),
        property_ref: Some("unit-4b".to_string()),
        uploaded_by: None,
    }
}

fn work_order(title: &str) -> CreateWorkOrder {
    CreateWorkOrder {
        title: title.to_string(),
        description: None,
        priority: WorkOrderPriority::Medium,
        property_ref: Some("unit-4b".to_string()),
        assigned_to: None,
        created_by: None,
        due_date: None,
    }
}

async fn two_orgs(t: &TestContext) -> (RequestContext, RequestContext) {
    let alice = t.create_user("alice@example.com").await;
    let bob = t.create_user("bob@example.com").await;
    let org_a = t.create_org(alice, "org-a").await;
    let org_b = t.create_org(bob, "org-b").await;
    (ctx(alice, org_a), ctx(bob, org_b))
}

#[tokio::test]
async fn test_lists_never_leak_across_orgs() {
    let t = TestContext::new();
    let (a, b) = two_orgs(&t).await;

    // Same titles in both orgs
    for title in ["Lease 4B", "Inspection 4B"] {
        t.services.documents.create(&a, document(title, "lease")).await.unwrap();
        t.services.documents.create(&b, document(title, "lease")).await.unwrap();
        t.services.work_orders.create(&a, work_order(title)).await.unwrap();
        t.services.work_orders.create(&b, work_order(title)).await.unwrap();
    }
    t.services.documents.create(&b, document("Extra", "notice")).await.unwrap();

    let page = PageRequest::default();
    let docs_a = t
        .services
        .documents
        .list(&a, &DocumentFilter::default(), &page)
        .await
        .unwrap();
    assert_eq!(docs_a.total, 2);
    assert!(docs_a.data.iter().all(|d| Some(d.org_id) == a.org_id));

    let docs_b = t
        .services
        .documents
        .list(&b, &DocumentFilter::default(), &page)
        .await
        .unwrap();
    assert_eq!(docs_b.total, 3);
    assert!(docs_b.data.iter().all(|d| Some(d.org_id) == b.org_id));

    let orders_a = t
        .services
        .work_orders
        .list(&a, &WorkOrderFilter::default(), &page)
        .await
        .unwrap();
    assert_eq!(orders_a.total, 2);
    assert!(orders_a.data.iter().all(|w| Some(w.org_id) == a.org_id));
}

#[tokio::test]
async fn test_other_orgs_rows_look_missing() {
    let t = TestContext::new();
    let (a, b) = two_orgs(&t).await;
    let doc = t.services.documents.create(&b, document("Lease", "lease")).await.unwrap();

    // Alice is authorized in her own org, but Bob's document isn't there
    assert!(matches!(
        t.services.documents.get(&a, doc.id).await,
        Err(ServiceError::NotFound("document"))
    ));
    assert!(matches!(
        t.services
            .documents
            .update(&a, doc.id, UpdateDocument {
                title: Some("Hijacked".to_string()),
                ..Default::default()
            })
            .await,
        Err(ServiceError::NotFound("document"))
    ));
    assert!(matches!(
        t.services.documents.delete(&a, doc.id).await,
        Err(ServiceError::NotFound("document"))
    ));

    let still_there = t.services.documents.get(&b, doc.id).await.unwrap();
    assert_eq!(still_there.title, "Lease");
}

#[tokio::test]
async fn test_category_filter_and_uploader_stamp() {
    let t = TestContext::new();
    let (a, _) = two_orgs(&t).await;
    t.services.documents.create(&a, document("Lease", "lease")).await.unwrap();
    let notice = t.services.documents.create(&a, document("Notice", "notice")).await.unwrap();
    assert_eq!(notice.uploaded_by, a.caller);

    let filtered = t
        .services
        .documents
        .list(
            &a,
            &DocumentFilter {
                category: Some("notice".to_string()),
            },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.data[0].id, notice.id);
}

#[tokio::test]
async fn test_pagination_totals_and_past_the_end() {
    let t = TestContext::new();
    let (a, _) = two_orgs(&t).await;
    for n in 0..7 {
        t.services
            .documents
            .create(&a, document(&format!("doc-{}", n), "lease"))
            .await
            .unwrap();
    }

    let second = t
        .services
        .documents
        .list(&a, &DocumentFilter::default(), &PageRequest::new(Some(2), Some(3)))
        .await
        .unwrap();
    assert_eq!(second.total, 7);
    assert_eq!(second.total_pages, 3);
    assert_eq!(second.page, 2);
    assert_eq!(second.data.len(), 3);

    let beyond = t
        .services
        .documents
        .list(&a, &DocumentFilter::default(), &PageRequest::new(Some(9), Some(3)))
        .await
        .unwrap();
    assert!(beyond.data.is_empty());
    assert_eq!(beyond.total, 7);
    assert_eq!(beyond.total_pages, 3);
}

#[tokio::test]
async fn test_work_order_completion_and_assignee_scope() {
    let t = TestContext::new();
    let (a, b) = two_orgs(&t).await;
    let order = t.services.work_orders.create(&a, work_order("Leaky faucet")).await.unwrap();
    assert_eq!(order.status, WorkOrderStatus::Open);
    assert_eq!(order.created_by, a.caller);

    // Bob isn't a member of org A, so he can't be assigned there
    let result = t
        .services
        .work_orders
        .update(&a, order.id, UpdateWorkOrder {
            assigned_to: b.caller,
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound("assignee"))));

    let done = t
        .services
        .work_orders
        .update(&a, order.id, UpdateWorkOrder {
            status: Some(WorkOrderStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(done.completed_at.is_some());

    let reopened = t
        .services
        .work_orders
        .update(&a, order.id, UpdateWorkOrder {
            status: Some(WorkOrderStatus::Open),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(reopened.completed_at.is_none());

    let open = t
        .services
        .work_orders
        .list(
            &a,
            &WorkOrderFilter {
                status: Some(WorkOrderStatus::Open),
            },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(open.total, 1);
}

#[tokio::test]
async fn test_charge_status_filter() {
    let t = TestContext::new();
    let (a, _) = two_orgs(&t).await;
    for cents in [1000, 2000] {
        t.services
            .billing
            .create_charge(
                &a,
                CreateCharge {
                    contact_id: None,
                    description: "Late fee".to_string(),
                    amount: money(cents),
                    due_date: None,
                },
            )
            .await
            .unwrap();
    }

    let pending = t
        .services
        .billing
        .list_charges(
            &a,
            &ChargeFilter {
                status: Some(ChargeStatus::Pending),
            },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(pending.total, 2);

    let paid = t
        .services
        .billing
        .list_charges(
            &a,
            &ChargeFilter {
                status: Some(ChargeStatus::Paid),
            },
            &PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(paid.total, 0);
}

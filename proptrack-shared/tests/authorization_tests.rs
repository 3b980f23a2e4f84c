/// Authorization guard behavior across orgs, roles and memberships

mod common;

use common::{ctx, TestContext};
use proptrack_shared::auth::authorization::{
    AuthorizationGuard, Decision, DenyReason, MissingContext,
};
use proptrack_shared::auth::capability;
use proptrack_shared::models::document::{CreateDocument, DocumentFilter};
use proptrack_shared::models::permission::ADMIN_ROLE_NAME;
use proptrack_shared::pagination::PageRequest;
use proptrack_shared::services::members::NewMember;
use proptrack_shared::services::{RequestContext, ServiceError};
use uuid::Uuid;

fn document(title: &str) -> CreateDocument {
    CreateDocument {
        title: title.to_string(),
        category: "lease".to_string(),
        url: format!("https://files.example.com/{}", title),
        property_ref: None,
        uploaded_by: None,
    }
}

#[tokio::test]
async fn test_non_member_is_denied_for_every_capability() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;
    let stranger = t.create_user("stranger@example.com").await;

    let guard = AuthorizationGuard::new(t.store.clone());
    for name in capability::ALL {
        let decision = guard
            .check_permission(Some(stranger), Some(org_id), Some(*name))
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::NoMembership),
            "capability {}",
            name
        );
    }
}

#[tokio::test]
async fn test_role_in_one_org_grants_nothing_in_another() {
    let t = TestContext::new();
    let alice = t.create_user("alice@example.com").await;
    let bob = t.create_user("bob@example.com").await;
    let org_a = t.create_org(alice, "org-a").await;
    let org_b = t.create_org(bob, "org-b").await;

    // Alice is Admin of A and holds documents.read there
    let guard = AuthorizationGuard::new(t.store.clone());
    assert!(guard
        .check_permission(Some(alice), Some(org_a), Some(capability::DOCUMENTS_READ))
        .await
        .unwrap()
        .is_allowed());

    let decision = guard
        .check_permission(Some(alice), Some(org_b), Some(capability::DOCUMENTS_READ))
        .await
        .unwrap();
    assert_eq!(decision, Decision::Deny(DenyReason::NoMembership));

    let result = t
        .services
        .documents
        .list(&ctx(alice, org_b), &DocumentFilter::default(), &PageRequest::default())
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Denied(DenyReason::NoMembership))
    ));
}

#[tokio::test]
async fn test_missing_context_is_denied() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;

    let anonymous = RequestContext::new(None, Some(org_id));
    let result = t.services.documents.get(&anonymous, Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(ServiceError::Denied(DenyReason::MissingContext(MissingContext::Caller)))
    ));

    let no_org = RequestContext::user(owner);
    let result = t.services.documents.get(&no_org, Uuid::new_v4()).await;
    assert!(matches!(
        result,
        Err(ServiceError::Denied(DenyReason::MissingContext(MissingContext::Org)))
    ));
}

#[tokio::test]
async fn test_custom_role_is_limited_to_its_capabilities() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;
    let (reader, role) = t
        .member_with(org_id, owner, "reader@example.com", &[capability::DOCUMENTS_READ])
        .await;
    assert_eq!(role.capabilities, vec![capability::DOCUMENTS_READ.to_string()]);

    let reader_ctx = ctx(reader, org_id);
    assert!(t
        .services
        .documents
        .list(&reader_ctx, &DocumentFilter::default(), &PageRequest::default())
        .await
        .is_ok());

    let result = t.services.documents.create(&reader_ctx, document("lease-1")).await;
    match result {
        Err(ServiceError::Denied(DenyReason::InsufficientPermission(capability))) => {
            assert_eq!(capability, "documents.write");
        }
        other => panic!("expected InsufficientPermission, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deny_happens_before_lookup() {
    let t = TestContext::new();
    let alice = t.create_user("alice@example.com").await;
    let bob = t.create_user("bob@example.com").await;
    let org_a = t.create_org(alice, "org-a").await;
    let _org_b = t.create_org(bob, "org-b").await;

    let doc = t
        .services
        .documents
        .create(&ctx(alice, org_a), document("lease-1"))
        .await
        .unwrap();

    // Bob asks for Alice's document by ID in Alice's org: denied, not "not found"
    let result = t.services.documents.get(&ctx(bob, org_a), doc.id).await;
    assert!(matches!(result, Err(ServiceError::Denied(DenyReason::NoMembership))));
}

#[tokio::test]
async fn test_revoked_membership_no_longer_authorizes() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;
    let (member, _) = t
        .member_with(org_id, owner, "member@example.com", &[capability::DOCUMENTS_READ])
        .await;

    let members = t
        .services
        .members
        .list_members(&ctx(owner, org_id), &PageRequest::default())
        .await
        .unwrap();
    let membership = members
        .data
        .iter()
        .find(|m| m.user_id == member)
        .expect("member listed");

    let revoked = t
        .services
        .members
        .revoke_member(&ctx(owner, org_id), membership.membership_id)
        .await
        .unwrap();
    assert!(!revoked.is_active());
    assert!(revoked.revoked_at.is_some());

    let result = t
        .services
        .documents
        .list(&ctx(member, org_id), &DocumentFilter::default(), &PageRequest::default())
        .await;
    assert!(matches!(result, Err(ServiceError::Denied(DenyReason::NoMembership))));

    // Revoking twice finds no active membership
    let again = t
        .services
        .members
        .revoke_member(&ctx(owner, org_id), membership.membership_id)
        .await;
    assert!(matches!(again, Err(ServiceError::NotFound("membership"))));
}

#[tokio::test]
async fn test_adding_an_existing_member_conflicts() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;
    let (_, role) = t
        .member_with(org_id, owner, "member@example.com", &[capability::DOCUMENTS_READ])
        .await;

    let result = t
        .services
        .members
        .add_member(
            &ctx(owner, org_id),
            proptrack_shared::services::members::NewMember {
                email: "MEMBER@example.com".to_string(),
                role_id: role.role.id,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn test_role_from_another_org_cannot_be_assigned() {
    let t = TestContext::new();
    let alice = t.create_user("alice@example.com").await;
    let bob = t.create_user("bob@example.com").await;
    let org_a = t.create_org(alice, "org-a").await;
    let org_b = t.create_org(bob, "org-b").await;
    let (_, foreign_role) = t
        .member_with(org_b, bob, "b-member@example.com", &[capability::DOCUMENTS_READ])
        .await;
    t.create_user("newcomer@example.com").await;

    let result = t
        .services
        .members
        .add_member(
            &ctx(alice, org_a),
            proptrack_shared::services::members::NewMember {
                email: "newcomer@example.com".to_string(),
                role_id: foreign_role.role.id,
            },
        )
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound("role"))));
}

async fn membership_of(t: &TestContext, org_id: Uuid, admin: Uuid, user: Uuid) -> Uuid {
    t.services
        .members
        .list_members(&ctx(admin, org_id), &PageRequest::default())
        .await
        .unwrap()
        .data
        .into_iter()
        .find(|m| m.user_id == user && m.status.as_str() == "active")
        .expect("active membership listed")
        .membership_id
}

#[tokio::test]
async fn test_last_admin_membership_cannot_be_revoked() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;
    let owner_membership = membership_of(&t, org_id, owner, owner).await;

    let result = t
        .services
        .members
        .revoke_member(&ctx(owner, org_id), owner_membership)
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));

    // Still in charge
    assert!(t
        .services
        .members
        .list_members(&ctx(owner, org_id), &PageRequest::default())
        .await
        .is_ok());

    // With a second admin the first can step down
    let admin_role = t
        .services
        .permissions
        .list_roles(&ctx(owner, org_id))
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.role.name == ADMIN_ROLE_NAME)
        .expect("admin role");
    let co_owner = t.create_user("co-owner@example.com").await;
    t.services
        .members
        .add_member(
            &ctx(owner, org_id),
            NewMember {
                email: "co-owner@example.com".to_string(),
                role_id: admin_role.role.id,
            },
        )
        .await
        .unwrap();

    t.services
        .members
        .revoke_member(&ctx(co_owner, org_id), owner_membership)
        .await
        .unwrap();

    let co_owner_membership = membership_of(&t, org_id, co_owner, co_owner).await;
    let result = t
        .services
        .members
        .revoke_member(&ctx(co_owner, org_id), co_owner_membership)
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn test_plan_member_cap_is_enforced() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;

    // Starter allows five active members, the owner included
    let mut last = None;
    for n in 0..4 {
        let (member, role) = t
            .member_with(org_id, owner, &format!("member{}@example.com", n), &[capability::DOCUMENTS_READ])
            .await;
        last = Some((member, role.role.id));
    }
    let (last_member, role_id) = last.unwrap();

    t.create_user("sixth@example.com").await;
    let sixth = || NewMember {
        email: "sixth@example.com".to_string(),
        role_id,
    };
    let result = t.services.members.add_member(&ctx(owner, org_id), sixth()).await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));

    // Revoking frees a seat
    let membership = membership_of(&t, org_id, owner, last_member).await;
    t.services
        .members
        .revoke_member(&ctx(owner, org_id), membership)
        .await
        .unwrap();
    assert!(t
        .services
        .members
        .add_member(&ctx(owner, org_id), sixth())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_roles_only_carry_capabilities_the_granter_holds() {
    let t = TestContext::new();
    let owner = t.create_user("owner@example.com").await;
    let org_id = t.create_org(owner, "maple-court").await;
    let (manager, manager_role) = t
        .member_with(
            org_id,
            owner,
            "manager@example.com",
            &[capability::ROLES_MANAGE, capability::DOCUMENTS_READ],
        )
        .await;
    let manager_ctx = ctx(manager, org_id);

    let result = t
        .services
        .permissions
        .create_role(&manager_ctx, "Writers", &[capability::DOCUMENTS_WRITE.to_string()])
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Denied(DenyReason::InsufficientPermission(ref cap))) if cap == capability::DOCUMENTS_WRITE
    ));

    // Self-escalation through the manager's own role is refused too
    let result = t
        .services
        .permissions
        .grant_permission(
            &manager_ctx,
            manager_role.role.id,
            &[capability::PAYMENTS_WRITE.to_string()],
        )
        .await;
    assert!(matches!(result, Err(ServiceError::Denied(DenyReason::InsufficientPermission(_)))));

    let readers = t
        .services
        .permissions
        .create_role(&manager_ctx, "Readers", &[capability::DOCUMENTS_READ.to_string()])
        .await
        .unwrap();
    assert_eq!(readers.capabilities, vec![capability::DOCUMENTS_READ.to_string()]);
}

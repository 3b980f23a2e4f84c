//! Shared fixtures for service-level tests
//!
//! Everything runs against an in-memory store, so no database is needed.
//! Users are inserted straight into the store with a placeholder hash to
//! keep Argon2 out of tests that don't exercise login.

#![allow(dead_code)]

use std::sync::Arc;

use proptrack_shared::models::permission::RoleWithCapabilities;
use proptrack_shared::models::user::CreateUser;
use proptrack_shared::services::members::NewMember;
use proptrack_shared::services::orgs::NewOrg;
use proptrack_shared::services::{RequestContext, Services};
use proptrack_shared::store::{MemoryStore, Store};
use rust_decimal::Decimal;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub services: Services,
}

impl TestContext {
    /// Catalog and plans seeded like a migrated database
    pub fn new() -> Self {
        Self::with_store(MemoryStore::seeded())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let services = Services::new(store.clone(), TEST_JWT_SECRET);
        Self { store, services }
    }

    pub async fn create_user(&self, email: &str) -> Uuid {
        self.store
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "not-a-real-hash".to_string(),
                name: None,
            })
            .await
            .expect("create user")
            .id
    }

    /// Creates an org owned by `owner` and returns its ID
    pub async fn create_org(&self, owner: Uuid, slug: &str) -> Uuid {
        self.services
            .orgs
            .create_org(
                &RequestContext::user(owner),
                NewOrg {
                    name: slug.replace('-', " "),
                    slug: slug.to_string(),
                    plan_id: None,
                },
            )
            .await
            .expect("create org")
            .org
            .id
    }

    /// Adds a role holding `capabilities` and a member with that role
    pub async fn member_with(
        &self,
        org_id: Uuid,
        admin: Uuid,
        email: &str,
        capabilities: &[&str],
    ) -> (Uuid, RoleWithCapabilities) {
        let admin_ctx = RequestContext::user(admin).with_org(org_id);
        let names: Vec<String> = capabilities.iter().map(|c| c.to_string()).collect();

        let role = self
            .services
            .permissions
            .create_role(&admin_ctx, &format!("role-{}", Uuid::new_v4()), &names)
            .await
            .expect("create role");

        let user = self.create_user(email).await;
        self.services
            .members
            .add_member(
                &admin_ctx,
                NewMember {
                    email: email.to_string(),
                    role_id: role.role.id,
                },
            )
            .await
            .expect("add member");

        (user, role)
    }
}

pub fn ctx(user: Uuid, org_id: Uuid) -> RequestContext {
    RequestContext::user(user).with_org(org_id)
}

pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

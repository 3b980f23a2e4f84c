/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: register, login, refresh
/// - `me`: the caller's own profile
/// - `orgs`, `members`, `roles`: org administration
/// - `documents`, `work_orders`: property records
/// - `billing`: contacts, invoices, charges
/// - `payments`: the payment ledger
///
/// Tenant routes find their org in the path (`/orgs/:org_id/...`), the
/// `org_id` query parameter, or an `org_id` field in the JSON body, in that
/// order of precedence.

use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use proptrack_shared::auth::authorization::resolve_org_id;
use proptrack_shared::auth::middleware::AuthContext;
use proptrack_shared::pagination::PageRequest;
use proptrack_shared::services::RequestContext;
use serde::Deserialize;
use uuid::Uuid;

pub mod auth;
pub mod billing;
pub mod documents;
pub mod health;
pub mod me;
pub mod members;
pub mod orgs;
pub mod payments;
pub mod roles;
pub mod work_orders;

/// The authenticated user, if the JWT layer found one
///
/// Never rejects: anonymous requests reach the handler and the
/// authorization guard decides what they may do.
#[derive(Debug, Clone, Copy, Default)]
pub struct Caller(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(
            parts.extensions.get::<AuthContext>().map(|auth| auth.user_id),
        ))
    }
}

impl Caller {
    /// Context for a route with no org in its path
    pub fn context(self, query: Option<Uuid>, body: Option<Uuid>) -> RequestContext {
        RequestContext::new(self.0, resolve_org_id(None, query, body))
    }

    /// Context for `/orgs/:org_id/...` routes
    pub fn in_org(self, org_id: Uuid) -> RequestContext {
        RequestContext::new(self.0, Some(org_id))
    }
}

/// `?org_id=` on single-resource routes
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OrgQuery {
    pub org_id: Option<Uuid>,
}

/// `?org_id=&page=&limit=` on list routes
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListQuery {
    pub org_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_context_prefers_query_org() {
        let user = Uuid::new_v4();
        let query_org = Uuid::new_v4();
        let body_org = Uuid::new_v4();

        let ctx = Caller(Some(user)).context(Some(query_org), Some(body_org));
        assert_eq!(ctx.caller, Some(user));
        assert_eq!(ctx.org_id, Some(query_org));

        let ctx = Caller(None).context(None, Some(body_org));
        assert_eq!(ctx.caller, None);
        assert_eq!(ctx.org_id, Some(body_org));
    }

    #[test]
    fn test_list_query_page_request() {
        let query = ListQuery {
            org_id: None,
            page: Some(3),
            limit: Some(25),
        };
        assert_eq!(query.page_request(), PageRequest::new(Some(3), Some(25)));
    }
}

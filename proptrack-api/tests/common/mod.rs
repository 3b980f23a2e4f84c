//! Common test utilities for HTTP tests
//!
//! Builds the full router over a seeded [`MemoryStore`], so requests go
//! through every layer (JWT, tracing, security headers) without a database
//! or a socket.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use proptrack_api::app::{build_router, AppState};
use proptrack_api::config::{ApiConfig, Config, DatabaseConfig, JwtConfig, LogConfig, LogFormat};
use proptrack_shared::auth::jwt::{create_token, Claims, TokenType};
use proptrack_shared::models::user::CreateUser;
use proptrack_shared::store::{MemoryStore, Store};
use serde_json::{json, Value};
use tower::Service as _;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
}

/// A user with a valid access token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: DatabaseConfig {
            url: "postgresql://unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
        log: LogConfig {
            format: LogFormat::Pretty,
        },
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::seeded())
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let state = AppState::new(store.clone(), test_config());

        Self {
            app: build_router(state),
            store,
        }
    }

    /// Inserts a user directly and mints an access token for them
    pub async fn user(&self, email: &str) -> TestUser {
        let user = self
            .store
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "not-a-real-hash".to_string(),
                name: None,
            })
            .await
            .unwrap();

        let claims = Claims::new(user.id, TokenType::Access);
        TestUser {
            id: user.id,
            token: create_token(&claims, TEST_JWT_SECRET).unwrap(),
        }
    }

    /// Creates an org through the API; `owner` becomes its Admin
    pub async fn org(&self, owner: &TestUser, slug: &str) -> Uuid {
        let (status, body) = self
            .send(
                Method::POST,
                "/v1/orgs",
                Some(&owner.token),
                Some(json!({ "name": slug, "slug": slug })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        body["org"]["id"].as_str().unwrap().parse().unwrap()
    }

    /// Adds `email` to the org under a new role holding `capabilities`
    pub async fn member_with(
        &self,
        org_id: Uuid,
        admin: &TestUser,
        email: &str,
        capabilities: &[&str],
    ) -> TestUser {
        let member = self.user(email).await;

        let (status, role) = self
            .send(
                Method::POST,
                &format!("/v1/orgs/{}/roles", org_id),
                Some(&admin.token),
                Some(json!({ "name": format!("role-{}", email), "capabilities": capabilities })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", role);

        let (status, body) = self
            .send(
                Method::POST,
                &format!("/v1/orgs/{}/members", org_id),
                Some(&admin.token),
                Some(json!({ "email": email, "role_id": role["id"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        member
    }

    pub async fn call(&self, request: Request<Body>) -> Response {
        self.app.clone().call(request).await.unwrap()
    }

    /// Sends a JSON request and parses the JSON response (Null when empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.call(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

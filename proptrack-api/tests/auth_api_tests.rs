/// Registration, login, token refresh and the caller's profile over HTTP

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{read_json, TestApp};
use proptrack_shared::auth::capability;
use serde_json::json;

#[tokio::test]
async fn test_health_reports_connected_store() {
    let app = TestApp::new();

    let response = app
        .call(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );

    let body = read_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_register_with_org_makes_caller_admin() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({
                "email": "Manager@Example.com",
                "password": "maple2024",
                "name": "Dana Reyes",
                "org_name": "Maple Court"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["email"], "manager@example.com");
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["org"]["org"]["slug"], "maple-court");
    assert_eq!(body["org"]["admin_role"]["name"], "Admin");
    assert_eq!(
        body["org"]["admin_role"]["capabilities"].as_array().unwrap().len(),
        capability::ALL.len()
    );

    // The token works and the org shows up for its owner
    let token = body["access_token"].as_str().unwrap();
    let (status, orgs) = app.send(Method::GET, "/v1/orgs", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orgs.as_array().unwrap().len(), 1);
    assert_eq!(orgs[0]["role_name"], "Admin");
}

#[tokio::test]
async fn test_register_without_org() {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({ "email": "solo@example.com", "password": "maple2024" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body.get("org").is_none());
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let app = TestApp::new();
    let register = |email: &str, password: &str| {
        json!({ "email": email, "password": password })
    };

    let (status, _) = app
        .send(Method::POST, "/v1/auth/register", None, Some(register("a@example.com", "maple2024")))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(Method::POST, "/v1/auth/register", None, Some(register("A@example.com", "maple2024")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = app
        .send(Method::POST, "/v1/auth/register", None, Some(register("b@example.com", "onlyletters")))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "password");

    let (status, body) = app
        .send(Method::POST, "/v1/auth/register", None, Some(register("not-an-email", "maple2024")))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "email");
}

#[tokio::test]
async fn test_login_and_refresh() {
    let app = TestApp::new();
    app.send(
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "email": "dana@example.com", "password": "maple2024" })),
    )
    .await;

    let (status, body) = app
        .send(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "dana@example.com", "password": "wrong-pass1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, session) = app
        .send(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "dana@example.com", "password": "maple2024" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, refreshed) = app
        .send(
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": session["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(refreshed["access_token"].is_string());

    // An access token is not a refresh token
    let (status, _) = app
        .send(
            Method::POST,
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": session["access_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_requires_a_caller() {
    let app = TestApp::new();
    let user = app.user("dana@example.com").await;

    let (status, body) = app.send(Method::GET, "/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.send(Method::GET, "/v1/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::PATCH,
            "/v1/me",
            Some(&user.token),
            Some(json!({ "name": "Dana Reyes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Dana Reyes");
    assert_eq!(body["email"], "dana@example.com");
}

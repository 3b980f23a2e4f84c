/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use proptrack_api::{app::{build_router, AppState}, config::Config};
/// use proptrack_shared::{db::pool::create_pool, store::PgStore};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.pool_config()).await?;
/// let state = AppState::new(Arc::new(PgStore::new(pool)), config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use proptrack_shared::auth::middleware::create_jwt_middleware;
use proptrack_shared::services::Services;
use proptrack_shared::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        Self {
            services: Services::new(store, &config.jwt.secret),
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # public
/// └── /v1/
///     ├── /auth/{register,login,refresh}   # public
///     ├── /me                          # GET, PATCH
///     ├── /orgs                        # GET, POST
///     │   └── /:org_id                 # GET, PATCH
///     │       ├── /members             # GET, POST
///     │       │   └── /:id             # DELETE
///     │       ├── /roles               # GET, POST
///     │       │   └── /:id/permissions # POST
///     │       └── /permissions         # GET
///     ├── /documents                   # GET, POST
///     │   └── /:id                     # GET, PATCH, DELETE
///     ├── /work-orders                 # GET, POST
///     │   └── /:id                     # GET, PATCH, DELETE
///     ├── /contacts                    # GET, POST
///     ├── /invoices                    # POST
///     │   └── /:id                     # GET
///     ├── /charges                     # GET, POST
///     │   └── /:id                     # GET
///     └── /payments                    # GET, POST
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, request tracing,
/// then (everything under `/v1` except `/auth`) bearer token validation.
/// A request without a token reaches its handler anonymously and is
/// refused by the authorization guard where it matters.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let org_routes = Router::new()
        .route(
            "/",
            get(routes::orgs::list_orgs).post(routes::orgs::create_org),
        )
        .route(
            "/:org_id",
            get(routes::orgs::get_org).patch(routes::orgs::update_org),
        )
        .route(
            "/:org_id/members",
            get(routes::members::list_members).post(routes::members::add_member),
        )
        .route("/:org_id/members/:id", delete(routes::members::revoke_member))
        .route(
            "/:org_id/roles",
            get(routes::roles::list_roles).post(routes::roles::create_role),
        )
        .route(
            "/:org_id/roles/:id/permissions",
            post(routes::roles::grant_permission),
        )
        .route("/:org_id/permissions", get(routes::roles::org_capabilities));

    let tenant_routes = Router::new()
        .route(
            "/me",
            get(routes::me::get_profile).patch(routes::me::update_profile),
        )
        .nest("/orgs", org_routes)
        .route(
            "/documents",
            get(routes::documents::list_documents).post(routes::documents::create_document),
        )
        .route(
            "/documents/:id",
            get(routes::documents::get_document)
                .patch(routes::documents::update_document)
                .delete(routes::documents::delete_document),
        )
        .route(
            "/work-orders",
            get(routes::work_orders::list_work_orders)
                .post(routes::work_orders::create_work_order),
        )
        .route(
            "/work-orders/:id",
            get(routes::work_orders::get_work_order)
                .patch(routes::work_orders::update_work_order)
                .delete(routes::work_orders::delete_work_order),
        )
        .route(
            "/contacts",
            get(routes::billing::list_contacts).post(routes::billing::create_contact),
        )
        .route("/invoices", post(routes::billing::create_invoice))
        .route("/invoices/:id", get(routes::billing::get_invoice))
        .route(
            "/charges",
            get(routes::billing::list_charges).post(routes::billing::create_charge),
        )
        .route("/charges/:id", get(routes::billing::get_charge))
        .route(
            "/payments",
            get(routes::payments::list_payments).post(routes::payments::create_payment),
        )
        .layer(axum::middleware::from_fn(create_jwt_middleware(
            state.jwt_secret().to_string(),
        )));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(tenant_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Permissive in development (`CORS_ORIGINS=*`), an allow-list otherwise
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(routes::payments::IDEMPOTENCY_KEY_HEADER),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use namahatta_hierarchy::api::{HasPool, RoleApp};
use namahatta_hierarchy::models::UserId;
use namahatta_hierarchy::permissions::{ActingUser, HIERARCHY_ROLE_ADMIN};

#[derive(Clone)]
struct DevAuthConfig {
    default_user_id: Uuid,
    default_roles: Vec<String>,
    require_dev_header: bool,
}

#[derive(Clone)]
struct ExampleApp {
    pool: Arc<PgPool>,
    auth: DevAuthConfig,
}

impl HasPool for ExampleApp {
    fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }
}

impl RoleApp for ExampleApp {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let database_url = env::var("DATABASE_URL")
        .context("DATABASE_URL is required to run demos/role_api_server.rs")?;
    let bind = env::var("HIERARCHY_EXAMPLE_BIND").unwrap_or_else(|_| "127.0.0.1:4020".to_string());
    let bind_addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid HIERARCHY_EXAMPLE_BIND '{}'", bind))?;

    let default_user_id = env::var("HIERARCHY_EXAMPLE_DEFAULT_USER_ID")
        .unwrap_or_else(|_| "00000000-0000-0000-0000-000000000001".to_string());
    let default_user_id = Uuid::parse_str(&default_user_id).with_context(|| {
        format!(
            "invalid HIERARCHY_EXAMPLE_DEFAULT_USER_ID '{}'",
            default_user_id
        )
    })?;
    let auth = DevAuthConfig {
        default_user_id,
        default_roles: vec![HIERARCHY_ROLE_ADMIN.to_string()],
        require_dev_header: env_flag("HIERARCHY_EXAMPLE_REQUIRE_DEV_HEADER"),
    };

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("failed to connect to postgres")?;

    namahatta_hierarchy::db::create_hierarchy_tables(&pool)
        .await
        .context("failed to run hierarchy migrations")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to postgres")?;

    let app_state = ExampleApp {
        pool: Arc::new(pool),
        auth,
    };

    let api_v1 = Router::new()
        .route("/healthz", get(health_handler))
        .route("/example/whoami", get(whoami_handler))
        .merge(namahatta_hierarchy::api::routes::<ExampleApp>());

    let app = Router::new()
        .nest("/api/v1", api_v1)
        .layer(from_fn_with_state(
            app_state.clone(),
            dev_identity_middleware,
        ))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;

    println!(
        "namahatta_hierarchy example server listening on http://{}",
        bind_addr
    );
    println!("api base path: /api/v1");
    println!("auth shim headers: x-dev-user-id, x-dev-roles");
    println!("set HIERARCHY_EXAMPLE_REQUIRE_DEV_HEADER=true to require x-dev-user-id");

    axum::serve(listener, app)
        .await
        .context("example server failed")
}

fn env_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes"
        }
        Err(_) => false,
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

async fn whoami_handler(actor: ActingUser) -> Json<serde_json::Value> {
    Json(json!({
        "userId": actor.id().to_string(),
        "grantedRoles": actor.granted_roles(),
    }))
}

async fn dev_identity_middleware(
    State(app): State<ExampleApp>,
    mut req: Request,
    next: Next,
) -> Response {
    let headers = req.headers();
    let user_id = match parse_user_id(headers, &app.auth) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let granted_roles = parse_roles(headers, &app.auth);

    req.extensions_mut()
        .insert(ActingUser::new(user_id, granted_roles));
    next.run(req).await
}

fn parse_user_id(headers: &HeaderMap, auth: &DevAuthConfig) -> Result<UserId, Response> {
    let Some(raw_user_id) = header_value(headers, "x-dev-user-id") else {
        if auth.require_dev_header {
            return Err(json_error(
                StatusCode::UNAUTHORIZED,
                "missing_dev_user_id",
                "x-dev-user-id header is required",
            ));
        }
        return Ok(UserId(auth.default_user_id));
    };

    Uuid::parse_str(raw_user_id).map(UserId).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_dev_user_id",
            "invalid UUID",
        )
    })
}

fn parse_roles(headers: &HeaderMap, auth: &DevAuthConfig) -> Vec<String> {
    match header_value(headers, "x-dev-roles") {
        Some(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(|role| role.trim().to_string())
            .filter(|role| !role.is_empty())
            .collect(),
        _ => auth.default_roles.clone(),
    }
}

fn header_value<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|value| value.to_str().ok())
}

fn json_error(status: StatusCode, code: &'static str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        })),
    )
        .into_response()
}

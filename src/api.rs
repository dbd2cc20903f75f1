use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::StatusCode,
    http::request::Parts,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::error::{ErrorDetails, ErrorKind, LibError};
use crate::hierarchy::LeadershipRole;
use crate::models::{
    AvailableSupervisorsQuery, BulkValidatePayload, DemoteRolePayload, DevoteeId, HistoryQuery,
    PromoteRolePayload, RemoveRolePayload, ReplaceRolePayload, TransferSubordinatesPayload,
};
use crate::operations::RoleOperations;
use crate::permissions::{self, ActingUser};

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(kind = ?self.0.kind, error = %self.0.source, "role api request failed");

        if let Some(ErrorDetails::Validation(issues)) = self.0.details {
            return (status, Json(json!({ "errors": issues }))).into_response();
        }
        (status, self.0.public).into_response()
    }
}

pub trait HasPool {
    fn pool(&self) -> Arc<sqlx::PgPool>;
}

pub trait RoleApp: HasPool {
    /// Grants accepted for the mutation endpoints. Hosts may narrow or widen
    /// this; reads only require an authenticated acting user.
    fn role_mutation_access_roles(&self) -> &'static [&'static str] {
        permissions::role_mutation_access_roles()
    }
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<ActingUser>().cloned().ok_or_else(|| {
            AppError(LibError::forbidden(
                "Authentication required",
                anyhow!("no acting user attached to the request"),
            ))
        })
    }
}

fn ensure_elevated<S: RoleApp>(app: &S, actor: &ActingUser) -> Result<(), AppError> {
    if actor.holds_any(app.role_mutation_access_roles()) {
        Ok(())
    } else {
        Err(AppError(LibError::forbidden(
            "You do not have permission to manage leadership roles",
            anyhow!(
                "user {} holds none of {:?}",
                actor.id(),
                app.role_mutation_access_roles()
            ),
        )))
    }
}

async fn promote_handler<S>(
    State(app): State<S>,
    actor: ActingUser,
    Json(payload): Json<PromoteRolePayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    ensure_elevated(&app, &actor)?;
    let operations = RoleOperations::new(app.pool());
    let outcome = operations.promote(actor.id(), payload).await?;
    Ok(Json(outcome))
}

async fn demote_handler<S>(
    State(app): State<S>,
    actor: ActingUser,
    Json(payload): Json<DemoteRolePayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    ensure_elevated(&app, &actor)?;
    let operations = RoleOperations::new(app.pool());
    let outcome = operations.demote(actor.id(), payload).await?;
    Ok(Json(outcome))
}

async fn replace_handler<S>(
    State(app): State<S>,
    actor: ActingUser,
    Json(payload): Json<ReplaceRolePayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    ensure_elevated(&app, &actor)?;
    let operations = RoleOperations::new(app.pool());
    let outcome = operations.replace(actor.id(), payload).await?;
    Ok(Json(outcome))
}

async fn remove_handler<S>(
    State(app): State<S>,
    actor: ActingUser,
    Json(payload): Json<RemoveRolePayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    ensure_elevated(&app, &actor)?;
    let operations = RoleOperations::new(app.pool());
    let outcome = operations.remove(actor.id(), payload).await?;
    Ok(Json(outcome))
}

async fn transfer_subordinates_handler<S>(
    State(app): State<S>,
    actor: ActingUser,
    Json(payload): Json<TransferSubordinatesPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    ensure_elevated(&app, &actor)?;
    let operations = RoleOperations::new(app.pool());
    let outcome = operations.transfer_subordinates(actor.id(), payload).await?;
    Ok(Json(outcome))
}

async fn validate_bulk_handler<S>(
    State(app): State<S>,
    actor: ActingUser,
    Json(payload): Json<BulkValidatePayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    ensure_elevated(&app, &actor)?;
    let operations = RoleOperations::new(app.pool());
    let report = operations.validate_bulk(payload).await?;
    Ok(Json(report))
}

async fn available_supervisors_handler<S>(
    State(app): State<S>,
    _actor: ActingUser,
    Path((district_code, target_role)): Path<(String, String)>,
    Query(query): Query<AvailableSupervisorsQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    let target_role = LeadershipRole::from_str(&target_role).map_err(|message| {
        AppError(LibError::invalid(
            "Unknown leadership role",
            anyhow!(message),
        ))
    })?;
    let exclude = query.excluded_ids()?;
    let operations = RoleOperations::new(app.pool());
    let items = operations
        .available_supervisors(&district_code, target_role, &exclude)
        .await?;
    Ok(Json(items))
}

async fn subordinates_handler<S>(
    State(app): State<S>,
    _actor: ActingUser,
    Path(devotee_id): Path<DevoteeId>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    let operations = RoleOperations::new(app.pool());
    let items = operations.direct_subordinates(devotee_id).await?;
    Ok(Json(items))
}

async fn all_subordinates_handler<S>(
    State(app): State<S>,
    _actor: ActingUser,
    Path(devotee_id): Path<DevoteeId>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    let operations = RoleOperations::new(app.pool());
    let items = operations.all_subordinates(devotee_id).await?;
    Ok(Json(items))
}

async fn history_handler<S>(
    State(app): State<S>,
    _actor: ActingUser,
    Path(devotee_id): Path<DevoteeId>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    let operations = RoleOperations::new(app.pool());
    let page = operations.history(devotee_id, query).await?;
    Ok(Json(page))
}

pub fn routes<S>() -> Router<S>
where
    S: RoleApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /role/{{promote,demote,replace,remove}} [POST]");
    tracing::info!("Registering route /role/transfer-subordinates [POST]");
    tracing::info!("Registering route /role/validate-bulk [POST]");
    tracing::info!("Registering route /role/available-supervisors/{{district}}/{{role}} [GET]");
    tracing::info!("Registering route /role/subordinates/{{devotee_id}}[/all] [GET]");
    tracing::info!("Registering route /role/history/{{devotee_id}} [GET]");

    Router::new()
        .route("/role/promote", post(promote_handler::<S>))
        .route("/role/demote", post(demote_handler::<S>))
        .route("/role/replace", post(replace_handler::<S>))
        .route("/role/remove", post(remove_handler::<S>))
        .route(
            "/role/transfer-subordinates",
            post(transfer_subordinates_handler::<S>),
        )
        .route("/role/validate-bulk", post(validate_bulk_handler::<S>))
        .route(
            "/role/available-supervisors/{district_code}/{target_role}",
            get(available_supervisors_handler::<S>),
        )
        .route("/role/subordinates/{devotee_id}", get(subordinates_handler::<S>))
        .route(
            "/role/subordinates/{devotee_id}/all",
            get(all_subordinates_handler::<S>),
        )
        .route("/role/history/{devotee_id}", get(history_handler::<S>))
}

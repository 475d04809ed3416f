//! Maintenance ledger endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{maintenance::MaintenanceRecord, transition::MaintenanceTransition},
};

use super::AuthenticatedUser;

/// Maintenance check-out request
#[derive(Deserialize, ToSchema, Default)]
pub struct CloseMaintenanceRequest {
    /// Work performed
    pub notes: Option<String>,
}

#[utoipa::path(
    get,
    path = "/maintenance/{id}",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Maintenance record ID")),
    responses(
        (status = 200, description = "Maintenance record", body = MaintenanceRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MaintenanceRecord>> {
    claims.require_admin()?;
    let record = state.services.reports.maintenance(id).await?;
    Ok(Json(record))
}

/// Close maintenance and return the equipment to service
#[utoipa::path(
    post,
    path = "/maintenance/{id}/close",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Maintenance record ID")),
    request_body = CloseMaintenanceRequest,
    responses(
        (status = 200, description = "Maintenance closed, equipment available", body = MaintenanceTransition),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already closed or concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn close_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<CloseMaintenanceRequest>>,
) -> AppResult<Json<MaintenanceTransition>> {
    claims.require_admin()?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let transition = state
        .services
        .lifecycle
        .end_maintenance(id, request.notes)
        .await?;
    Ok(Json(transition))
}

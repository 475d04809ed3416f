//! Equipment API endpoints: inventory and lifecycle transitions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        enums::MaintenanceType,
        equipment::{CreateEquipment, EquipmentQuery, EquipmentRecord, Removal, UpdateEquipment},
        transition::{LoanTransition, MaintenanceTransition, OverrideTransition},
    },
};

use super::AuthenticatedUser;

/// Reservation request
#[derive(Deserialize, ToSchema)]
pub struct ReservationRequest {
    /// Date the equipment is reserved for
    pub scheduled_at: DateTime<Utc>,
}

/// Maintenance check-in request
#[derive(Deserialize, ToSchema)]
pub struct StartMaintenanceRequest {
    pub maintenance_type: MaintenanceType,
    /// Defaults to the authenticated user
    pub technician_id: Option<Uuid>,
}

/// Administrative override request
#[derive(Deserialize, ToSchema, Default)]
pub struct UnavailableRequest {
    /// Recorded as notes on every ledger entry the override closes
    pub reason: Option<String>,
}

/// List equipment
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(EquipmentQuery),
    responses(
        (status = 200, description = "Equipment list", body = Vec<EquipmentRecord>),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<EquipmentQuery>,
) -> AppResult<Json<Vec<EquipmentRecord>>> {
    let equipment = state.services.inventory.list_equipment(query).await?;
    Ok(Json(equipment))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentRecord),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EquipmentRecord>> {
    let equipment = state.services.inventory.get_equipment(id).await?;
    Ok(Json(equipment))
}

/// Create equipment
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = EquipmentRecord),
        (status = 400, description = "Invalid data", body = crate::error::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<EquipmentRecord>)> {
    claims.require_admin()?;
    let equipment = state.services.inventory.create_equipment(data).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

/// Update equipment details (status excluded)
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentRecord),
        (status = 404, description = "Equipment or category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateEquipment>,
) -> AppResult<Json<EquipmentRecord>> {
    claims.require_admin()?;
    let equipment = state.services.inventory.update_equipment(id, data).await?;
    Ok(Json(equipment))
}

/// Remove equipment, retiring it instead when history references it
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Deleted or retired", body = Removal),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Removal>> {
    claims.require_admin()?;
    let removal = state.services.inventory.remove_equipment(id).await?;
    Ok(Json(removal))
}

/// Borrow available equipment
#[utoipa::path(
    post,
    path = "/equipment/{id}/loan",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 201, description = "Loan opened", body = LoanTransition),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Not available, or lost a concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<LoanTransition>)> {
    let transition = state
        .services
        .lifecycle
        .request_loan(id, claims.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(transition)))
}

/// Reserve available equipment
#[utoipa::path(
    post,
    path = "/equipment/{id}/reservation",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = ReservationRequest,
    responses(
        (status = 201, description = "Reservation opened", body = LoanTransition),
        (status = 409, description = "Not available, or lost a concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ReservationRequest>,
) -> AppResult<(StatusCode, Json<LoanTransition>)> {
    let transition = state
        .services
        .lifecycle
        .request_reservation(id, claims.user_id(), request.scheduled_at)
        .await?;
    Ok((StatusCode::CREATED, Json(transition)))
}

/// Check equipment in for maintenance
#[utoipa::path(
    post,
    path = "/equipment/{id}/maintenance",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = StartMaintenanceRequest,
    responses(
        (status = 201, description = "Maintenance opened", body = MaintenanceTransition),
        (status = 409, description = "Not available, or lost a concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn start_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<StartMaintenanceRequest>,
) -> AppResult<(StatusCode, Json<MaintenanceTransition>)> {
    claims.require_admin()?;
    let technician_id = request.technician_id.unwrap_or_else(|| claims.user_id());
    let transition = state
        .services
        .lifecycle
        .start_maintenance(id, technician_id, request.maintenance_type)
        .await?;
    Ok((StatusCode::CREATED, Json(transition)))
}

/// Administrative override to `unavailable`
#[utoipa::path(
    post,
    path = "/equipment/{id}/unavailable",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = UnavailableRequest,
    responses(
        (status = 200, description = "Equipment unavailable, open entries closed", body = OverrideTransition),
        (status = 409, description = "Already unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_unavailable(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<UnavailableRequest>>,
) -> AppResult<Json<OverrideTransition>> {
    claims.require_admin()?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let transition = state
        .services
        .lifecycle
        .mark_unavailable(id, request.reason)
        .await?;
    Ok(Json(transition))
}

/// Administrative restore of unavailable equipment
#[utoipa::path(
    post,
    path = "/equipment/{id}/restore",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment available again", body = EquipmentRecord),
        (status = 409, description = "Equipment is not unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn restore(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EquipmentRecord>> {
    claims.require_admin()?;
    let equipment = state.services.lifecycle.restore(id).await?;
    Ok(Json(equipment))
}

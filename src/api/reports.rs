//! Reporting endpoints (read-only)

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        loan::{LoanQuery, LoanRecord},
        maintenance::{MaintenanceQuery, MaintenanceRecord},
    },
    services::reports::{DashboardSummary, StatusCount},
};

use super::AuthenticatedUser;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StaleQuery {
    /// Age threshold in days (defaults to the configured value)
    pub days: Option<i64>,
}

/// Administrator dashboard
#[utoipa::path(
    get,
    path = "/reports/dashboard",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard figures", body = DashboardSummary),
        (status = 503, description = "Report unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn dashboard(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardSummary>> {
    claims.require_admin()?;
    let summary = state.services.reports.dashboard().await?;
    Ok(Json(summary))
}

/// Equipment count per status
#[utoipa::path(
    get,
    path = "/reports/status-counts",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One entry per status", body = Vec<StatusCount>),
        (status = 503, description = "Report unavailable", body = crate::error::ErrorResponse)
    )
)]
pub async fn status_counts(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<StatusCount>>> {
    claims.require_admin()?;
    let counts = state.services.reports.status_counts().await?;
    Ok(Json(counts))
}

/// Active loans and reservations of a user
#[utoipa::path(
    get,
    path = "/reports/users/{id}/loans",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Active entries", body = Vec<LoanRecord>),
        (status = 403, description = "Another user's loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<LoanRecord>>> {
    claims.require_self_or_admin(user_id)?;
    let loans = state.services.reports.active_loans_for_user(user_id).await?;
    Ok(Json(loans))
}

/// Loan history
#[utoipa::path(
    get,
    path = "/reports/loans",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Newest first", body = Vec<LoanRecord>),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn loan_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanRecord>>> {
    claims.require_admin()?;
    let loans = state.services.reports.loan_history(query).await?;
    Ok(Json(loans))
}

/// Maintenance history
#[utoipa::path(
    get,
    path = "/reports/maintenance",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(MaintenanceQuery),
    responses(
        (status = 200, description = "Newest first", body = Vec<MaintenanceRecord>),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn maintenance_history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<MaintenanceQuery>,
) -> AppResult<Json<Vec<MaintenanceRecord>>> {
    claims.require_admin()?;
    let records = state.services.reports.maintenance_history(query).await?;
    Ok(Json(records))
}

/// Open maintenance older than a threshold
#[utoipa::path(
    get,
    path = "/reports/maintenance/stale",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(StaleQuery),
    responses(
        (status = 200, description = "Stale open records", body = Vec<MaintenanceRecord>)
    )
)]
pub async fn stale_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<StaleQuery>,
) -> AppResult<Json<Vec<MaintenanceRecord>>> {
    claims.require_admin()?;
    let records = state.services.reports.stale_maintenance(query.days).await?;
    Ok(Json(records))
}

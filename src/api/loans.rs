//! Loan and reservation endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{loan::LoanRecord, transition::LoanTransition},
};

use super::AuthenticatedUser;

/// Return request
#[derive(Deserialize, ToSchema, Default)]
pub struct ReturnRequest {
    /// Observations on the returned equipment
    pub notes: Option<String>,
}

/// Get a loan or reservation
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan or reservation ID")),
    responses(
        (status = 200, description = "Ledger entry", body = LoanRecord),
        (status = 403, description = "Another user's loan", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanRecord>> {
    let loan = state.services.reports.loan(id).await?;
    claims.require_self_or_admin(loan.user_id)?;
    Ok(Json(loan))
}

/// Return a borrowed equipment
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Loan ID")),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Loan closed, equipment available", body = LoanTransition),
        (status = 404, description = "No active loan", body = crate::error::ErrorResponse),
        (status = 409, description = "Invalid state or concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<ReturnRequest>>,
) -> AppResult<Json<LoanTransition>> {
    let loan = state.services.reports.loan(id).await?;
    claims.require_self_or_admin(loan.user_id)?;

    let request = request.map(|Json(r)| r).unwrap_or_default();
    let transition = state
        .services
        .lifecycle
        .return_equipment(id, request.notes)
        .await?;
    Ok(Json(transition))
}

/// Turn a reservation into a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/fulfill",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation fulfilled, loan opened", body = LoanTransition),
        (status = 404, description = "No active reservation", body = crate::error::ErrorResponse),
        (status = 409, description = "Invalid state or concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn fulfill_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanTransition>> {
    let reservation = state.services.reports.loan(id).await?;
    claims.require_self_or_admin(reservation.user_id)?;

    let transition = state.services.lifecycle.fulfill_reservation(id).await?;
    Ok(Json(transition))
}

/// Cancel a reservation
#[utoipa::path(
    post,
    path = "/loans/{id}/cancel",
    tag = "lifecycle",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled, equipment available", body = LoanTransition),
        (status = 404, description = "No active reservation", body = crate::error::ErrorResponse),
        (status = 409, description = "Invalid state or concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanTransition>> {
    let reservation = state.services.reports.loan(id).await?;
    claims.require_self_or_admin(reservation.user_id)?;

    let transition = state.services.lifecycle.cancel_reservation(id).await?;
    Ok(Json(transition))
}

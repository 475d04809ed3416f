//! Loan request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        request::{LoanRequest, RequestQuery, SubmitRequest},
        transition::ApprovedRequest,
    },
};

use super::AuthenticatedUser;

/// Rejection body
#[derive(Deserialize, ToSchema, Default)]
pub struct RejectRequest {
    /// Reason shown to the requester
    pub notes: Option<String>,
}

/// Ask for a loan or reservation of a piece of equipment
#[utoipa::path(
    post,
    path = "/equipment/{id}/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = SubmitRequest,
    responses(
        (status = 201, description = "Request queued", body = LoanRequest),
        (status = 400, description = "Missing or past reservation date", body = crate::error::ErrorResponse),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse),
        (status = 422, description = "A request is already pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> AppResult<(StatusCode, Json<LoanRequest>)> {
    let created = state
        .services
        .requests
        .submit(id, claims.user_id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List requests, newest first. Non-administrators only see their own.
#[utoipa::path(
    get,
    path = "/requests",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(RequestQuery),
    responses(
        (status = 200, description = "Requests", body = Vec<LoanRequest>),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<RequestQuery>,
) -> AppResult<Json<Vec<LoanRequest>>> {
    let requests = state.services.requests.list(&claims, query).await?;
    Ok(Json(requests))
}

/// Get a request
#[utoipa::path(
    get,
    path = "/requests/{id}",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request", body = LoanRequest),
        (status = 403, description = "Another user's request", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LoanRequest>> {
    let request = state.services.requests.get(id).await?;
    claims.require_self_or_admin(request.user_id)?;
    Ok(Json(request))
}

/// Approve a pending request, opening the loan or reservation (admin only)
#[utoipa::path(
    post,
    path = "/requests/{id}/approve",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request approved", body = ApprovedRequest),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already decided, equipment not available, or lost a concurrent update", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApprovedRequest>> {
    claims.require_admin()?;

    let approved = state
        .services
        .requests
        .approve(id, claims.user_id())
        .await?;
    Ok(Json(approved))
}

/// Reject a pending request (admin only)
#[utoipa::path(
    post,
    path = "/requests/{id}/reject",
    tag = "requests",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Request rejected", body = LoanRequest),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already decided", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    request: Option<Json<RejectRequest>>,
) -> AppResult<Json<LoanRequest>> {
    claims.require_admin()?;

    let request = request.map(|Json(r)| r).unwrap_or_default();
    let rejected = state
        .services
        .requests
        .reject(id, claims.user_id(), request.notes)
        .await?;
    Ok(Json(rejected))
}

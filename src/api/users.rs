//! User directory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{AdminUpdateProfile, ProfileQuery, UpdateProfile, UserProfile},
};

use super::AuthenticatedUser;

/// List users (admin only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(ProfileQuery),
    responses(
        (status = 200, description = "Users ordered by name", body = Vec<UserProfile>),
        (status = 400, description = "Unknown role filter", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ProfileQuery>,
) -> AppResult<Json<Vec<UserProfile>>> {
    claims.require_admin()?;

    let users = state.services.users.list(query).await?;
    Ok(Json(users))
}

/// Get own profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own profile", body = UserProfile),
        (status = 404, description = "No profile saved yet", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_my_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserProfile>> {
    let profile = state.services.users.me(&claims).await?;
    Ok(Json(profile))
}

/// Create or update own profile (name, email)
#[utoipa::path(
    put,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile saved", body = UserProfile),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 422, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_my_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(profile): Json<UpdateProfile>,
) -> AppResult<Json<UserProfile>> {
    let saved = state.services.users.save_me(&claims, profile).await?;
    Ok(Json(saved))
}

/// Get a user's profile
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 403, description = "Another user's profile", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    claims.require_self_or_admin(id)?;

    let profile = state.services.users.get(id).await?;
    Ok(Json(profile))
}

/// Edit any profile, including its role (admin only)
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AdminUpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(profile): Json<AdminUpdateProfile>,
) -> AppResult<Json<UserProfile>> {
    claims.require_admin()?;

    let updated = state.services.users.update(id, profile).await?;
    Ok(Json(updated))
}

/// Delete a user (admin only)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Administrator role required", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 422, description = "User has an active loan or a pending request", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

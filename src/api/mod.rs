//! API handlers for EquipTrack REST endpoints

pub mod categories;
pub mod equipment;
pub mod health;
pub mod loans;
pub mod maintenance;
pub mod openapi;
pub mod reports;
pub mod requests;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        // Tokens are issued by the auth provider, only verified here
        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Equipment inventory
        .route(
            "/equipment",
            get(equipment::list_equipment).post(equipment::create_equipment),
        )
        .route(
            "/equipment/:id",
            get(equipment::get_equipment)
                .put(equipment::update_equipment)
                .delete(equipment::delete_equipment),
        )
        // Lifecycle transitions
        .route("/equipment/:id/loan", post(equipment::request_loan))
        .route("/equipment/:id/reservation", post(equipment::request_reservation))
        .route("/equipment/:id/maintenance", post(equipment::start_maintenance))
        .route("/equipment/:id/unavailable", post(equipment::mark_unavailable))
        .route("/equipment/:id/restore", post(equipment::restore))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/loans/:id/fulfill", post(loans::fulfill_reservation))
        .route("/loans/:id/cancel", post(loans::cancel_reservation))
        .route("/equipment/:id/requests", post(requests::submit_request))
        .route("/maintenance/:id", get(maintenance::get_maintenance))
        .route("/maintenance/:id/close", post(maintenance::close_maintenance))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Requests
        .route("/requests", get(requests::list_requests))
        .route("/requests/:id", get(requests::get_request))
        .route("/requests/:id/approve", post(requests::approve_request))
        .route("/requests/:id/reject", post(requests::reject_request))
        // Users
        .route("/users", get(users::list_users))
        .route(
            "/users/me",
            get(users::get_my_profile).put(users::update_my_profile),
        )
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Reports
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/reports/status-counts", get(reports::status_counts))
        .route("/reports/users/:id/loans", get(reports::user_loans))
        .route("/reports/loans", get(reports::loan_history))
        .route("/reports/maintenance", get(reports::maintenance_history))
        .route("/reports/maintenance/stale", get(reports::stale_maintenance))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{categories, equipment, health, loans, maintenance, reports, requests, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EquipTrack API",
        version = "1.0.0",
        description = "Equipment loan, reservation and maintenance tracking REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        // Lifecycle
        equipment::request_loan,
        equipment::request_reservation,
        equipment::start_maintenance,
        equipment::mark_unavailable,
        equipment::restore,
        loans::get_loan,
        loans::return_loan,
        loans::fulfill_reservation,
        loans::cancel_reservation,
        maintenance::get_maintenance,
        maintenance::close_maintenance,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Reports
        reports::dashboard,
        reports::status_counts,
        reports::user_loans,
        reports::loan_history,
        reports::maintenance_history,
        reports::stale_maintenance,
        // Requests
        requests::submit_request,
        requests::list_requests,
        requests::get_request,
        requests::approve_request,
        requests::reject_request,
        // Users
        users::list_users,
        users::get_my_profile,
        users::update_my_profile,
        users::get_user,
        users::update_user,
        users::delete_user,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::EquipmentStatus,
            crate::models::enums::LoanKind,
            crate::models::enums::LoanStatus,
            crate::models::enums::MaintenanceType,
            crate::models::enums::Role,
            crate::models::enums::RequestStatus,
            // Equipment
            crate::models::equipment::EquipmentRecord,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::Removal,
            crate::models::equipment::RemovalOutcome,
            // Categories
            crate::models::category::Category,
            crate::models::category::CreateCategory,
            crate::models::category::UpdateCategory,
            // Ledgers
            crate::models::loan::LoanRecord,
            crate::models::maintenance::MaintenanceRecord,
            // Transitions
            crate::models::transition::TransitionKind,
            crate::models::transition::TransitionEvent,
            crate::models::transition::LoanTransition,
            crate::models::transition::MaintenanceTransition,
            crate::models::transition::OverrideTransition,
            equipment::ReservationRequest,
            equipment::StartMaintenanceRequest,
            equipment::UnavailableRequest,
            loans::ReturnRequest,
            maintenance::CloseMaintenanceRequest,
            // Requests
            crate::models::request::LoanRequest,
            crate::models::request::SubmitRequest,
            crate::models::transition::ApprovedRequest,
            requests::RejectRequest,
            // Users
            crate::models::user::UserProfile,
            crate::models::user::UpdateProfile,
            crate::models::user::AdminUpdateProfile,
            // Reports
            crate::services::reports::DashboardSummary,
            crate::services::reports::StatusCount,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Equipment inventory"),
        (name = "lifecycle", description = "Loan, reservation and maintenance transitions"),
        (name = "categories", description = "Equipment categories"),
        (name = "requests", description = "Loan and reservation requests awaiting approval"),
        (name = "users", description = "User directory"),
        (name = "reports", description = "Read-only reports")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

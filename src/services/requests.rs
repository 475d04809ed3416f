//! Loan request service
//!
//! Users queue requests for equipment; an administrator approves (which opens
//! the loan or reservation through the lifecycle manager) or rejects them.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::lifecycle::LifecycleManager;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::LoanKind,
        request::{LoanRequest, NewLoanRequest, RequestFilter, RequestQuery, SubmitRequest},
        transition::ApprovedRequest,
        user::UserClaims,
    },
    repository::RequestStore,
};

#[derive(Clone)]
pub struct RequestService {
    store: Arc<dyn RequestStore>,
    lifecycle: LifecycleManager,
}

impl RequestService {
    pub fn new(store: Arc<dyn RequestStore>, lifecycle: LifecycleManager) -> Self {
        Self { store, lifecycle }
    }

    /// Queue a request for the authenticated user
    pub async fn submit(
        &self,
        equipment_id: Uuid,
        user_id: Uuid,
        data: SubmitRequest,
    ) -> AppResult<LoanRequest> {
        let scheduled_at = match data.kind {
            LoanKind::Loan => None,
            LoanKind::Reservation => {
                let date = data.scheduled_at.ok_or_else(|| {
                    AppError::Validation("scheduled_at is required for a reservation".to_string())
                })?;
                if date < Utc::now() {
                    return Err(AppError::Validation(
                        "scheduled_at must not be in the past".to_string(),
                    ));
                }
                Some(date)
            }
        };

        let request = self
            .store
            .submit_request(NewLoanRequest {
                equipment_id,
                user_id,
                kind: data.kind,
                scheduled_at,
            })
            .await?;
        tracing::info!(
            request_id = %request.id,
            %equipment_id,
            %user_id,
            kind = %request.kind,
            "Request submitted"
        );
        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<LoanRequest> {
        self.store.get_request(id).await
    }

    /// Administrators see every request, users only their own
    pub async fn list(&self, claims: &UserClaims, query: RequestQuery) -> AppResult<Vec<LoanRequest>> {
        let mut filter = RequestFilter::try_from(query)?;
        if !claims.is_admin() {
            filter.user_id = Some(claims.user_id());
        }
        self.store.list_requests(&filter).await
    }

    pub async fn approve(&self, id: Uuid, admin_id: Uuid) -> AppResult<ApprovedRequest> {
        self.lifecycle.approve_request(id, admin_id).await
    }

    pub async fn reject(
        &self,
        id: Uuid,
        admin_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<LoanRequest> {
        self.lifecycle.reject_request(id, admin_id, notes).await
    }
}

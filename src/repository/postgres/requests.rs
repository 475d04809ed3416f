//! Pending loan and reservation requests

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{foreign_key_as, unique_as_rejected, PgStore};
use crate::{
    error::{AppError, AppResult},
    models::request::{LoanRequest, LoanRequestRow, NewLoanRequest, RequestFilter},
    repository::RequestStore,
};

#[async_trait]
impl RequestStore for PgStore {
    async fn submit_request(&self, request: NewLoanRequest) -> AppResult<LoanRequest> {
        let equipment_id = request.equipment_id;
        sqlx::query_as::<_, LoanRequestRow>(
            r#"
            INSERT INTO loan_requests (id, equipment_id, user_id, kind, scheduled_at,
                                       status, requested_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(equipment_id)
        .bind(request.user_id)
        .bind(request.kind.as_str())
        .bind(request.scheduled_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            match unique_as_rejected(
                e,
                format!("A request for equipment {} is already pending", equipment_id),
            ) {
                AppError::Database(e) => foreign_key_as(e, || {
                    AppError::NotFound(format!("Equipment {} not found", equipment_id))
                }),
                other => other,
            }
        })?
        .try_into()
    }

    async fn get_request(&self, id: Uuid) -> AppResult<LoanRequest> {
        sqlx::query_as::<_, LoanRequestRow>("SELECT * FROM loan_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?
            .try_into()
    }

    async fn list_requests(&self, filter: &RequestFilter) -> AppResult<Vec<LoanRequest>> {
        let rows = sqlx::query_as::<_, LoanRequestRow>(
            r#"
            SELECT * FROM loan_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR user_id = $2)
              AND ($3::uuid IS NULL OR equipment_id = $3)
            ORDER BY requested_at DESC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.user_id)
        .bind(filter.equipment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LoanRequest::try_from).collect()
    }
}

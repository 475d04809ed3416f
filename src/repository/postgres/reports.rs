//! Read path for the reporting facade

use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::EquipmentStatus,
        loan::{LoanFilter, LoanRecord, LoanRow},
        maintenance::{MaintenanceFilter, MaintenanceRecord, MaintenanceRow},
    },
    repository::ReportStore,
};

#[async_trait]
impl ReportStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn count_equipment_by_status(&self) -> AppResult<Vec<(EquipmentStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM equipment GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(status, count)| -> AppResult<_> {
                Ok((status.parse::<EquipmentStatus>()?, count))
            })
            .collect()
    }

    async fn get_loan(&self, id: Uuid) -> AppResult<LoanRecord> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))?
            .try_into()
    }

    async fn get_maintenance(&self, id: Uuid) -> AppResult<MaintenanceRecord> {
        sqlx::query_as::<_, MaintenanceRow>("SELECT * FROM maintenance_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Maintenance record {} not found", id)))?
            .try_into()
    }

    async fn query_loans(&self, filter: &LoanFilter) -> AppResult<Vec<LoanRecord>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT * FROM loans
            WHERE ($1::timestamptz IS NULL OR requested_at >= $1)
              AND ($2::timestamptz IS NULL OR requested_at <= $2)
              AND ($3::uuid IS NULL OR user_id = $3)
              AND ($4::text IS NULL OR kind = $4)
              AND (NOT $5 OR status = 'active')
            ORDER BY requested_at DESC
            "#,
        )
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.user_id)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.active_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LoanRecord::try_from).collect()
    }

    async fn query_maintenance(
        &self,
        filter: &MaintenanceFilter,
    ) -> AppResult<Vec<MaintenanceRecord>> {
        let rows = sqlx::query_as::<_, MaintenanceRow>(
            r#"
            SELECT * FROM maintenance_records
            WHERE ($1::timestamptz IS NULL OR opened_at >= $1)
              AND ($2::timestamptz IS NULL OR opened_at <= $2)
              AND ($3::uuid IS NULL OR equipment_id = $3)
              AND (NOT $4 OR closed_at IS NOT NULL)
              AND (NOT $5 OR closed_at IS NULL)
            ORDER BY opened_at DESC
            "#,
        )
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.equipment_id)
        .bind(filter.completed_only)
        .bind(filter.open_only)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MaintenanceRecord::try_from).collect()
    }
}

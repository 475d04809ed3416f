//! Transactional status swaps and ledger writes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{foreign_key_as, unique_as_rejected, PgTransaction};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, LoanStatus, RequestStatus},
        equipment::{EquipmentRecord, EquipmentRow},
        loan::{CloseLoan, LoanRecord, LoanRow, NewLoan},
        maintenance::{MaintenanceRecord, MaintenanceRow, NewMaintenance},
        request::{LoanRequest, LoanRequestRow, RequestDecision},
    },
    repository::StoreTransaction,
};

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn equipment(&mut self, id: Uuid) -> AppResult<EquipmentRecord> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?
            .try_into()
    }

    async fn compare_and_swap_status(
        &mut self,
        id: Uuid,
        expected: EquipmentStatus,
        next: EquipmentStatus,
    ) -> AppResult<EquipmentRecord> {
        let swapped = sqlx::query_as::<_, EquipmentRow>(
            r#"
            UPDATE equipment SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .fetch_optional(self.conn()?)
        .await?;

        if let Some(row) = swapped {
            return row.try_into();
        }

        let found: Option<String> =
            sqlx::query_scalar("SELECT status FROM equipment WHERE id = $1")
                .bind(id)
                .fetch_optional(self.conn()?)
                .await?;

        match found {
            None => Err(AppError::NotFound(format!("Equipment {} not found", id))),
            Some(status) => {
                let status: EquipmentStatus = status.parse()?;
                Err(AppError::conflict(
                    format!("Equipment {} is {}, expected {}", id, status, expected),
                    Some(status),
                ))
            }
        }
    }

    async fn loan(&mut self, id: Uuid) -> AppResult<LoanRecord> {
        sqlx::query_as::<_, LoanRow>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan {} not found", id)))?
            .try_into()
    }

    async fn active_loan(&mut self, equipment_id: Uuid) -> AppResult<Option<LoanRecord>> {
        sqlx::query_as::<_, LoanRow>(
            "SELECT * FROM loans WHERE equipment_id = $1 AND status = 'active'",
        )
        .bind(equipment_id)
        .fetch_optional(self.conn()?)
        .await?
        .map(LoanRecord::try_from)
        .transpose()
    }

    async fn open_loan(&mut self, loan: NewLoan) -> AppResult<LoanRecord> {
        let equipment_id = loan.equipment_id;
        let inserted = sqlx::query_as::<_, LoanRow>(
            r#"
            INSERT INTO loans (id, equipment_id, user_id, kind, status, requested_at,
                               scheduled_at, reservation_id)
            SELECT $1, $2, $3, $4, 'active', $5, $6, $7
            WHERE NOT EXISTS (
                SELECT 1 FROM maintenance_records
                WHERE equipment_id = $2 AND closed_at IS NULL
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(equipment_id)
        .bind(loan.user_id)
        .bind(loan.kind.as_str())
        .bind(Utc::now())
        .bind(loan.scheduled_at)
        .bind(loan.reservation_id)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| {
            let e = unique_as_rejected(
                e,
                format!(
                    "Equipment {} already has an active loan or reservation",
                    equipment_id
                ),
            );
            match e {
                AppError::Database(e) => foreign_key_as(e, || {
                    AppError::NotFound(format!("Equipment {} not found", equipment_id))
                }),
                other => other,
            }
        })?;

        inserted
            .ok_or_else(|| {
                AppError::rejected(
                    format!("Equipment {} is under maintenance", equipment_id),
                    None,
                )
            })?
            .try_into()
    }

    async fn close_loan(&mut self, id: Uuid, close: CloseLoan) -> AppResult<LoanRecord> {
        let closed = sqlx::query_as::<_, LoanRow>(
            r#"
            UPDATE loans SET status = $2, returned_at = $3, notes = COALESCE($4, notes)
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(close.status.as_str())
        .bind(close.closed_at)
        .bind(&close.notes)
        .fetch_optional(self.conn()?)
        .await?;

        if let Some(row) = closed {
            return row.try_into();
        }

        let found: Option<String> = sqlx::query_scalar("SELECT status FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?;

        match found {
            None => Err(AppError::NotFound(format!("Loan {} not found", id))),
            Some(status) => {
                let status: LoanStatus = status.parse()?;
                Err(AppError::AlreadyClosed(format!(
                    "Loan {} is already {}",
                    id, status
                )))
            }
        }
    }

    async fn maintenance(&mut self, id: Uuid) -> AppResult<MaintenanceRecord> {
        sqlx::query_as::<_, MaintenanceRow>("SELECT * FROM maintenance_records WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Maintenance record {} not found", id)))?
            .try_into()
    }

    async fn open_maintenance_for(
        &mut self,
        equipment_id: Uuid,
    ) -> AppResult<Option<MaintenanceRecord>> {
        sqlx::query_as::<_, MaintenanceRow>(
            "SELECT * FROM maintenance_records WHERE equipment_id = $1 AND closed_at IS NULL",
        )
        .bind(equipment_id)
        .fetch_optional(self.conn()?)
        .await?
        .map(MaintenanceRecord::try_from)
        .transpose()
    }

    async fn open_maintenance(&mut self, record: NewMaintenance) -> AppResult<MaintenanceRecord> {
        let equipment_id = record.equipment_id;
        let inserted = sqlx::query_as::<_, MaintenanceRow>(
            r#"
            INSERT INTO maintenance_records (id, equipment_id, technician_id,
                                             maintenance_type, opened_at)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (
                SELECT 1 FROM loans WHERE equipment_id = $2 AND status = 'active'
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(equipment_id)
        .bind(record.technician_id)
        .bind(record.maintenance_type.as_str())
        .bind(Utc::now())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| {
            let e = unique_as_rejected(
                e,
                format!("Equipment {} already has open maintenance", equipment_id),
            );
            match e {
                AppError::Database(e) => foreign_key_as(e, || {
                    AppError::NotFound(format!("Equipment {} not found", equipment_id))
                }),
                other => other,
            }
        })?;

        inserted
            .ok_or_else(|| {
                AppError::rejected(
                    format!(
                        "Equipment {} has an active loan or reservation",
                        equipment_id
                    ),
                    None,
                )
            })?
            .try_into()
    }

    async fn close_maintenance(
        &mut self,
        id: Uuid,
        closed_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> AppResult<MaintenanceRecord> {
        let closed = sqlx::query_as::<_, MaintenanceRow>(
            r#"
            UPDATE maintenance_records SET closed_at = $2, notes = COALESCE($3, notes)
            WHERE id = $1 AND closed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(closed_at)
        .bind(&notes)
        .fetch_optional(self.conn()?)
        .await?;

        if let Some(row) = closed {
            return row.try_into();
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM maintenance_records WHERE id = $1)")
                .bind(id)
                .fetch_one(self.conn()?)
                .await?;

        if exists {
            Err(AppError::AlreadyClosed(format!(
                "Maintenance record {} is already closed",
                id
            )))
        } else {
            Err(AppError::NotFound(format!("Maintenance record {} not found", id)))
        }
    }

    async fn loan_request(&mut self, id: Uuid) -> AppResult<LoanRequest> {
        sqlx::query_as::<_, LoanRequestRow>("SELECT * FROM loan_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.conn()?)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", id)))?
            .try_into()
    }

    async fn settle_request(
        &mut self,
        id: Uuid,
        decision: RequestDecision,
    ) -> AppResult<LoanRequest> {
        let settled = sqlx::query_as::<_, LoanRequestRow>(
            r#"
            UPDATE loan_requests
            SET status = $2, decided_by = $3, decided_at = $4, loan_id = $5, notes = $6
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(decision.status.as_str())
        .bind(decision.decided_by)
        .bind(decision.decided_at)
        .bind(decision.loan_id)
        .bind(&decision.notes)
        .fetch_optional(self.conn()?)
        .await?;

        if let Some(row) = settled {
            return row.try_into();
        }

        let found: Option<String> =
            sqlx::query_scalar("SELECT status FROM loan_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(self.conn()?)
                .await?;

        match found {
            None => Err(AppError::NotFound(format!("Request {} not found", id))),
            Some(status) => {
                let status: RequestStatus = status.parse()?;
                Err(AppError::AlreadyClosed(format!(
                    "Request {} is already {}",
                    id, status
                )))
            }
        }
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}

//! Read-only reporting facade
//!
//! Store failures here never touch data: they are logged and surfaced as
//! `StoreUnavailable` so the client shows "report unavailable".

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::ReportsConfig,
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, LoanKind},
        loan::{LoanFilter, LoanQuery, LoanRecord},
        maintenance::{MaintenanceFilter, MaintenanceQuery, MaintenanceRecord},
    },
    repository::ReportStore,
};

/// Number of equipment units in one status
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: EquipmentStatus,
    pub count: i64,
}

/// Administrator dashboard figures
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_equipment: i64,
    pub by_status: Vec<StatusCount>,
    pub active_loans: i64,
    pub active_reservations: i64,
    pub open_maintenance: i64,
    /// Open maintenance older than the configured threshold
    pub stale_maintenance: i64,
}

fn unavailable(report: &'static str) -> impl FnOnce(AppError) -> AppError {
    move |err| match err {
        // Caller mistakes pass through untouched
        AppError::Validation(_) | AppError::NotFound(_) => err,
        other => {
            tracing::warn!("Report '{}' unavailable: {}", report, other);
            AppError::StoreUnavailable(format!("Report '{}' unavailable", report))
        }
    }
}

/// Instant `days` days before now; `Validation` when out of range
fn days_ago(days: i64) -> AppResult<DateTime<Utc>> {
    if days < 0 {
        return Err(AppError::Validation("`days` must not be negative".to_string()));
    }
    Duration::try_days(days)
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .ok_or_else(|| AppError::Validation(format!("`days` is out of range: {}", days)))
}

#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn ReportStore>,
    config: ReportsConfig,
}

impl ReportingService {
    pub fn new(store: Arc<dyn ReportStore>, config: ReportsConfig) -> Self {
        Self { store, config }
    }

    /// Readiness check on the backing store
    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await.map_err(unavailable("ping"))
    }

    pub async fn loan(&self, id: Uuid) -> AppResult<LoanRecord> {
        self.store.get_loan(id).await.map_err(unavailable("loan"))
    }

    pub async fn maintenance(&self, id: Uuid) -> AppResult<MaintenanceRecord> {
        self.store
            .get_maintenance(id)
            .await
            .map_err(unavailable("maintenance record"))
    }

    /// Count per status, every status present even when zero
    pub async fn status_counts(&self) -> AppResult<Vec<StatusCount>> {
        let counted: HashMap<EquipmentStatus, i64> = self
            .store
            .count_equipment_by_status()
            .await
            .map_err(unavailable("status counts"))?
            .into_iter()
            .collect();

        Ok(EquipmentStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counted.get(&status).copied().unwrap_or(0),
            })
            .collect())
    }

    pub async fn dashboard(&self) -> AppResult<DashboardSummary> {
        let by_status = self.status_counts().await?;
        let active = self
            .store
            .query_loans(&LoanFilter {
                active_only: true,
                ..Default::default()
            })
            .await
            .map_err(unavailable("dashboard"))?;
        let open = self
            .store
            .query_maintenance(&MaintenanceFilter {
                open_only: true,
                ..Default::default()
            })
            .await
            .map_err(unavailable("dashboard"))?;

        let stale_before = days_ago(self.config.stale_maintenance_days).map_err(|e| {
            AppError::Internal(format!("reports.stale_maintenance_days: {}", e))
        })?;
        Ok(DashboardSummary {
            total_equipment: by_status.iter().map(|s| s.count).sum(),
            by_status,
            active_loans: active.iter().filter(|l| l.kind == LoanKind::Loan).count() as i64,
            active_reservations: active
                .iter()
                .filter(|l| l.kind == LoanKind::Reservation)
                .count() as i64,
            open_maintenance: open.len() as i64,
            stale_maintenance: open.iter().filter(|m| m.opened_at < stale_before).count() as i64,
        })
    }

    /// Active loans and reservations of one user
    pub async fn active_loans_for_user(&self, user_id: Uuid) -> AppResult<Vec<LoanRecord>> {
        self.store
            .query_loans(&LoanFilter {
                user_id: Some(user_id),
                active_only: true,
                ..Default::default()
            })
            .await
            .map_err(unavailable("user loans"))
    }

    /// Open maintenance older than `days`, or the configured default
    pub async fn stale_maintenance(&self, days: Option<i64>) -> AppResult<Vec<MaintenanceRecord>> {
        let cutoff = days_ago(days.unwrap_or(self.config.stale_maintenance_days))?;
        let open = self
            .store
            .query_maintenance(&MaintenanceFilter {
                to: Some(cutoff),
                open_only: true,
                ..Default::default()
            })
            .await
            .map_err(unavailable("stale maintenance"))?;
        Ok(open.into_iter().filter(|m| m.opened_at < cutoff).collect())
    }

    pub async fn maintenance_history(
        &self,
        query: MaintenanceQuery,
    ) -> AppResult<Vec<MaintenanceRecord>> {
        let filter = MaintenanceFilter::try_from(query)?;
        self.store
            .query_maintenance(&filter)
            .await
            .map_err(unavailable("maintenance history"))
    }

    pub async fn loan_history(&self, query: LoanQuery) -> AppResult<Vec<LoanRecord>> {
        let filter = LoanFilter::try_from(query)?;
        self.store
            .query_loans(&filter)
            .await
            .map_err(unavailable("loan history"))
    }
}

//! Loan and reservation ledger entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::enums::{LoanKind, LoanStatus};
use crate::error::AppError;

/// Loan or reservation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoanRecord {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub kind: LoanKind,
    pub status: LoanStatus,
    pub requested_at: DateTime<Utc>,
    /// Date the reservation is for (reservations only)
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the record left `active`, whatever the closing reason
    pub returned_at: Option<DateTime<Utc>>,
    /// Reservation this loan fulfilled, if any
    pub reservation_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl LoanRecord {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

#[derive(Debug, FromRow)]
pub struct LoanRow {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub reservation_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl TryFrom<LoanRow> for LoanRecord {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            equipment_id: row.equipment_id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            status: row.status.parse()?,
            requested_at: row.requested_at,
            scheduled_at: row.scheduled_at,
            returned_at: row.returned_at,
            reservation_id: row.reservation_id,
            notes: row.notes,
        })
    }
}

/// Ledger insert for a new active loan or reservation
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub kind: LoanKind,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub reservation_id: Option<Uuid>,
}

impl NewLoan {
    pub fn into_record(self, id: Uuid, requested_at: DateTime<Utc>) -> LoanRecord {
        LoanRecord {
            id,
            equipment_id: self.equipment_id,
            user_id: self.user_id,
            kind: self.kind,
            status: LoanStatus::Active,
            requested_at,
            scheduled_at: self.scheduled_at,
            returned_at: None,
            reservation_id: self.reservation_id,
            notes: None,
        }
    }
}

/// How an active ledger entry is being closed
#[derive(Debug, Clone, PartialEq)]
pub struct CloseLoan {
    pub status: LoanStatus,
    pub closed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Loan history query
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    /// Lower bound on `requested_at` (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Upper bound on `requested_at` (inclusive)
    pub to: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
    /// `loan` or `reservation`
    pub kind: Option<String>,
    /// Only records still active
    #[serde(default)]
    pub active_only: bool,
}

/// Parsed form of [`LoanQuery`], also used internally by the reporting facade
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
    pub kind: Option<LoanKind>,
    pub active_only: bool,
}

impl TryFrom<LoanQuery> for LoanFilter {
    type Error = AppError;

    fn try_from(query: LoanQuery) -> Result<Self, Self::Error> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::Validation("`from` is after `to`".to_string()));
            }
        }
        Ok(Self {
            from: query.from,
            to: query.to,
            user_id: query.user_id,
            kind: query.kind.as_deref().map(str::parse).transpose()?,
            active_only: query.active_only,
        })
    }
}

impl LoanFilter {
    pub fn matches(&self, loan: &LoanRecord) -> bool {
        self.from.map_or(true, |from| loan.requested_at >= from)
            && self.to.map_or(true, |to| loan.requested_at <= to)
            && self.user_id.map_or(true, |u| loan.user_id == u)
            && self.kind.map_or(true, |k| loan.kind == k)
            && (!self.active_only || loan.is_active())
    }
}

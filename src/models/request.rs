//! Loan and reservation requests awaiting an administrator decision

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::enums::{LoanKind, RequestStatus};
use crate::error::AppError;

/// A user's request for a loan or reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoanRequest {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub kind: LoanKind,
    /// Date the reservation is for (reservation requests only)
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Administrator who approved or rejected the request
    pub decided_by: Option<Uuid>,
    /// Loan or reservation opened on approval
    pub loan_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl LoanRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

#[derive(Debug, FromRow)]
pub struct LoanRequestRow {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
    pub loan_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl TryFrom<LoanRequestRow> for LoanRequest {
    type Error = AppError;

    fn try_from(row: LoanRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            equipment_id: row.equipment_id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            scheduled_at: row.scheduled_at,
            status: row.status.parse()?,
            requested_at: row.requested_at,
            decided_at: row.decided_at,
            decided_by: row.decided_by,
            loan_id: row.loan_id,
            notes: row.notes,
        })
    }
}

/// Submit request body
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitRequest {
    pub kind: LoanKind,
    /// Required for reservations, ignored for loans
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Ledger insert for a new pending request
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoanRequest {
    pub equipment_id: Uuid,
    pub user_id: Uuid,
    pub kind: LoanKind,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl NewLoanRequest {
    pub fn into_record(self, id: Uuid, requested_at: DateTime<Utc>) -> LoanRequest {
        LoanRequest {
            id,
            equipment_id: self.equipment_id,
            user_id: self.user_id,
            kind: self.kind,
            scheduled_at: self.scheduled_at,
            status: RequestStatus::Pending,
            requested_at,
            decided_at: None,
            decided_by: None,
            loan_id: None,
            notes: None,
        }
    }
}

/// Outcome written on a pending request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDecision {
    pub status: RequestStatus,
    pub decided_by: Uuid,
    pub decided_at: DateTime<Utc>,
    pub loan_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Request listing query
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RequestQuery {
    /// `pending`, `approved` or `rejected`
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub user_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
}

impl TryFrom<RequestQuery> for RequestFilter {
    type Error = AppError;

    fn try_from(query: RequestQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            status: query.status.as_deref().map(str::parse).transpose()?,
            user_id: query.user_id,
            equipment_id: query.equipment_id,
        })
    }
}

impl RequestFilter {
    pub fn matches(&self, request: &LoanRequest) -> bool {
        self.status.map_or(true, |s| request.status == s)
            && self.user_id.map_or(true, |u| request.user_id == u)
            && self.equipment_id.map_or(true, |e| request.equipment_id == e)
    }
}

//! Maintenance ledger entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::enums::MaintenanceType;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRecord {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub technician_id: Uuid,
    pub maintenance_type: MaintenanceType,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl MaintenanceRecord {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}

#[derive(Debug, FromRow)]
pub struct MaintenanceRow {
    pub id: Uuid,
    pub equipment_id: Uuid,
    pub technician_id: Uuid,
    pub maintenance_type: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl TryFrom<MaintenanceRow> for MaintenanceRecord {
    type Error = AppError;

    fn try_from(row: MaintenanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            equipment_id: row.equipment_id,
            technician_id: row.technician_id,
            maintenance_type: row.maintenance_type.parse()?,
            opened_at: row.opened_at,
            closed_at: row.closed_at,
            notes: row.notes,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMaintenance {
    pub equipment_id: Uuid,
    pub technician_id: Uuid,
    pub maintenance_type: MaintenanceType,
}

impl NewMaintenance {
    pub fn into_record(self, id: Uuid, opened_at: DateTime<Utc>) -> MaintenanceRecord {
        MaintenanceRecord {
            id,
            equipment_id: self.equipment_id,
            technician_id: self.technician_id,
            maintenance_type: self.maintenance_type,
            opened_at,
            closed_at: None,
            notes: None,
        }
    }
}

/// Maintenance history query
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MaintenanceQuery {
    /// Lower bound on `opened_at` (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Upper bound on `opened_at` (inclusive)
    pub to: Option<DateTime<Utc>>,
    pub equipment_id: Option<Uuid>,
    /// Only records that have been closed
    #[serde(default)]
    pub completed_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub equipment_id: Option<Uuid>,
    pub completed_only: bool,
    pub open_only: bool,
}

impl TryFrom<MaintenanceQuery> for MaintenanceFilter {
    type Error = AppError;

    fn try_from(query: MaintenanceQuery) -> Result<Self, Self::Error> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::Validation("`from` is after `to`".to_string()));
            }
        }
        Ok(Self {
            from: query.from,
            to: query.to,
            equipment_id: query.equipment_id,
            completed_only: query.completed_only,
            open_only: false,
        })
    }
}

impl MaintenanceFilter {
    pub fn matches(&self, record: &MaintenanceRecord) -> bool {
        self.from.map_or(true, |from| record.opened_at >= from)
            && self.to.map_or(true, |to| record.opened_at <= to)
            && self.equipment_id.map_or(true, |e| record.equipment_id == e)
            && (!self.completed_only || !record.is_open())
            && (!self.open_only || record.is_open())
    }
}

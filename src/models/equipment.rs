//! Equipment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::EquipmentStatus;
use crate::error::AppError;

/// Equipment record. `status` is owned by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EquipmentRecord {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub status: EquipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw equipment row, status still in its stored string form
#[derive(Debug, FromRow)]
pub struct EquipmentRow {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EquipmentRow> for EquipmentRecord {
    type Error = AppError;

    fn try_from(row: EquipmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            description: row.description,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Create equipment request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    pub category_id: Uuid,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Update equipment details. Status is deliberately absent.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    /// Absent keeps the current text, an empty string clears it
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Equipment list filter
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EquipmentQuery {
    /// Status, e.g. `available` or `in_maintenance`
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    /// Case-insensitive substring of the name
    pub name: Option<String>,
}

/// Parsed form of [`EquipmentQuery`]
#[derive(Debug, Clone, Default)]
pub struct EquipmentFilter {
    pub status: Option<EquipmentStatus>,
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
}

impl TryFrom<EquipmentQuery> for EquipmentFilter {
    type Error = AppError;

    fn try_from(query: EquipmentQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            status: query.status.as_deref().map(str::parse).transpose()?,
            category_id: query.category_id,
            name: query
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        })
    }
}

impl EquipmentFilter {
    pub fn matches(&self, record: &EquipmentRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self.category_id.map_or(true, |c| record.category_id == c)
            && self.name.as_ref().map_or(true, |n| {
                record.name.to_lowercase().contains(&n.to_lowercase())
            })
    }
}

/// How an equipment removal request was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemovalOutcome {
    /// No ledger entry referenced the equipment, the row is gone
    Deleted,
    /// Referenced by history, soft-deleted to `unavailable`
    Retired,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Removal {
    pub outcome: RemovalOutcome,
    /// Retired equipment as it now stands
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment: Option<EquipmentRecord>,
}

impl Removal {
    pub fn deleted() -> Self {
        Self {
            outcome: RemovalOutcome::Deleted,
            equipment: None,
        }
    }

    pub fn retired(equipment: EquipmentRecord) -> Self {
        Self {
            outcome: RemovalOutcome::Retired,
            equipment: Some(equipment),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> EquipmentRow {
        EquipmentRow {
            id: Uuid::new_v4(),
            name: "Projector".into(),
            category_id: Uuid::new_v4(),
            description: None,
            status: status.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_with_known_status_converts() {
        let record = EquipmentRecord::try_from(row("in_maintenance")).unwrap();
        assert_eq!(record.status, EquipmentStatus::InMaintenance);
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        assert!(EquipmentRecord::try_from(row("prestado")).is_err());
    }

    #[test]
    fn test_filter_rejects_unknown_status() {
        let query = EquipmentQuery {
            status: Some("broken".into()),
            ..Default::default()
        };
        assert!(EquipmentFilter::try_from(query).is_err());
    }

    #[test]
    fn test_filter_name_match_is_case_insensitive() {
        let filter = EquipmentFilter {
            name: Some("PROJ".into()),
            ..Default::default()
        };
        let record = EquipmentRecord::try_from(row("available")).unwrap();
        assert!(filter.matches(&record));
    }

    #[test]
    fn test_create_validation() {
        let data = CreateEquipment {
            name: String::new(),
            category_id: Uuid::new_v4(),
            description: None,
        };
        assert!(data.validate().is_err());
    }
}

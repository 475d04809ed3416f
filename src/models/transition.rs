//! Lifecycle transition results and events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    enums::EquipmentStatus, equipment::EquipmentRecord, loan::LoanRecord,
    maintenance::MaintenanceRecord, request::LoanRequest,
};

/// Lifecycle operation that produced a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Loan,
    Reservation,
    FulfillReservation,
    CancelReservation,
    Return,
    StartMaintenance,
    EndMaintenance,
    MarkUnavailable,
    Restore,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 9] = [
        TransitionKind::Loan,
        TransitionKind::Reservation,
        TransitionKind::FulfillReservation,
        TransitionKind::CancelReservation,
        TransitionKind::Return,
        TransitionKind::StartMaintenance,
        TransitionKind::EndMaintenance,
        TransitionKind::MarkUnavailable,
        TransitionKind::Restore,
    ];

    /// Administrative transitions bypass the regular table
    pub fn is_administrative(&self) -> bool {
        matches!(self, TransitionKind::MarkUnavailable | TransitionKind::Restore)
    }

    /// Required source status and resulting status.
    ///
    /// `None` for `MarkUnavailable`, which leaves any status but `unavailable`.
    pub fn edge(&self) -> Option<(EquipmentStatus, EquipmentStatus)> {
        use EquipmentStatus::*;
        match self {
            TransitionKind::Loan => Some((Available, Loaned)),
            TransitionKind::Reservation => Some((Available, Reserved)),
            TransitionKind::FulfillReservation => Some((Reserved, Loaned)),
            TransitionKind::CancelReservation => Some((Reserved, Available)),
            TransitionKind::Return => Some((Loaned, Available)),
            TransitionKind::StartMaintenance => Some((Available, InMaintenance)),
            TransitionKind::EndMaintenance => Some((InMaintenance, Available)),
            TransitionKind::MarkUnavailable => None,
            TransitionKind::Restore => Some((Unavailable, Available)),
        }
    }

    /// Whether the status table allows this transition out of `from`
    pub fn allowed_from(&self, from: EquipmentStatus) -> bool {
        match self.edge() {
            Some((source, target)) if self.is_administrative() => {
                from == source && from.can_override_to(target)
            }
            Some((source, target)) => from == source && from.can_transition_to(target),
            None => from.can_override_to(EquipmentStatus::Unavailable),
        }
    }
}

/// Published after every committed transition
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransitionEvent {
    pub equipment_id: Uuid,
    pub kind: TransitionKind,
    pub from: EquipmentStatus,
    pub to: EquipmentStatus,
    pub at: DateTime<Utc>,
}

/// Equipment and loan ledger state after a loan-side transition
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanTransition {
    pub equipment: EquipmentRecord,
    pub loan: LoanRecord,
    /// Reservation closed by a fulfillment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<LoanRecord>,
}

/// Equipment and maintenance ledger state after a maintenance transition
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceTransition {
    pub equipment: EquipmentRecord,
    pub maintenance: MaintenanceRecord,
}

/// Result of an administrative override to `unavailable`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverrideTransition {
    pub equipment: EquipmentRecord,
    /// Loan or reservation closed by the override
    pub closed_loan: Option<LoanRecord>,
    /// Maintenance record closed by the override
    pub closed_maintenance: Option<MaintenanceRecord>,
}

/// Approved request with the loan or reservation it opened
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApprovedRequest {
    pub request: LoanRequest,
    pub equipment: EquipmentRecord,
    pub loan: LoanRecord,
}

//! Shared domain enums
//!
//! Every enum is stored as a lowercase snake_case string. Parsing is strict:
//! unknown strings are rejected rather than mapped to a fallback value.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// EquipmentStatus
// ---------------------------------------------------------------------------

/// Current status of an equipment unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    Loaned,
    Reserved,
    Unavailable,
    InMaintenance,
}

impl EquipmentStatus {
    pub const ALL: [EquipmentStatus; 5] = [
        EquipmentStatus::Available,
        EquipmentStatus::Loaned,
        EquipmentStatus::Reserved,
        EquipmentStatus::Unavailable,
        EquipmentStatus::InMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Available => "available",
            EquipmentStatus::Loaned => "loaned",
            EquipmentStatus::Reserved => "reserved",
            EquipmentStatus::Unavailable => "unavailable",
            EquipmentStatus::InMaintenance => "in_maintenance",
        }
    }

    /// Statuses reachable from `self` through a regular (non-administrative) transition.
    ///
    /// - `available`      -> `loaned`, `reserved`, `in_maintenance`
    /// - `loaned`         -> `available` (return)
    /// - `reserved`       -> `loaned` (fulfillment), `available` (cancellation)
    /// - `in_maintenance` -> `available` (maintenance close)
    /// - `unavailable`    -> nothing; only an administrative restore leaves it
    pub fn valid_transitions(&self) -> &'static [EquipmentStatus] {
        use EquipmentStatus::*;
        match self {
            Available => &[Loaned, Reserved, InMaintenance],
            Loaned => &[Available],
            Reserved => &[Loaned, Available],
            InMaintenance => &[Available],
            Unavailable => &[],
        }
    }

    pub fn can_transition_to(&self, next: EquipmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Administrative moves outside the regular table: any other status to
    /// `unavailable`, and `unavailable` back to `available`
    pub fn can_override_to(&self, next: EquipmentStatus) -> bool {
        use EquipmentStatus::*;
        match (self, next) {
            (Unavailable, Available) => true,
            (Unavailable, _) => false,
            (_, Unavailable) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EquipmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EquipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown equipment status '{}'", s)))
    }
}

// ---------------------------------------------------------------------------
// LoanKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanKind {
    Loan,
    Reservation,
}

impl LoanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanKind::Loan => "loan",
            LoanKind::Reservation => "reservation",
        }
    }
}

impl std::fmt::Display for LoanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loan" => Ok(LoanKind::Loan),
            "reservation" => Ok(LoanKind::Reservation),
            _ => Err(AppError::Validation(format!("Unknown loan kind '{}'", s))),
        }
    }
}

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Returned,
    Cancelled,
    /// Reservation that was turned into a loan
    Fulfilled,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
            LoanStatus::Cancelled => "cancelled",
            LoanStatus::Fulfilled => "fulfilled",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "returned" => Ok(LoanStatus::Returned),
            "cancelled" => Ok(LoanStatus::Cancelled),
            "fulfilled" => Ok(LoanStatus::Fulfilled),
            _ => Err(AppError::Validation(format!("Unknown loan status '{}'", s))),
        }
    }
}

// ---------------------------------------------------------------------------
// MaintenanceType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceType {
    Preventive,
    Corrective,
}

impl MaintenanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceType::Preventive => "preventive",
            MaintenanceType::Corrective => "corrective",
        }
    }
}

impl std::fmt::Display for MaintenanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaintenanceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preventive" => Ok(MaintenanceType::Preventive),
            "corrective" => Ok(MaintenanceType::Corrective),
            _ => Err(AppError::Validation(format!("Unknown maintenance type '{}'", s))),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role carried in the bearer token and recorded in the user directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(AppError::Validation(format!("Unknown role '{}'", s))),
        }
    }
}

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

/// Administrator decision on a loan or reservation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(AppError::Validation(format!("Unknown request status '{}'", s))),
        }
    }
}

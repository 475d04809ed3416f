//! Repository layer: the backing store contract and its implementations
//!
//! Three traits split the store by concern:
//! - [`TransitionStore`] opens a [`StoreTransaction`], the only way to change an
//!   equipment status. Dropping a transaction without committing it discards
//!   every staged write.
//! - [`InventoryStore`] covers categories and the non-status equipment fields.
//! - [`ReportStore`] is the read path used by the reporting facade.
//!
//! [`RequestStore`] records pending loan requests, whose approval runs through
//! a [`StoreTransaction`]. [`UserStore`] is the user directory.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        category::{Category, CreateCategory, UpdateCategory},
        enums::{EquipmentStatus, Role},
        equipment::{CreateEquipment, EquipmentFilter, EquipmentRecord, UpdateEquipment},
        loan::{CloseLoan, LoanFilter, LoanRecord, NewLoan},
        maintenance::{MaintenanceFilter, MaintenanceRecord, NewMaintenance},
        request::{LoanRequest, NewLoanRequest, RequestDecision, RequestFilter},
        user::{AdminUpdateProfile, ProfileFilter, UpdateProfile, UserProfile},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Entry point for status-changing work
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransitionStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>>;
}

/// One atomic unit of work spanning equipment status and both ledgers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreTransaction: Send {
    /// Equipment as seen by this transaction, `NotFound` if absent
    async fn equipment(&mut self, id: Uuid) -> AppResult<EquipmentRecord>;

    /// Set `next` only if the status is still `expected` at write time.
    /// Fails with `Conflict` carrying the status actually found.
    async fn compare_and_swap_status(
        &mut self,
        id: Uuid,
        expected: EquipmentStatus,
        next: EquipmentStatus,
    ) -> AppResult<EquipmentRecord>;

    async fn loan(&mut self, id: Uuid) -> AppResult<LoanRecord>;

    async fn active_loan(&mut self, equipment_id: Uuid) -> AppResult<Option<LoanRecord>>;

    /// `Rejected` when the equipment already has an active loan or reservation,
    /// or an open maintenance record
    async fn open_loan(&mut self, loan: NewLoan) -> AppResult<LoanRecord>;

    /// `NotFound` or `AlreadyClosed` when there is no active record to close
    async fn close_loan(&mut self, id: Uuid, close: CloseLoan) -> AppResult<LoanRecord>;

    async fn maintenance(&mut self, id: Uuid) -> AppResult<MaintenanceRecord>;

    async fn open_maintenance_for(
        &mut self,
        equipment_id: Uuid,
    ) -> AppResult<Option<MaintenanceRecord>>;

    /// `Rejected` when the equipment already has an open maintenance record,
    /// or an active loan or reservation
    async fn open_maintenance(&mut self, record: NewMaintenance) -> AppResult<MaintenanceRecord>;

    async fn close_maintenance(
        &mut self,
        id: Uuid,
        closed_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> AppResult<MaintenanceRecord>;

    async fn loan_request(&mut self, id: Uuid) -> AppResult<LoanRequest>;

    /// Record the decision only while the request is still pending,
    /// `AlreadyClosed` once it was decided
    async fn settle_request(
        &mut self,
        id: Uuid,
        decision: RequestDecision,
    ) -> AppResult<LoanRequest>;

    /// Apply every staged write, or none of them
    async fn commit(&mut self) -> AppResult<()>;
}

/// Categories and equipment details
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> AppResult<Category>;
    /// `Rejected` on a duplicate name
    async fn create_category(&self, data: &CreateCategory) -> AppResult<Category>;
    async fn update_category(&self, id: Uuid, data: &UpdateCategory) -> AppResult<Category>;
    /// `Rejected` while equipment still references the category
    async fn delete_category(&self, id: Uuid) -> AppResult<()>;

    /// New equipment is always `available`; `NotFound` if the category is missing
    async fn create_equipment(&self, data: &CreateEquipment) -> AppResult<EquipmentRecord>;
    async fn get_equipment(&self, id: Uuid) -> AppResult<EquipmentRecord>;
    async fn list_equipment(&self, filter: &EquipmentFilter) -> AppResult<Vec<EquipmentRecord>>;
    async fn update_equipment(&self, id: Uuid, data: &UpdateEquipment)
        -> AppResult<EquipmentRecord>;
    /// Whether any ledger entry references the equipment
    async fn equipment_has_history(&self, id: Uuid) -> AppResult<bool>;
    /// Hard delete; `Rejected` once a ledger entry references the equipment
    async fn delete_equipment(&self, id: Uuid) -> AppResult<()>;
}

/// Read-only queries for dashboards and reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn ping(&self) -> AppResult<()>;
    async fn count_equipment_by_status(&self) -> AppResult<Vec<(EquipmentStatus, i64)>>;
    async fn get_loan(&self, id: Uuid) -> AppResult<LoanRecord>;
    async fn get_maintenance(&self, id: Uuid) -> AppResult<MaintenanceRecord>;
    /// Newest `requested_at` first
    async fn query_loans(&self, filter: &LoanFilter) -> AppResult<Vec<LoanRecord>>;
    /// Newest `opened_at` first
    async fn query_maintenance(&self, filter: &MaintenanceFilter)
        -> AppResult<Vec<MaintenanceRecord>>;
}

/// Loan and reservation requests
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// `NotFound` for unknown equipment, `Rejected` when the user already has
    /// a pending request for the same equipment
    async fn submit_request(&self, request: NewLoanRequest) -> AppResult<LoanRequest>;
    async fn get_request(&self, id: Uuid) -> AppResult<LoanRequest>;
    /// Newest first
    async fn list_requests(&self, filter: &RequestFilter) -> AppResult<Vec<LoanRequest>>;
}

/// User directory keyed by the token subject
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create with `role` on first save, otherwise update name and email.
    /// `Rejected` when another profile uses the email.
    async fn save_profile(
        &self,
        id: Uuid,
        data: &UpdateProfile,
        role: Role,
    ) -> AppResult<UserProfile>;
    async fn get_profile(&self, id: Uuid) -> AppResult<UserProfile>;
    /// Ordered by name
    async fn list_profiles(&self, filter: &ProfileFilter) -> AppResult<Vec<UserProfile>>;
    async fn update_profile(&self, id: Uuid, data: &AdminUpdateProfile)
        -> AppResult<UserProfile>;
    /// `Rejected` while the user holds an active loan or reservation, or a
    /// pending request
    async fn delete_profile(&self, id: Uuid) -> AppResult<()>;
}

/// Every store backend implements all five concerns
pub trait Store:
    TransitionStore + InventoryStore + ReportStore + RequestStore + UserStore + 'static
{
}

impl<T> Store for T where
    T: TransitionStore + InventoryStore + ReportStore + RequestStore + UserStore + 'static
{
}

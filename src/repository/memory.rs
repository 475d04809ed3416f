//! In-memory store
//!
//! Transactions are optimistic. Writes are staged on the transaction and
//! overlay the committed state for its own reads; `commit` takes the write
//! lock, re-checks every compare-and-swap expectation and ledger uniqueness
//! against the committed state, then applies everything at once. A dropped
//! transaction leaves no trace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    InventoryStore, ReportStore, RequestStore, StoreTransaction, TransitionStore, UserStore,
};
use crate::{
    error::{AppError, AppResult},
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

#[derive(Default)]
struct MemoryState {
    categories: HashMap<Uuid, Category>,
    equipment: HashMap<Uuid, EquipmentRecord>,
    loans: HashMap<Uuid, LoanRecord>,
    maintenance: HashMap<Uuid, MaintenanceRecord>,
    requests: HashMap<Uuid, LoanRequest>,
    profiles: HashMap<Uuid, UserProfile>,
}

impl MemoryState {
    fn has_history(&self, equipment_id: Uuid) -> bool {
        self.loans.values().any(|l| l.equipment_id == equipment_id)
            || self.maintenance.values().any(|m| m.equipment_id == equipment_id)
            || self.requests.values().any(|r| r.equipment_id == equipment_id)
    }

    fn email_taken(&self, email: &str, except: Uuid) -> bool {
        self.profiles
            .values()
            .any(|p| p.id != except && p.email.eq_ignore_ascii_case(email))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn equipment_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Equipment {} not found", id))
}

fn loan_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Loan {} not found", id))
}

fn maintenance_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Maintenance record {} not found", id))
}

fn request_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Request {} not found", id))
}

fn profile_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

fn email_taken(email: &str) -> AppError {
    AppError::rejected(format!("Email '{}' is already registered", email), None)
}

pub struct MemoryTransaction {
    state: Arc<RwLock<MemoryState>>,
    /// Committed status each swapped equipment must still have at commit time
    expected: HashMap<Uuid, EquipmentStatus>,
    equipment: HashMap<Uuid, EquipmentRecord>,
    loans: HashMap<Uuid, LoanRecord>,
    maintenance: HashMap<Uuid, MaintenanceRecord>,
    requests: HashMap<Uuid, LoanRequest>,
    committed: bool,
}

impl MemoryTransaction {
    fn ensure_open(&self) -> AppResult<()> {
        if self.committed {
            return Err(AppError::Internal("Transaction already committed".to_string()));
        }
        Ok(())
    }

    /// Loans of one equipment, staged versions shadowing committed ones
    async fn loans_of(&self, equipment_id: Uuid) -> Vec<LoanRecord> {
        let state = self.state.read().await;
        let mut merged: HashMap<Uuid, LoanRecord> = state
            .loans
            .values()
            .filter(|l| l.equipment_id == equipment_id)
            .map(|l| (l.id, l.clone()))
            .collect();
        for loan in self.loans.values().filter(|l| l.equipment_id == equipment_id) {
            merged.insert(loan.id, loan.clone());
        }
        merged.into_values().collect()
    }

    async fn maintenance_of(&self, equipment_id: Uuid) -> Vec<MaintenanceRecord> {
        let state = self.state.read().await;
        let mut merged: HashMap<Uuid, MaintenanceRecord> = state
            .maintenance
            .values()
            .filter(|m| m.equipment_id == equipment_id)
            .map(|m| (m.id, m.clone()))
            .collect();
        for record in self
            .maintenance
            .values()
            .filter(|m| m.equipment_id == equipment_id)
        {
            merged.insert(record.id, record.clone());
        }
        merged.into_values().collect()
    }

    /// Checks run under the write lock right before staged writes are applied
    fn validate(&self, state: &MemoryState) -> AppResult<()> {
        for (id, expected) in &self.expected {
            let current = state.equipment.get(id).ok_or_else(|| equipment_not_found(*id))?;
            if current.status != *expected {
                return Err(AppError::conflict(
                    format!(
                        "Equipment {} changed to {} concurrently (expected {})",
                        id, current.status, expected
                    ),
                    Some(current.status),
                ));
            }
        }

        for loan in self.loans.values() {
            match state.loans.get(&loan.id) {
                // Existing rows are only staged by a close
                Some(committed) if !committed.is_active() => {
                    return Err(AppError::conflict(
                        format!("Loan {} was closed concurrently", loan.id),
                        None,
                    ));
                }
                Some(_) => {}
                None if loan.is_active() => {
                    let duplicate = state.loans.values().any(|other| {
                        other.equipment_id == loan.equipment_id
                            && other.is_active()
                            && self
                                .loans
                                .get(&other.id)
                                .map_or(true, |staged| staged.is_active())
                    });
                    if duplicate {
                        return Err(AppError::rejected(
                            format!(
                                "Equipment {} already has an active loan or reservation",
                                loan.equipment_id
                            ),
                            None,
                        ));
                    }
                }
                None => {}
            }
        }

        for record in self.maintenance.values() {
            match state.maintenance.get(&record.id) {
                Some(committed) if !committed.is_open() => {
                    return Err(AppError::conflict(
                        format!("Maintenance record {} was closed concurrently", record.id),
                        None,
                    ));
                }
                Some(_) => {}
                None if record.is_open() => {
                    let duplicate = state.maintenance.values().any(|other| {
                        other.equipment_id == record.equipment_id
                            && other.is_open()
                            && self
                                .maintenance
                                .get(&other.id)
                                .map_or(true, |staged| staged.is_open())
                    });
                    if duplicate {
                        return Err(AppError::rejected(
                            format!(
                                "Equipment {} already has open maintenance",
                                record.equipment_id
                            ),
                            None,
                        ));
                    }
                }
                None => {}
            }
        }

        for request in self.requests.values() {
            match state.requests.get(&request.id) {
                Some(committed) if !committed.is_pending() => {
                    return Err(AppError::conflict(
                        format!("Request {} was decided concurrently", request.id),
                        None,
                    ));
                }
                Some(_) => {}
                None => return Err(request_not_found(request.id)),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl TransitionStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            state: self.state.clone(),
            expected: HashMap::new(),
            equipment: HashMap::new(),
            loans: HashMap::new(),
            maintenance: HashMap::new(),
            requests: HashMap::new(),
            committed: false,
        }))
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn equipment(&mut self, id: Uuid) -> AppResult<EquipmentRecord> {
        self.ensure_open()?;
        if let Some(staged) = self.equipment.get(&id) {
            return Ok(staged.clone());
        }
        let state = self.state.read().await;
        state
            .equipment
            .get(&id)
            .cloned()
            .ok_or_else(|| equipment_not_found(id))
    }

    async fn compare_and_swap_status(
        &mut self,
        id: Uuid,
        expected: EquipmentStatus,
        next: EquipmentStatus,
    ) -> AppResult<EquipmentRecord> {
        let mut record = self.equipment(id).await?;
        if record.status != expected {
            return Err(AppError::conflict(
                format!("Equipment {} is {}, expected {}", id, record.status, expected),
                Some(record.status),
            ));
        }
        if !self.expected.contains_key(&id) {
            // Fail early if another transaction already committed a change
            let committed = {
                let state = self.state.read().await;
                state.equipment.get(&id).map(|e| e.status)
            };
            match committed {
                Some(status) if status != expected => {
                    return Err(AppError::conflict(
                        format!("Equipment {} is {}, expected {}", id, status, expected),
                        Some(status),
                    ));
                }
                Some(_) => {}
                None => return Err(equipment_not_found(id)),
            }
            self.expected.insert(id, expected);
        }
        record.status = next;
        record.updated_at = Utc::now();
        self.equipment.insert(id, record.clone());
        Ok(record)
    }

    async fn loan(&mut self, id: Uuid) -> AppResult<LoanRecord> {
        self.ensure_open()?;
        if let Some(staged) = self.loans.get(&id) {
            return Ok(staged.clone());
        }
        let state = self.state.read().await;
        state.loans.get(&id).cloned().ok_or_else(|| loan_not_found(id))
    }

    async fn active_loan(&mut self, equipment_id: Uuid) -> AppResult<Option<LoanRecord>> {
        self.ensure_open()?;
        Ok(self
            .loans_of(equipment_id)
            .await
            .into_iter()
            .find(LoanRecord::is_active))
    }

    async fn open_loan(&mut self, loan: NewLoan) -> AppResult<LoanRecord> {
        self.equipment(loan.equipment_id).await?;
        if self.active_loan(loan.equipment_id).await?.is_some() {
            return Err(AppError::rejected(
                format!(
                    "Equipment {} already has an active loan or reservation",
                    loan.equipment_id
                ),
                None,
            ));
        }
        if self.open_maintenance_for(loan.equipment_id).await?.is_some() {
            return Err(AppError::rejected(
                format!("Equipment {} is under maintenance", loan.equipment_id),
                None,
            ));
        }
        let record = loan.into_record(Uuid::new_v4(), Utc::now());
        self.loans.insert(record.id, record.clone());
        Ok(record)
    }

    async fn close_loan(&mut self, id: Uuid, close: CloseLoan) -> AppResult<LoanRecord> {
        let mut record = self.loan(id).await?;
        if !record.is_active() {
            return Err(AppError::AlreadyClosed(format!(
                "Loan {} is already {}",
                id, record.status
            )));
        }
        record.status = close.status;
        record.returned_at = Some(close.closed_at);
        if close.notes.is_some() {
            record.notes = close.notes;
        }
        self.loans.insert(id, record.clone());
        Ok(record)
    }

    async fn maintenance(&mut self, id: Uuid) -> AppResult<MaintenanceRecord> {
        self.ensure_open()?;
        if let Some(staged) = self.maintenance.get(&id) {
            return Ok(staged.clone());
        }
        let state = self.state.read().await;
        state
            .maintenance
            .get(&id)
            .cloned()
            .ok_or_else(|| maintenance_not_found(id))
    }

    async fn open_maintenance_for(
        &mut self,
        equipment_id: Uuid,
    ) -> AppResult<Option<MaintenanceRecord>> {
        self.ensure_open()?;
        Ok(self
            .maintenance_of(equipment_id)
            .await
            .into_iter()
            .find(MaintenanceRecord::is_open))
    }

    async fn open_maintenance(&mut self, record: NewMaintenance) -> AppResult<MaintenanceRecord> {
        self.equipment(record.equipment_id).await?;
        if self.open_maintenance_for(record.equipment_id).await?.is_some() {
            return Err(AppError::rejected(
                format!("Equipment {} already has open maintenance", record.equipment_id),
                None,
            ));
        }
        if self.active_loan(record.equipment_id).await?.is_some() {
            return Err(AppError::rejected(
                format!(
                    "Equipment {} has an active loan or reservation",
                    record.equipment_id
                ),
                None,
            ));
        }
        let record = record.into_record(Uuid::new_v4(), Utc::now());
        self.maintenance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn close_maintenance(
        &mut self,
        id: Uuid,
        closed_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> AppResult<MaintenanceRecord> {
        let mut record = self.maintenance(id).await?;
        if !record.is_open() {
            return Err(AppError::AlreadyClosed(format!(
                "Maintenance record {} is already closed",
                id
            )));
        }
        record.closed_at = Some(closed_at);
        if notes.is_some() {
            record.notes = notes;
        }
        self.maintenance.insert(id, record.clone());
        Ok(record)
    }

    async fn loan_request(&mut self, id: Uuid) -> AppResult<LoanRequest> {
        self.ensure_open()?;
        if let Some(staged) = self.requests.get(&id) {
            return Ok(staged.clone());
        }
        let state = self.state.read().await;
        state
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| request_not_found(id))
    }

    async fn settle_request(
        &mut self,
        id: Uuid,
        decision: RequestDecision,
    ) -> AppResult<LoanRequest> {
        let mut request = self.loan_request(id).await?;
        if !request.is_pending() {
            return Err(AppError::AlreadyClosed(format!(
                "Request {} is already {}",
                id, request.status
            )));
        }
        request.status = decision.status;
        request.decided_by = Some(decision.decided_by);
        request.decided_at = Some(decision.decided_at);
        request.loan_id = decision.loan_id;
        request.notes = decision.notes;
        self.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn commit(&mut self) -> AppResult<()> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        self.validate(&state)?;

        for (id, record) in self.equipment.drain() {
            state.equipment.insert(id, record);
        }
        for (id, record) in self.loans.drain() {
            state.loans.insert(id, record);
        }
        for (id, record) in self.maintenance.drain() {
            state.maintenance.insert(id, record);
        }
        for (id, request) in self.requests.drain() {
            state.requests.insert(id, request);
        }
        self.committed = true;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        let state = self.state.read().await;
        state
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    async fn create_category(&self, data: &CreateCategory) -> AppResult<Category> {
        let mut state = self.state.write().await;
        if state.categories.values().any(|c| c.name == data.name) {
            return Err(AppError::rejected(
                format!("Category '{}' already exists", data.name),
                None,
            ));
        }
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            description: data.description.clone(),
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, data: &UpdateCategory) -> AppResult<Category> {
        let mut state = self.state.write().await;
        if let Some(name) = &data.name {
            if state
                .categories
                .values()
                .any(|c| c.id != id && &c.name == name)
            {
                return Err(AppError::rejected(
                    format!("Category '{}' already exists", name),
                    None,
                ));
            }
        }
        let category = state
            .categories
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;
        if let Some(name) = &data.name {
            category.name = name.clone();
        }
        if let Some(description) = &data.description {
            category.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&id) {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }
        let in_use = state.equipment.values().filter(|e| e.category_id == id).count();
        if in_use > 0 {
            return Err(AppError::rejected(
                format!("Category {} is used by {} equipment records", id, in_use),
                None,
            ));
        }
        state.categories.remove(&id);
        Ok(())
    }

    async fn create_equipment(&self, data: &CreateEquipment) -> AppResult<EquipmentRecord> {
        let mut state = self.state.write().await;
        if !state.categories.contains_key(&data.category_id) {
            return Err(AppError::NotFound(format!(
                "Category {} not found",
                data.category_id
            )));
        }
        let now = Utc::now();
        let record = EquipmentRecord {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            category_id: data.category_id,
            description: data.description.clone(),
            status: EquipmentStatus::Available,
            created_at: now,
            updated_at: now,
        };
        state.equipment.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_equipment(&self, id: Uuid) -> AppResult<EquipmentRecord> {
        let state = self.state.read().await;
        state
            .equipment
            .get(&id)
            .cloned()
            .ok_or_else(|| equipment_not_found(id))
    }

    async fn list_equipment(&self, filter: &EquipmentFilter) -> AppResult<Vec<EquipmentRecord>> {
        let state = self.state.read().await;
        let mut rows: Vec<EquipmentRecord> = state
            .equipment
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_equipment(
        &self,
        id: Uuid,
        data: &UpdateEquipment,
    ) -> AppResult<EquipmentRecord> {
        let mut state = self.state.write().await;
        if let Some(category_id) = data.category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(AppError::NotFound(format!("Category {} not found", category_id)));
            }
        }
        let record = state
            .equipment
            .get_mut(&id)
            .ok_or_else(|| equipment_not_found(id))?;
        if let Some(name) = &data.name {
            record.name = name.clone();
        }
        if let Some(category_id) = data.category_id {
            record.category_id = category_id;
        }
        if let Some(description) = &data.description {
            record.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn equipment_has_history(&self, id: Uuid) -> AppResult<bool> {
        let state = self.state.read().await;
        if !state.equipment.contains_key(&id) {
            return Err(equipment_not_found(id));
        }
        Ok(state.has_history(id))
    }

    async fn delete_equipment(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.equipment.contains_key(&id) {
            return Err(equipment_not_found(id));
        }
        if state.has_history(id) {
            return Err(AppError::rejected(
                format!("Equipment {} is referenced by ledger entries", id),
                None,
            ));
        }
        state.equipment.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn count_equipment_by_status(&self) -> AppResult<Vec<(EquipmentStatus, i64)>> {
        let state = self.state.read().await;
        let mut counts: HashMap<EquipmentStatus, i64> = HashMap::new();
        for record in state.equipment.values() {
            *counts.entry(record.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn get_loan(&self, id: Uuid) -> AppResult<LoanRecord> {
        let state = self.state.read().await;
        state.loans.get(&id).cloned().ok_or_else(|| loan_not_found(id))
    }

    async fn get_maintenance(&self, id: Uuid) -> AppResult<MaintenanceRecord> {
        let state = self.state.read().await;
        state
            .maintenance
            .get(&id)
            .cloned()
            .ok_or_else(|| maintenance_not_found(id))
    }

    async fn query_loans(&self, filter: &LoanFilter) -> AppResult<Vec<LoanRecord>> {
        let state = self.state.read().await;
        let mut rows: Vec<LoanRecord> = state
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rows)
    }

    async fn query_maintenance(
        &self,
        filter: &MaintenanceFilter,
    ) -> AppResult<Vec<MaintenanceRecord>> {
        let state = self.state.read().await;
        let mut rows: Vec<MaintenanceRecord> = state
            .maintenance
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        Ok(rows)
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn submit_request(&self, request: NewLoanRequest) -> AppResult<LoanRequest> {
        let mut state = self.state.write().await;
        if !state.equipment.contains_key(&request.equipment_id) {
            return Err(equipment_not_found(request.equipment_id));
        }
        let duplicate = state.requests.values().any(|r| {
            r.is_pending() && r.equipment_id == request.equipment_id && r.user_id == request.user_id
        });
        if duplicate {
            return Err(AppError::rejected(
                format!(
                    "A request for equipment {} is already pending",
                    request.equipment_id
                ),
                None,
            ));
        }
        let record = request.into_record(Uuid::new_v4(), Utc::now());
        state.requests.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_request(&self, id: Uuid) -> AppResult<LoanRequest> {
        let state = self.state.read().await;
        state
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| request_not_found(id))
    }

    async fn list_requests(&self, filter: &RequestFilter) -> AppResult<Vec<LoanRequest>> {
        let state = self.state.read().await;
        let mut rows: Vec<LoanRequest> = state
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rows)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn save_profile(
        &self,
        id: Uuid,
        data: &UpdateProfile,
        role: Role,
    ) -> AppResult<UserProfile> {
        let mut state = self.state.write().await;
        if state.email_taken(&data.email, id) {
            return Err(email_taken(&data.email));
        }
        let now = Utc::now();
        let profile = state.profiles.entry(id).or_insert_with(|| UserProfile {
            id,
            name: data.name.clone(),
            email: data.email.clone(),
            role,
            created_at: now,
            updated_at: now,
        });
        profile.name = data.name.clone();
        profile.email = data.email.clone();
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn get_profile(&self, id: Uuid) -> AppResult<UserProfile> {
        let state = self.state.read().await;
        state
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| profile_not_found(id))
    }

    async fn list_profiles(&self, filter: &ProfileFilter) -> AppResult<Vec<UserProfile>> {
        let state = self.state.read().await;
        let mut rows: Vec<UserProfile> = state
            .profiles
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        data: &AdminUpdateProfile,
    ) -> AppResult<UserProfile> {
        let mut state = self.state.write().await;
        if let Some(email) = &data.email {
            if state.email_taken(email, id) {
                return Err(email_taken(email));
            }
        }
        let profile = state
            .profiles
            .get_mut(&id)
            .ok_or_else(|| profile_not_found(id))?;
        if let Some(name) = &data.name {
            profile.name = name.clone();
        }
        if let Some(email) = &data.email {
            profile.email = email.clone();
        }
        if let Some(role) = data.role {
            profile.role = role;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn delete_profile(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        if !state.profiles.contains_key(&id) {
            return Err(profile_not_found(id));
        }
        let busy = state.loans.values().any(|l| l.user_id == id && l.is_active())
            || state.requests.values().any(|r| r.user_id == id && r.is_pending());
        if busy {
            return Err(AppError::rejected(
                format!("User {} has an active loan or a pending request", id),
                None,
            ));
        }
        state.profiles.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{LoanKind, LoanStatus, MaintenanceType};

    async fn seeded() -> (MemoryStore, EquipmentRecord) {
        let store = MemoryStore::new();
        let category = store
            .create_category(&CreateCategory {
                name: "Laptops".into(),
                description: None,
            })
            .await
            .unwrap();
        let equipment = store
            .create_equipment(&CreateEquipment {
                name: "ThinkPad".into(),
                category_id: category.id,
                description: None,
            })
            .await
            .unwrap();
        (store, equipment)
    }

    fn new_loan(equipment_id: Uuid) -> NewLoan {
        NewLoan {
            equipment_id,
            user_id: Uuid::new_v4(),
            kind: LoanKind::Loan,
            scheduled_at: None,
            reservation_id: None,
        }
    }

    #[tokio::test]
    async fn test_cas_fails_with_found_status() {
        let (store, equipment) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let err = tx
            .compare_and_swap_status(
                equipment.id,
                EquipmentStatus::Loaned,
                EquipmentStatus::Available,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(err.current_status(), Some(EquipmentStatus::Available));
    }

    #[tokio::test]
    async fn test_dropped_transaction_leaves_no_trace() {
        let (store, equipment) = seeded().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.compare_and_swap_status(
                equipment.id,
                EquipmentStatus::Available,
                EquipmentStatus::Loaned,
            )
            .await
            .unwrap();
            tx.open_loan(new_loan(equipment.id)).await.unwrap();
        }
        let current = store.get_equipment(equipment.id).await.unwrap();
        assert_eq!(current.status, EquipmentStatus::Available);
        assert!(store
            .query_loans(&LoanFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_staged_writes_visible_inside_transaction() {
        let (store, equipment) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        tx.compare_and_swap_status(
            equipment.id,
            EquipmentStatus::Available,
            EquipmentStatus::Loaned,
        )
        .await
        .unwrap();
        let loan = tx.open_loan(new_loan(equipment.id)).await.unwrap();
        assert_eq!(tx.equipment(equipment.id).await.unwrap().status, EquipmentStatus::Loaned);
        assert_eq!(tx.active_loan(equipment.id).await.unwrap().unwrap().id, loan.id);
        // Not yet visible outside
        assert_eq!(
            store.get_equipment(equipment.id).await.unwrap().status,
            EquipmentStatus::Available
        );
        tx.commit().await.unwrap();
        assert_eq!(
            store.get_equipment(equipment.id).await.unwrap().status,
            EquipmentStatus::Loaned
        );
    }

    #[tokio::test]
    async fn test_second_active_loan_rejected() {
        let (store, equipment) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        tx.open_loan(new_loan(equipment.id)).await.unwrap();
        let err = tx.open_loan(new_loan(equipment.id)).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_commit_detects_concurrent_swap() {
        let (store, equipment) = seeded().await;
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first
            .compare_and_swap_status(
                equipment.id,
                EquipmentStatus::Available,
                EquipmentStatus::Loaned,
            )
            .await
            .unwrap();
        second
            .compare_and_swap_status(
                equipment.id,
                EquipmentStatus::Available,
                EquipmentStatus::InMaintenance,
            )
            .await
            .unwrap();
        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(err.current_status(), Some(EquipmentStatus::Loaned));
    }

    #[tokio::test]
    async fn test_close_twice_reports_already_closed() {
        let (store, equipment) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let loan = tx.open_loan(new_loan(equipment.id)).await.unwrap();
        tx.commit().await.unwrap();

        let close = CloseLoan {
            status: LoanStatus::Returned,
            closed_at: Utc::now(),
            notes: None,
        };
        let mut tx = store.begin().await.unwrap();
        tx.close_loan(loan.id, close.clone()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.close_loan(loan.id, close).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyClosed(_)));
    }

    #[tokio::test]
    async fn test_maintenance_and_loan_are_exclusive() {
        let (store, equipment) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        tx.open_maintenance(NewMaintenance {
            equipment_id: equipment.id,
            technician_id: Uuid::new_v4(),
            maintenance_type: MaintenanceType::Corrective,
        })
        .await
        .unwrap();
        let err = tx.open_loan(new_loan(equipment.id)).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_category_in_use_cannot_be_deleted() {
        let (store, equipment) = seeded().await;
        let err = store.delete_category(equipment.category_id).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_referenced_equipment_cannot_be_hard_deleted() {
        let (store, equipment) = seeded().await;
        assert!(!store.equipment_has_history(equipment.id).await.unwrap());

        let mut tx = store.begin().await.unwrap();
        tx.open_loan(new_loan(equipment.id)).await.unwrap();
        tx.commit().await.unwrap();

        assert!(store.equipment_has_history(equipment.id).await.unwrap());
        let err = store.delete_equipment(equipment.id).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));
    }

    fn new_request(equipment_id: Uuid, user_id: Uuid) -> NewLoanRequest {
        NewLoanRequest {
            equipment_id,
            user_id,
            kind: LoanKind::Loan,
            scheduled_at: None,
        }
    }

    fn decision(status: crate::models::enums::RequestStatus) -> RequestDecision {
        RequestDecision {
            status,
            decided_by: Uuid::new_v4(),
            decided_at: Utc::now(),
            loan_id: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_one_pending_request_per_user_and_equipment() {
        let (store, equipment) = seeded().await;
        let user = Uuid::new_v4();
        store
            .submit_request(new_request(equipment.id, user))
            .await
            .unwrap();
        let err = store
            .submit_request(new_request(equipment.id, user))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));

        // Another user may queue for the same unit
        store
            .submit_request(new_request(equipment.id, Uuid::new_v4()))
            .await
            .unwrap();
        assert!(matches!(
            store.submit_request(new_request(Uuid::new_v4(), user)).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_request_decided_once() {
        use crate::models::enums::RequestStatus;

        let (store, equipment) = seeded().await;
        let request = store
            .submit_request(new_request(equipment.id, Uuid::new_v4()))
            .await
            .unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first
            .settle_request(request.id, decision(RequestStatus::Rejected))
            .await
            .unwrap();
        second
            .settle_request(request.id, decision(RequestStatus::Approved))
            .await
            .unwrap();
        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .settle_request(request.id, decision(RequestStatus::Approved))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyClosed(_)));
        assert_eq!(
            store.get_request(request.id).await.unwrap().status,
            RequestStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_profile_email_unique_case_insensitive() {
        let store = MemoryStore::new();
        let first = Uuid::new_v4();
        store
            .save_profile(
                first,
                &UpdateProfile {
                    name: "Ana".into(),
                    email: "ana@school.edu".into(),
                },
                Role::User,
            )
            .await
            .unwrap();
        let err = store
            .save_profile(
                Uuid::new_v4(),
                &UpdateProfile {
                    name: "Other".into(),
                    email: "ANA@school.edu".into(),
                },
                Role::User,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));

        // Saving again keeps the original role and creation time
        let again = store
            .save_profile(
                first,
                &UpdateProfile {
                    name: "Ana Torres".into(),
                    email: "ana@school.edu".into(),
                },
                Role::Admin,
            )
            .await
            .unwrap();
        assert_eq!(again.role, Role::User);
        assert_eq!(again.name, "Ana Torres");
    }

    #[tokio::test]
    async fn test_profile_with_active_loan_cannot_be_deleted() {
        let (store, equipment) = seeded().await;
        let user = Uuid::new_v4();
        store
            .save_profile(
                user,
                &UpdateProfile {
                    name: "Luis".into(),
                    email: "luis@school.edu".into(),
                },
                Role::User,
            )
            .await
            .unwrap();
        let mut tx = store.begin().await.unwrap();
        let loan = tx
            .open_loan(NewLoan {
                user_id: user,
                ..new_loan(equipment.id)
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let err = store.delete_profile(user).await.unwrap_err();
        assert!(matches!(err, AppError::Rejected { .. }));

        let mut tx = store.begin().await.unwrap();
        tx.close_loan(
            loan.id,
            CloseLoan {
                status: LoanStatus::Returned,
                closed_at: Utc::now(),
                notes: None,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        store.delete_profile(user).await.unwrap();
        assert!(matches!(
            store.get_profile(user).await,
            Err(AppError::NotFound(_))
        ));
    }
}

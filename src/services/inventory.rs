//! Inventory service: categories and equipment details

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::lifecycle::LifecycleManager;
use crate::{
    error::AppResult,
    models::{
        category::{Category, CreateCategory, UpdateCategory},
        enums::EquipmentStatus,
        equipment::{
            CreateEquipment, EquipmentFilter, EquipmentQuery, EquipmentRecord, Removal,
            UpdateEquipment,
        },
    },
    repository::InventoryStore,
};

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Trimmed, with blank kept as the empty string so the store clears the field
fn trimmed_update(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    lifecycle: LifecycleManager,
}

impl InventoryService {
    pub fn new(store: Arc<dyn InventoryStore>, lifecycle: LifecycleManager) -> Self {
        Self { store, lifecycle }
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.store.list_categories().await
    }

    pub async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        self.store.get_category(id).await
    }

    pub async fn create_category(&self, mut data: CreateCategory) -> AppResult<Category> {
        data.name = data.name.trim().to_string();
        data.description = trimmed(data.description);
        data.validate()?;
        self.store.create_category(&data).await
    }

    pub async fn update_category(&self, id: Uuid, mut data: UpdateCategory) -> AppResult<Category> {
        data.name = data.name.map(|n| n.trim().to_string());
        data.description = trimmed_update(data.description);
        data.validate()?;
        self.store.update_category(id, &data).await
    }

    pub async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        self.store.delete_category(id).await?;
        tracing::info!("Category {} deleted", id);
        Ok(())
    }

    /// Register new equipment, always `available`
    pub async fn create_equipment(&self, mut data: CreateEquipment) -> AppResult<EquipmentRecord> {
        data.name = data.name.trim().to_string();
        data.description = trimmed(data.description);
        data.validate()?;
        let equipment = self.store.create_equipment(&data).await?;
        tracing::info!("Equipment {} created ({})", equipment.id, equipment.name);
        Ok(equipment)
    }

    pub async fn get_equipment(&self, id: Uuid) -> AppResult<EquipmentRecord> {
        self.store.get_equipment(id).await
    }

    /// List equipment; unknown status strings are rejected
    pub async fn list_equipment(&self, query: EquipmentQuery) -> AppResult<Vec<EquipmentRecord>> {
        let filter = EquipmentFilter::try_from(query)?;
        self.store.list_equipment(&filter).await
    }

    /// Update name, category or description. Status is never touched here.
    pub async fn update_equipment(
        &self,
        id: Uuid,
        mut data: UpdateEquipment,
    ) -> AppResult<EquipmentRecord> {
        data.name = data.name.map(|n| n.trim().to_string());
        data.description = trimmed_update(data.description);
        data.validate()?;
        self.store.update_equipment(id, &data).await
    }

    /// Hard delete when nothing references the equipment, otherwise retire it
    /// through the administrative override
    pub async fn remove_equipment(&self, id: Uuid) -> AppResult<Removal> {
        if !self.store.equipment_has_history(id).await? {
            self.store.delete_equipment(id).await?;
            tracing::info!("Equipment {} deleted", id);
            return Ok(Removal::deleted());
        }

        let current = self.store.get_equipment(id).await?;
        let equipment = if current.status == EquipmentStatus::Unavailable {
            current
        } else {
            self.lifecycle
                .mark_unavailable(id, Some("Retired from inventory".to_string()))
                .await?
                .equipment
        };
        tracing::info!("Equipment {} retired, history preserved", id);
        Ok(Removal::retired(equipment))
    }
}

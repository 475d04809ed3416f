//! Business logic services

pub mod inventory;
pub mod lifecycle;
pub mod reports;
pub mod requests;
pub mod users;

use std::sync::Arc;

use crate::{config::ReportsConfig, repository::Store};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub lifecycle: lifecycle::LifecycleManager,
    pub inventory: inventory::InventoryService,
    pub reports: reports::ReportingService,
    pub requests: requests::RequestService,
    pub users: users::UserService,
}

impl Services {
    /// Create all services on top of one store backend
    pub fn new<S: Store>(store: Arc<S>, reports_config: ReportsConfig) -> Self {
        let lifecycle = lifecycle::LifecycleManager::new(store.clone());
        Self {
            inventory: inventory::InventoryService::new(store.clone(), lifecycle.clone()),
            requests: requests::RequestService::new(store.clone(), lifecycle.clone()),
            users: users::UserService::new(store.clone()),
            reports: reports::ReportingService::new(store, reports_config),
            lifecycle,
        }
    }
}

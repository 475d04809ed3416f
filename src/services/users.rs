//! User directory service

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{
        AdminUpdateProfile, ProfileFilter, ProfileQuery, UpdateProfile, UserClaims, UserProfile,
    },
    repository::UserStore,
};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn me(&self, claims: &UserClaims) -> AppResult<UserProfile> {
        self.store.get_profile(claims.user_id()).await
    }

    /// Create or update the caller's own profile. A new profile takes the
    /// role from the token; an existing one keeps its directory role.
    pub async fn save_me(&self, claims: &UserClaims, mut data: UpdateProfile) -> AppResult<UserProfile> {
        data.name = data.name.trim().to_string();
        data.email = data.email.trim().to_string();
        data.validate()?;
        self.store
            .save_profile(claims.user_id(), &data, claims.role)
            .await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<UserProfile> {
        self.store.get_profile(id).await
    }

    pub async fn list(&self, query: ProfileQuery) -> AppResult<Vec<UserProfile>> {
        let filter = ProfileFilter::try_from(query)?;
        self.store.list_profiles(&filter).await
    }

    pub async fn update(&self, id: Uuid, mut data: AdminUpdateProfile) -> AppResult<UserProfile> {
        data.name = data.name.map(|n| n.trim().to_string());
        data.email = data.email.map(|e| e.trim().to_string());
        data.validate()?;
        let profile = self.store.update_profile(id, &data).await?;
        if let Some(role) = data.role {
            tracing::info!(user_id = %id, %role, "User role changed");
        }
        Ok(profile)
    }

    /// Remove a profile. Users holding equipment or with a pending request stay.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.store.delete_profile(id).await?;
        tracing::info!("User {} deleted", id);
        Ok(())
    }
}

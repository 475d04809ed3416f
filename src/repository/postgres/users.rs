//! User directory

use async_trait::async_trait;
use uuid::Uuid;

use super::{unique_as_rejected, PgStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Role,
        user::{AdminUpdateProfile, ProfileFilter, ProfileRow, UpdateProfile, UserProfile},
    },
    repository::UserStore,
};

fn profile_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

#[async_trait]
impl UserStore for PgStore {
    async fn save_profile(
        &self,
        id: Uuid,
        data: &UpdateProfile,
        role: Role,
    ) -> AppResult<UserProfile> {
        sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO user_profiles (id, name, email, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, email = EXCLUDED.email, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_as_rejected(e, format!("Email '{}' is already registered", data.email))
        })?
        .try_into()
    }

    async fn get_profile(&self, id: Uuid) -> AppResult<UserProfile> {
        sqlx::query_as::<_, ProfileRow>("SELECT * FROM user_profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| profile_not_found(id))?
            .try_into()
    }

    async fn list_profiles(&self, filter: &ProfileFilter) -> AppResult<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT * FROM user_profiles
            WHERE ($1::text IS NULL OR role = $1)
              AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%')
            ORDER BY name
            "#,
        )
        .bind(filter.role.map(|r| r.as_str()))
        .bind(&filter.search)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }

    async fn update_profile(
        &self,
        id: Uuid,
        data: &AdminUpdateProfile,
    ) -> AppResult<UserProfile> {
        sqlx::query_as::<_, ProfileRow>(
            r#"
            UPDATE user_profiles
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(data.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_as_rejected(e, "Email is already registered"))?
        .ok_or_else(|| profile_not_found(id))?
        .try_into()
    }

    async fn delete_profile(&self, id: Uuid) -> AppResult<()> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM user_profiles p
            WHERE p.id = $1
              AND NOT EXISTS (SELECT 1 FROM loans WHERE user_id = p.id AND status = 'active')
              AND NOT EXISTS (
                  SELECT 1 FROM loan_requests WHERE user_id = p.id AND status = 'pending'
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if deleted.rows_affected() > 0 {
            return Ok(());
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user_profiles WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Err(AppError::rejected(
                format!("User {} has an active loan or a pending request", id),
                None,
            ))
        } else {
            Err(profile_not_found(id))
        }
    }
}

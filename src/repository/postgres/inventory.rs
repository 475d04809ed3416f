//! Categories and equipment details

use async_trait::async_trait;
use uuid::Uuid;

use super::{foreign_key_as, unique_as_rejected, PgStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        category::{Category, CreateCategory, UpdateCategory},
        equipment::{CreateEquipment, EquipmentFilter, EquipmentRecord, EquipmentRow, UpdateEquipment},
    },
    repository::InventoryStore,
};

fn category_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Category {} not found", id))
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_category(&self, id: Uuid) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| category_not_found(id))
    }

    async fn create_category(&self, data: &CreateCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_as_rejected(e, format!("Category '{}' already exists", data.name)))
    }

    async fn update_category(&self, id: Uuid, data: &UpdateCategory) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = CASE WHEN $3::text IS NULL THEN description ELSE NULLIF($3, '') END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| unique_as_rejected(e, "Category name already exists"))?
        .ok_or_else(|| category_not_found(id))
    }

    async fn delete_category(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                foreign_key_as(e, || {
                    AppError::rejected(
                        format!("Category {} is still used by equipment", id),
                        None,
                    )
                })
            })?;
        if result.rows_affected() == 0 {
            return Err(category_not_found(id));
        }
        Ok(())
    }

    async fn create_equipment(&self, data: &CreateEquipment) -> AppResult<EquipmentRecord> {
        sqlx::query_as::<_, EquipmentRow>(
            r#"
            INSERT INTO equipment (id, name, category_id, description, status)
            VALUES ($1, $2, $3, $4, 'available')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(data.category_id)
        .bind(&data.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| foreign_key_as(e, || category_not_found(data.category_id)))?
        .try_into()
    }

    async fn get_equipment(&self, id: Uuid) -> AppResult<EquipmentRecord> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?
            .try_into()
    }

    async fn list_equipment(&self, filter: &EquipmentFilter) -> AppResult<Vec<EquipmentRecord>> {
        let rows = sqlx::query_as::<_, EquipmentRow>(
            r#"
            SELECT * FROM equipment
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR category_id = $2)
              AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%')
            ORDER BY name
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.category_id)
        .bind(&filter.name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EquipmentRecord::try_from).collect()
    }

    async fn update_equipment(
        &self,
        id: Uuid,
        data: &UpdateEquipment,
    ) -> AppResult<EquipmentRecord> {
        let row = sqlx::query_as::<_, EquipmentRow>(
            r#"
            UPDATE equipment
            SET name = COALESCE($2, name),
                category_id = COALESCE($3, category_id),
                description = CASE WHEN $4::text IS NULL THEN description ELSE NULLIF($4, '') END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&data.name)
        .bind(data.category_id)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            foreign_key_as(e, || {
                AppError::NotFound("Category not found".to_string())
            })
        })?
        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;

        row.try_into()
    }

    async fn equipment_has_history(&self, id: Uuid) -> AppResult<bool> {
        let row: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT EXISTS(SELECT 1 FROM loans WHERE equipment_id = e.id)
                OR EXISTS(SELECT 1 FROM maintenance_records WHERE equipment_id = e.id)
                OR EXISTS(SELECT 1 FROM loan_requests WHERE equipment_id = e.id)
            FROM equipment e
            WHERE e.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn delete_equipment(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                foreign_key_as(e, || {
                    AppError::rejected(
                        format!("Equipment {} is referenced by ledger entries", id),
                        None,
                    )
                })
            })?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }
}

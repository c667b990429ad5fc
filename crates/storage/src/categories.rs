use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use rentdesk_core::payload::{CategoryDraft, CategoryPatch, ValidationError};
use rentdesk_core::types::Category;

use crate::{constraint_violation, new_id, to_rfc3339, Constraint};

/// Repository for car categories.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        draft: &CategoryDraft,
        now: DateTime<Utc>,
    ) -> Result<Category, CategoryError> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO categories (id, name, description, base_price, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.base_price)
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.fetch(&id).await
    }

    /// Lists categories alphabetically.
    pub async fn list(&self) -> Result<Vec<Category>, CategoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, base_price, created_at, updated_at \
             FROM categories ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    pub async fn fetch(&self, id: &str) -> Result<Category, CategoryError> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, base_price, created_at, updated_at \
             FROM categories WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Category::from)
        .ok_or(CategoryError::NotFound)
    }

    pub async fn exists(&self, id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Applies a partial update; validators run against the merged record.
    pub async fn update(
        &self,
        id: &str,
        patch: CategoryPatch,
        now: DateTime<Utc>,
    ) -> Result<Category, CategoryError> {
        let current = self.fetch(id).await?;
        let mut draft = CategoryDraft {
            name: current.name,
            description: current.description,
            base_price: current.base_price,
        };
        patch.apply(&mut draft)?;

        let result = sqlx::query(
            "UPDATE categories SET name = ?, description = ?, base_price = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.base_price)
        .bind(to_rfc3339(now))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(CategoryError::NotFound);
        }
        self.fetch(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), CategoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match constraint_violation(&err) {
                Some(Constraint::ForeignKey) => CategoryError::InUse,
                _ => CategoryError::Database(err),
            })?;

        if result.rows_affected() == 0 {
            return Err(CategoryError::NotFound);
        }
        Ok(())
    }
}

fn map_write_error(err: sqlx::Error) -> CategoryError {
    match constraint_violation(&err) {
        Some(Constraint::Unique) => CategoryError::DuplicateName,
        _ => CategoryError::Database(err),
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    base_price: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            base_price: row.base_price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("Category not found")]
    NotFound,
    #[error("a category with this name already exists")]
    DuplicateName,
    #[error("category is still assigned to one or more cars")]
    InUse,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{category_draft, seed_car, setup_db};

    #[tokio::test]
    async fn insert_list_and_fetch() {
        let db = setup_db().await;
        let repo = db.categories();
        let suv = repo.insert(&category_draft("SUV"), Utc::now()).await.expect("insert");
        repo.insert(&category_draft("economy"), Utc::now())
            .await
            .expect("insert");

        let names: Vec<String> = repo
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["economy", "SUV"]);

        let fetched = repo.fetch(&suv.id).await.expect("fetch");
        assert_eq!(fetched, suv);
        assert!(repo.exists(&suv.id).await.expect("exists"));
        assert!(matches!(repo.fetch("missing").await, Err(CategoryError::NotFound)));
    }

    #[tokio::test]
    async fn duplicate_names_conflict_case_insensitively() {
        let db = setup_db().await;
        let repo = db.categories();
        repo.insert(&category_draft("Luxury"), Utc::now())
            .await
            .expect("insert");
        let err = repo
            .insert(&category_draft("luxury"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CategoryError::DuplicateName));
    }

    #[tokio::test]
    async fn update_merges_and_validates() {
        let db = setup_db().await;
        let repo = db.categories();
        let created = repo
            .insert(&category_draft("Compact"), Utc::now())
            .await
            .expect("insert");

        let patch: CategoryPatch =
            serde_json::from_value(serde_json::json!({ "basePrice": 65 })).unwrap();
        let updated = repo.update(&created.id, patch, Utc::now()).await.expect("update");
        assert_eq!(updated.base_price, 65.0);
        assert_eq!(updated.name, "Compact");

        let patch: CategoryPatch =
            serde_json::from_value(serde_json::json!({ "basePrice": -5 })).unwrap();
        let err = repo.update(&created.id, patch, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CategoryError::Validation(_)));

        let err = repo
            .update("missing", CategoryPatch::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CategoryError::NotFound));
    }

    #[tokio::test]
    async fn delete_refuses_categories_in_use() {
        let db = setup_db().await;
        let car = seed_car(&db, "IN-USE-1").await;
        let err = db.categories().delete(&car.category.id).await.unwrap_err();
        assert!(matches!(err, CategoryError::InUse));

        let spare = db
            .categories()
            .insert(&category_draft("Spare"), Utc::now())
            .await
            .expect("insert");
        db.categories().delete(&spare.id).await.expect("delete");
        assert!(matches!(
            db.categories().delete(&spare.id).await,
            Err(CategoryError::NotFound)
        ));
    }
}

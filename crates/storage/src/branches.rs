use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use rentdesk_core::payload::{BranchDraft, BranchPatch, ValidationError};
use rentdesk_core::types::{Branch, Coordinates};

use crate::{constraint_violation, new_id, to_rfc3339, Constraint};

pub(crate) const BRANCH_COLUMNS: &str =
    "id, name, address, city, contact_number, email, latitude, longitude, created_at, updated_at";

/// Repository for rental branches.
#[derive(Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        draft: &BranchDraft,
        now: DateTime<Utc>,
    ) -> Result<Branch, BranchError> {
        let id = new_id();
        let (latitude, longitude) = split_coordinates(draft.coordinates);
        sqlx::query(
            "INSERT INTO branches \
             (id, name, address, city, contact_number, email, latitude, longitude, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(&draft.contact_number)
        .bind(&draft.email)
        .bind(latitude)
        .bind(longitude)
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await?;

        self.fetch(&id).await
    }

    /// Lists branches ordered by city and name.
    pub async fn list(&self) -> Result<Vec<Branch>, BranchError> {
        let rows = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches ORDER BY city COLLATE NOCASE, name COLLATE NOCASE"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Branch::from).collect())
    }

    pub async fn fetch(&self, id: &str) -> Result<Branch, BranchError> {
        sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Branch::from)
        .ok_or(BranchError::NotFound)
    }

    pub async fn exists(&self, id: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM branches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Applies a partial update; validators run against the merged record.
    pub async fn update(
        &self,
        id: &str,
        patch: BranchPatch,
        now: DateTime<Utc>,
    ) -> Result<Branch, BranchError> {
        let current = self.fetch(id).await?;
        let mut draft = BranchDraft {
            name: current.name,
            address: current.address,
            city: current.city,
            contact_number: current.contact_number,
            email: current.email,
            coordinates: current.coordinates,
        };
        patch.apply(&mut draft)?;

        let (latitude, longitude) = split_coordinates(draft.coordinates);
        let result = sqlx::query(
            "UPDATE branches SET name = ?, address = ?, city = ?, contact_number = ?, email = ?, \
             latitude = ?, longitude = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.city)
        .bind(&draft.contact_number)
        .bind(&draft.email)
        .bind(latitude)
        .bind(longitude)
        .bind(to_rfc3339(now))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BranchError::NotFound);
        }
        self.fetch(id).await
    }

    /// Deletes a branch. Staff assigned to it lose their assignment; cars or
    /// bookings still pointing at it block the delete.
    pub async fn delete(&self, id: &str) -> Result<(), BranchError> {
        let result = sqlx::query("DELETE FROM branches WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match constraint_violation(&err) {
                Some(Constraint::ForeignKey) => BranchError::InUse,
                _ => BranchError::Database(err),
            })?;

        if result.rows_affected() == 0 {
            return Err(BranchError::NotFound);
        }
        Ok(())
    }
}

fn split_coordinates(coordinates: Option<Coordinates>) -> (Option<f64>, Option<f64>) {
    match coordinates {
        Some(c) => (Some(c.latitude), Some(c.longitude)),
        None => (None, None),
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BranchRow {
    id: String,
    name: String,
    address: String,
    city: String,
    contact_number: String,
    email: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        let coordinates = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            address: row.address,
            city: row.city,
            contact_number: row.contact_number,
            email: row.email,
            coordinates,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum BranchError {
    #[error("Branch not found")]
    NotFound,
    #[error("branch still has cars or bookings assigned")]
    InUse,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{branch_draft, seed_car, setup_db, user_draft};
    use rentdesk_core::types::UserRole;

    #[tokio::test]
    async fn insert_and_fetch_keeps_coordinates() {
        let db = setup_db().await;
        let mut draft = branch_draft("Airport");
        draft.coordinates = Some(Coordinates {
            latitude: 51.47,
            longitude: -0.45,
        });
        let branch = db.branches().insert(&draft, Utc::now()).await.expect("insert");
        let fetched = db.branches().fetch(&branch.id).await.expect("fetch");
        assert_eq!(fetched.coordinates, draft.coordinates);
        assert_eq!(db.branches().list().await.expect("list").len(), 1);
        assert!(db.branches().exists(&branch.id).await.expect("exists"));
        assert!(!db.branches().exists("missing").await.expect("exists"));
    }

    #[tokio::test]
    async fn update_can_clear_coordinates() {
        let db = setup_db().await;
        let mut draft = branch_draft("Harbour");
        draft.coordinates = Some(Coordinates {
            latitude: 10.0,
            longitude: 20.0,
        });
        let branch = db.branches().insert(&draft, Utc::now()).await.expect("insert");

        let patch: BranchPatch = serde_json::from_value(serde_json::json!({
            "coordinates": null,
            "city": "Portsmouth"
        }))
        .unwrap();
        let updated = db
            .branches()
            .update(&branch.id, patch, Utc::now())
            .await
            .expect("update");
        assert_eq!(updated.coordinates, None);
        assert_eq!(updated.city, "Portsmouth");

        let patch: BranchPatch =
            serde_json::from_value(serde_json::json!({ "email": "not-an-email" })).unwrap();
        assert!(matches!(
            db.branches().update(&branch.id, patch, Utc::now()).await,
            Err(BranchError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_blocks_on_cars_and_unassigns_staff() {
        let db = setup_db().await;
        let car = seed_car(&db, "BR-1").await;
        assert!(matches!(
            db.branches().delete(&car.branch.id).await,
            Err(BranchError::InUse)
        ));

        let branch = db
            .branches()
            .insert(&branch_draft("Suburb"), Utc::now())
            .await
            .expect("insert");
        let staff = db
            .users()
            .insert(
                &user_draft("staff@example.com", Some(&branch.id)),
                UserRole::Staff,
                "hash",
                Utc::now(),
            )
            .await
            .expect("staff");
        db.branches().delete(&branch.id).await.expect("delete");

        let reloaded = db.users().fetch_staff(&staff.id).await.expect("staff");
        assert!(reloaded.branch.is_none());
    }
}

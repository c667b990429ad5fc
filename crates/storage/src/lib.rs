mod bookings;
mod branches;
mod cars;
mod categories;
mod payments;
mod users;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

pub use bookings::{BookingError, BookingRepository, NewBooking};
pub use branches::{BranchError, BranchRepository};
pub use cars::{CarError, CarRepository};
pub use categories::{CategoryError, CategoryRepository};
pub use payments::{NewPayment, PaymentError, PaymentRepository};
pub use users::{UserError, UserRepository};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for car categories.
    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone())
    }

    /// Returns a handle for rental branches.
    pub fn branches(&self) -> BranchRepository {
        BranchRepository::new(self.pool.clone())
    }

    /// Returns a handle for fleet cars.
    pub fn cars(&self) -> CarRepository {
        CarRepository::new(self.pool.clone())
    }

    /// Returns a handle for user accounts (admins, staff and customers).
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Returns a handle for bookings.
    pub fn bookings(&self) -> BookingRepository {
        BookingRepository::new(self.pool.clone())
    }

    /// Returns a handle for payments.
    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// SQLite constraint classes surfaced by failed writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Constraint {
    Unique,
    ForeignKey,
}

const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";

pub(crate) fn constraint_violation(err: &sqlx::Error) -> Option<Constraint> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    match db_err.code().as_deref() {
        Some(SQLITE_CONSTRAINT_UNIQUE) => Some(Constraint::Unique),
        Some(SQLITE_CONSTRAINT_FOREIGNKEY) => Some(Constraint::ForeignKey),
        _ => None,
    }
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use rentdesk_core::payload::{BranchDraft, CarDraft, CategoryDraft, UserDraft};
    use rentdesk_core::types::{Branch, Car, CarStatus, Category, Transmission, UserStatus};

    /// Each test gets its own private in-memory database.
    pub async fn setup_db() -> Database {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("connect");
        db.run_migrations().await.expect("migrations");
        db
    }

    pub fn category_draft(name: &str) -> CategoryDraft {
        CategoryDraft {
            name: name.to_string(),
            description: Some(format!("{name} cars")),
            base_price: 50.0,
        }
    }

    pub fn branch_draft(name: &str) -> BranchDraft {
        BranchDraft {
            name: name.to_string(),
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            contact_number: "+15550100".to_string(),
            email: "branch@example.com".to_string(),
            coordinates: None,
        }
    }

    pub fn car_draft(category: &Category, branch: &Branch, plate: &str) -> CarDraft {
        CarDraft {
            make: "Toyota".to_string(),
            model: "Corolla".to_string(),
            year: Some(2022),
            category_id: category.id.clone(),
            license_plate: plate.to_string(),
            branch_id: branch.id.clone(),
            daily_rate: 45.0,
            transmission: Transmission::Automatic,
            status: CarStatus::Available,
            mileage: Some(12_000),
            engine_size: None,
            fuel_type: Some("petrol".to_string()),
            doors: Some(4),
            seats: Some(5),
            features: vec!["GPS".to_string()],
            images: vec![],
        }
    }

    pub fn user_draft(email: &str, branch_id: Option<&str>) -> UserDraft {
        UserDraft {
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            phone_number: Some("+15550100".to_string()),
            branch_id: branch_id.map(str::to_string),
            status: UserStatus::Active,
        }
    }

    pub async fn seed_car(db: &Database, plate: &str) -> Car {
        let category = db
            .categories()
            .insert(&category_draft(&format!("Cat {plate}")), Utc::now())
            .await
            .expect("category");
        let branch = db
            .branches()
            .insert(&branch_draft("Downtown"), Utc::now())
            .await
            .expect("branch");
        db.cars()
            .insert(&car_draft(&category, &branch, plate), Utc::now())
            .await
            .expect("car")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::setup_db;

    #[tokio::test]
    async fn migrations_apply() {
        let db = setup_db().await;

        let tables: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '_sqlx%'")
                .fetch_one(db.pool())
                .await
                .expect("fetch tables");
        assert_eq!(tables.0, 6, "expected core tables to be created");
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = setup_db().await;
        let enabled: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .expect("pragma");
        assert_eq!(enabled.0, 1);
    }
}

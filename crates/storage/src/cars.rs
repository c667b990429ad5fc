use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use rentdesk_core::payload::{CarDraft, CarPatch, ValidationError};
use rentdesk_core::types::{Branch, Car, Category, Coordinates, UnknownVariant};

use crate::{constraint_violation, new_id, to_rfc3339, BranchRepository, CategoryRepository, Constraint};

const CAR_SELECT: &str = r#"
SELECT c.id,
       c.make,
       c.model,
       c.year,
       c.license_plate,
       c.daily_rate,
       c.transmission,
       c.status,
       c.mileage,
       c.engine_size,
       c.fuel_type,
       c.doors,
       c.seats,
       c.features_json,
       c.images_json,
       c.created_at,
       c.updated_at,
       cat.id AS category_id,
       cat.name AS category_name,
       cat.description AS category_description,
       cat.base_price AS category_base_price,
       cat.created_at AS category_created_at,
       cat.updated_at AS category_updated_at,
       b.id AS branch_id,
       b.name AS branch_name,
       b.address AS branch_address,
       b.city AS branch_city,
       b.contact_number AS branch_contact_number,
       b.email AS branch_email,
       b.latitude AS branch_latitude,
       b.longitude AS branch_longitude,
       b.created_at AS branch_created_at,
       b.updated_at AS branch_updated_at
  FROM cars AS c
  JOIN categories AS cat ON cat.id = c.category_id
  JOIN branches AS b ON b.id = c.branch_id
"#;

/// Repository for fleet cars. Reads always populate category and branch.
#[derive(Clone)]
pub struct CarRepository {
    pool: SqlitePool,
}

impl CarRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, draft: &CarDraft, now: DateTime<Utc>) -> Result<Car, CarError> {
        self.ensure_references(draft).await?;

        let id = new_id();
        sqlx::query(
            "INSERT INTO cars \
             (id, make, model, year, category_id, license_plate, branch_id, daily_rate, transmission, status, \
              mileage, engine_size, fuel_type, doors, seats, features_json, images_json, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&draft.make)
        .bind(&draft.model)
        .bind(draft.year)
        .bind(&draft.category_id)
        .bind(&draft.license_plate)
        .bind(&draft.branch_id)
        .bind(draft.daily_rate)
        .bind(draft.transmission.as_str())
        .bind(draft.status.as_str())
        .bind(draft.mileage)
        .bind(&draft.engine_size)
        .bind(&draft.fuel_type)
        .bind(draft.doors)
        .bind(draft.seats)
        .bind(serde_json::to_string(&draft.features)?)
        .bind(serde_json::to_string(&draft.images)?)
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.fetch(&id).await
    }

    /// Lists every car, newest first.
    pub async fn list(&self) -> Result<Vec<Car>, CarError> {
        let rows = sqlx::query_as::<_, CarRow>(&format!(
            "{CAR_SELECT} ORDER BY c.created_at DESC, c.license_plate"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Car::try_from).collect()
    }

    pub async fn fetch(&self, id: &str) -> Result<Car, CarError> {
        let row = sqlx::query_as::<_, CarRow>(&format!("{CAR_SELECT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(CarError::NotFound)?;
        Car::try_from(row)
    }

    /// Applies a partial update; validators run against the merged record.
    pub async fn update(
        &self,
        id: &str,
        patch: CarPatch,
        now: DateTime<Utc>,
    ) -> Result<Car, CarError> {
        let current = self.fetch(id).await?;
        let touches_references = patch.touches_references();
        let mut draft = draft_from(current);
        patch.apply(&mut draft)?;
        if touches_references {
            self.ensure_references(&draft).await?;
        }

        let result = sqlx::query(
            "UPDATE cars SET make = ?, model = ?, year = ?, category_id = ?, license_plate = ?, branch_id = ?, \
             daily_rate = ?, transmission = ?, status = ?, mileage = ?, engine_size = ?, fuel_type = ?, \
             doors = ?, seats = ?, features_json = ?, images_json = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&draft.make)
        .bind(&draft.model)
        .bind(draft.year)
        .bind(&draft.category_id)
        .bind(&draft.license_plate)
        .bind(&draft.branch_id)
        .bind(draft.daily_rate)
        .bind(draft.transmission.as_str())
        .bind(draft.status.as_str())
        .bind(draft.mileage)
        .bind(&draft.engine_size)
        .bind(&draft.fuel_type)
        .bind(draft.doors)
        .bind(draft.seats)
        .bind(serde_json::to_string(&draft.features)?)
        .bind(serde_json::to_string(&draft.images)?)
        .bind(to_rfc3339(now))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(CarError::NotFound);
        }
        self.fetch(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), CarError> {
        let result = sqlx::query("DELETE FROM cars WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match constraint_violation(&err) {
                Some(Constraint::ForeignKey) => CarError::HasBookings,
                _ => CarError::Database(err),
            })?;

        if result.rows_affected() == 0 {
            return Err(CarError::NotFound);
        }
        Ok(())
    }

    async fn ensure_references(&self, draft: &CarDraft) -> Result<(), CarError> {
        let categories = CategoryRepository::new(self.pool.clone());
        if !categories.exists(&draft.category_id).await? {
            return Err(CarError::UnknownCategory);
        }

        let branches = BranchRepository::new(self.pool.clone());
        if !branches.exists(&draft.branch_id).await? {
            return Err(CarError::UnknownBranch);
        }
        Ok(())
    }
}

fn draft_from(car: Car) -> CarDraft {
    CarDraft {
        make: car.make,
        model: car.model,
        year: car.year,
        category_id: car.category.id,
        license_plate: car.license_plate,
        branch_id: car.branch.id,
        daily_rate: car.daily_rate,
        transmission: car.transmission,
        status: car.status,
        mileage: car.mileage,
        engine_size: car.engine_size,
        fuel_type: car.fuel_type,
        doors: car.doors,
        seats: car.seats,
        features: car.features,
        images: car.images,
    }
}

fn map_write_error(err: sqlx::Error) -> CarError {
    match constraint_violation(&err) {
        Some(Constraint::Unique) => CarError::DuplicatePlate,
        // A reference vanished between the existence check and the write.
        Some(Constraint::ForeignKey) => CarError::UnknownCategory,
        None => CarError::Database(err),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CarRow {
    id: String,
    make: String,
    model: String,
    year: Option<i32>,
    license_plate: String,
    daily_rate: f64,
    transmission: String,
    status: String,
    mileage: Option<i64>,
    engine_size: Option<String>,
    fuel_type: Option<String>,
    doors: Option<i32>,
    seats: Option<i32>,
    features_json: String,
    images_json: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_id: String,
    category_name: String,
    category_description: Option<String>,
    category_base_price: f64,
    category_created_at: DateTime<Utc>,
    category_updated_at: DateTime<Utc>,
    branch_id: String,
    branch_name: String,
    branch_address: String,
    branch_city: String,
    branch_contact_number: String,
    branch_email: String,
    branch_latitude: Option<f64>,
    branch_longitude: Option<f64>,
    branch_created_at: DateTime<Utc>,
    branch_updated_at: DateTime<Utc>,
}

impl TryFrom<CarRow> for Car {
    type Error = CarError;

    fn try_from(row: CarRow) -> Result<Self, Self::Error> {
        let corrupt = |err: UnknownVariant| CarError::Corrupt(err.to_string());
        Ok(Self {
            transmission: row.transmission.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            features: serde_json::from_str(&row.features_json)?,
            images: serde_json::from_str(&row.images_json)?,
            id: row.id,
            make: row.make,
            model: row.model,
            year: row.year,
            category: Category {
                id: row.category_id,
                name: row.category_name,
                description: row.category_description,
                base_price: row.category_base_price,
                created_at: row.category_created_at,
                updated_at: row.category_updated_at,
            },
            license_plate: row.license_plate,
            branch: Branch {
                id: row.branch_id,
                name: row.branch_name,
                address: row.branch_address,
                city: row.branch_city,
                contact_number: row.branch_contact_number,
                email: row.branch_email,
                coordinates: row
                    .branch_latitude
                    .zip(row.branch_longitude)
                    .map(|(latitude, longitude)| Coordinates {
                        latitude,
                        longitude,
                    }),
                created_at: row.branch_created_at,
                updated_at: row.branch_updated_at,
            },
            daily_rate: row.daily_rate,
            mileage: row.mileage,
            engine_size: row.engine_size,
            fuel_type: row.fuel_type,
            doors: row.doors,
            seats: row.seats,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum CarError {
    #[error("Car not found")]
    NotFound,
    #[error("a car with this license plate already exists")]
    DuplicatePlate,
    #[error("category does not exist")]
    UnknownCategory,
    #[error("branch does not exist")]
    UnknownBranch,
    #[error("car has bookings on record and cannot be deleted")]
    HasBookings,
    #[error("stored car row is invalid: {0}")]
    Corrupt(String),
    #[error("failed to encode car lists: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{branch_draft, car_draft, category_draft, seed_car, setup_db};
    use rentdesk_core::types::CarStatus;
    use serde_json::json;

    #[tokio::test]
    async fn insert_populates_category_and_branch() {
        let db = setup_db().await;
        let car = seed_car(&db, "ABC-123").await;
        assert_eq!(car.category.name, "Cat ABC-123");
        assert_eq!(car.branch.name, "Downtown");
        assert_eq!(car.features, vec!["GPS"]);
        assert!(car.images.is_empty());

        let listed = db.cars().list().await.expect("list");
        assert_eq!(listed, vec![car.clone()]);
        assert_eq!(db.cars().fetch(&car.id).await.expect("fetch"), car);
    }

    #[tokio::test]
    async fn insert_rejects_unknown_references_and_duplicate_plates() {
        let db = setup_db().await;
        let category = db
            .categories()
            .insert(&category_draft("Economy"), Utc::now())
            .await
            .unwrap();
        let branch = db
            .branches()
            .insert(&branch_draft("Downtown"), Utc::now())
            .await
            .unwrap();

        let mut draft = car_draft(&category, &branch, "XYZ-1");
        draft.category_id = "missing".into();
        assert!(matches!(
            db.cars().insert(&draft, Utc::now()).await,
            Err(CarError::UnknownCategory)
        ));

        let mut draft = car_draft(&category, &branch, "XYZ-1");
        draft.branch_id = "missing".into();
        assert!(matches!(
            db.cars().insert(&draft, Utc::now()).await,
            Err(CarError::UnknownBranch)
        ));

        db.cars()
            .insert(&car_draft(&category, &branch, "XYZ-1"), Utc::now())
            .await
            .expect("first insert");
        assert!(matches!(
            db.cars()
                .insert(&car_draft(&category, &branch, "xyz-1"), Utc::now())
                .await,
            Err(CarError::DuplicatePlate)
        ));
    }

    #[tokio::test]
    async fn update_applies_partial_patch() {
        let db = setup_db().await;
        let car = seed_car(&db, "UPD-1").await;

        let patch: CarPatch = serde_json::from_value(json!({
            "status": "rented",
            "images": ["https://img.example.com/a.jpg"],
            "mileage": null
        }))
        .unwrap();
        let updated = db.cars().update(&car.id, patch, Utc::now()).await.expect("update");
        assert_eq!(updated.status, CarStatus::Rented);
        assert_eq!(updated.images, vec!["https://img.example.com/a.jpg"]);
        assert_eq!(updated.mileage, None);
        assert_eq!(updated.make, car.make);

        let patch: CarPatch = serde_json::from_value(json!({ "branch": "missing" })).unwrap();
        assert!(matches!(
            db.cars().update(&car.id, patch, Utc::now()).await,
            Err(CarError::UnknownBranch)
        ));

        assert!(matches!(
            db.cars().update("missing", CarPatch::default(), Utc::now()).await,
            Err(CarError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_removes_car() {
        let db = setup_db().await;
        let car = seed_car(&db, "DEL-1").await;
        db.cars().delete(&car.id).await.expect("delete");
        assert!(matches!(db.cars().fetch(&car.id).await, Err(CarError::NotFound)));
        assert!(matches!(db.cars().delete(&car.id).await, Err(CarError::NotFound)));
    }
}

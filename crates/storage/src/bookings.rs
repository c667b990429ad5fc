use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use rentdesk_core::reports::DateRange;
use rentdesk_core::types::{Booking, BookingPaymentStatus, BookingStatus, UnknownVariant};

use crate::{constraint_violation, new_id, to_rfc3339, Constraint};

const BOOKING_COLUMNS: &str = "id, customer_id, car_id, pickup_branch_id, return_branch_id, \
     start_date, end_date, status, total_amount, payment_status, created_at, updated_at";

/// Booking written by the seeding tools; the admin API only reads bookings.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: String,
    pub car_id: String,
    pub pickup_branch_id: String,
    pub return_branch_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_amount: f64,
    pub payment_status: BookingPaymentStatus,
}

#[derive(Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        booking: &NewBooking,
        now: DateTime<Utc>,
    ) -> Result<Booking, BookingError> {
        if booking.end_date < booking.start_date {
            return Err(BookingError::InvalidPeriod);
        }

        let id = new_id();
        sqlx::query(
            "INSERT INTO bookings \
             (id, customer_id, car_id, pickup_branch_id, return_branch_id, start_date, end_date, \
              status, total_amount, payment_status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&booking.customer_id)
        .bind(&booking.car_id)
        .bind(&booking.pickup_branch_id)
        .bind(&booking.return_branch_id)
        .bind(to_rfc3339(booking.start_date))
        .bind(to_rfc3339(booking.end_date))
        .bind(booking.status.as_str())
        .bind(booking.total_amount)
        .bind(booking.payment_status.as_str())
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await
        .map_err(|err| match constraint_violation(&err) {
            Some(Constraint::ForeignKey) => BookingError::UnknownReference,
            _ => BookingError::Database(err),
        })?;

        self.fetch(&id).await
    }

    pub async fn fetch(&self, id: &str) -> Result<Booking, BookingError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BookingError::NotFound)?;
        Booking::try_from(row)
    }

    pub async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, BookingError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ? ORDER BY created_at"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    /// Lists bookings created inside `range`, or every booking when no range is given.
    pub async fn list_created_within(
        &self,
        range: Option<DateRange>,
    ) -> Result<Vec<Booking>, BookingError> {
        let rows = match range {
            Some(range) => {
                sqlx::query_as::<_, BookingRow>(&format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings \
                     WHERE created_at >= ? AND created_at <= ? ORDER BY created_at"
                ))
                .bind(to_rfc3339(range.start))
                .bind(to_rfc3339(range.end))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, BookingRow>(&format!(
                    "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(Booking::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookingRow {
    pub(crate) id: String,
    pub(crate) customer_id: String,
    pub(crate) car_id: String,
    pub(crate) pickup_branch_id: String,
    pub(crate) return_branch_id: String,
    pub(crate) start_date: DateTime<Utc>,
    pub(crate) end_date: DateTime<Utc>,
    pub(crate) status: String,
    pub(crate) total_amount: f64,
    pub(crate) payment_status: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let corrupt = |err: UnknownVariant| BookingError::Corrupt(err.to_string());
        Ok(Self {
            status: row.status.parse().map_err(corrupt)?,
            payment_status: row.payment_status.parse().map_err(corrupt)?,
            id: row.id,
            customer: row.customer_id,
            car: row.car_id,
            pickup_branch: row.pickup_branch_id,
            return_branch: row.return_branch_id,
            start_date: row.start_date,
            end_date: row.end_date,
            total_amount: row.total_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,
    #[error("booking end date is before its start date")]
    InvalidPeriod,
    #[error("booking references a customer, car or branch that does not exist")]
    UnknownReference,
    #[error("stored booking row is invalid: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::test_support::{seed_car, user_draft};
    use crate::Database;
    use rentdesk_core::types::UserRole;

    /// Seeds a customer and a car, returning a booking template for them.
    pub async fn booking_template(db: &Database, plate: &str) -> NewBooking {
        let car = seed_car(db, plate).await;
        let customer = db
            .users()
            .insert(
                &user_draft(&format!("{}@example.com", plate.to_lowercase()), None),
                UserRole::Customer,
                "hash",
                Utc::now(),
            )
            .await
            .expect("customer");
        NewBooking {
            customer_id: customer.id,
            car_id: car.id,
            pickup_branch_id: car.branch.id.clone(),
            return_branch_id: car.branch.id,
            start_date: Utc::now(),
            end_date: Utc::now() + chrono::Duration::days(3),
            status: BookingStatus::Completed,
            total_amount: 135.0,
            payment_status: BookingPaymentStatus::Paid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::booking_template;
    use super::*;
    use crate::test_support::setup_db;
    use crate::CarError;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn insert_and_filter_by_status() {
        let db = setup_db().await;
        let template = booking_template(&db, "BK-1").await;
        let completed = db
            .bookings()
            .insert(&template, Utc::now())
            .await
            .expect("insert");
        let mut pending = template.clone();
        pending.status = BookingStatus::Pending;
        db.bookings().insert(&pending, Utc::now()).await.expect("insert");

        let listed = db
            .bookings()
            .list_by_status(BookingStatus::Completed)
            .await
            .expect("list");
        assert_eq!(listed, vec![completed]);
    }

    #[tokio::test]
    async fn list_created_within_honours_range() {
        let db = setup_db().await;
        let template = booking_template(&db, "BK-2").await;
        let january = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let march = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        db.bookings().insert(&template, january).await.expect("insert");
        db.bookings().insert(&template, march).await.expect("insert");

        let all = db.bookings().list_created_within(None).await.expect("list");
        assert_eq!(all.len(), 2);

        let range = DateRange {
            start: january - Duration::days(1),
            end: january + Duration::days(1),
        };
        let within = db
            .bookings()
            .list_created_within(Some(range))
            .await
            .expect("list");
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].created_at, january);
    }

    #[tokio::test]
    async fn rejects_invalid_periods_and_dangling_references() {
        let db = setup_db().await;
        let template = booking_template(&db, "BK-3").await;

        let mut reversed = template.clone();
        reversed.end_date = reversed.start_date - Duration::days(1);
        assert!(matches!(
            db.bookings().insert(&reversed, Utc::now()).await,
            Err(BookingError::InvalidPeriod)
        ));

        let mut dangling = template.clone();
        dangling.car_id = "missing".into();
        assert!(matches!(
            db.bookings().insert(&dangling, Utc::now()).await,
            Err(BookingError::UnknownReference)
        ));
    }

    #[tokio::test]
    async fn cars_with_bookings_cannot_be_deleted() {
        let db = setup_db().await;
        let template = booking_template(&db, "BK-4").await;
        db.bookings().insert(&template, Utc::now()).await.expect("insert");
        assert!(matches!(
            db.cars().delete(&template.car_id).await,
            Err(CarError::HasBookings)
        ));
    }
}

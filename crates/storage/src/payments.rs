use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use rentdesk_core::reports::DateRange;
use rentdesk_core::types::{Booking, Payment, PaymentStatus, UnknownVariant};

use crate::bookings::BookingRow;
use crate::{constraint_violation, new_id, to_rfc3339, BookingError, Constraint};

const PAYMENT_SELECT: &str = r#"
SELECT p.id,
       p.amount,
       p.currency,
       p.payment_method,
       p.status,
       p.paid_by,
       p.created_at,
       p.updated_at,
       b.id AS booking_id,
       b.customer_id,
       b.car_id,
       b.pickup_branch_id,
       b.return_branch_id,
       b.start_date,
       b.end_date,
       b.status AS booking_status,
       b.total_amount,
       b.payment_status,
       b.created_at AS booking_created_at,
       b.updated_at AS booking_updated_at
  FROM payments AS p
  JOIN bookings AS b ON b.id = p.booking_id
"#;

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub paid_by: Option<String>,
}

/// Repository for payments. Reads populate the paid booking.
#[derive(Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        payment: &NewPayment,
        now: DateTime<Utc>,
    ) -> Result<Payment, PaymentError> {
        let id = new_id();
        sqlx::query(
            "INSERT INTO payments \
             (id, booking_id, amount, currency, payment_method, status, paid_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&payment.booking_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.payment_method)
        .bind(payment.status.as_str())
        .bind(&payment.paid_by)
        .bind(to_rfc3339(now))
        .bind(to_rfc3339(now))
        .execute(&self.pool)
        .await
        .map_err(|err| match constraint_violation(&err) {
            Some(Constraint::ForeignKey) => PaymentError::UnknownReference,
            _ => PaymentError::Database(err),
        })?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!("{PAYMENT_SELECT} WHERE p.id = ?"))
            .bind(&id)
            .fetch_one(&self.pool)
            .await?;
        Payment::try_from(row)
    }

    /// Completed payments created inside `range`, oldest first.
    pub async fn list_completed_within(
        &self,
        range: DateRange,
    ) -> Result<Vec<Payment>, PaymentError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "{PAYMENT_SELECT} WHERE p.status = ? AND p.created_at >= ? AND p.created_at <= ? \
             ORDER BY p.created_at"
        ))
        .bind(PaymentStatus::Completed.as_str())
        .bind(to_rfc3339(range.start))
        .bind(to_rfc3339(range.end))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    amount: f64,
    currency: String,
    payment_method: String,
    status: String,
    paid_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    booking_id: String,
    customer_id: String,
    car_id: String,
    pickup_branch_id: String,
    return_branch_id: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    booking_status: String,
    total_amount: f64,
    payment_status: String,
    booking_created_at: DateTime<Utc>,
    booking_updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = PaymentError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let booking = Booking::try_from(BookingRow {
            id: row.booking_id,
            customer_id: row.customer_id,
            car_id: row.car_id,
            pickup_branch_id: row.pickup_branch_id,
            return_branch_id: row.return_branch_id,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.booking_status,
            total_amount: row.total_amount,
            payment_status: row.payment_status,
            created_at: row.booking_created_at,
            updated_at: row.booking_updated_at,
        })?;
        Ok(Self {
            status: row
                .status
                .parse()
                .map_err(|err: UnknownVariant| PaymentError::Corrupt(err.to_string()))?,
            id: row.id,
            booking,
            amount: row.amount,
            currency: row.currency,
            payment_method: row.payment_method,
            paid_by: row.paid_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment references a booking or user that does not exist")]
    UnknownReference,
    #[error("stored payment row is invalid: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

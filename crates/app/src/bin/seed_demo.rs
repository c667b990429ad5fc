//! Inserts a small demo data set so the reports have something to show.
//!
//! Every step looks its record up first, so a rerun after a partial failure
//! completes the set instead of duplicating it.

use std::error::Error;

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rentdesk_core::password::hash_password;
use rentdesk_core::payload::{BranchDraft, CarDraft, CategoryDraft, UserDraft};
use rentdesk_core::reports::DateRange;
use rentdesk_core::types::{
    Booking, BookingPaymentStatus, BookingStatus, Branch, Car, CarStatus, Category, PaymentStatus,
    Transmission, UserRole, UserStatus,
};
use rentdesk_core::validation::random_string;
use rentdesk_storage::{Database, NewBooking, NewPayment};
use rentdesk_util::{database_url, load_env_file};

const DEMO_CATEGORY: &str = "Demo Economy";
const DEMO_PLATE: &str = "DEMO-001";
const DEMO_CUSTOMER_EMAIL: &str = "customer@example.com";

type SeedResult<T> = Result<T, Box<dyn Error>>;

#[tokio::main]
async fn main() -> SeedResult<()> {
    load_env_file();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let database = Database::connect(&database_url()).await?;
    database.run_migrations().await?;

    let inserted = seed(&database, Utc::now()).await?;
    if inserted == 0 {
        info!(stage = "seed", "demo data already present");
    } else {
        info!(stage = "seed", inserted, "demo data inserted");
    }
    Ok(())
}

/// Returns how many records were inserted.
async fn seed(database: &Database, now: DateTime<Utc>) -> SeedResult<usize> {
    let mut inserted = 0;

    let category = match find_category(database).await? {
        Some(category) => category,
        None => {
            inserted += 1;
            database
                .categories()
                .insert(
                    &CategoryDraft {
                        name: DEMO_CATEGORY.to_string(),
                        description: Some("Compact cars for city trips".to_string()),
                        base_price: 45.0,
                    },
                    now,
                )
                .await?
        }
    };

    let mut branches = Vec::with_capacity(2);
    for (name, address) in [
        ("Demo Downtown", "1 Market Street"),
        ("Demo Airport", "100 Terminal Road"),
    ] {
        let branch = match find_branch(database, name).await? {
            Some(branch) => branch,
            None => {
                inserted += 1;
                database
                    .branches()
                    .insert(&demo_branch(name, address), now)
                    .await?
            }
        };
        branches.push(branch);
    }
    let [pickup, dropoff] = <[Branch; 2]>::try_from(branches).map_err(|_| "expected two branches")?;

    let car = match find_car(database).await? {
        Some(car) => car,
        None => {
            inserted += 1;
            database
                .cars()
                .insert(&demo_car(&category, &pickup), now)
                .await?
        }
    };

    let customer_id = match database
        .users()
        .find_account_by_email(DEMO_CUSTOMER_EMAIL, UserRole::Customer)
        .await?
    {
        Some(account) => account.id,
        None => {
            inserted += 1;
            database
                .users()
                .insert(
                    &UserDraft {
                        first_name: "Demo".to_string(),
                        last_name: "Customer".to_string(),
                        email: DEMO_CUSTOMER_EMAIL.to_string(),
                        phone_number: None,
                        branch_id: None,
                        status: UserStatus::Active,
                    },
                    UserRole::Customer,
                    &hash_password(&random_string(16))?,
                    now,
                )
                .await?
                .id
        }
    };

    let booking = match find_booking(database, &car.id, &customer_id).await? {
        Some(booking) => booking,
        None => {
            inserted += 1;
            database
                .bookings()
                .insert(
                    &NewBooking {
                        customer_id: customer_id.clone(),
                        car_id: car.id.clone(),
                        pickup_branch_id: pickup.id,
                        return_branch_id: dropoff.id,
                        start_date: Utc
                            .with_ymd_and_hms(2024, 12, 10, 0, 0, 0)
                            .single()
                            .ok_or("invalid start date")?,
                        end_date: Utc
                            .with_ymd_and_hms(2024, 12, 15, 0, 0, 0)
                            .single()
                            .ok_or("invalid end date")?,
                        status: BookingStatus::Completed,
                        total_amount: 500.0,
                        payment_status: BookingPaymentStatus::Paid,
                    },
                    now,
                )
                .await?
        }
    };

    let since_booking = DateRange {
        start: booking.created_at,
        end: now,
    };
    let paid = database
        .payments()
        .list_completed_within(since_booking)
        .await?
        .iter()
        .any(|payment| payment.booking.id == booking.id);
    if !paid {
        inserted += 1;
        database
            .payments()
            .insert(
                &NewPayment {
                    booking_id: booking.id.clone(),
                    amount: 500.0,
                    currency: "USD".to_string(),
                    payment_method: "stripe".to_string(),
                    status: PaymentStatus::Completed,
                    paid_by: Some(customer_id),
                },
                now,
            )
            .await?;
    }

    Ok(inserted)
}

async fn find_category(database: &Database) -> SeedResult<Option<Category>> {
    Ok(database
        .categories()
        .list()
        .await?
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(DEMO_CATEGORY)))
}

async fn find_branch(database: &Database, name: &str) -> SeedResult<Option<Branch>> {
    Ok(database
        .branches()
        .list()
        .await?
        .into_iter()
        .find(|b| b.name == name))
}

async fn find_car(database: &Database) -> SeedResult<Option<Car>> {
    Ok(database
        .cars()
        .list()
        .await?
        .into_iter()
        .find(|c| c.license_plate.eq_ignore_ascii_case(DEMO_PLATE)))
}

async fn find_booking(
    database: &Database,
    car_id: &str,
    customer_id: &str,
) -> SeedResult<Option<Booking>> {
    Ok(database
        .bookings()
        .list_by_status(BookingStatus::Completed)
        .await?
        .into_iter()
        .find(|b| b.car == car_id && b.customer == customer_id))
}

fn demo_branch(name: &str, address: &str) -> BranchDraft {
    BranchDraft {
        name: name.to_string(),
        address: address.to_string(),
        city: "Springfield".to_string(),
        contact_number: "+15550100".to_string(),
        email: "branches@example.com".to_string(),
        coordinates: None,
    }
}

fn demo_car(category: &Category, branch: &Branch) -> CarDraft {
    CarDraft {
        make: "Toyota".to_string(),
        model: "Corolla".to_string(),
        year: Some(2022),
        category_id: category.id.clone(),
        license_plate: DEMO_PLATE.to_string(),
        branch_id: branch.id.clone(),
        daily_rate: 100.0,
        transmission: Transmission::Automatic,
        status: CarStatus::Available,
        mileage: Some(12_000),
        engine_size: Some("1.8L".to_string()),
        fuel_type: Some("petrol".to_string()),
        doors: Some(4),
        seats: Some(5),
        features: vec!["Bluetooth".to_string(), "Backup camera".to_string()],
        images: Vec::new(),
    }
}

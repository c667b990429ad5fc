//! Report aggregation over rows already loaded from storage.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::payload::ValidationError;
use crate::types::{Booking, BookingStatus, Car, Payment, PaymentStatus};
use crate::validation::{days_between, rental_days};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Parses a `YYYY-MM-DD` or RFC 3339 bound. Date-only end bounds cover the
/// whole day.
fn parse_bound(
    raw: &str,
    field: &'static str,
    bound: Bound,
) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ValidationError::Invalid {
        field,
        reason: "must be YYYY-MM-DD or an RFC 3339 timestamp".to_string(),
    })?;
    let start_of_day = date.and_time(NaiveTime::MIN).and_utc();
    Ok(match bound {
        Bound::Start => start_of_day,
        Bound::End => start_of_day + Duration::days(1) - Duration::milliseconds(1),
    })
}

/// Builds a range from the `startDate`/`endDate` query parameters. Both are required.
pub fn parse_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<DateRange, ValidationError> {
    let start = start
        .filter(|s| !s.trim().is_empty())
        .ok_or(ValidationError::Required("startDate"))?;
    let end = end
        .filter(|s| !s.trim().is_empty())
        .ok_or(ValidationError::Required("endDate"))?;
    let range = DateRange {
        start: parse_bound(start, "startDate", Bound::Start)?,
        end: parse_bound(end, "endDate", Bound::End)?,
    };
    if range.start > range.end {
        return Err(ValidationError::Invalid {
            field: "endDate",
            reason: "must not be before startDate".to_string(),
        });
    }
    Ok(range)
}

/// Like [`parse_date_range`] but yields `None` when neither bound is supplied.
pub fn parse_optional_date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<DateRange>, ValidationError> {
    let blank = |v: Option<&str>| v.map_or(true, |s| s.trim().is_empty());
    if blank(start) && blank(end) {
        return Ok(None);
    }
    parse_date_range(start, end).map(Some)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub total_revenue: f64,
    pub period_days: i64,
    pub payments: Vec<Payment>,
}

/// Sums completed payments created within the range.
pub fn revenue_report(range: DateRange, payments: Vec<Payment>) -> RevenueReport {
    let payments: Vec<Payment> = payments
        .into_iter()
        .filter(|p| p.status == PaymentStatus::Completed && range.contains(p.created_at))
        .collect();
    let total_revenue = payments.iter().map(|p| p.amount).sum();
    RevenueReport {
        total_revenue,
        period_days: days_between(range.start, range.end),
        payments,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarUsage {
    pub car: Car,
    pub total_bookings: u64,
    pub total_days: u64,
}

/// Per-car booking count and rented days over completed bookings.
pub fn usage_report(cars: Vec<Car>, bookings: &[Booking]) -> Vec<CarUsage> {
    let mut per_car: HashMap<&str, (u64, u64)> = HashMap::new();
    for booking in bookings
        .iter()
        .filter(|b| b.status == BookingStatus::Completed)
    {
        let entry = per_car.entry(booking.car.as_str()).or_default();
        entry.0 += 1;
        entry.1 += rental_days(booking.start_date, booking.end_date);
    }

    cars.into_iter()
        .map(|car| {
            let (total_bookings, total_days) =
                per_car.get(car.id.as_str()).copied().unwrap_or_default();
            CarUsage {
                car,
                total_bookings,
                total_days,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsReport {
    pub total_bookings: u64,
    pub monthly_trends: BTreeMap<String, u64>,
}

/// Counts bookings per UTC `YYYY-MM` month of creation.
pub fn trends_report(bookings: &[Booking], range: Option<DateRange>) -> TrendsReport {
    let mut monthly_trends = BTreeMap::new();
    let mut total_bookings = 0;
    for booking in bookings
        .iter()
        .filter(|b| range.map_or(true, |r| r.contains(b.created_at)))
    {
        total_bookings += 1;
        *monthly_trends
            .entry(booking.created_at.format("%Y-%m").to_string())
            .or_insert(0) += 1;
    }
    TrendsReport {
        total_bookings,
        monthly_trends,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BookingPaymentStatus, Branch, CarStatus, Category, Transmission,
    };
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn booking(id: &str, car: &str, status: BookingStatus, start: DateTime<Utc>, end: DateTime<Utc>) -> Booking {
        Booking {
            id: id.into(),
            customer: "cust-1".into(),
            car: car.into(),
            pickup_branch: "br-1".into(),
            return_branch: "br-1".into(),
            start_date: start,
            end_date: end,
            status,
            total_amount: 100.0,
            payment_status: BookingPaymentStatus::Paid,
            created_at: start,
            updated_at: start,
        }
    }

    fn car(id: &str) -> Car {
        let now = at(2024, 1, 1);
        Car {
            id: id.into(),
            make: "Toyota".into(),
            model: "Yaris".into(),
            year: Some(2021),
            category: Category {
                id: "cat-1".into(),
                name: "Economy".into(),
                description: None,
                base_price: 30.0,
                created_at: now,
                updated_at: now,
            },
            license_plate: format!("PLATE-{id}"),
            branch: Branch {
                id: "br-1".into(),
                name: "Downtown".into(),
                address: "1 Main St".into(),
                city: "Springfield".into(),
                contact_number: "+15550100".into(),
                email: "downtown@example.com".into(),
                coordinates: None,
                created_at: now,
                updated_at: now,
            },
            daily_rate: 40.0,
            transmission: Transmission::Automatic,
            status: CarStatus::Available,
            mileage: None,
            engine_size: None,
            fuel_type: None,
            doors: None,
            seats: None,
            features: vec![],
            images: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(id: &str, amount: f64, status: PaymentStatus, created_at: DateTime<Utc>) -> Payment {
        Payment {
            id: id.into(),
            booking: booking("bk-1", "car-1", BookingStatus::Completed, created_at, created_at),
            amount,
            currency: "USD".into(),
            payment_method: "stripe".into(),
            status,
            paid_by: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn date_range_requires_both_bounds() {
        assert_eq!(
            parse_date_range(None, Some("2024-01-31")).unwrap_err(),
            ValidationError::Required("startDate")
        );
        assert_eq!(
            parse_date_range(Some("2024-01-01"), Some(" ")).unwrap_err(),
            ValidationError::Required("endDate")
        );
    }

    #[test]
    fn date_only_end_covers_whole_day() {
        let range = parse_date_range(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        assert_eq!(range.start, at(2024, 1, 1));
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()));
        assert!(!range.contains(at(2024, 2, 1)));
    }

    #[test]
    fn date_range_accepts_rfc3339_and_rejects_inverted() {
        let range =
            parse_date_range(Some("2024-01-01T12:00:00+02:00"), Some("2024-01-02")).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());

        assert!(matches!(
            parse_date_range(Some("2024-02-01"), Some("2024-01-01")),
            Err(ValidationError::Invalid { field: "endDate", .. })
        ));
        assert!(matches!(
            parse_date_range(Some("yesterday"), Some("2024-01-01")),
            Err(ValidationError::Invalid { field: "startDate", .. })
        ));
    }

    #[test]
    fn optional_range_is_none_when_absent() {
        assert_eq!(parse_optional_date_range(None, Some("")).unwrap(), None);
        assert!(parse_optional_date_range(Some("2024-01-01"), None).is_err());
    }

    #[test]
    fn revenue_sums_completed_payments_in_range() {
        let range = parse_date_range(Some("2024-12-01"), Some("2024-12-31")).unwrap();
        let report = revenue_report(
            range,
            vec![
                payment("p-1", 500.0, PaymentStatus::Completed, at(2024, 12, 10)),
                payment("p-2", 250.5, PaymentStatus::Completed, at(2024, 12, 31)),
                payment("p-3", 900.0, PaymentStatus::Refunded, at(2024, 12, 12)),
                payment("p-4", 75.0, PaymentStatus::Completed, at(2025, 1, 1)),
            ],
        );
        assert_eq!(report.total_revenue, 750.5);
        assert_eq!(report.payments.len(), 2);
        assert_eq!(report.period_days, 31);
    }

    #[test]
    fn usage_counts_completed_bookings_per_car() {
        let bookings = vec![
            booking("b-1", "car-1", BookingStatus::Completed, at(2024, 12, 10), at(2024, 12, 15)),
            booking(
                "b-2",
                "car-1",
                BookingStatus::Completed,
                at(2024, 12, 20),
                Utc.with_ymd_and_hms(2024, 12, 21, 6, 0, 0).unwrap(),
            ),
            booking("b-3", "car-1", BookingStatus::Cancelled, at(2024, 12, 1), at(2024, 12, 9)),
            booking("b-4", "car-2", BookingStatus::Active, at(2024, 12, 1), at(2024, 12, 3)),
        ];
        let report = usage_report(vec![car("car-1"), car("car-2")], &bookings);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].car.id, "car-1");
        assert_eq!(report[0].total_bookings, 2);
        assert_eq!(report[0].total_days, 7);
        assert_eq!(report[1].total_bookings, 0);
        assert_eq!(report[1].total_days, 0);
    }

    #[test]
    fn trends_bucket_by_month() {
        let bookings = vec![
            booking("b-1", "car-1", BookingStatus::Pending, at(2024, 11, 30), at(2024, 12, 2)),
            booking("b-2", "car-1", BookingStatus::Completed, at(2024, 12, 1), at(2024, 12, 2)),
            booking("b-3", "car-2", BookingStatus::Cancelled, at(2024, 12, 31), at(2025, 1, 2)),
        ];
        let report = trends_report(&bookings, None);
        assert_eq!(report.total_bookings, 3);
        assert_eq!(report.monthly_trends.get("2024-11"), Some(&1));
        assert_eq!(report.monthly_trends.get("2024-12"), Some(&2));

        let december = parse_date_range(Some("2024-12-01"), Some("2024-12-31")).unwrap();
        let report = trends_report(&bookings, Some(december));
        assert_eq!(report.total_bookings, 2);
        assert_eq!(report.monthly_trends.len(), 1);
    }
}

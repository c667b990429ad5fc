use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

// E.164 with an optional leading plus.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("phone regex compiles"));

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_phone_number(phone_number: &str) -> bool {
    PHONE_RE.is_match(phone_number)
}

/// Whole days between two instants, rounded to the nearest day.
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let seconds = end.signed_duration_since(start).num_seconds() as f64;
    (seconds / SECONDS_PER_DAY).round() as i64
}

/// Billable rental days: any started day counts, negative spans count as zero.
pub fn rental_days(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let millis = end.signed_duration_since(start).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis as f64 / (SECONDS_PER_DAY * 1000.0)).ceil() as u64
}

/// Random alphanumeric string, used for temporary passwords.
pub fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn validates_email_shape() {
        assert!(is_valid_email("admin@example.com"));
        assert!(!is_valid_email("admin@example"));
        assert!(!is_valid_email("ad min@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn validates_e164_phone_numbers() {
        assert!(is_valid_phone_number("+1234567890"));
        assert!(is_valid_phone_number("447911123456"));
        assert!(!is_valid_phone_number("+0123456"));
        assert!(!is_valid_phone_number("+1 234 567"));
        assert!(!is_valid_phone_number("+1234567890123456"));
    }

    #[test]
    fn rental_days_rounds_partial_days_up() {
        assert_eq!(rental_days(at(2024, 12, 10, 0), at(2024, 12, 15, 0)), 5);
        assert_eq!(rental_days(at(2024, 12, 10, 0), at(2024, 12, 10, 1)), 1);
        assert_eq!(rental_days(at(2024, 12, 10, 9), at(2024, 12, 12, 10)), 3);
        assert_eq!(rental_days(at(2024, 12, 15, 0), at(2024, 12, 10, 0)), 0);
    }

    #[test]
    fn days_between_rounds_to_nearest() {
        assert_eq!(days_between(at(2024, 1, 1, 0), at(2024, 1, 3, 11)), 2);
        assert_eq!(days_between(at(2024, 1, 1, 0), at(2024, 1, 3, 13)), 3);
        assert_eq!(days_between(at(2024, 1, 3, 0), at(2024, 1, 1, 0)), -2);
    }

    #[test]
    fn random_string_has_requested_length() {
        let value = random_string(12);
        assert_eq!(value.len(), 12);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}

//! Request payloads accepted by the admin API and the validated drafts that
//! the storage layer persists.
//!
//! Create requests deserialize every field as optional so that missing values
//! surface as validation errors instead of decode failures. Patch requests
//! distinguish "absent" from an explicit `null` for nullable fields.

use chrono::{Datelike, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::types::{CarStatus, Coordinates, Transmission, UserStatus};
use crate::validation::{is_valid_email, is_valid_phone_number};

const FIRST_CAR_YEAR: i32 = 1886;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingFields(Vec<&'static str>),
    #[error("{0} is required")]
    Required(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Number sent either as JSON number or as a numeric string from a form field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    fn to_f64(&self, field: &'static str) -> Result<f64, ValidationError> {
        let value = match self {
            Self::Number(number) => number.as_f64(),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
        };
        value
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationError::invalid(field, "must be a number"))
    }

    fn to_i64(&self, field: &'static str) -> Result<i64, ValidationError> {
        let value = self.to_f64(field)?;
        if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
            return Err(ValidationError::invalid(field, "must be a whole number"));
        }
        Ok(value as i64)
    }

    fn to_i32(&self, field: &'static str) -> Result<i32, ValidationError> {
        i32::try_from(self.to_i64(field)?)
            .map_err(|_| ValidationError::invalid(field, "is out of range"))
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_blank_numeric(value: Option<Numeric>) -> Option<Numeric> {
    value.filter(|n| !n.is_blank())
}

fn require_text(
    value: Option<String>,
    field: &'static str,
) -> Result<String, ValidationError> {
    non_blank(value).ok_or(ValidationError::Required(field))
}

fn replace_text(
    target: &mut String,
    value: Option<String>,
    field: &'static str,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        *target = require_text(Some(value), field)?;
    }
    Ok(())
}

fn nullable_text(target: &mut Option<String>, value: Option<Option<String>>) {
    if let Some(value) = value {
        *target = non_blank(value);
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDraft {
    pub name: String,
    pub description: Option<String>,
    pub base_price: f64,
}

impl CategoryDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if !(self.base_price.is_finite() && self.base_price >= 0.0) {
            return Err(ValidationError::invalid(
                "basePrice",
                "must be zero or greater",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub base_price: Option<Numeric>,
}

impl NewCategoryRequest {
    pub fn into_draft(self) -> Result<CategoryDraft, ValidationError> {
        let name = require_text(self.name, "name")?;
        let base_price = non_blank_numeric(self.base_price)
            .ok_or(ValidationError::Required("basePrice"))?
            .to_f64("basePrice")?;
        let draft = CategoryDraft {
            name,
            description: non_blank(self.description),
            base_price,
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub base_price: Option<Numeric>,
}

impl CategoryPatch {
    pub fn apply(self, draft: &mut CategoryDraft) -> Result<(), ValidationError> {
        replace_text(&mut draft.name, self.name, "name")?;
        nullable_text(&mut draft.description, self.description);
        if let Some(price) = non_blank_numeric(self.base_price) {
            draft.base_price = price.to_f64("basePrice")?;
        }
        draft.validate()
    }
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct BranchDraft {
    pub name: String,
    pub address: String,
    pub city: String,
    pub contact_number: String,
    pub email: String,
    pub coordinates: Option<Coordinates>,
}

impl BranchDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("name", &self.name),
            ("address", &self.address),
            ("city", &self.city),
            ("contactNumber", &self.contact_number),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::Required(field));
            }
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::invalid("email", "must be a valid email address"));
        }
        if let Some(coords) = self.coordinates {
            if !(-90.0..=90.0).contains(&coords.latitude) {
                return Err(ValidationError::invalid("latitude", "must be between -90 and 90"));
            }
            if !(-180.0..=180.0).contains(&coords.longitude) {
                return Err(ValidationError::invalid(
                    "longitude",
                    "must be between -180 and 180",
                ));
            }
        }
        Ok(())
    }
}

/// Reads coordinates from the flat `latitude`/`longitude` form fields.
fn flat_coordinates(
    latitude: Option<Numeric>,
    longitude: Option<Numeric>,
) -> Result<Option<Coordinates>, ValidationError> {
    match (non_blank_numeric(latitude), non_blank_numeric(longitude)) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => Ok(Some(Coordinates {
            latitude: lat.to_f64("latitude")?,
            longitude: lng.to_f64("longitude")?,
        })),
        (Some(_), None) => Err(ValidationError::Required("longitude")),
        (None, Some(_)) => Err(ValidationError::Required("latitude")),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranchRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub latitude: Option<Numeric>,
    pub longitude: Option<Numeric>,
}

impl NewBranchRequest {
    pub fn into_draft(self) -> Result<BranchDraft, ValidationError> {
        let coordinates = match flat_coordinates(self.latitude, self.longitude)? {
            Some(coords) => Some(coords),
            None => self.coordinates,
        };
        let draft = BranchDraft {
            name: require_text(self.name, "name")?,
            address: require_text(self.address, "address")?,
            city: require_text(self.city, "city")?,
            contact_number: require_text(self.contact_number, "contactNumber")?,
            email: require_text(self.email, "email")?.to_lowercase(),
            coordinates,
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub coordinates: Option<Option<Coordinates>>,
    pub latitude: Option<Numeric>,
    pub longitude: Option<Numeric>,
}

impl BranchPatch {
    pub fn apply(self, draft: &mut BranchDraft) -> Result<(), ValidationError> {
        replace_text(&mut draft.name, self.name, "name")?;
        replace_text(&mut draft.address, self.address, "address")?;
        replace_text(&mut draft.city, self.city, "city")?;
        replace_text(&mut draft.contact_number, self.contact_number, "contactNumber")?;
        if let Some(email) = self.email {
            draft.email = require_text(Some(email), "email")?.to_lowercase();
        }
        if let Some(coordinates) = self.coordinates {
            draft.coordinates = coordinates;
        }
        if let Some(coords) = flat_coordinates(self.latitude, self.longitude)? {
            draft.coordinates = Some(coords);
        }
        draft.validate()
    }
}

// ---------------------------------------------------------------------------
// Cars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CarDraft {
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub category_id: String,
    pub license_plate: String,
    pub branch_id: String,
    pub daily_rate: f64,
    pub transmission: Transmission,
    pub status: CarStatus,
    pub mileage: Option<i64>,
    pub engine_size: Option<String>,
    pub fuel_type: Option<String>,
    pub doors: Option<i32>,
    pub seats: Option<i32>,
    pub features: Vec<String>,
    pub images: Vec<String>,
}

impl CarDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("make", &self.make),
            ("model", &self.model),
            ("category", &self.category_id),
            ("licensePlate", &self.license_plate),
            ("branch", &self.branch_id),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::Required(field));
            }
        }
        if let Some(year) = self.year {
            let latest = Utc::now().year() + 1;
            if !(FIRST_CAR_YEAR..=latest).contains(&year) {
                return Err(ValidationError::invalid(
                    "year",
                    format!("must be between {FIRST_CAR_YEAR} and {latest}"),
                ));
            }
        }
        if !(self.daily_rate.is_finite() && self.daily_rate > 0.0) {
            return Err(ValidationError::invalid("dailyRate", "must be greater than zero"));
        }
        if matches!(self.mileage, Some(m) if m < 0) {
            return Err(ValidationError::invalid("mileage", "must be zero or greater"));
        }
        if matches!(self.doors, Some(d) if d <= 0) {
            return Err(ValidationError::invalid("doors", "must be greater than zero"));
        }
        if matches!(self.seats, Some(s) if s <= 0) {
            return Err(ValidationError::invalid("seats", "must be greater than zero"));
        }
        Ok(())
    }
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn optional_i32(value: Option<Numeric>, field: &'static str) -> Result<Option<i32>, ValidationError> {
    non_blank_numeric(value).map(|n| n.to_i32(field)).transpose()
}

fn optional_i64(value: Option<Numeric>, field: &'static str) -> Result<Option<i64>, ValidationError> {
    non_blank_numeric(value).map(|n| n.to_i64(field)).transpose()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCarRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<Numeric>,
    pub category: Option<String>,
    pub license_plate: Option<String>,
    pub branch: Option<String>,
    pub daily_rate: Option<Numeric>,
    pub transmission: Option<Transmission>,
    pub status: Option<CarStatus>,
    pub mileage: Option<Numeric>,
    pub engine_size: Option<String>,
    pub fuel_type: Option<String>,
    pub doors: Option<Numeric>,
    pub seats: Option<Numeric>,
    pub features: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl NewCarRequest {
    /// Validates the request, reporting every absent required field at once.
    pub fn into_draft(self) -> Result<CarDraft, ValidationError> {
        let make = non_blank(self.make);
        let model = non_blank(self.model);
        let category = non_blank(self.category);
        let license_plate = non_blank(self.license_plate);
        let branch = non_blank(self.branch);
        let daily_rate = non_blank_numeric(self.daily_rate);

        let mut missing = Vec::new();
        for (field, present) in [
            ("make", make.is_some()),
            ("model", model.is_some()),
            ("category", category.is_some()),
            ("licensePlate", license_plate.is_some()),
            ("branch", branch.is_some()),
            ("dailyRate", daily_rate.is_some()),
            ("transmission", self.transmission.is_some()),
        ] {
            if !present {
                missing.push(field);
            }
        }

        let (
            Some(make),
            Some(model),
            Some(category_id),
            Some(license_plate),
            Some(branch_id),
            Some(daily_rate),
            Some(transmission),
        ) = (
            make,
            model,
            category,
            license_plate,
            branch,
            daily_rate,
            self.transmission,
        )
        else {
            return Err(ValidationError::MissingFields(missing));
        };

        let draft = CarDraft {
            make,
            model,
            year: optional_i32(self.year, "year")?,
            category_id,
            license_plate,
            branch_id,
            daily_rate: daily_rate.to_f64("dailyRate")?,
            transmission,
            status: self.status.unwrap_or_default(),
            mileage: optional_i64(self.mileage, "mileage")?,
            engine_size: non_blank(self.engine_size),
            fuel_type: non_blank(self.fuel_type),
            doors: optional_i32(self.doors, "doors")?,
            seats: optional_i32(self.seats, "seats")?,
            features: clean_list(self.features.unwrap_or_default()),
            images: clean_list(self.images.unwrap_or_default()),
        };
        draft.validate()?;
        Ok(draft)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarPatch {
    pub make: Option<String>,
    pub model: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub year: Option<Option<Numeric>>,
    pub category: Option<String>,
    pub license_plate: Option<String>,
    pub branch: Option<String>,
    pub daily_rate: Option<Numeric>,
    pub transmission: Option<Transmission>,
    pub status: Option<CarStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub mileage: Option<Option<Numeric>>,
    #[serde(default, deserialize_with = "nullable")]
    pub engine_size: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub fuel_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub doors: Option<Option<Numeric>>,
    #[serde(default, deserialize_with = "nullable")]
    pub seats: Option<Option<Numeric>>,
    pub features: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

impl CarPatch {
    pub fn apply(self, draft: &mut CarDraft) -> Result<(), ValidationError> {
        replace_text(&mut draft.make, self.make, "make")?;
        replace_text(&mut draft.model, self.model, "model")?;
        replace_text(&mut draft.category_id, self.category, "category")?;
        replace_text(&mut draft.license_plate, self.license_plate, "licensePlate")?;
        replace_text(&mut draft.branch_id, self.branch, "branch")?;
        if let Some(year) = self.year {
            draft.year = optional_i32(year, "year")?;
        }
        if let Some(rate) = non_blank_numeric(self.daily_rate) {
            draft.daily_rate = rate.to_f64("dailyRate")?;
        }
        if let Some(transmission) = self.transmission {
            draft.transmission = transmission;
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(mileage) = self.mileage {
            draft.mileage = optional_i64(mileage, "mileage")?;
        }
        nullable_text(&mut draft.engine_size, self.engine_size);
        nullable_text(&mut draft.fuel_type, self.fuel_type);
        if let Some(doors) = self.doors {
            draft.doors = optional_i32(doors, "doors")?;
        }
        if let Some(seats) = self.seats {
            draft.seats = optional_i32(seats, "seats")?;
        }
        if let Some(features) = self.features {
            draft.features = clean_list(features);
        }
        if let Some(images) = self.images {
            draft.images = clean_list(images);
        }
        draft.validate()
    }

    /// Returns `true` when the patch points the car at a different category or branch.
    pub fn touches_references(&self) -> bool {
        self.category.is_some() || self.branch.is_some()
    }
}

// ---------------------------------------------------------------------------
// Users / staff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct UserDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub branch_id: Option<String>,
    pub status: UserStatus,
}

impl UserDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::Required("firstName"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::Required("lastName"));
        }
        if !is_valid_email(&self.email) {
            return Err(ValidationError::invalid("email", "must be a valid email address"));
        }
        if let Some(phone) = &self.phone_number {
            if !is_valid_phone_number(phone) {
                return Err(ValidationError::invalid(
                    "phoneNumber",
                    "must be in E.164 format",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStaffRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub branch: Option<String>,
}

impl NewStaffRequest {
    /// Splits the request into the validated user fields and the optional
    /// plaintext password. New staff members always start out active.
    pub fn into_draft(self) -> Result<(UserDraft, Option<String>), ValidationError> {
        let draft = UserDraft {
            first_name: require_text(self.first_name, "firstName")?,
            last_name: require_text(self.last_name, "lastName")?,
            email: require_text(self.email, "email")?.to_lowercase(),
            phone_number: non_blank(self.phone_number),
            branch_id: non_blank(self.branch),
            status: UserStatus::Active,
        };
        draft.validate()?;
        Ok((draft, self.password.filter(|p| !p.is_empty())))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub branch: Option<Option<String>>,
    pub status: Option<UserStatus>,
    pub password: Option<String>,
}

impl StaffPatch {
    /// Removes the plaintext password so it can be hashed before the patch is stored.
    pub fn take_password(&mut self) -> Option<String> {
        self.password.take().filter(|p| !p.is_empty())
    }

    pub fn apply(self, draft: &mut UserDraft) -> Result<(), ValidationError> {
        replace_text(&mut draft.first_name, self.first_name, "firstName")?;
        replace_text(&mut draft.last_name, self.last_name, "lastName")?;
        if let Some(email) = self.email {
            draft.email = require_text(Some(email), "email")?.to_lowercase();
        }
        nullable_text(&mut draft.phone_number, self.phone_number);
        nullable_text(&mut draft.branch_id, self.branch);
        if let Some(status) = self.status {
            draft.status = status;
        }
        draft.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn car_request(value: serde_json::Value) -> NewCarRequest {
        serde_json::from_value(value).expect("request decodes")
    }

    fn valid_car() -> serde_json::Value {
        json!({
            "make": "Toyota",
            "model": "Corolla",
            "year": 2022,
            "category": "cat-1",
            "licensePlate": "ABC-123",
            "branch": "br-1",
            "dailyRate": "45.5",
            "transmission": "automatic",
            "features": ["GPS", " ", "Bluetooth"]
        })
    }

    #[test]
    fn new_car_fills_defaults() {
        let draft = car_request(valid_car()).into_draft().expect("valid car");
        assert_eq!(draft.daily_rate, 45.5);
        assert_eq!(draft.status, CarStatus::Available);
        assert_eq!(draft.year, Some(2022));
        assert!(draft.images.is_empty());
        assert_eq!(draft.features, vec!["GPS", "Bluetooth"]);
    }

    #[test]
    fn new_car_reports_all_missing_fields() {
        let err = car_request(json!({ "make": "Toyota", "licensePlate": "  " }))
            .into_draft()
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");
        let ValidationError::MissingFields(fields) = err else {
            panic!("expected missing fields");
        };
        assert_eq!(
            fields,
            vec!["model", "category", "licensePlate", "branch", "dailyRate", "transmission"]
        );
    }

    #[test]
    fn new_car_rejects_bad_numbers() {
        let mut value = valid_car();
        value["dailyRate"] = json!(0);
        let err = car_request(value).into_draft().unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "dailyRate", .. }));

        let mut value = valid_car();
        value["year"] = json!(1700);
        let err = car_request(value).into_draft().unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "year", .. }));

        let mut value = valid_car();
        value["doors"] = json!("four");
        let err = car_request(value).into_draft().unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { field: "doors", .. }));
    }

    #[test]
    fn unknown_transmission_fails_to_decode() {
        let mut value = valid_car();
        value["transmission"] = json!("cvt");
        assert!(serde_json::from_value::<NewCarRequest>(value).is_err());
    }

    #[test]
    fn car_patch_distinguishes_null_from_absent() {
        let mut draft = car_request(valid_car()).into_draft().expect("valid car");
        draft.mileage = Some(1200);

        let patch: CarPatch =
            serde_json::from_value(json!({ "year": null, "status": "maintenance" })).unwrap();
        assert!(!patch.touches_references());
        patch.apply(&mut draft).expect("patch applies");
        assert_eq!(draft.year, None);
        assert_eq!(draft.mileage, Some(1200));
        assert_eq!(draft.status, CarStatus::Maintenance);
    }

    #[test]
    fn car_patch_runs_validators_on_merged_record() {
        let mut draft = car_request(valid_car()).into_draft().expect("valid car");
        let patch: CarPatch = serde_json::from_value(json!({ "dailyRate": -3 })).unwrap();
        assert!(patch.apply(&mut draft).is_err());

        let patch: CarPatch = serde_json::from_value(json!({ "make": "" })).unwrap();
        assert_eq!(
            patch.apply(&mut draft).unwrap_err(),
            ValidationError::Required("make")
        );
    }

    #[test]
    fn category_requires_name_and_non_negative_price() {
        let req: NewCategoryRequest =
            serde_json::from_value(json!({ "name": "Economy", "basePrice": 30 })).unwrap();
        let draft = req.into_draft().expect("valid");
        assert_eq!(draft.base_price, 30.0);

        let req: NewCategoryRequest =
            serde_json::from_value(json!({ "name": "Economy", "basePrice": -1 })).unwrap();
        assert!(req.into_draft().is_err());

        let req: NewCategoryRequest = serde_json::from_value(json!({ "basePrice": 10 })).unwrap();
        assert_eq!(req.into_draft().unwrap_err(), ValidationError::Required("name"));
    }

    #[test]
    fn category_patch_clears_description() {
        let mut draft = CategoryDraft {
            name: "SUV".into(),
            description: Some("Large".into()),
            base_price: 80.0,
        };
        let patch: CategoryPatch = serde_json::from_value(json!({ "description": null })).unwrap();
        patch.apply(&mut draft).expect("patch applies");
        assert_eq!(draft.description, None);
        assert_eq!(draft.name, "SUV");
    }

    fn branch_body() -> serde_json::Value {
        json!({
            "name": "Downtown",
            "address": "1 Main St",
            "city": "Springfield",
            "contactNumber": "+15550100",
            "email": "Downtown@Example.com",
        })
    }

    #[test]
    fn branch_accepts_flat_coordinates() {
        let mut body = branch_body();
        body["latitude"] = json!("40.7");
        body["longitude"] = json!(-74.0);
        let req: NewBranchRequest = serde_json::from_value(body).unwrap();
        let draft = req.into_draft().expect("valid branch");
        assert_eq!(draft.email, "downtown@example.com");
        assert_eq!(
            draft.coordinates,
            Some(Coordinates {
                latitude: 40.7,
                longitude: -74.0
            })
        );
    }

    #[test]
    fn branch_rejects_half_coordinates_and_bad_ranges() {
        let mut body = branch_body();
        body["latitude"] = json!(12);
        let req: NewBranchRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.into_draft().unwrap_err(), ValidationError::Required("longitude"));

        let mut body = branch_body();
        body["coordinates"] = json!({ "latitude": 91.0, "longitude": 0.0 });
        let req: NewBranchRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(
            req.into_draft().unwrap_err(),
            ValidationError::Invalid { field: "latitude", .. }
        ));
    }

    #[test]
    fn staff_request_normalises_and_validates() {
        let req: NewStaffRequest = serde_json::from_value(json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "email": " Jane@Example.com ",
            "phoneNumber": "+15550100",
            "branch": "",
            "password": "secret99"
        }))
        .unwrap();
        let (draft, password) = req.into_draft().expect("valid staff");
        assert_eq!(draft.email, "jane@example.com");
        assert_eq!(draft.branch_id, None);
        assert_eq!(draft.status, UserStatus::Active);
        assert_eq!(password.as_deref(), Some("secret99"));

        let req: NewStaffRequest = serde_json::from_value(json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "jane@example.com",
            "phoneNumber": "555-0100"
        }))
        .unwrap();
        assert!(matches!(
            req.into_draft().unwrap_err(),
            ValidationError::Invalid { field: "phoneNumber", .. }
        ));
    }

    #[test]
    fn staff_patch_can_clear_branch_and_extract_password() {
        let mut draft = UserDraft {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane@example.com".into(),
            phone_number: None,
            branch_id: Some("br-1".into()),
            status: UserStatus::Active,
        };
        let mut patch: StaffPatch = serde_json::from_value(json!({
            "branch": null,
            "status": "inactive",
            "password": "newpass1",
            "role": "admin"
        }))
        .unwrap();
        assert_eq!(patch.take_password().as_deref(), Some("newpass1"));
        patch.apply(&mut draft).expect("patch applies");
        assert_eq!(draft.branch_id, None);
        assert_eq!(draft.status, UserStatus::Inactive);
    }
}

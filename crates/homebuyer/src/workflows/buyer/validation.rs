//! Strict input schemas for each workflow operation.
//!
//! Form payloads arrive loosely typed (numbers may be sent as empty strings,
//! dates as free text). Everything is normalized here so the service only
//! ever sees typed values.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{OfferId, OfferStatus, SavedHomeId, TourId, TourStatus};

const MIN_ADDRESS_LEN: usize = 5;

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Numeric form input: either a JSON number or text (possibly empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormNumber {
    Number(f64),
    Text(String),
}

impl FormNumber {
    /// `Ok(None)` for blank input, `Err(())` for anything non-numeric.
    fn resolve(&self) -> Result<Option<Decimal>, ()> {
        match self {
            FormNumber::Number(value) if value.is_finite() => {
                Decimal::try_from(*value).map(|d| Some(d.normalize())).map_err(|_| ())
            }
            FormNumber::Number(_) => Err(()),
            FormNumber::Text(raw) if raw.trim().is_empty() => Ok(None),
            FormNumber::Text(raw) => Decimal::from_str(raw.trim())
                .map(|d| Some(d.normalize()))
                .map_err(|_| ()),
        }
    }
}

impl From<u32> for FormNumber {
    fn from(value: u32) -> Self {
        FormNumber::Number(f64::from(value))
    }
}

impl From<&str> for FormNumber {
    fn from(value: &str) -> Self {
        FormNumber::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SavedHomeForm {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub price: Option<FormNumber>,
    #[serde(default)]
    pub bedrooms: Option<FormNumber>,
    #[serde(default)]
    pub bathrooms: Option<FormNumber>,
    #[serde(default)]
    pub square_feet: Option<FormNumber>,
    #[serde(default)]
    pub listing_url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TourRequestForm {
    #[serde(default)]
    pub saved_home_id: String,
    #[serde(default)]
    pub requested_date: Option<String>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TourStatusForm {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OfferForm {
    #[serde(default)]
    pub saved_home_id: String,
    #[serde(default)]
    pub amount: Option<FormNumber>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OfferStatusForm {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Normalized saved-home attributes ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedHomeDetails {
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub price: Option<Decimal>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<Decimal>,
    pub square_feet: Option<u32>,
    pub listing_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TourRequest {
    pub saved_home_id: SavedHomeId,
    pub requested_date: Option<DateTime<Utc>>,
    pub availability: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TourStatusUpdate {
    pub tour_id: TourId,
    pub status: TourStatus,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferSubmission {
    pub saved_home_id: SavedHomeId,
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfferStatusUpdate {
    pub offer_id: OfferId,
    pub status: OfferStatus,
    pub notes: Option<String>,
}

pub fn saved_home(form: SavedHomeForm) -> Result<SavedHomeDetails, ValidationError> {
    let address = form.address.trim().to_string();
    if address.chars().count() < MIN_ADDRESS_LEN {
        return Err(ValidationError::new("address", "Address is required"));
    }

    let listing_url = match optional_text(form.listing_url) {
        Some(url) if !is_well_formed_url(&url) => {
            return Err(ValidationError::new(
                "listing_url",
                "Please enter a valid URL",
            ))
        }
        other => other,
    };

    Ok(SavedHomeDetails {
        address,
        city: optional_text(form.city),
        state: optional_text(form.state),
        zip_code: optional_text(form.zip_code),
        price: non_negative("price", form.price.as_ref())?,
        bedrooms: whole_number("bedrooms", form.bedrooms.as_ref())?,
        bathrooms: non_negative("bathrooms", form.bathrooms.as_ref())?,
        square_feet: whole_number("square_feet", form.square_feet.as_ref())?,
        listing_url,
        notes: optional_text(form.notes),
    })
}

pub fn tour_request(form: TourRequestForm) -> Result<TourRequest, ValidationError> {
    let saved_home_id = required_id("saved_home_id", &form.saved_home_id, "Property is required")?;
    let requested_date = optional_date("requested_date", form.requested_date)?;

    Ok(TourRequest {
        saved_home_id: SavedHomeId(saved_home_id),
        requested_date,
        availability: optional_text(form.availability),
        notes: optional_text(form.notes),
    })
}

pub fn tour_status(tour_id: &str, form: TourStatusForm) -> Result<TourStatusUpdate, ValidationError> {
    let tour_id = required_id("tour_id", tour_id, "Tour ID is required")?;
    let status = TourStatus::parse(&form.status).ok_or_else(|| {
        ValidationError::new(
            "status",
            format!("Unknown tour status '{}'", form.status.trim()),
        )
    })?;

    Ok(TourStatusUpdate {
        tour_id: TourId(tour_id),
        status,
        scheduled_date: optional_date("scheduled_date", form.scheduled_date)?,
        notes: optional_text(form.notes),
    })
}

pub fn offer(form: OfferForm) -> Result<OfferSubmission, ValidationError> {
    let saved_home_id = required_id("saved_home_id", &form.saved_home_id, "Property is required")?;

    let amount = form
        .amount
        .as_ref()
        .map(FormNumber::resolve)
        .transpose()
        .ok()
        .flatten()
        .flatten()
        .ok_or_else(|| ValidationError::new("amount", "Offer amount is required"))?;

    if amount < Decimal::ONE {
        return Err(ValidationError::new(
            "amount",
            "Offer amount must be at least $1",
        ));
    }

    Ok(OfferSubmission {
        saved_home_id: SavedHomeId(saved_home_id),
        amount,
        notes: optional_text(form.notes),
    })
}

pub fn offer_status(
    offer_id: &str,
    form: OfferStatusForm,
) -> Result<OfferStatusUpdate, ValidationError> {
    let offer_id = required_id("offer_id", offer_id, "Offer ID is required")?;
    let status = OfferStatus::parse(&form.status).ok_or_else(|| {
        ValidationError::new(
            "status",
            format!("Unknown offer status '{}'", form.status.trim()),
        )
    })?;

    Ok(OfferStatusUpdate {
        offer_id: OfferId(offer_id),
        status,
        notes: optional_text(form.notes),
    })
}

fn required_id(field: &'static str, raw: &str, message: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, message));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn non_negative(
    field: &'static str,
    value: Option<&FormNumber>,
) -> Result<Option<Decimal>, ValidationError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let resolved = value
        .resolve()
        .map_err(|()| ValidationError::new(field, format!("{field} must be a number")))?;

    match resolved {
        Some(number) if number.is_sign_negative() && !number.is_zero() => Err(
            ValidationError::new(field, format!("{field} must be zero or greater")),
        ),
        other => Ok(other),
    }
}

fn whole_number(
    field: &'static str,
    value: Option<&FormNumber>,
) -> Result<Option<u32>, ValidationError> {
    match non_negative(field, value)? {
        None => Ok(None),
        Some(number) if number.fract().is_zero() => number
            .to_u32()
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, format!("{field} is too large"))),
        Some(_) => Err(ValidationError::new(
            field,
            format!("{field} must be a whole number"),
        )),
    }
}

/// Accepts RFC 3339 timestamps, `datetime-local` values, and plain dates (midnight UTC).
fn optional_date(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let Some(raw) = optional_text(value) else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&raw, format) {
            return Ok(Some(parsed.and_utc()));
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(midnight.and_utc()));
    }

    Err(ValidationError::new(field, "Please enter a valid date"))
}

/// `scheme://host[...]` with no whitespace.
fn is_well_formed_url(raw: &str) -> bool {
    if raw.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((scheme, rest)) = raw.split_once("://") else {
        return false;
    };

    let scheme_ok = scheme
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('@')
        .next()
        .unwrap_or_default();

    scheme_ok && !host.is_empty() && !host.starts_with(':')
}

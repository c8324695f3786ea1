//! Data models for the Kobo forms pipeline.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::dates::parse_timestamp;
use crate::error::ApiError;

// ---

/// Keys the normalizer adds on top of the form's own labels.
const RESERVED_KEYS: [&str; 4] = ["date", "lat", "lon", "status"];

/// Which source fields of a form carry the date, geometry and measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFields {
    // ---
    pub name: String,
    pub datetime: String,
    pub geom: String,
    pub measure: String,
    pub filters: HashMap<String, String>,
}

/// One submission exactly as the Kobo data endpoint returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Map<String, Value>);

/// Value of one form label after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LabelValue {
    /// Copied verbatim; `None` for unanswered questions.
    Text(Option<String>),
    /// The measure field.
    Integer(i64),
}

/// Form labels in survey order.
pub type LabelValues = Vec<(String, LabelValue)>;

/// A submission reshaped for the frontend, still carrying its full timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    // ---
    /// Every form label except the geometry and datetime fields.
    pub fields: LabelValues,
    pub date: DateTime<Utc>,
    pub lat: String,
    pub lon: String,
    pub status: Option<String>,
}

/// Borrowed view of one record field, used for type-sensitive filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
    Instant(DateTime<Utc>),
    Null,
}

/// Output row: a normalized record with its date reduced to a calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct FormResponse {
    pub fields: LabelValues,
    pub date: NaiveDate,
    pub lat: String,
    pub lon: String,
    pub status: Option<String>,
}

impl RawRecord {
    // ---
    fn require(&self, key: &str) -> Result<&Value, ApiError> {
        self.0
            .get(key)
            .ok_or_else(|| ApiError::Data(format!("submission is missing field '{key}'")))
    }

    fn require_str(&self, key: &str) -> Result<&str, ApiError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| ApiError::Data(format!("field '{key}' is not a string")))
    }

    /// `_validation_status.label`, absent when either level is missing.
    pub fn validation_label(&self) -> Option<String> {
        self.0
            .get("_validation_status")
            .and_then(Value::as_object)
            .and_then(|status| status.get("label"))
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    /// Convert into a [`NormalizedRecord`] according to `form` and `labels`.
    ///
    /// The measure is only coerced when the form lists it among its labels.
    /// Any parse failure is returned as [`ApiError::Data`]; callers treat it
    /// as fatal for the whole batch.
    pub fn normalize(&self, form: &FormFields, labels: &[String]) -> Result<NormalizedRecord, ApiError> {
        // ---
        let raw_date = self.require_str(&form.datetime)?;
        let date = parse_timestamp(raw_date).ok_or_else(|| {
            ApiError::Data(format!(
                "field '{}' has unparseable date '{}'",
                form.datetime, raw_date
            ))
        })?;

        let raw_geom = self.require_str(&form.geom)?;
        let (lat, lon) = split_geometry(raw_geom).ok_or_else(|| {
            ApiError::Data(format!(
                "field '{}' has malformed geometry '{}'",
                form.geom, raw_geom
            ))
        })?;

        let mut fields: LabelValues = Vec::with_capacity(labels.len());
        for label in labels {
            if *label == form.geom
                || *label == form.datetime
                || RESERVED_KEYS.contains(&label.as_str())
                || fields.iter().any(|(seen, _)| seen == label)
            {
                continue;
            }
            let value = if *label == form.measure {
                LabelValue::Integer(parse_measure(self.require(label)?, label)?)
            } else {
                LabelValue::Text(self.0.get(label).and_then(value_as_text))
            };
            fields.push((label.clone(), value));
        }

        Ok(NormalizedRecord {
            fields,
            date,
            lat,
            lon,
            status: self.validation_label(),
        })
    }
}

fn parse_measure(value: &Value, key: &str) -> Result<i64, ApiError> {
    // ---
    let parsed = match value {
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::Data(format!("field '{key}' is not an integer: {value}")))
}

/// First two whitespace-separated tokens of a Kobo geopoint
/// (`"lat lon altitude accuracy"`).
fn split_geometry(raw: &str) -> Option<(String, String)> {
    let mut tokens = raw.split_whitespace();
    let lat = tokens.next()?;
    let lon = tokens.next()?;
    Some((lat.to_string(), lon.to_string()))
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl NormalizedRecord {
    /// Value of a form label, if the form has it.
    pub fn label(&self, key: &str) -> Option<&LabelValue> {
        self.fields
            .iter()
            .find(|(label, _)| label == key)
            .map(|(_, value)| value)
    }

    /// Look up a field by its output key.
    pub fn field(&self, key: &str) -> Option<FieldValue<'_>> {
        // ---
        match key {
            "date" => Some(FieldValue::Instant(self.date)),
            "lat" => Some(FieldValue::Text(&self.lat)),
            "lon" => Some(FieldValue::Text(&self.lon)),
            "status" => Some(
                self.status
                    .as_deref()
                    .map_or(FieldValue::Null, FieldValue::Text),
            ),
            k => self.label(k).map(|value| match value {
                LabelValue::Text(text) => text.as_deref().map_or(FieldValue::Null, FieldValue::Text),
                LabelValue::Integer(n) => FieldValue::Integer(*n),
            }),
        }
    }

    pub fn into_response(self) -> FormResponse {
        FormResponse {
            fields: self.fields,
            date: self.date.date_naive(),
            lat: self.lat,
            lon: self.lon,
            status: self.status,
        }
    }
}

impl Serialize for FormResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // ---
        let mut map = serializer.serialize_map(Some(self.fields.len() + 4))?;
        for (label, value) in &self.fields {
            map.serialize_entry(label, value)?;
        }
        map.serialize_entry("date", &self.date.format("%Y-%m-%d").to_string())?;
        map.serialize_entry("lat", &self.lat)?;
        map.serialize_entry("lon", &self.lon)?;
        map.serialize_entry("status", &self.status)?;
        map.end()
    }
}

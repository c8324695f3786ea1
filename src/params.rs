//! Query-string collection for `GET /kobo/forms`.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ApiError;
use crate::models::FormFields;

// ---

/// Raw query parameters. Everything is optional here so that a missing value
/// produces our own error message instead of axum's generic rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormsQuery {
    pub form_name: Option<String>,
    pub datetime_field: Option<String>,
    pub geom_field: Option<String>,
    pub measure_field: Option<String>,
    pub filters: Option<String>,
    pub kobo_url: Option<String>,
    pub begin_date_time: Option<String>,
    pub end_date_time: Option<String>,
}

fn required(value: &Option<String>, name: &str) -> Result<String, ApiError> {
    value.clone().ok_or_else(|| ApiError::missing_param(name))
}

impl FormsQuery {
    /// Build the [`FormFields`] for this request.
    pub fn form_fields(&self) -> Result<FormFields, ApiError> {
        // ---
        let name = required(&self.form_name, "formName")?;
        let datetime = required(&self.datetime_field, "datetimeField")?;
        let geom = required(&self.geom_field, "geomField")?;
        let measure = required(&self.measure_field, "measureField")?;
        let filters = parse_filters(&required(&self.filters, "filters")?)?;

        Ok(FormFields {
            name,
            datetime,
            geom,
            measure,
            filters,
        })
    }

    pub fn kobo_url(&self) -> Result<&str, ApiError> {
        self.kobo_url
            .as_deref()
            .ok_or_else(|| ApiError::missing_param("koboUrl"))
    }
}

/// Parse `"a=1,b=2"` into `{"a": "1", "b": "2"}`.
///
/// Each entry must contain exactly one `=`. Later duplicates replace earlier
/// ones. An empty string yields no filters.
pub fn parse_filters(raw: &str) -> Result<HashMap<String, String>, ApiError> {
    // ---
    if raw.is_empty() {
        return Ok(HashMap::new());
    }

    raw.split(',')
        .map(|entry| {
            let mut parts = entry.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => Ok((key.to_string(), value.to_string())),
                _ => Err(ApiError::BadRequest(format!(
                    "Malformed filter '{entry}': expected key=value"
                ))),
            }
        })
        .collect()
}

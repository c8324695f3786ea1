use axum::{
    extract::rejection::QueryRejection, extract::Query, extract::State, routing::get, Json,
    Router,
};
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    config, filter_and_sort, kobo, ApiError, DateWindow, FormResponse, FormsQuery,
    NormalizedRecord,
};

// ---

pub fn router() -> Router<reqwest::Client> {
    // ---
    Router::new().route("/kobo/forms", get(handler))
}

async fn handler(
    params: Result<Query<FormsQuery>, QueryRejection>,
    State(client): State<reqwest::Client>,
) -> Result<Json<Vec<FormResponse>>, ApiError> {
    // ---
    info!("GET /kobo/forms - Starting pipeline");

    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    // Step 1: Collect credentials and parameters
    debug!("GET /kobo/forms - Step 1");

    let credentials = config::load_credentials()?;
    let form_fields = params.form_fields()?;
    let window = DateWindow::from_params(
        params.begin_date_time.as_deref(),
        params.end_date_time.as_deref(),
        Utc::now(),
    )?;
    let listing_url = params.kobo_url()?;

    // Step 2: Fetch from Kobo
    debug!("GET /kobo/forms - Step 2");

    let submissions =
        kobo::fetch_form_submissions(&client, &credentials, listing_url, &form_fields.name)
            .await?;

    // Step 3: Normalize, failing the batch on the first bad submission
    debug!("GET /kobo/forms - Step 3");

    let records = submissions
        .records
        .iter()
        .map(|raw| raw.normalize(&form_fields, &submissions.labels))
        .collect::<Result<Vec<NormalizedRecord>, ApiError>>()?;

    // Step 4: Filter and sort
    debug!("GET /kobo/forms - Step 4");

    let total = records.len();
    let responses = filter_and_sort(records, &window, &form_fields.filters);
    info!(
        "Pipeline complete, returning {} of {} submissions for form '{}'",
        responses.len(),
        total,
        form_fields.name
    );

    Ok(Json(responses))
}

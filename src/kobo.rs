//! KoboToolbox API client.
//!
//! Resolving a form's submissions takes three sequential calls, each needing
//! a URL returned by the previous one:
//! 1. the asset listing (`koboUrl`) to find the form by name,
//! 2. the asset detail to read the survey's field labels,
//! 3. the asset's data endpoint to read the submissions.
//!
//! Any failure aborts the whole request; there is no retry.

use reqwest::header::ACCEPT;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, info};

use crate::config::Credentials;
use crate::error::ApiError;
use crate::models::RawRecord;

// ---

/// Asset listing (`/api/v2/assets/`).
#[derive(Debug, Deserialize)]
struct AssetList {
    results: Vec<AssetSummary>,
}

#[derive(Debug, Deserialize)]
struct AssetSummary {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Asset detail (`/api/v2/assets/<uid>/`).
#[derive(Debug, Deserialize)]
struct AssetDetail {
    content: AssetContent,
    data: String,
}

#[derive(Debug, Deserialize)]
struct AssetContent {
    survey: Vec<SurveyQuestion>,
}

#[derive(Debug, Deserialize)]
struct SurveyQuestion {
    #[serde(rename = "$autoname", default)]
    autoname: Option<String>,
}

/// Submissions (`/api/v2/assets/<uid>/data/`).
#[derive(Debug, Deserialize)]
struct SubmissionList {
    results: Vec<RawRecord>,
}

/// Submissions of a form together with its ordered field labels.
#[derive(Debug)]
pub struct FormSubmissions {
    pub records: Vec<RawRecord>,
    pub labels: Vec<String>,
}

/// Fetch every submission of `form_name` starting from the asset listing at
/// `listing_url`.
pub async fn fetch_form_submissions(
    client: &reqwest::Client,
    credentials: &Credentials,
    listing_url: &str,
    form_name: &str,
) -> Result<FormSubmissions, ApiError> {
    // ---
    debug!("Fetching Kobo asset listing from: {}", listing_url);
    let listing: AssetList = get_json(client, credentials, listing_url).await?;

    let asset = listing
        .results
        .into_iter()
        .find(|a| a.name.as_deref() == Some(form_name))
        .ok_or_else(|| ApiError::NotFound("Form not found".to_string()))?;

    let asset_url = asset.url.ok_or_else(|| {
        ApiError::Upstream(format!("asset '{form_name}' has no url in the listing"))
    })?;

    debug!("Fetching form metadata from: {}", asset_url);
    let detail: AssetDetail = get_json(client, credentials, &asset_url).await?;

    let labels: Vec<String> = detail
        .content
        .survey
        .into_iter()
        .filter_map(|q| q.autoname)
        .collect();

    debug!("Fetching form submissions from: {}", detail.data);
    let submissions: SubmissionList = get_json(client, credentials, &detail.data).await?;

    info!(
        "Fetched {} submissions and {} labels for form '{}'",
        submissions.results.len(),
        labels.len(),
        form_name
    );

    Ok(FormSubmissions {
        records: submissions.results,
        labels,
    })
}

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    credentials: &Credentials,
    url: &str,
) -> Result<T, ApiError> {
    // ---
    let response = client
        .get(url)
        .basic_auth(&credentials.username, Some(&credentials.password))
        .header(ACCEPT, "application/json")
        .send()
        .await?
        .error_for_status()?;

    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use serde_json::json;

    #[derive(Clone)]
    struct MockKobo {
        base: String,
        hits: Arc<AtomicUsize>,
        listing_status: StatusCode,
        data_status: StatusCode,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Basic "))
    }

    async fn listing(State(mock): State<MockKobo>, headers: HeaderMap) -> impl IntoResponse {
        // ---
        mock.hits.fetch_add(1, Ordering::SeqCst);
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if !mock.listing_status.is_success() {
            return mock.listing_status.into_response();
        }
        Json(json!({
            "count": 2,
            "results": [
                {"name": "other-form", "url": format!("{}/api/v2/assets/zzz/", mock.base)},
                {"name": "flood-survey", "url": format!("{}/api/v2/assets/abc/", mock.base)}
            ]
        }))
        .into_response()
    }

    async fn detail(State(mock): State<MockKobo>) -> impl IntoResponse {
        // ---
        mock.hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "name": "flood-survey",
            "content": {
                "survey": [
                    {"type": "start", "$autoname": "ts"},
                    {"type": "geopoint", "$autoname": "geo"},
                    {"type": "integer", "$autoname": "qty"},
                    {"type": "note"},
                    {"type": "text", "$autoname": "district"}
                ]
            },
            "data": format!("{}/api/v2/assets/abc/data/", mock.base)
        }))
    }

    async fn data(State(mock): State<MockKobo>) -> impl IntoResponse {
        // ---
        mock.hits.fetch_add(1, Ordering::SeqCst);
        if !mock.data_status.is_success() {
            return mock.data_status.into_response();
        }
        Json(json!({
            "count": 1,
            "results": [{
                "ts": "2023-05-01T10:00:00Z",
                "geo": "1.23 4.56 0 0",
                "qty": "7",
                "district": "Kampot",
                "_validation_status": {"label": "approved"}
            }]
        }))
        .into_response()
    }

    async fn spawn_mock(
        listing_status: StatusCode,
        data_status: StatusCode,
    ) -> (MockKobo, String) {
        // ---
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let mock = MockKobo {
            base: base.clone(),
            hits: Arc::new(AtomicUsize::new(0)),
            listing_status,
            data_status,
        };

        let app = Router::new()
            .route("/api/v2/assets/", get(listing))
            .route("/api/v2/assets/abc/", get(detail))
            .route("/api/v2/assets/abc/data/", get(data))
            .with_state(mock.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (mock, format!("{base}/api/v2/assets/"))
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "enumerator".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetches_labels_and_records() {
        // ---
        let (mock, listing_url) = spawn_mock(StatusCode::OK, StatusCode::OK).await;
        let client = reqwest::Client::new();

        let result = fetch_form_submissions(&client, &credentials(), &listing_url, "flood-survey")
            .await
            .unwrap();

        assert_eq!(result.labels, vec!["ts", "geo", "qty", "district"]);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].0["district"], "Kampot");
        assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_form_is_not_found_after_one_call() {
        // ---
        let (mock, listing_url) = spawn_mock(StatusCode::OK, StatusCode::OK).await;
        let client = reqwest::Client::new();

        let err = fetch_form_submissions(&client, &credentials(), &listing_url, "missing")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listing_server_error_is_upstream() {
        // ---
        let (mock, listing_url) = spawn_mock(StatusCode::INTERNAL_SERVER_ERROR, StatusCode::OK).await;
        let client = reqwest::Client::new();

        let err = fetch_form_submissions(&client, &credentials(), &listing_url, "flood-survey")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Upstream(_)));
        assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broken_asset_url_is_upstream() {
        // ---
        // "other-form" points at a route the mock does not serve.
        let (_mock, listing_url) = spawn_mock(StatusCode::OK, StatusCode::OK).await;
        let client = reqwest::Client::new();

        let err = fetch_form_submissions(&client, &credentials(), &listing_url, "other-form")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_data_endpoint_server_error_is_upstream() {
        // ---
        let (mock, listing_url) =
            spawn_mock(StatusCode::OK, StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = reqwest::Client::new();

        let err = fetch_form_submissions(&client, &credentials(), &listing_url, "flood-survey")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Upstream(_)));
        assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
    }
}

use axum::Router;

mod forms;
mod health;

// ---

pub fn router(client: reqwest::Client) -> Router {
    // ---
    Router::new()
        .merge(forms::router())
        .merge(health::router())
        .with_state(client)
}

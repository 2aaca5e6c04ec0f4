use axum::{Router, routing::get};

use crate::models::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(landing))
}

pub async fn landing() -> &'static str {
    "Hospital scheduling service. POST /appointment, POST /surgery, POST /surgery/{hospitalization_id}."
}

use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod home_routes;
pub mod surgery_routes;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(home_routes::router())
        .merge(auth_routes::router())
        .merge(appointment_routes::router())
        .merge(surgery_routes::router());

    Router::new().nest("/dbproj", api).with_state(state)
}

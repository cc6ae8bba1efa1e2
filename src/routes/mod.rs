use axum::{
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod extract;
pub mod fields;
mod health;
pub mod times;
pub mod todos;

pub use health::health;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    let api_router = Router::new()
        .route(
            "/todos/",
            get(todos::routes::list).post(todos::routes::create),
        )
        .route("/todos/notify/", get(todos::routes::notify))
        .route(
            "/todos/{id}/",
            get(todos::routes::get)
                .put(todos::routes::update)
                .delete(todos::routes::delete),
        )
        .route(
            "/times/",
            get(times::routes::list).post(times::routes::create),
        )
        .route(
            "/times/{id}/",
            get(times::routes::get)
                .put(times::routes::update)
                .delete(times::routes::delete),
        )
        .route(
            "/times/by-todo/{fpk}/",
            get(times::routes::list_by_todo).delete(times::routes::delete_by_todo),
        );

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api_router)
}

/// The full service: routes, shared state and the HTTP layers.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "Welcome to the todo API written in Rust"
}

//! The HTTP/WS control surface. Module split follows
//! `orchestrator::api`'s `{models, handlers, routes, ws}` shape,
//! narrowed to the one resource (`workflows`) this system exposes.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod ws;

pub use routes::create_router;
pub use state::AppState;

pub mod handlers;
pub mod routes;
pub mod webhook;

pub use routes::create_router;

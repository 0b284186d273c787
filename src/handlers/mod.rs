pub mod health_handlers;
pub mod submit_handlers;

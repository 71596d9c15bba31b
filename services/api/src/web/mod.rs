pub mod rest;
pub mod state;

pub use rest::{assist_handler, generate_content_handler, health_handler, router};

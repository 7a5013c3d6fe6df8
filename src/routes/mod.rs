//! HTTP routes for Madang

pub mod api;
pub mod health;
pub mod response;

pub use api::handle_api_request;
pub use health::{health_check, readiness_check};
pub use response::{error_response, json_response};

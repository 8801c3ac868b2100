mod auth_api_http;
mod donation_api_http;
mod partner_status_api_http;
mod transport_reqwest;

pub use auth_api_http::*;
pub use donation_api_http::*;
pub use partner_status_api_http::*;
pub use transport_reqwest::*;

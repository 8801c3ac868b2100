// store

mod credential_store;
mod payment_record_source;

pub use credential_store::*;
pub use payment_record_source::*;

// remote

mod http_transport;
mod remote_api;

pub use http_transport::*;
pub use remote_api::*;

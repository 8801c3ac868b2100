mod auth_session_manager;
pub mod local_fallback;
mod payment_ledger;
mod rate_limiter;
mod request_gateway;
mod status_check_coordinator;
mod status_check_offline;
mod ttl_cache;

pub use auth_session_manager::*;
pub use payment_ledger::*;
pub use rate_limiter::*;
pub use request_gateway::*;
pub use status_check_coordinator::*;
pub use status_check_offline::*;
pub use ttl_cache::*;

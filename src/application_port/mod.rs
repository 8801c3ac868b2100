mod auth_session;
mod gateway;
mod status_check;

pub use auth_session::*;
pub use gateway::*;
pub use status_check::*;

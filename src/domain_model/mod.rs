mod credential;
mod payment;
mod scope;
mod user;

pub use credential::*;
pub use payment::*;
pub use scope::*;
pub use user::*;

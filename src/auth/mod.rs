pub mod accounts;
pub mod authentication;
pub mod password;
pub mod session;

pub use accounts::*;
pub use authentication::*;
pub use session::*;

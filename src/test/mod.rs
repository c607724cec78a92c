mod accounts;
mod config;
pub mod utils;

pub use utils::test_utils;

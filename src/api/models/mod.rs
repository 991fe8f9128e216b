pub mod admin;
pub mod system;
pub mod user_data;

pub use admin::*;
pub use system::*;
pub use user_data::*;

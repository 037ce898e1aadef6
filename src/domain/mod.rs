pub mod models;
pub mod window;

pub use models::*;
pub use window::{parse_date, DateWindow};

pub mod connection;
pub mod history;
pub mod matches;
pub mod models;
pub mod ratings;
pub mod setup;

pub use connection::{create_memory_pool, create_pool, get_connection, DbConn, DbPool};
pub use models::*;
pub use setup::{init_database, reset_database};

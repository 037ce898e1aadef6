pub mod handlers;
pub mod models;
pub mod parsers;
pub mod routes;

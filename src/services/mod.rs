pub mod engine;
pub mod history;
pub mod leaderboard;
pub mod processing;
pub mod recalculation;
pub mod server;
pub mod smart_score;

pub use engine::RatingEngine;

pub mod settings;

pub use settings::{AppConfig, EloSettings, ServerSettings, SmartScoreSettings};

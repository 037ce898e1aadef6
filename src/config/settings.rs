/// Elo constants shared by the outcome evaluator and the rating engine
#[derive(Debug, Clone, PartialEq)]
pub struct EloSettings {
    pub default_rating: i32,
    pub rating_floor: i32,
    pub k_factor: f64,
    pub k_factor_new: f64,
    pub k_factor_high: f64,
    /// Entities with fewer ledger entries than this use `k_factor_new`
    pub new_entity_games: usize,
    /// Ratings strictly above this use `k_factor_high`
    pub high_rating_threshold: i32,
    pub win_multiplier: f64,
    pub win_penalty_multiplier: f64,
    pub draw_multiplier: f64,
    pub goal_bonus_threshold: i32,
    pub goal_bonus: i32,
}

impl Default for EloSettings {
    fn default() -> Self {
        Self {
            default_rating: 1200,
            rating_floor: 100,
            k_factor: 32.0,
            k_factor_new: 40.0,
            k_factor_high: 24.0,
            new_entity_games: 10,
            high_rating_threshold: 2000,
            win_multiplier: 1.0,
            win_penalty_multiplier: 0.7, // a shoot-out win is worth less
            draw_multiplier: 0.5,
            goal_bonus_threshold: 3,
            goal_bonus: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmartScoreSettings {
    pub rating_weight: f64,
    pub consistency_weight: f64,
    pub winrate_weight: f64,
    pub activity_weight: f64,
    pub player_activity_cap: usize,
    pub pair_activity_cap: usize,
    pub consistency_default: f64,
    pub consistency_min: f64,
    pub consistency_max: f64,
}

impl Default for SmartScoreSettings {
    fn default() -> Self {
        Self {
            rating_weight: 0.35,
            consistency_weight: 0.20,
            winrate_weight: 0.35,
            activity_weight: 0.10,
            player_activity_cap: 20,
            pair_activity_cap: 15,
            consistency_default: 50.0,
            consistency_min: 30.0,
            consistency_max: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub database_path: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 1000,
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "elo_ranking.db".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub elo: EloSettings,
    pub smart: SmartScoreSettings,
    pub server: ServerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            elo: EloSettings::default(),
            smart: SmartScoreSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

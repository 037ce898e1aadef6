pub mod elo;
pub mod outcome;
pub mod types;

pub use elo::{expected_score, k_factor, new_rating, team_rating, RatingDelta};
pub use outcome::{evaluate, MatchOutcome, OutcomeKind};
pub use types::{
    Entity, MatchId, MatchKind, MatchResult, PairIdentity, PenaltyResult, PlayerId, RatingType,
    RatingValue, Team,
};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{RatingError, Result};

pub type PlayerId = i64;
pub type MatchId = i64;
pub type RatingValue = i32;

/// Two distinct players, stored lower id first so both orders share one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairIdentity {
    low: PlayerId,
    high: PlayerId,
}

impl PairIdentity {
    pub fn new(first: PlayerId, second: PlayerId) -> Result<Self> {
        if first == second {
            return Err(RatingError::InvalidMatchShape(format!(
                "pair needs two distinct players, got {} twice",
                first
            )));
        }
        Ok(Self {
            low: first.min(second),
            high: first.max(second),
        })
    }

    pub fn low(&self) -> PlayerId {
        self.low
    }

    pub fn high(&self) -> PlayerId {
        self.high
    }

    pub fn members(&self) -> [PlayerId; 2] {
        [self.low, self.high]
    }
}

/// Anything that owns a rating: a single player or a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Entity {
    Player(PlayerId),
    Pair(PairIdentity),
}

impl Entity {
    pub fn pair(first: PlayerId, second: PlayerId) -> Result<Self> {
        PairIdentity::new(first, second).map(Entity::Pair)
    }

    /// Rebuilds an entity from its stored columns
    pub fn from_columns(player_id: PlayerId, partner_id: Option<PlayerId>) -> Result<Self> {
        match partner_id {
            Some(partner) => Entity::pair(player_id, partner),
            None => Ok(Entity::Player(player_id)),
        }
    }

    /// Primary player column: the player, or the lower pair member
    pub fn player_id(&self) -> PlayerId {
        match self {
            Entity::Player(id) => *id,
            Entity::Pair(pair) => pair.low(),
        }
    }

    pub fn partner_id(&self) -> Option<PlayerId> {
        match self {
            Entity::Player(_) => None,
            Entity::Pair(pair) => Some(pair.high()),
        }
    }

    pub fn members(&self) -> Vec<PlayerId> {
        match self {
            Entity::Player(id) => vec![*id],
            Entity::Pair(pair) => pair.members().to_vec(),
        }
    }

    /// Canonical key used as the storage primary key
    pub fn key(&self) -> String {
        match self {
            Entity::Player(id) => format!("p:{}", id),
            Entity::Pair(pair) => format!("pair:{}-{}", pair.low(), pair.high()),
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Entity::Pair(_))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Player(id) => write!(f, "player {}", id),
            Entity::Pair(pair) => write!(f, "pair {}&{}", pair.low(), pair.high()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatingType {
    #[serde(rename = "global")]
    Global,
    #[serde(rename = "1v1")]
    OneVsOne,
    #[serde(rename = "2v2")]
    TwoVsTwo,
    #[serde(rename = "pair")]
    Pair,
}

impl RatingType {
    pub const INDIVIDUAL: [RatingType; 3] =
        [RatingType::Global, RatingType::OneVsOne, RatingType::TwoVsTwo];

    pub fn as_str(&self) -> &'static str {
        match self {
            RatingType::Global => "global",
            RatingType::OneVsOne => "1v1",
            RatingType::TwoVsTwo => "2v2",
            RatingType::Pair => "pair",
        }
    }

    pub fn for_kind(kind: MatchKind) -> Self {
        match kind {
            MatchKind::OneVsOne => RatingType::OneVsOne,
            MatchKind::TwoVsTwo => RatingType::TwoVsTwo,
        }
    }

    pub fn applies_to(&self, entity: &Entity) -> bool {
        matches!(self, RatingType::Pair) == entity.is_pair()
    }

    pub fn ensure_applies_to(&self, entity: &Entity) -> Result<()> {
        if self.applies_to(entity) {
            Ok(())
        } else {
            Err(RatingError::InvalidRatingType(format!(
                "{} rating does not apply to {}",
                self.as_str(),
                entity
            )))
        }
    }
}

impl FromStr for RatingType {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self> {
        // "v1"/"v2" are the legacy enum names still found in older rows
        match s {
            "global" => Ok(RatingType::Global),
            "1v1" | "v1" => Ok(RatingType::OneVsOne),
            "2v2" | "v2" => Ok(RatingType::TwoVsTwo),
            "pair" => Ok(RatingType::Pair),
            other => Err(RatingError::InvalidRatingType(other.to_string())),
        }
    }
}

impl fmt::Display for RatingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    #[serde(rename = "1v1")]
    OneVsOne,
    #[serde(rename = "2v2")]
    TwoVsTwo,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::OneVsOne => "1v1",
            MatchKind::TwoVsTwo => "2v2",
        }
    }

    pub fn team_size(&self) -> usize {
        match self {
            MatchKind::OneVsOne => 1,
            MatchKind::TwoVsTwo => 2,
        }
    }
}

impl FromStr for MatchKind {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1v1" | "v1" => Ok(MatchKind::OneVsOne),
            "2v2" | "v2" => Ok(MatchKind::TwoVsTwo),
            other => Err(RatingError::InvalidMatchShape(format!(
                "unknown match kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub fn as_str(&self) -> &'static str {
        match self {
            Team::A => "A",
            Team::B => "B",
        }
    }
}

impl FromStr for Team {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(Team::A),
            "B" => Ok(Team::B),
            other => Err(RatingError::InvalidMatchShape(format!(
                "unknown team '{}'",
                other
            ))),
        }
    }
}

/// Ledger classification of one side's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Loss,
    Draw,
}

impl MatchResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchResult::Win => "win",
            MatchResult::Loss => "loss",
            MatchResult::Draw => "draw",
        }
    }
}

impl FromStr for MatchResult {
    type Err = RatingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "win" => Ok(MatchResult::Win),
            "loss" => Ok(MatchResult::Loss),
            "draw" => Ok(MatchResult::Draw),
            other => Err(RatingError::TransientStore(format!(
                "unknown result '{}' in ledger",
                other
            ))),
        }
    }
}

/// Shoot-out outcome for one side, stored as -1 / 0 / 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenaltyResult {
    Lost,
    NotApplicable,
    Won,
}

impl PenaltyResult {
    pub fn as_i32(&self) -> i32 {
        match self {
            PenaltyResult::Lost => -1,
            PenaltyResult::NotApplicable => 0,
            PenaltyResult::Won => 1,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value.signum() {
            1 => PenaltyResult::Won,
            -1 => PenaltyResult::Lost,
            _ => PenaltyResult::NotApplicable,
        }
    }
}

use crate::config::settings::EloSettings;
use crate::domain::MatchOutcomeInput;

use super::types::{MatchResult, PenaltyResult, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Win,
    Draw,
    Penalty,
}

/// Actual scores and goal bonuses for both sides of one match
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOutcome {
    pub team_a_score: f64,
    pub team_b_score: f64,
    pub kind: OutcomeKind,
    pub team_a_bonus: i32,
    pub team_b_bonus: i32,
    /// Side that won, outright or on penalties
    pub winner: Option<Team>,
}

impl MatchOutcome {
    pub fn score_for(&self, team: Team) -> f64 {
        match team {
            Team::A => self.team_a_score,
            Team::B => self.team_b_score,
        }
    }

    pub fn bonus_for(&self, team: Team) -> i32 {
        match team {
            Team::A => self.team_a_bonus,
            Team::B => self.team_b_bonus,
        }
    }

    /// Ledger result for one side; shoot-outs count as win/loss, never draw
    pub fn result_for(&self, team: Team) -> MatchResult {
        match (self.kind, self.winner) {
            (OutcomeKind::Penalty, Some(winner)) | (OutcomeKind::Win, Some(winner)) => {
                if winner == team {
                    MatchResult::Win
                } else {
                    MatchResult::Loss
                }
            }
            _ => classify_score(self.score_for(team)),
        }
    }

    pub fn penalty_result_for(&self, team: Team) -> PenaltyResult {
        match (self.kind, self.winner) {
            (OutcomeKind::Penalty, Some(winner)) if winner == team => PenaltyResult::Won,
            (OutcomeKind::Penalty, Some(_)) => PenaltyResult::Lost,
            _ => PenaltyResult::NotApplicable,
        }
    }
}

fn classify_score(score: f64) -> MatchResult {
    if score >= 1.0 {
        MatchResult::Win
    } else if score <= 0.0 {
        MatchResult::Loss
    } else {
        MatchResult::Draw
    }
}

/// Scores a match from its scoreline and shoot-out result
pub fn evaluate(input: &MatchOutcomeInput, settings: &EloSettings) -> MatchOutcome {
    let (team_a_score, team_b_score, kind, winner) = determine_scores(input, settings);
    let (team_a_bonus, team_b_bonus) = goal_bonus(input, kind, settings);

    MatchOutcome {
        team_a_score,
        team_b_score,
        kind,
        team_a_bonus,
        team_b_bonus,
        winner,
    }
}

fn determine_scores(
    input: &MatchOutcomeInput,
    settings: &EloSettings,
) -> (f64, f64, OutcomeKind, Option<Team>) {
    let winning = settings.win_penalty_multiplier;
    let losing = 1.0 - settings.win_penalty_multiplier;

    match (input.went_to_penalties, input.penalty_winner) {
        (true, Some(Team::A)) => (winning, losing, OutcomeKind::Penalty, Some(Team::A)),
        (true, Some(Team::B)) => (losing, winning, OutcomeKind::Penalty, Some(Team::B)),
        _ if input.team_a_goals > input.team_b_goals => {
            (settings.win_multiplier, 0.0, OutcomeKind::Win, Some(Team::A))
        }
        _ if input.team_b_goals > input.team_a_goals => {
            (0.0, settings.win_multiplier, OutcomeKind::Win, Some(Team::B))
        }
        _ => (
            settings.draw_multiplier,
            settings.draw_multiplier,
            OutcomeKind::Draw,
            None,
        ),
    }
}

fn goal_bonus(input: &MatchOutcomeInput, kind: OutcomeKind, settings: &EloSettings) -> (i32, i32) {
    let difference = (input.team_a_goals - input.team_b_goals).abs();
    if kind != OutcomeKind::Win || difference < settings.goal_bonus_threshold {
        return (0, 0);
    }

    if input.team_a_goals > input.team_b_goals {
        (settings.goal_bonus, 0)
    } else {
        (0, settings.goal_bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::MatchKind;
    use chrono::NaiveDate;

    fn input(a: i32, b: i32, penalties: Option<Team>) -> MatchOutcomeInput {
        MatchOutcomeInput {
            id: 1,
            team_a_goals: a,
            team_b_goals: b,
            kind: MatchKind::OneVsOne,
            went_to_penalties: penalties.is_some(),
            penalty_winner: penalties,
            team_a: vec![1],
            team_b: vec![2],
            played_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            created_by: None,
        }
    }

    #[test]
    fn test_outright_win_without_bonus() {
        let outcome = evaluate(&input(2, 1, None), &EloSettings::default());
        assert_eq!(outcome.kind, OutcomeKind::Win);
        assert_eq!(outcome.team_a_score, 1.0);
        assert_eq!(outcome.team_b_score, 0.0);
        assert_eq!((outcome.team_a_bonus, outcome.team_b_bonus), (0, 0));
        assert_eq!(outcome.result_for(Team::A), MatchResult::Win);
        assert_eq!(outcome.result_for(Team::B), MatchResult::Loss);
    }

    #[test]
    fn test_goal_bonus_goes_to_the_winner() {
        let outcome = evaluate(&input(5, 1, None), &EloSettings::default());
        assert_eq!((outcome.team_a_bonus, outcome.team_b_bonus), (5, 0));

        let outcome = evaluate(&input(0, 3, None), &EloSettings::default());
        assert_eq!((outcome.team_a_bonus, outcome.team_b_bonus), (0, 5));
    }

    #[test]
    fn test_penalty_shootout_is_weighted() {
        let outcome = evaluate(&input(2, 2, Some(Team::A)), &EloSettings::default());
        assert_eq!(outcome.kind, OutcomeKind::Penalty);
        assert!((outcome.team_a_score - 0.7).abs() < 1e-9);
        assert!((outcome.team_b_score - 0.3).abs() < 1e-9);
        assert_eq!(outcome.result_for(Team::A), MatchResult::Win);
        assert_eq!(outcome.result_for(Team::B), MatchResult::Loss);
        assert_eq!(outcome.penalty_result_for(Team::A), PenaltyResult::Won);
        assert_eq!(outcome.penalty_result_for(Team::B), PenaltyResult::Lost);
        assert_eq!((outcome.team_a_bonus, outcome.team_b_bonus), (0, 0));
    }

    #[test]
    fn test_plain_draw() {
        let outcome = evaluate(&input(1, 1, None), &EloSettings::default());
        assert_eq!(outcome.kind, OutcomeKind::Draw);
        assert_eq!(outcome.team_a_score, 0.5);
        assert_eq!(outcome.result_for(Team::B), MatchResult::Draw);
        assert_eq!(outcome.penalty_result_for(Team::B), PenaltyResult::NotApplicable);
    }
}

use crate::config::settings::EloSettings;

use super::types::RatingValue;

/// New rating plus the change actually applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingDelta {
    pub new_rating: RatingValue,
    pub change: RatingValue,
}

/// Probability that `rating` beats `opponent`
pub fn expected_score(rating: RatingValue, opponent: RatingValue) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(f64::from(opponent - rating) / 400.0))
}

/// Applies one Elo step; the result never drops below the floor
pub fn new_rating(
    current: RatingValue,
    expected: f64,
    actual: f64,
    k_factor: f64,
    bonus: i32,
    settings: &EloSettings,
) -> RatingDelta {
    let raw_change = (k_factor * (actual - expected) + f64::from(bonus)).round() as RatingValue;
    let new_rating = (current + raw_change).max(settings.rating_floor);

    RatingDelta {
        new_rating,
        change: new_rating - current,
    }
}

/// K-factor from the entity's prior ledger entries and current rating
pub fn k_factor(prior_entries: usize, current: RatingValue, settings: &EloSettings) -> f64 {
    if prior_entries < settings.new_entity_games {
        settings.k_factor_new
    } else if current > settings.high_rating_threshold {
        settings.k_factor_high
    } else {
        settings.k_factor
    }
}

/// Rounded mean of the side's ratings; missing ratings count as the default
pub fn team_rating(ratings: &[Option<RatingValue>], settings: &EloSettings) -> RatingValue {
    if ratings.is_empty() {
        return settings.default_rating;
    }

    let total: f64 = ratings
        .iter()
        .map(|r| f64::from(r.unwrap_or(settings.default_rating)))
        .sum();
    (total / ratings.len() as f64).round() as RatingValue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_score_equal_ratings() {
        assert!((expected_score(1200, 1200) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_expected_scores_are_complementary() {
        for (a, b) in [(1200, 1200), (1500, 1100), (100, 2600), (1834, 1835)] {
            let sum = expected_score(a, b) + expected_score(b, a);
            assert!((sum - 1.0).abs() < 1e-9, "{} vs {} summed to {}", a, b, sum);
        }
    }

    #[test]
    fn test_new_rating_win_equal() {
        let settings = EloSettings::default();
        let delta = new_rating(1200, 0.5, 1.0, 32.0, 0, &settings);
        assert_eq!(delta, RatingDelta { new_rating: 1216, change: 16 });
    }

    #[test]
    fn test_bonus_is_added_on_top() {
        let settings = EloSettings::default();
        let delta = new_rating(1200, 0.5, 1.0, 40.0, 5, &settings);
        assert_eq!(delta.change, 25);
    }

    #[test]
    fn test_rating_floor() {
        let settings = EloSettings::default();
        for current in [100, 101, 120, 500] {
            for k in [24.0, 32.0, 40.0, 400.0] {
                let delta = new_rating(current, 0.99, 0.0, k, 0, &settings);
                assert!(delta.new_rating >= 100);
                assert_eq!(delta.new_rating - current, delta.change);
            }
        }
    }

    #[test]
    fn test_k_factor_tiers() {
        let settings = EloSettings::default();
        assert_eq!(k_factor(0, 2500, &settings), 40.0);
        assert_eq!(k_factor(9, 1200, &settings), 40.0);
        assert_eq!(k_factor(10, 2001, &settings), 24.0);
        assert_eq!(k_factor(10, 2000, &settings), 32.0);
    }

    #[test]
    fn test_team_rating_rounds_mean_and_defaults() {
        let settings = EloSettings::default();
        assert_eq!(team_rating(&[Some(1201), Some(1200)], &settings), 1201);
        assert_eq!(team_rating(&[None, Some(1300)], &settings), 1250);
        assert_eq!(team_rating(&[], &settings), 1200);
    }
}

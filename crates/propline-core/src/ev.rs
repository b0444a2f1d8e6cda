// Expected-value and rating calculator for a single prop bet.

use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsRecord;
use crate::model::{Direction, League};

/// Each factor moves probability by at most `weight * MAX_SHIFT`.
const MAX_SHIFT: f64 = 0.05;
const MIN_PROBABILITY: f64 = 0.25;
const MAX_PROBABILITY: f64 = 0.75;
const HIGH_WIND_MPH: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvError {
    #[error("invalid American odds {0}")]
    InvalidOdds(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBet,
    GoodBet,
    Neutral,
    Avoid,
    StrongAvoid,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::StrongBet => "strong_bet",
            Recommendation::GoodBet => "good_bet",
            Recommendation::Neutral => "neutral",
            Recommendation::Avoid => "avoid",
            Recommendation::StrongAvoid => "strong_avoid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    HitRate,
    RecentForm,
    Matchup,
    Weather,
    Injury,
    Rest,
}

impl FactorKind {
    pub fn weight(self) -> f64 {
        match self {
            FactorKind::HitRate => 0.25,
            FactorKind::RecentForm => 0.20,
            FactorKind::Matchup => 0.20,
            FactorKind::Weather => 0.15,
            FactorKind::Injury => 0.10,
            FactorKind::Rest => 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub kind: FactorKind,
    pub impact: Impact,
    /// In `[-1, 1]`.
    pub signal: f64,
}

impl Factor {
    fn new(kind: FactorKind, impact: Impact, signal: f64) -> Self {
        Self {
            kind,
            impact,
            signal: signal.clamp(-1.0, 1.0),
        }
    }

    /// Probability shift this factor contributes.
    pub fn adjustment(&self) -> f64 {
        self.signal * self.kind.weight() * MAX_SHIFT
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Weather {
    pub wind_mph: f64,
    pub precipitation: bool,
}

/// Everything known about a bet. Absent inputs contribute no factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvInput {
    pub american_odds: i32,
    pub league: League,
    pub prop_type: String,
    pub direction: Direction,
    /// Season hit rate in `[0, 1]`.
    pub hit_rate: Option<f64>,
    /// Short-window hit rate in `[0, 1]`.
    pub recent_form: Option<f64>,
    /// Opponent's defense-rank percentile in `[0, 100]`; high means
    /// generous.
    pub matchup_percentile: Option<f64>,
    pub weather: Option<Weather>,
    pub injury_status: Option<String>,
    pub rest_days: Option<i64>,
}

impl EvInput {
    pub fn new(american_odds: i32, league: League, prop_type: &str, direction: Direction) -> Self {
        Self {
            american_odds,
            league,
            prop_type: prop_type.to_string(),
            direction,
            hit_rate: None,
            recent_form: None,
            matchup_percentile: None,
            weather: None,
            injury_status: None,
            rest_days: None,
        }
    }

    /// Fill the data-driven factors from an analytics record. Empty hit
    /// rates are treated as unknown rather than as 0%.
    pub fn from_record(record: &AnalyticsRecord, american_odds: i32) -> Self {
        let mut input = Self::new(american_odds, record.league, &record.prop_type, record.direction);
        if record.season_hit_rate.total > 0 {
            input.hit_rate = Some(record.season_hit_rate.hit_rate);
        }
        input.recent_form = record
            .windows
            .iter()
            .min_by_key(|w| w.size)
            .filter(|w| w.hit_rate.total > 0)
            .map(|w| w.hit_rate.hit_rate);
        input.matchup_percentile = record.matchup_rank.as_ref().map(|m| m.rank_percentile);
        input
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvRating {
    pub ev_percent: f64,
    pub roi_percent: f64,
    /// 1 to 5.
    pub stars: u8,
    /// 30 to 95, or 50 with no factors.
    pub confidence: f64,
    pub recommendation: Recommendation,
    pub implied_probability: f64,
    pub adjusted_probability: f64,
    pub factors: Vec<Factor>,
}

/// `+150 -> 2.5`, `-200 -> 1.5`. Zero is not a price.
pub fn decimal_odds(american: i32) -> Result<f64, EvError> {
    match american {
        0 => Err(EvError::InvalidOdds(american)),
        o if o > 0 => Ok(o as f64 / 100.0 + 1.0),
        o => Ok(100.0 / (o as f64).abs() + 1.0),
    }
}

pub fn implied_probability(american: i32) -> Result<f64, EvError> {
    Ok(1.0 / decimal_odds(american)?)
}

/// `(p * (d - 1) - (1 - p)) * 100`.
pub fn ev_percent(probability: f64, decimal: f64) -> f64 {
    (probability * (decimal - 1.0) - (1.0 - probability)) * 100.0
}

fn rate_factor(kind: FactorKind, rate: f64, positive_above: f64, negative_below: f64) -> Factor {
    let impact = if rate > positive_above {
        Impact::Positive
    } else if rate < negative_below {
        Impact::Negative
    } else {
        Impact::Neutral
    };
    Factor::new(kind, impact, (rate - 0.5) * 2.0)
}

fn weather_sensitive(prop_type: &str) -> bool {
    ["yards", "points", "touchdown", "runs", "home_runs", "goals", "receptions"]
        .iter()
        .any(|k| prop_type.contains(k))
}

/// Build the factor list for an input. Weather only counts for outdoor
/// leagues.
pub fn analyze_factors(input: &EvInput) -> Vec<Factor> {
    let mut factors = Vec::new();

    if let Some(rate) = input.hit_rate {
        factors.push(rate_factor(FactorKind::HitRate, rate, 0.6, 0.4));
    }
    if let Some(form) = input.recent_form {
        factors.push(rate_factor(FactorKind::RecentForm, form, 0.7, 0.3));
    }
    if let Some(percentile) = input.matchup_percentile {
        let generous = (percentile / 100.0).clamp(0.0, 1.0);
        let strength = match input.direction {
            Direction::Over => generous,
            Direction::Under => 1.0 - generous,
        };
        factors.push(rate_factor(FactorKind::Matchup, strength, 0.6, 0.4));
    }
    if let Some(weather) = &input.weather {
        if input.league.is_outdoor() {
            let harsh = weather.wind_mph >= HIGH_WIND_MPH || weather.precipitation;
            let factor = if harsh && weather_sensitive(&input.prop_type) {
                match input.direction {
                    Direction::Over => Factor::new(FactorKind::Weather, Impact::Negative, -1.0),
                    Direction::Under => Factor::new(FactorKind::Weather, Impact::Positive, 1.0),
                }
            } else {
                Factor::new(FactorKind::Weather, Impact::Neutral, 0.0)
            };
            factors.push(factor);
        }
    }
    if let Some(status) = input.injury_status.as_deref() {
        let factor = match status.trim().to_ascii_lowercase().as_str() {
            "healthy" => Factor::new(FactorKind::Injury, Impact::Positive, 1.0),
            "questionable" => Factor::new(FactorKind::Injury, Impact::Neutral, 0.0),
            _ => Factor::new(FactorKind::Injury, Impact::Negative, -1.0),
        };
        factors.push(factor);
    }
    if let Some(days) = input.rest_days {
        let factor = if (2..=4).contains(&days) {
            Factor::new(FactorKind::Rest, Impact::Positive, 1.0)
        } else if !(1..=6).contains(&days) {
            Factor::new(FactorKind::Rest, Impact::Negative, -1.0)
        } else {
            Factor::new(FactorKind::Rest, Impact::Neutral, 0.0)
        };
        factors.push(factor);
    }

    factors
}

/// EV thresholds give the base rating, nudged one star when positive
/// factors outnumber negative ones by more than one (or the reverse).
pub fn star_rating(ev_percent: f64, factors: &[Factor]) -> u8 {
    let mut stars: i32 = if ev_percent > 10.0 {
        5
    } else if ev_percent > 5.0 {
        4
    } else if ev_percent > 0.0 {
        3
    } else if ev_percent > -5.0 {
        2
    } else {
        1
    };
    let positive = factors.iter().filter(|f| f.impact == Impact::Positive).count();
    let negative = factors.iter().filter(|f| f.impact == Impact::Negative).count();
    if positive > negative + 1 {
        stars += 1;
    }
    if negative > positive + 1 {
        stars -= 1;
    }
    stars.clamp(1, 5) as u8
}

pub fn confidence(factors: &[Factor]) -> f64 {
    if factors.is_empty() {
        return 50.0;
    }
    let weighted: f64 = factors.iter().map(|f| f.kind.weight() * 100.0).sum();
    weighted.clamp(30.0, 95.0)
}

pub fn recommendation(ev_percent: f64, stars: u8) -> Recommendation {
    if ev_percent > 8.0 && stars >= 4 {
        Recommendation::StrongBet
    } else if ev_percent > 3.0 && stars >= 3 {
        Recommendation::GoodBet
    } else if ev_percent > -3.0 && stars >= 2 {
        Recommendation::Neutral
    } else if ev_percent > -8.0 && stars <= 2 {
        Recommendation::Avoid
    } else {
        Recommendation::StrongAvoid
    }
}

/// Rate one bet: implied probability from the odds, shifted by the factors
/// and clamped to `[0.25, 0.75]`, then priced against the same odds.
pub fn compute_ev(input: &EvInput) -> Result<EvRating, EvError> {
    let decimal = decimal_odds(input.american_odds)?;
    let implied = 1.0 / decimal;
    let factors = analyze_factors(input);
    let shift: f64 = factors.iter().map(Factor::adjustment).sum();
    let adjusted = (implied + shift).clamp(MIN_PROBABILITY, MAX_PROBABILITY);

    let ev = ev_percent(adjusted, decimal);
    let stars = star_rating(ev, &factors);
    Ok(EvRating {
        ev_percent: ev,
        roi_percent: ev,
        stars,
        confidence: confidence(&factors),
        recommendation: recommendation(ev, stars),
        implied_probability: implied,
        adjusted_probability: adjusted,
        factors,
    })
}

// Rolling-window analytics: hit rates and streaks over a player's game logs
// for a line and direction, plus the derived per-line analytics record.

mod cache;
mod engine;

pub use cache::AnalyticsCache;
pub use engine::{AnalyticsEngine, ChartPoint};

use serde::{Deserialize, Serialize};

use crate::ev::EvRating;
use crate::model::{Direction, League};

/// Strict comparison: a value exactly on the line is never a hit.
pub fn is_hit(actual: f64, line: f64, direction: Direction) -> bool {
    match direction {
        Direction::Over => actual > line,
        Direction::Under => actual < line,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitRate {
    pub hits: usize,
    pub total: usize,
    /// `hits / total` in `[0, 1]`; `0` when `total` is `0`.
    pub hit_rate: f64,
}

impl HitRate {
    pub const EMPTY: HitRate = HitRate {
        hits: 0,
        total: 0,
        hit_rate: 0.0,
    };

    pub fn percent(&self) -> f64 {
        self.hit_rate * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    /// Positive for a run of hits, negative for a run of misses.
    pub current: i64,
    /// Longest same-outcome run in the scanned logs.
    pub longest: usize,
    pub direction: Direction,
}

fn windowed(values: &[f64], window: Option<usize>) -> &[f64] {
    match window {
        Some(n) => &values[..n.min(values.len())],
        None => values,
    }
}

/// Hit count over the `window` most recent values (all values for `None`).
/// `values` must be ordered most recent first.
pub fn compute_hit_rate(values: &[f64], line: f64, direction: Direction, window: Option<usize>) -> HitRate {
    let considered = windowed(values, window);
    let total = considered.len();
    if total == 0 {
        return HitRate::EMPTY;
    }
    let hits = considered.iter().filter(|v| is_hit(**v, line, direction)).count();
    HitRate {
        hits,
        total,
        hit_rate: hits as f64 / total as f64,
    }
}

/// Current and longest same-outcome runs, scanning from the most recent
/// value backward. `values` must be ordered most recent first.
pub fn compute_streak(values: &[f64], line: f64, direction: Direction, window: Option<usize>) -> Streak {
    let considered = windowed(values, window);
    let outcomes: Vec<bool> = considered.iter().map(|v| is_hit(*v, line, direction)).collect();

    let Some(&latest) = outcomes.first() else {
        return Streak {
            current: 0,
            longest: 0,
            direction,
        };
    };

    let current_len = outcomes.iter().take_while(|o| **o == latest).count();

    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<bool> = None;
    for outcome in &outcomes {
        run = if prev == Some(*outcome) { run + 1 } else { 1 };
        longest = longest.max(run);
        prev = Some(*outcome);
    }

    let current = if latest {
        current_len as i64
    } else {
        -(current_len as i64)
    };
    Streak {
        current,
        longest,
        direction,
    }
}

/// Mean of `values`, or `None` when empty.
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

// ---------------------------------------------------------------------------
// Analytics record
// ---------------------------------------------------------------------------

/// Hit rate over the `size` most recent games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowHitRate {
    pub size: usize,
    pub hit_rate: HitRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub opponent_team_id: String,
    pub hit_rate: HitRate,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupRank {
    pub rank: i64,
    pub total: i64,
    pub rank_percentile: f64,
}

/// Derived analytics for one player, prop type, line, direction, and
/// season. Fully recomputable from game logs and defense ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub player_id: String,
    pub prop_type: String,
    pub line: f64,
    pub direction: Direction,
    pub season: String,
    pub league: League,
    pub season_hit_rate: HitRate,
    /// Trailing windows (L5, L10, L20 by default) over all logged games.
    pub windows: Vec<WindowHitRate>,
    pub head_to_head: Option<HeadToHead>,
    pub season_average: Option<f64>,
    pub streak: Streak,
    pub matchup_rank: Option<MatchupRank>,
    /// Rating at the most recent offered price for this direction.
    pub ev: Option<EvRating>,
}

impl AnalyticsRecord {
    /// Hit rate for a trailing window, if that window was computed.
    pub fn window(&self, size: usize) -> Option<&HitRate> {
        self.windows.iter().find(|w| w.size == size).map(|w| &w.hit_rate)
    }
}

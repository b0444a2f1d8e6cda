// Per-run memo of game-log reads and computed hit rates/streaks.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Direction, PlayerGameLog};

use super::{HitRate, Streak};

/// `f64` lines hashed by bit pattern; `250.5` and `250.5` always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LineBits(u64);

impl From<f64> for LineBits {
    fn from(line: f64) -> Self {
        // Fold -0.0 into 0.0 so both spellings share an entry.
        LineBits(if line == 0.0 { 0 } else { line.to_bits() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LogKey {
    player_id: String,
    prop_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OutcomeKey {
    player_id: String,
    prop_type: String,
    line: LineBits,
    direction: Direction,
    window: Option<usize>,
}

/// Owned by one `AnalyticsEngine` for the length of a run. Entries are
/// never invalidated; build a new cache to see newly written facts.
#[derive(Debug, Default)]
pub struct AnalyticsCache {
    logs: HashMap<LogKey, Arc<Vec<PlayerGameLog>>>,
    hit_rates: HashMap<OutcomeKey, HitRate>,
    streaks: HashMap<OutcomeKey, Streak>,
    hits: usize,
    misses: usize,
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn logs(&mut self, player_id: &str, prop_type: &str) -> Option<Arc<Vec<PlayerGameLog>>> {
        let found = self.logs.get(&log_key(player_id, prop_type)).cloned();
        self.note(found.is_some());
        found
    }

    pub(crate) fn store_logs(&mut self, player_id: &str, prop_type: &str, logs: Vec<PlayerGameLog>) -> Arc<Vec<PlayerGameLog>> {
        let logs = Arc::new(logs);
        self.logs.insert(log_key(player_id, prop_type), Arc::clone(&logs));
        logs
    }

    pub(crate) fn hit_rate(
        &mut self,
        player_id: &str,
        prop_type: &str,
        line: f64,
        direction: Direction,
        window: Option<usize>,
    ) -> Option<HitRate> {
        let found = self
            .hit_rates
            .get(&outcome_key(player_id, prop_type, line, direction, window))
            .copied();
        self.note(found.is_some());
        found
    }

    pub(crate) fn store_hit_rate(
        &mut self,
        player_id: &str,
        prop_type: &str,
        line: f64,
        direction: Direction,
        window: Option<usize>,
        rate: HitRate,
    ) {
        self.hit_rates
            .insert(outcome_key(player_id, prop_type, line, direction, window), rate);
    }

    pub(crate) fn streak(&mut self, player_id: &str, prop_type: &str, line: f64, direction: Direction) -> Option<Streak> {
        let found = self
            .streaks
            .get(&outcome_key(player_id, prop_type, line, direction, None))
            .copied();
        self.note(found.is_some());
        found
    }

    pub(crate) fn store_streak(&mut self, player_id: &str, prop_type: &str, line: f64, direction: Direction, streak: Streak) {
        self.streaks
            .insert(outcome_key(player_id, prop_type, line, direction, None), streak);
    }

    fn note(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    /// `(hits, misses)` across every lookup so far.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn log_key(player_id: &str, prop_type: &str) -> LogKey {
    LogKey {
        player_id: player_id.to_string(),
        prop_type: prop_type.to_string(),
    }
}

fn outcome_key(player_id: &str, prop_type: &str, line: f64, direction: Direction, window: Option<usize>) -> OutcomeKey {
    OutcomeKey {
        player_id: player_id.to_string(),
        prop_type: prop_type.to_string(),
        line: line.into(),
        direction,
        window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_distinguish_direction_and_window() {
        let mut cache = AnalyticsCache::new();
        let rate = HitRate {
            hits: 1,
            total: 2,
            hit_rate: 0.5,
        };
        cache.store_hit_rate("p", "points", 20.5, Direction::Over, Some(5), rate);

        assert_eq!(cache.hit_rate("p", "points", 20.5, Direction::Over, Some(5)), Some(rate));
        assert_eq!(cache.hit_rate("p", "points", 20.5, Direction::Under, Some(5)), None);
        assert_eq!(cache.hit_rate("p", "points", 20.5, Direction::Over, None), None);
        assert_eq!(cache.hit_rate("p", "points", 21.5, Direction::Over, Some(5)), None);
        assert_eq!(cache.stats(), (1, 3));
    }

    #[test]
    fn negative_zero_line_shares_entry() {
        let mut cache = AnalyticsCache::new();
        cache.store_hit_rate("p", "plus_minus", -0.0, Direction::Over, None, HitRate::EMPTY);
        assert!(cache.hit_rate("p", "plus_minus", 0.0, Direction::Over, None).is_some());
    }

    #[test]
    fn separate_caches_do_not_share_state() {
        let mut a = AnalyticsCache::new();
        let mut b = AnalyticsCache::new();
        a.store_logs("p", "points", Vec::new());
        assert!(a.logs("p", "points").is_some());
        assert!(b.logs("p", "points").is_none());
        a.clear();
        assert!(a.logs("p", "points").is_none());
    }
}

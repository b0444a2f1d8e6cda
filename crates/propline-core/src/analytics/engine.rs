use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    average, compute_hit_rate, compute_streak, AnalyticsCache, AnalyticsRecord, HeadToHead, HitRate,
    MatchupRank, Streak, WindowHitRate,
};
use crate::db::{Database, LineTarget};
use crate::ev::{compute_ev, EvInput};
use crate::model::{Direction, PlayerGameLog};

/// Default trailing windows (L5, L10, L20).
pub const DEFAULT_WINDOWS: [usize; 3] = [5, 10, 20];

/// One point of a player's recent output for a prop type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub opponent_team_id: Option<String>,
}

/// Computes hit rates, streaks, and analytics records from committed game
/// logs. Holds its own cache, so build one engine per run.
pub struct AnalyticsEngine<'a> {
    db: &'a Database,
    cache: AnalyticsCache,
    windows: Vec<usize>,
}

impl<'a> AnalyticsEngine<'a> {
    pub fn new(db: &'a Database, windows: Vec<usize>) -> Self {
        Self {
            db,
            cache: AnalyticsCache::new(),
            windows,
        }
    }

    pub fn with_default_windows(db: &'a Database) -> Self {
        Self::new(db, DEFAULT_WINDOWS.to_vec())
    }

    pub fn cache(&self) -> &AnalyticsCache {
        &self.cache
    }

    fn logs(&mut self, player_id: &str, prop_type: &str) -> Result<Arc<Vec<PlayerGameLog>>> {
        if let Some(logs) = self.cache.logs(player_id, prop_type) {
            return Ok(logs);
        }
        let logs = self.db.game_logs_for(player_id, prop_type)?;
        Ok(self.cache.store_logs(player_id, prop_type, logs))
    }

    /// Hit rate over the `window` most recent logs, or every log for `None`.
    pub fn hit_rate(
        &mut self,
        player_id: &str,
        prop_type: &str,
        line: f64,
        direction: Direction,
        window: Option<usize>,
    ) -> Result<HitRate> {
        if let Some(rate) = self.cache.hit_rate(player_id, prop_type, line, direction, window) {
            return Ok(rate);
        }
        let values = values(&self.logs(player_id, prop_type)?);
        let rate = compute_hit_rate(&values, line, direction, window);
        self.cache
            .store_hit_rate(player_id, prop_type, line, direction, window, rate);
        Ok(rate)
    }

    /// Current and longest streak across the full log history.
    pub fn streak(&mut self, player_id: &str, prop_type: &str, line: f64, direction: Direction) -> Result<Streak> {
        if let Some(streak) = self.cache.streak(player_id, prop_type, line, direction) {
            return Ok(streak);
        }
        let values = values(&self.logs(player_id, prop_type)?);
        let streak = compute_streak(&values, line, direction, None);
        self.cache
            .store_streak(player_id, prop_type, line, direction, streak);
        Ok(streak)
    }

    /// Build the analytics record for one offered line and direction.
    ///
    /// The season hit rate and season average use only logs from `season`;
    /// trailing windows and the streak run across seasons. Head-to-head and
    /// matchup rank are present only when the line names an opponent.
    pub fn compute_record(&mut self, target: &LineTarget, season: &str, direction: Direction) -> Result<AnalyticsRecord> {
        let logs = self.logs(&target.player_id, &target.prop_type)?;
        let season_values: Vec<f64> = logs
            .iter()
            .filter(|log| log.season == season)
            .map(|log| log.actual_value)
            .collect();

        let mut windows = Vec::with_capacity(self.windows.len());
        for size in self.windows.clone() {
            let hit_rate = self.hit_rate(&target.player_id, &target.prop_type, target.line, direction, Some(size))?;
            windows.push(WindowHitRate { size, hit_rate });
        }

        let head_to_head = target.opponent_team_id.as_deref().map(|opponent| {
            let h2h: Vec<f64> = logs
                .iter()
                .filter(|log| log.opponent_team_id.as_deref() == Some(opponent))
                .map(|log| log.actual_value)
                .collect();
            HeadToHead {
                opponent_team_id: opponent.to_string(),
                hit_rate: compute_hit_rate(&h2h, target.line, direction, None),
                average: average(&h2h),
            }
        });

        let matchup_rank = match target.opponent_team_id.as_deref() {
            Some(opponent) => self
                .db
                .defense_rank_for(target.league, season, &target.prop_type, opponent)?
                .map(|(rank, total)| MatchupRank {
                    rank: rank.rank,
                    total,
                    rank_percentile: rank.rank_percentile,
                }),
            None => None,
        };

        let streak = self.streak(&target.player_id, &target.prop_type, target.line, direction)?;

        let mut record = AnalyticsRecord {
            player_id: target.player_id.clone(),
            prop_type: target.prop_type.clone(),
            line: target.line,
            direction,
            season: season.to_string(),
            league: target.league,
            season_hit_rate: compute_hit_rate(&season_values, target.line, direction, None),
            windows,
            head_to_head,
            season_average: average(&season_values),
            streak,
            matchup_rank,
            ev: None,
        };

        let odds = match direction {
            Direction::Over => target.over_odds,
            Direction::Under => target.under_odds,
        };
        if let Some(odds) = odds {
            match compute_ev(&EvInput::from_record(&record, odds)) {
                Ok(rating) => record.ev = Some(rating),
                Err(e) => warn!(player_id = %target.player_id, prop_type = %target.prop_type, error = %e, "skipping EV"),
            }
        }
        Ok(record)
    }

    /// Recompute every analytics record for `season`: one per distinct
    /// offered (player, prop type, line) and direction. Replaces the
    /// season's rows wholesale. Returns the number of records written.
    pub fn recompute_all(&mut self, season: &str) -> Result<usize> {
        let targets = self.db.line_targets(season)?;
        let mut records = Vec::with_capacity(targets.len() * 2);
        for target in &targets {
            for direction in Direction::BOTH {
                records.push(self.compute_record(target, season, direction)?);
            }
        }
        self.db.replace_analytics(season, &records)?;

        let (hits, misses) = self.cache.stats();
        info!(
            season,
            targets = targets.len(),
            records = records.len(),
            cache_hits = hits,
            cache_misses = misses,
            "analytics recomputed"
        );
        Ok(records.len())
    }

    /// The `limit` most recent values for a player and prop type, oldest
    /// first so they plot left to right.
    pub fn chart_series(&mut self, player_id: &str, prop_type: &str, limit: usize) -> Result<Vec<ChartPoint>> {
        let logs = self.logs(player_id, prop_type)?;
        let mut points: Vec<ChartPoint> = logs
            .iter()
            .take(limit)
            .map(|log| ChartPoint {
                date: log.date,
                value: log.actual_value,
                opponent_team_id: log.opponent_team_id.clone(),
            })
            .collect();
        points.reverse();
        debug!(player_id, prop_type, points = points.len(), "chart series");
        Ok(points)
    }
}

fn values(logs: &[PlayerGameLog]) -> Vec<f64> {
    logs.iter().map(|log| log.actual_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defense::DefenseRank;
    use crate::model::{conflict_key, CanonicalPlayer, League, PropLine};

    const PLAYER: &str = "jalen-brunson-1-nba";

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seeded_db() -> Database {
        let db = Database::open(":memory:").unwrap();
        db.upsert_player(&CanonicalPlayer {
            player_id: PLAYER.to_string(),
            display_name: "Jalen Brunson".to_string(),
            league: League::Nba,
            team_id: Some("NYK".to_string()),
            position: Some("PG".to_string()),
        })
        .unwrap();
        // Most recent first: 27 vs BOS, 31 vs MIA, 22 vs BOS, then a prior season.
        for (date, season, opponent, value) in [
            ("2025-01-20", "2025", "BOS", 27.0),
            ("2025-01-18", "2025", "MIA", 31.0),
            ("2025-01-15", "2025", "BOS", 22.0),
            ("2024-04-10", "2024", "PHI", 40.0),
        ] {
            db.upsert_game_log(&PlayerGameLog {
                player_id: PLAYER.to_string(),
                date: d(date),
                prop_type: "points".to_string(),
                league: League::Nba,
                season: season.to_string(),
                game_id: format!("g-{date}"),
                team_id: Some("NYK".to_string()),
                opponent_team_id: Some(opponent.to_string()),
                actual_value: value,
                hit: None,
            })
            .unwrap();
        }
        db
    }

    fn offer(db: &Database, line: f64, opponent: &str) {
        let date = d("2025-01-22");
        db.upsert_prop_line(&PropLine {
            conflict_key: conflict_key(PLAYER, date, "points", "FanDuel", League::Nba, "2025"),
            player_id: PLAYER.to_string(),
            date,
            prop_type: "points".to_string(),
            sportsbook: "FanDuel".to_string(),
            league: League::Nba,
            season: "2025".to_string(),
            line,
            over_odds: Some(-110),
            under_odds: Some(-110),
            team_id: Some("NYK".to_string()),
            opponent_team_id: Some(opponent.to_string()),
            game_id: None,
        })
        .unwrap();
    }

    #[test]
    fn hit_rate_and_streak_read_through_cache() {
        let db = seeded_db();
        let mut engine = AnalyticsEngine::with_default_windows(&db);

        let rate = engine.hit_rate(PLAYER, "points", 25.5, Direction::Over, Some(3)).unwrap();
        assert_eq!((rate.hits, rate.total), (2, 3));
        let again = engine.hit_rate(PLAYER, "points", 25.5, Direction::Over, Some(3)).unwrap();
        assert_eq!(rate, again);

        let streak = engine.streak(PLAYER, "points", 25.5, Direction::Over).unwrap();
        assert_eq!(streak.current, 2);
        // 27, 31 hit; 22 misses; 40 hits.
        assert_eq!(streak.longest, 2);

        let (hits, _) = engine.cache().stats();
        assert!(hits >= 2);
    }

    #[test]
    fn unknown_player_has_empty_analytics() {
        let db = seeded_db();
        let mut engine = AnalyticsEngine::with_default_windows(&db);
        let rate = engine.hit_rate("nobody-1-nba", "points", 10.0, Direction::Under, None).unwrap();
        assert_eq!(rate, HitRate::EMPTY);
        let streak = engine.streak("nobody-1-nba", "points", 10.0, Direction::Under).unwrap();
        assert_eq!((streak.current, streak.longest), (0, 0));
    }

    #[test]
    fn record_separates_season_from_windows() {
        let db = seeded_db();
        db.replace_defense_ranks(
            League::Nba,
            "2025",
            "points",
            &[
                DefenseRank {
                    team_id: "BOS".to_string(),
                    allowed_per_game: 24.5,
                    games_tracked: 2,
                    rank: 1,
                    rank_percentile: 0.0,
                },
                DefenseRank {
                    team_id: "MIA".to_string(),
                    allowed_per_game: 31.0,
                    games_tracked: 1,
                    rank: 2,
                    rank_percentile: 100.0,
                },
            ],
        )
        .unwrap();

        let target = LineTarget {
            player_id: PLAYER.to_string(),
            prop_type: "points".to_string(),
            line: 25.5,
            league: League::Nba,
            opponent_team_id: Some("BOS".to_string()),
            over_odds: Some(-110),
            under_odds: None,
        };
        let mut engine = AnalyticsEngine::with_default_windows(&db);
        let record = engine.compute_record(&target, "2025", Direction::Over).unwrap();

        assert_eq!((record.season_hit_rate.hits, record.season_hit_rate.total), (2, 3));
        assert_eq!(record.season_average, Some(80.0 / 3.0));
        // L5 reaches back into the prior season.
        let l5 = record.window(5).unwrap();
        assert_eq!((l5.hits, l5.total), (3, 4));

        let h2h = record.head_to_head.as_ref().unwrap();
        assert_eq!(h2h.opponent_team_id, "BOS");
        assert_eq!((h2h.hit_rate.hits, h2h.hit_rate.total), (1, 2));
        assert_eq!(h2h.average, Some(24.5));

        let matchup = record.matchup_rank.as_ref().unwrap();
        assert_eq!((matchup.rank, matchup.total), (1, 2));

        let ev = record.ev.as_ref().unwrap();
        assert!((1..=5).contains(&ev.stars));
        assert!(engine.compute_record(&target, "2025", Direction::Under).unwrap().ev.is_none());
    }

    #[test]
    fn recompute_all_replaces_season_rows() {
        let db = seeded_db();
        offer(&db, 25.5, "BOS");

        let written = AnalyticsEngine::with_default_windows(&db).recompute_all("2025").unwrap();
        assert_eq!(written, 2);
        let stored = db.load_analytics(PLAYER, "points", "2025").unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|r| r.direction == Direction::Under));
        // No defense ranks computed yet.
        assert!(stored.iter().all(|r| r.matchup_rank.is_none()));
        assert!(stored.iter().all(|r| r.ev.is_some()));

        // A second run sees the same facts and writes the same rows.
        let written = AnalyticsEngine::with_default_windows(&db).recompute_all("2025").unwrap();
        assert_eq!(written, 2);
        assert_eq!(db.load_analytics(PLAYER, "points", "2025").unwrap(), stored);
    }

    #[test]
    fn chart_series_is_oldest_first() {
        let db = seeded_db();
        let mut engine = AnalyticsEngine::with_default_windows(&db);
        let points = engine.chart_series(PLAYER, "points", 3).unwrap();
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![22.0, 31.0, 27.0]);
        assert_eq!(points[2].opponent_team_id.as_deref(), Some("BOS"));
    }
}

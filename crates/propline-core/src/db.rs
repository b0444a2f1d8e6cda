// SQLite persistence layer for reference data, facts, and derived analytics.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::analytics::AnalyticsRecord;
use crate::defense::DefenseRank;
use crate::model::{CanonicalPlayer, CanonicalTeam, League, PlayerGameLog, PropLine, PropTypeAlias};

/// What a single upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The row already held exactly these values.
    Unchanged,
}

/// One row of the missing-entities register.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingEntity {
    pub kind: String,
    pub raw_value: String,
    pub league: Option<League>,
    pub occurrences: i64,
    pub first_seen: String,
    pub last_seen: String,
}

/// Row count and date span of a fact table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableStats {
    pub rows: i64,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

/// Per-team "stat allowed" aggregate feeding the defense-rank calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamAllowed {
    pub team_id: String,
    pub allowed_per_game: f64,
    pub games_tracked: i64,
}

/// A distinct (player, prop type, line) offered during a season, with the
/// opponent and odds from the most recent offering.
#[derive(Debug, Clone, PartialEq)]
pub struct LineTarget {
    pub player_id: String,
    pub prop_type: String,
    pub line: f64,
    pub league: League,
    pub opponent_team_id: Option<String>,
    pub over_odds: Option<i32>,
    pub under_odds: Option<i32>,
}

/// Columns that must only ever hold canonical identifiers.
const CANONICAL_COLUMNS: &[(&str, &str)] = &[
    ("prop_lines", "player_id"),
    ("prop_lines", "prop_type"),
    ("prop_lines", "team_id"),
    ("prop_lines", "opponent_team_id"),
    ("player_game_logs", "player_id"),
    ("player_game_logs", "prop_type"),
    ("player_game_logs", "team_id"),
    ("player_game_logs", "opponent_team_id"),
    ("players", "display_name"),
    ("players", "team_id"),
];

/// SQLite-backed store for teams, players, aliases, prop lines, game logs,
/// defense ranks, analytics records, and the missing-entities register.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS teams (
                league       TEXT NOT NULL,
                abbreviation TEXT NOT NULL,
                display_name TEXT NOT NULL,
                aliases      TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (league, abbreviation)
            );

            CREATE TABLE IF NOT EXISTS players (
                player_id    TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                league       TEXT NOT NULL,
                team_id      TEXT,
                position     TEXT,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS player_aliases (
                alias     TEXT PRIMARY KEY,
                player_id TEXT NOT NULL REFERENCES players(player_id)
            );

            CREATE TABLE IF NOT EXISTS prop_type_aliases (
                alias     TEXT NOT NULL,
                canonical TEXT NOT NULL,
                league    TEXT NOT NULL DEFAULT '',
                PRIMARY KEY (alias, league)
            );

            CREATE TABLE IF NOT EXISTS prop_lines (
                conflict_key     TEXT PRIMARY KEY,
                player_id        TEXT NOT NULL REFERENCES players(player_id),
                date             TEXT NOT NULL,
                prop_type        TEXT NOT NULL,
                sportsbook       TEXT NOT NULL,
                league           TEXT NOT NULL,
                season           TEXT NOT NULL,
                line             REAL NOT NULL,
                over_odds        INTEGER,
                under_odds       INTEGER,
                team_id          TEXT,
                opponent_team_id TEXT,
                game_id          TEXT,
                updated_at       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS player_game_logs (
                player_id        TEXT NOT NULL REFERENCES players(player_id),
                date             TEXT NOT NULL,
                prop_type        TEXT NOT NULL,
                league           TEXT NOT NULL,
                season           TEXT NOT NULL,
                game_id          TEXT NOT NULL,
                team_id          TEXT,
                opponent_team_id TEXT,
                actual_value     REAL NOT NULL,
                hit              INTEGER,
                updated_at       TEXT NOT NULL,
                PRIMARY KEY (player_id, date, prop_type)
            );

            CREATE TABLE IF NOT EXISTS defense_ranks (
                league           TEXT NOT NULL,
                season           TEXT NOT NULL,
                prop_type        TEXT NOT NULL,
                team_id          TEXT NOT NULL,
                allowed_per_game REAL NOT NULL,
                games_tracked    INTEGER NOT NULL,
                rank             INTEGER NOT NULL,
                rank_percentile  REAL NOT NULL,
                PRIMARY KEY (league, season, prop_type, team_id)
            );

            CREATE TABLE IF NOT EXISTS analytics (
                player_id   TEXT NOT NULL,
                prop_type   TEXT NOT NULL,
                line        REAL NOT NULL,
                direction   TEXT NOT NULL,
                season      TEXT NOT NULL,
                record      TEXT NOT NULL,
                computed_at TEXT NOT NULL,
                PRIMARY KEY (player_id, prop_type, line, direction, season)
            );

            CREATE TABLE IF NOT EXISTS missing_entities (
                kind        TEXT NOT NULL,
                raw_value   TEXT NOT NULL,
                league      TEXT NOT NULL DEFAULT '',
                occurrences INTEGER NOT NULL DEFAULT 1,
                first_seen  TEXT NOT NULL,
                last_seen   TEXT NOT NULL,
                PRIMARY KEY (kind, raw_value, league)
            );
            ",
        )
        .context("failed to create database schema")?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_game_logs_player_prop
                ON player_game_logs(player_id, prop_type, date);
             CREATE INDEX IF NOT EXISTS idx_game_logs_opponent
                ON player_game_logs(league, season, prop_type, opponent_team_id);
             CREATE INDEX IF NOT EXISTS idx_prop_lines_season
                ON prop_lines(season, player_id, prop_type);",
        )
        .context("failed to create indexes")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Insert or refresh team rows in a single transaction. Returns the
    /// number of rows written.
    pub fn seed_teams(&self, teams: &[CanonicalTeam]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin team seed transaction")?;
        for team in teams {
            let aliases_json =
                serde_json::to_string(&team.aliases).context("failed to serialize team aliases")?;
            tx.execute(
                "INSERT INTO teams (league, abbreviation, display_name, aliases)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(league, abbreviation) DO UPDATE SET
                    display_name = excluded.display_name,
                    aliases      = excluded.aliases",
                params![team.league.code(), team.abbreviation, team.display_name, aliases_json],
            )
            .context("failed to upsert team")?;
        }
        tx.commit().context("failed to commit team seed")?;
        Ok(teams.len())
    }

    pub fn load_teams(&self) -> Result<Vec<CanonicalTeam>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT league, abbreviation, display_name, aliases FROM teams ORDER BY league, abbreviation")
            .context("failed to prepare load_teams query")?;
        let teams = stmt
            .query_map([], |row| {
                let aliases_json: String = row.get(3)?;
                Ok(CanonicalTeam {
                    league: league_column(row, 0)?,
                    abbreviation: row.get(1)?,
                    display_name: row.get(2)?,
                    aliases: serde_json::from_str(&aliases_json).unwrap_or_default(),
                })
            })
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;
        Ok(teams)
    }

    /// Franchises stored under more than one abbreviation in the same
    /// league: `(league, display_name, abbreviations)`.
    pub fn duplicate_franchises(&self) -> Result<Vec<(String, String, Vec<String>)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT league, MIN(display_name), GROUP_CONCAT(abbreviation, ',')
                 FROM teams
                 GROUP BY league, lower(display_name)
                 HAVING COUNT(*) > 1
                 ORDER BY league",
            )
            .context("failed to prepare duplicate_franchises query")?;
        let rows = stmt
            .query_map([], |row| {
                let abbrs: String = row.get(2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    abbrs.split(',').map(str::to_string).collect(),
                ))
            })
            .context("failed to query duplicate franchises")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map duplicate franchise rows")?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Create the player on first sight; afterwards only fill in or move
    /// `team_id` and `position`. Players are never deleted.
    pub fn upsert_player(&self, player: &CanonicalPlayer) -> Result<UpsertOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin player transaction")?;
        let existed = row_exists(&tx, "SELECT EXISTS(SELECT 1 FROM players WHERE player_id = ?1)", &player.player_id)?;
        let changed = tx
            .execute(
                "INSERT INTO players (player_id, display_name, league, team_id, position)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(player_id) DO UPDATE SET
                    team_id  = COALESCE(excluded.team_id, players.team_id),
                    position = COALESCE(excluded.position, players.position)
                 WHERE players.team_id IS NOT COALESCE(excluded.team_id, players.team_id)
                    OR players.position IS NOT COALESCE(excluded.position, players.position)",
                params![
                    player.player_id,
                    player.display_name,
                    player.league.code(),
                    player.team_id,
                    player.position,
                ],
            )
            .context("failed to upsert player")?;
        tx.commit().context("failed to commit player upsert")?;
        Ok(outcome(existed, changed))
    }

    pub fn load_players(&self) -> Result<Vec<CanonicalPlayer>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT player_id, display_name, league, team_id, position FROM players ORDER BY player_id")
            .context("failed to prepare load_players query")?;
        let players = stmt
            .query_map([], |row| {
                Ok(CanonicalPlayer {
                    player_id: row.get(0)?,
                    display_name: row.get(1)?,
                    league: league_column(row, 2)?,
                    team_id: row.get(3)?,
                    position: row.get(4)?,
                })
            })
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    /// Map a free-text player alias (stored lower-cased) to a known player.
    pub fn insert_player_alias(&self, alias: &str, player_id: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO player_aliases (alias, player_id) VALUES (?1, ?2)
             ON CONFLICT(alias) DO UPDATE SET player_id = excluded.player_id",
            params![alias.trim().to_lowercase(), player_id],
        )
        .context("failed to insert player alias")?;
        Ok(())
    }

    pub fn load_player_aliases(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT alias, player_id FROM player_aliases ORDER BY alias")
            .context("failed to prepare load_player_aliases query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("failed to query player aliases")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player alias rows")?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Prop-type aliases
    // ------------------------------------------------------------------

    /// Seed the hand-curated alias table in one transaction.
    pub fn seed_prop_aliases(&self, aliases: &[PropTypeAlias]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin alias seed transaction")?;
        for alias in aliases {
            tx.execute(
                "INSERT INTO prop_type_aliases (alias, canonical, league) VALUES (?1, ?2, ?3)
                 ON CONFLICT(alias, league) DO UPDATE SET canonical = excluded.canonical",
                params![alias.alias, alias.canonical, alias.league.map(League::code).unwrap_or("")],
            )
            .context("failed to upsert prop type alias")?;
        }
        tx.commit().context("failed to commit alias seed")?;
        Ok(aliases.len())
    }

    pub fn load_prop_aliases(&self) -> Result<Vec<PropTypeAlias>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT alias, canonical, league FROM prop_type_aliases ORDER BY league, alias")
            .context("failed to prepare load_prop_aliases query")?;
        let rows = stmt
            .query_map([], |row| {
                let league: String = row.get(2)?;
                let league = if league.is_empty() {
                    None
                } else {
                    Some(parse_league(2, &league)?)
                };
                Ok(PropTypeAlias {
                    alias: row.get(0)?,
                    canonical: row.get(1)?,
                    league,
                })
            })
            .context("failed to query prop type aliases")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map prop type alias rows")?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Facts
    // ------------------------------------------------------------------

    /// Insert or update a prop line by its conflict key.
    pub fn upsert_prop_line(&self, line: &PropLine) -> Result<UpsertOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin prop line transaction")?;
        let existed = row_exists(
            &tx,
            "SELECT EXISTS(SELECT 1 FROM prop_lines WHERE conflict_key = ?1)",
            &line.conflict_key,
        )?;
        let changed = tx
            .execute(
                "INSERT INTO prop_lines
                    (conflict_key, player_id, date, prop_type, sportsbook, league, season,
                     line, over_odds, under_odds, team_id, opponent_team_id, game_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(conflict_key) DO UPDATE SET
                    line             = excluded.line,
                    over_odds        = excluded.over_odds,
                    under_odds       = excluded.under_odds,
                    team_id          = excluded.team_id,
                    opponent_team_id = excluded.opponent_team_id,
                    game_id          = excluded.game_id,
                    updated_at       = excluded.updated_at
                 WHERE prop_lines.line IS NOT excluded.line
                    OR prop_lines.over_odds IS NOT excluded.over_odds
                    OR prop_lines.under_odds IS NOT excluded.under_odds
                    OR prop_lines.team_id IS NOT excluded.team_id
                    OR prop_lines.opponent_team_id IS NOT excluded.opponent_team_id
                    OR prop_lines.game_id IS NOT excluded.game_id",
                params![
                    line.conflict_key,
                    line.player_id,
                    date_text(line.date),
                    line.prop_type,
                    line.sportsbook,
                    line.league.code(),
                    line.season,
                    line.line,
                    line.over_odds,
                    line.under_odds,
                    line.team_id,
                    line.opponent_team_id,
                    line.game_id,
                    now_text(),
                ],
            )
            .context("failed to upsert prop line")?;
        tx.commit().context("failed to commit prop line upsert")?;
        Ok(outcome(existed, changed))
    }

    /// Insert or update a game log keyed by `(player_id, date, prop_type)`.
    pub fn upsert_game_log(&self, log: &PlayerGameLog) -> Result<UpsertOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin game log transaction")?;
        let existed: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM player_game_logs
                               WHERE player_id = ?1 AND date = ?2 AND prop_type = ?3)",
                params![log.player_id, date_text(log.date), log.prop_type],
                |row| row.get(0),
            )
            .context("failed to check game log existence")?;
        let changed = tx
            .execute(
                "INSERT INTO player_game_logs
                    (player_id, date, prop_type, league, season, game_id, team_id,
                     opponent_team_id, actual_value, hit, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(player_id, date, prop_type) DO UPDATE SET
                    league           = excluded.league,
                    season           = excluded.season,
                    game_id          = excluded.game_id,
                    team_id          = excluded.team_id,
                    opponent_team_id = excluded.opponent_team_id,
                    actual_value     = excluded.actual_value,
                    hit              = excluded.hit,
                    updated_at       = excluded.updated_at
                 WHERE player_game_logs.league IS NOT excluded.league
                    OR player_game_logs.season IS NOT excluded.season
                    OR player_game_logs.game_id IS NOT excluded.game_id
                    OR player_game_logs.team_id IS NOT excluded.team_id
                    OR player_game_logs.opponent_team_id IS NOT excluded.opponent_team_id
                    OR player_game_logs.actual_value IS NOT excluded.actual_value
                    OR player_game_logs.hit IS NOT excluded.hit",
                params![
                    log.player_id,
                    date_text(log.date),
                    log.prop_type,
                    log.league.code(),
                    log.season,
                    log.game_id,
                    log.team_id,
                    log.opponent_team_id,
                    log.actual_value,
                    log.hit,
                    now_text(),
                ],
            )
            .context("failed to upsert game log")?;
        tx.commit().context("failed to commit game log upsert")?;
        Ok(outcome(existed, changed))
    }

    /// All game logs for a player and prop type, most recent first.
    pub fn game_logs_for(&self, player_id: &str, prop_type: &str) -> Result<Vec<PlayerGameLog>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, date, prop_type, league, season, game_id, team_id,
                        opponent_team_id, actual_value, hit
                 FROM player_game_logs
                 WHERE player_id = ?1 AND prop_type = ?2
                 ORDER BY date DESC, game_id DESC",
            )
            .context("failed to prepare game_logs_for query")?;
        let logs = stmt
            .query_map(params![player_id, prop_type], |row| {
                Ok(PlayerGameLog {
                    player_id: row.get(0)?,
                    date: date_column(row, 1)?,
                    prop_type: row.get(2)?,
                    league: league_column(row, 3)?,
                    season: row.get(4)?,
                    game_id: row.get(5)?,
                    team_id: row.get(6)?,
                    opponent_team_id: row.get(7)?,
                    actual_value: row.get(8)?,
                    hit: row.get(9)?,
                })
            })
            .context("failed to query game logs")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game log rows")?;
        Ok(logs)
    }

    pub fn load_prop_line(&self, conflict_key: &str) -> Result<Option<PropLine>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT conflict_key, player_id, date, prop_type, sportsbook, league, season,
                    line, over_odds, under_odds, team_id, opponent_team_id, game_id
             FROM prop_lines WHERE conflict_key = ?1",
            params![conflict_key],
            |row| {
                Ok(PropLine {
                    conflict_key: row.get(0)?,
                    player_id: row.get(1)?,
                    date: date_column(row, 2)?,
                    prop_type: row.get(3)?,
                    sportsbook: row.get(4)?,
                    league: league_column(row, 5)?,
                    season: row.get(6)?,
                    line: row.get(7)?,
                    over_odds: row.get(8)?,
                    under_odds: row.get(9)?,
                    team_id: row.get(10)?,
                    opponent_team_id: row.get(11)?,
                    game_id: row.get(12)?,
                })
            },
        )
        .optional()
        .context("failed to load prop line")
    }

    /// Distinct (player, prop type, line) offerings for a season.
    pub fn line_targets(&self, season: &str) -> Result<Vec<LineTarget>> {
        let conn = self.conn();
        // SQLite fills bare columns from the row that produced MAX(date).
        let mut stmt = conn
            .prepare(
                "SELECT player_id, prop_type, line, league, opponent_team_id, over_odds, under_odds, MAX(date)
                 FROM prop_lines
                 WHERE season = ?1
                 GROUP BY player_id, prop_type, line
                 ORDER BY player_id, prop_type, line",
            )
            .context("failed to prepare line_targets query")?;
        let rows = stmt
            .query_map(params![season], |row| {
                Ok(LineTarget {
                    player_id: row.get(0)?,
                    prop_type: row.get(1)?,
                    line: row.get(2)?,
                    league: league_column(row, 3)?,
                    opponent_team_id: row.get(4)?,
                    over_odds: row.get(5)?,
                    under_odds: row.get(6)?,
                })
            })
            .context("failed to query line targets")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map line target rows")?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Missing-entities register
    // ------------------------------------------------------------------

    /// Record one sighting of an identifier that could not be resolved.
    pub fn record_missing(&self, kind: &str, raw_value: &str, league: Option<League>) -> Result<()> {
        let conn = self.conn();
        let now = now_text();
        conn.execute(
            "INSERT INTO missing_entities (kind, raw_value, league, occurrences, first_seen, last_seen)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)
             ON CONFLICT(kind, raw_value, league) DO UPDATE SET
                occurrences = missing_entities.occurrences + 1,
                last_seen   = excluded.last_seen",
            params![kind, raw_value, league.map(League::code).unwrap_or(""), now],
        )
        .context("failed to record missing entity")?;
        Ok(())
    }

    /// The most frequently missed identifiers, highest count first.
    pub fn missing_entities(&self, limit: usize) -> Result<Vec<MissingEntity>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT kind, raw_value, league, occurrences, first_seen, last_seen
                 FROM missing_entities
                 ORDER BY occurrences DESC, kind, raw_value
                 LIMIT ?1",
            )
            .context("failed to prepare missing_entities query")?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                let league: String = row.get(2)?;
                Ok(MissingEntity {
                    kind: row.get(0)?,
                    raw_value: row.get(1)?,
                    league: league.parse().ok(),
                    occurrences: row.get(3)?,
                    first_seen: row.get(4)?,
                    last_seen: row.get(5)?,
                })
            })
            .context("failed to query missing entities")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map missing entity rows")?;
        Ok(rows)
    }

    pub fn missing_entity_count(&self) -> Result<i64> {
        let conn = self.conn();
        conn.query_row("SELECT COUNT(*) FROM missing_entities", [], |row| row.get(0))
            .context("failed to count missing entities")
    }

    // ------------------------------------------------------------------
    // Defense ranks
    // ------------------------------------------------------------------

    /// Prop types that have game logs for a league/season.
    pub fn game_log_prop_types(&self, league: League, season: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT prop_type FROM player_game_logs
                 WHERE league = ?1 AND season = ?2 ORDER BY prop_type",
            )
            .context("failed to prepare game_log_prop_types query")?;
        let rows = stmt
            .query_map(params![league.code(), season], |row| row.get(0))
            .context("failed to query game log prop types")?
            .collect::<std::result::Result<Vec<String>, _>>()
            .context("failed to map prop type rows")?;
        Ok(rows)
    }

    /// Stat allowed per game by each opponent: per-game sums across every
    /// player who faced the team, averaged over the team's tracked games.
    pub fn allowed_per_game(&self, league: League, season: &str, prop_type: &str) -> Result<Vec<TeamAllowed>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "WITH per_game AS (
                    SELECT opponent_team_id AS team_id, game_id, SUM(actual_value) AS allowed
                    FROM player_game_logs
                    WHERE league = ?1 AND season = ?2 AND prop_type = ?3
                      AND opponent_team_id IS NOT NULL AND opponent_team_id <> ''
                    GROUP BY opponent_team_id, game_id
                 )
                 SELECT team_id, AVG(allowed), COUNT(*)
                 FROM per_game
                 GROUP BY team_id
                 ORDER BY team_id",
            )
            .context("failed to prepare allowed_per_game query")?;
        let rows = stmt
            .query_map(params![league.code(), season, prop_type], |row| {
                Ok(TeamAllowed {
                    team_id: row.get(0)?,
                    allowed_per_game: row.get(1)?,
                    games_tracked: row.get(2)?,
                })
            })
            .context("failed to query allowed per game")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map allowed per game rows")?;
        Ok(rows)
    }

    /// Replace every rank row for `(league, season, prop_type)` in one
    /// transaction. Readers never observe a partially written ranking.
    pub fn replace_defense_ranks(
        &self,
        league: League,
        season: &str,
        prop_type: &str,
        ranks: &[DefenseRank],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin defense rank transaction")?;
        tx.execute(
            "DELETE FROM defense_ranks WHERE league = ?1 AND season = ?2 AND prop_type = ?3",
            params![league.code(), season, prop_type],
        )
        .context("failed to delete defense ranks")?;
        for rank in ranks {
            tx.execute(
                "INSERT INTO defense_ranks
                    (league, season, prop_type, team_id, allowed_per_game, games_tracked, rank, rank_percentile)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    league.code(),
                    season,
                    prop_type,
                    rank.team_id,
                    rank.allowed_per_game,
                    rank.games_tracked,
                    rank.rank,
                    rank.rank_percentile,
                ],
            )
            .context("failed to insert defense rank")?;
        }
        tx.commit().context("failed to commit defense ranks")?;
        Ok(())
    }

    pub fn load_defense_ranks(&self, league: League, season: &str, prop_type: &str) -> Result<Vec<DefenseRank>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, allowed_per_game, games_tracked, rank, rank_percentile
                 FROM defense_ranks
                 WHERE league = ?1 AND season = ?2 AND prop_type = ?3
                 ORDER BY rank, team_id",
            )
            .context("failed to prepare load_defense_ranks query")?;
        let rows = stmt
            .query_map(params![league.code(), season, prop_type], |row| {
                Ok(DefenseRank {
                    team_id: row.get(0)?,
                    allowed_per_game: row.get(1)?,
                    games_tracked: row.get(2)?,
                    rank: row.get(3)?,
                    rank_percentile: row.get(4)?,
                })
            })
            .context("failed to query defense ranks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map defense rank rows")?;
        Ok(rows)
    }

    /// One team's rank for a prop type, plus the number of ranked teams.
    pub fn defense_rank_for(
        &self,
        league: League,
        season: &str,
        prop_type: &str,
        team_id: &str,
    ) -> Result<Option<(DefenseRank, i64)>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT team_id, allowed_per_game, games_tracked, rank, rank_percentile,
                    (SELECT COUNT(*) FROM defense_ranks d
                     WHERE d.league = r.league AND d.season = r.season AND d.prop_type = r.prop_type)
             FROM defense_ranks r
             WHERE league = ?1 AND season = ?2 AND prop_type = ?3 AND team_id = ?4",
            params![league.code(), season, prop_type, team_id],
            |row| {
                Ok((
                    DefenseRank {
                        team_id: row.get(0)?,
                        allowed_per_game: row.get(1)?,
                        games_tracked: row.get(2)?,
                        rank: row.get(3)?,
                        rank_percentile: row.get(4)?,
                    },
                    row.get(5)?,
                ))
            },
        )
        .optional()
        .context("failed to load defense rank")
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    /// Replace the analytics rows of a season with a fresh recompute.
    pub fn replace_analytics(&self, season: &str, records: &[AnalyticsRecord]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin analytics transaction")?;
        tx.execute("DELETE FROM analytics WHERE season = ?1", params![season])
            .context("failed to delete analytics rows")?;
        let computed_at = now_text();
        for record in records {
            let json = serde_json::to_string(record).context("failed to serialize analytics record")?;
            tx.execute(
                "INSERT OR REPLACE INTO analytics
                    (player_id, prop_type, line, direction, season, record, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.player_id,
                    record.prop_type,
                    record.line,
                    record.direction.as_str(),
                    season,
                    json,
                    computed_at,
                ],
            )
            .context("failed to insert analytics record")?;
        }
        tx.commit().context("failed to commit analytics")?;
        Ok(())
    }

    pub fn load_analytics(&self, player_id: &str, prop_type: &str, season: &str) -> Result<Vec<AnalyticsRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT record FROM analytics
                 WHERE player_id = ?1 AND prop_type = ?2 AND season = ?3
                 ORDER BY line, direction",
            )
            .context("failed to prepare load_analytics query")?;
        let rows = stmt
            .query_map(params![player_id, prop_type, season], |row| row.get::<_, String>(0))
            .context("failed to query analytics")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map analytics rows")?;
        rows.iter()
            .map(|json| serde_json::from_str(json).context("failed to deserialize analytics record"))
            .collect()
    }

    // ------------------------------------------------------------------
    // Health queries
    // ------------------------------------------------------------------

    pub fn prop_line_stats(&self) -> Result<TableStats> {
        self.table_stats("SELECT COUNT(*), MIN(date), MAX(date) FROM prop_lines")
    }

    pub fn game_log_stats(&self) -> Result<TableStats> {
        self.table_stats("SELECT COUNT(*), MIN(date), MAX(date) FROM player_game_logs")
    }

    fn table_stats(&self, sql: &str) -> Result<TableStats> {
        let conn = self.conn();
        let (rows, earliest, latest): (i64, Option<String>, Option<String>) = conn
            .query_row(sql, [], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .context("failed to query table stats")?;
        Ok(TableStats {
            rows,
            earliest: earliest.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            latest: latest.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        })
    }

    /// Row counts per league for prop lines and game logs.
    pub fn league_distribution(&self) -> Result<Vec<(String, i64, i64)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT league, SUM(lines), SUM(logs) FROM (
                    SELECT league, COUNT(*) AS lines, 0 AS logs FROM prop_lines GROUP BY league
                    UNION ALL
                    SELECT league, 0, COUNT(*) FROM player_game_logs GROUP BY league
                 ) GROUP BY league ORDER BY league",
            )
            .context("failed to prepare league_distribution query")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .context("failed to query league distribution")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map league distribution rows")?;
        Ok(rows)
    }

    pub fn distinct_prop_types(&self) -> Result<(Vec<String>, Vec<String>)> {
        let conn = self.conn();
        let mut lines_stmt = conn
            .prepare("SELECT DISTINCT prop_type FROM prop_lines ORDER BY prop_type")
            .context("failed to prepare prop line prop types query")?;
        let lines = lines_stmt
            .query_map([], |row| row.get(0))
            .context("failed to query prop line prop types")?
            .collect::<std::result::Result<Vec<String>, _>>()
            .context("failed to map prop type rows")?;
        let mut logs_stmt = conn
            .prepare("SELECT DISTINCT prop_type FROM player_game_logs ORDER BY prop_type")
            .context("failed to prepare game log prop types query")?;
        let logs = logs_stmt
            .query_map([], |row| row.get(0))
            .context("failed to query game log prop types")?
            .collect::<std::result::Result<Vec<String>, _>>()
            .context("failed to map prop type rows")?;
        Ok((lines, logs))
    }

    /// Count rows whose canonical columns hold one of `placeholders`
    /// (compared trimmed and case-insensitively). Returns
    /// `("table.column", count)` for every column with at least one hit.
    pub fn placeholder_leaks(&self, placeholders: &[&str]) -> Result<Vec<(String, i64)>> {
        if placeholders.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let marks = vec!["?"; placeholders.len()].join(", ");
        let mut leaks = Vec::new();
        for (table, column) in CANONICAL_COLUMNS {
            let sql = format!(
                "SELECT COUNT(*) FROM {table}
                 WHERE {column} IS NOT NULL AND lower(trim({column})) IN ({marks})"
            );
            let count: i64 = conn
                .query_row(&sql, params_from_iter(placeholders.iter()), |row| row.get(0))
                .with_context(|| format!("failed to count placeholders in {table}.{column}"))?;
            if count > 0 {
                leaks.push((format!("{table}.{column}"), count));
            }
        }
        Ok(leaks)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn outcome(existed: bool, changed: usize) -> UpsertOutcome {
    match (existed, changed) {
        (false, _) => UpsertOutcome::Inserted,
        (true, 0) => UpsertOutcome::Unchanged,
        (true, _) => UpsertOutcome::Updated,
    }
}

fn row_exists(conn: &Connection, sql: &str, key: &str) -> Result<bool> {
    conn.query_row(sql, params![key], |row| row.get(0))
        .context("failed to check row existence")
}

fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn now_text() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn parse_league(idx: usize, code: &str) -> rusqlite::Result<League> {
    code.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn league_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<League> {
    let code: String = row.get(idx)?;
    parse_league(idx, &code)
}

fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

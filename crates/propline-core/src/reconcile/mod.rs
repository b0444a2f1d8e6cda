// Ingestion reconciler: raw upstream records -> resolved, validated facts ->
// idempotent upserts, with per-record error isolation.
//
// A batch is prepared in one pass (identity resolution, validation, in-batch
// de-duplication) and then written in fixed-size sub-batches on the blocking
// pool. Pages of a feed are processed strictly in order.

mod summary;

pub use summary::ReconcileSummary;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::db::{Database, UpsertOutcome};
use crate::feed::odds::bookmaker_name;
use crate::feed::{with_retry, FeedPage, RecordFeed, RetryPolicy, UpstreamError};
use crate::identity::{IdentityResolver, Resolution};
use crate::model::{
    conflict_key, parse_american_odds, parse_date, parse_number, CanonicalPlayer, League, PlayerGameLog,
    PropLine, RawGameLog, RawPropLine, RawRecord,
};

// ---------------------------------------------------------------------------
// Per-record errors
// ---------------------------------------------------------------------------

/// Which identity failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Player,
    Team,
    PropType,
}

impl IdentityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentityKind::Player => "player",
            IdentityKind::Team => "team",
            IdentityKind::PropType => "prop_type",
        }
    }
}

impl std::fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single record was skipped. Never propagated past the record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("unresolved {kind} `{raw}`")]
    UnresolvedIdentifier { kind: IdentityKind, raw: String },

    #[error("invalid `{field}`: {message}")]
    ConstraintViolation { field: String, message: String },
}

impl RecordError {
    /// Summary category this error is counted under.
    pub fn category(&self) -> &'static str {
        match self {
            RecordError::UnresolvedIdentifier { kind: IdentityKind::Player, .. } => "unresolved_player",
            RecordError::UnresolvedIdentifier { kind: IdentityKind::Team, .. } => "unresolved_team",
            RecordError::UnresolvedIdentifier { kind: IdentityKind::PropType, .. } => "unresolved_prop_type",
            RecordError::ConstraintViolation { .. } => "constraint_violation",
        }
    }
}

// ---------------------------------------------------------------------------
// Prepared records
// ---------------------------------------------------------------------------

/// A fully resolved record, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    PropLine { player: CanonicalPlayer, line: PropLine },
    GameLog { player: CanonicalPlayer, log: PlayerGameLog },
}

impl Prepared {
    /// In-batch identity: the conflict key for prop lines, the
    /// `(player, date, prop_type)` triple for game logs.
    pub fn key(&self) -> String {
        match self {
            Prepared::PropLine { line, .. } => format!("line:{}", line.conflict_key),
            Prepared::GameLog { log, .. } => {
                format!("log:{}|{}|{}", log.player_id, log.date.format("%Y-%m-%d"), log.prop_type)
            }
        }
    }

    fn league(&self) -> League {
        match self {
            Prepared::PropLine { line, .. } => line.league,
            Prepared::GameLog { log, .. } => log.league,
        }
    }

    fn prop_type(&self) -> &str {
        match self {
            Prepared::PropLine { line, .. } => &line.prop_type,
            Prepared::GameLog { log, .. } => &log.prop_type,
        }
    }
}

/// One unresolved sighting destined for the missing-entities register.
#[derive(Debug, Clone, PartialEq)]
struct Sighting {
    kind: IdentityKind,
    raw: String,
    league: Option<League>,
}

struct PreparedBatch {
    unique: Vec<Prepared>,
    missing: Vec<Sighting>,
    summary: ReconcileSummary,
}

/// Resolve and validate one raw record.
pub fn prepare_record(resolver: &IdentityResolver, raw: &RawRecord) -> Result<Prepared, RecordError> {
    match raw {
        RawRecord::PropLine(r) => prepare_prop_line(resolver, r),
        RawRecord::GameLog(r) => prepare_game_log(resolver, r),
    }
}

fn prepare_prop_line(resolver: &IdentityResolver, r: &RawPropLine) -> Result<Prepared, RecordError> {
    let league = parse_league(&r.league)?;
    let player = resolve_player(resolver, &r.player, league)?;
    let prop_type = resolve_prop_type(resolver, &r.prop_type, league)?;
    let team_id = resolve_optional_team(resolver, r.team.as_deref(), league)?;
    let opponent_team_id = resolve_optional_team(resolver, r.opponent.as_deref(), league)?;

    let date = parse_date("date", &r.date)?;
    let season = required("season", &r.season)?;
    let sportsbook = bookmaker_name(&required("sportsbook", &r.sportsbook)?);
    let line = parse_number("line", &r.line)?;
    let over_odds = optional_odds("over_odds", r.over_odds.as_ref())?;
    let under_odds = optional_odds("under_odds", r.under_odds.as_ref())?;

    let player = CanonicalPlayer {
        team_id: team_id.clone(),
        ..player
    };
    Ok(Prepared::PropLine {
        line: PropLine {
            conflict_key: conflict_key(&player.player_id, date, &prop_type, &sportsbook, league, &season),
            player_id: player.player_id.clone(),
            date,
            prop_type,
            sportsbook,
            league,
            season,
            line,
            over_odds,
            under_odds,
            team_id,
            opponent_team_id,
            game_id: r.game_id.as_deref().map(str::trim).filter(|g| !g.is_empty()).map(str::to_string),
        },
        player,
    })
}

fn prepare_game_log(resolver: &IdentityResolver, r: &RawGameLog) -> Result<Prepared, RecordError> {
    let league = parse_league(&r.league)?;
    let player = resolve_player(resolver, &r.player, league)?;
    let prop_type = resolve_prop_type(resolver, &r.prop_type, league)?;
    let team_id = resolve_optional_team(resolver, r.team.as_deref(), league)?;
    let opponent_team_id = resolve_optional_team(resolver, r.opponent.as_deref(), league)?;

    let date = parse_date("date", &r.date)?;
    let season = required("season", &r.season)?;
    let actual_value = parse_number("value", &r.value)?;
    // Without an upstream game id, one game per player per date.
    let game_id = r
        .game_id
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map_or_else(|| date.format("%Y-%m-%d").to_string(), str::to_string);

    let player = CanonicalPlayer {
        team_id: team_id.clone(),
        ..player
    };
    Ok(Prepared::GameLog {
        log: PlayerGameLog {
            player_id: player.player_id.clone(),
            date,
            prop_type,
            league,
            season,
            game_id,
            team_id,
            opponent_team_id,
            actual_value,
            hit: r.hit,
        },
        player,
    })
}

fn parse_league(raw: &str) -> Result<League, RecordError> {
    raw.parse().map_err(|e| RecordError::ConstraintViolation {
        field: "league".into(),
        message: format!("{e}"),
    })
}

fn resolve_player(resolver: &IdentityResolver, raw: &str, league: League) -> Result<CanonicalPlayer, RecordError> {
    match resolver.resolve_player(raw) {
        Resolution::Resolved(identity) => {
            if let Some(player_league) = identity.league {
                if player_league != league {
                    return Err(RecordError::ConstraintViolation {
                        field: "league".into(),
                        message: format!("player {} belongs to {player_league}, record says {league}", identity.player_id),
                    });
                }
            }
            Ok(CanonicalPlayer {
                player_id: identity.player_id,
                display_name: identity.display_name,
                league,
                team_id: None,
                position: None,
            })
        }
        Resolution::Unresolved => Err(RecordError::UnresolvedIdentifier {
            kind: IdentityKind::Player,
            raw: raw.to_string(),
        }),
    }
}

fn resolve_prop_type(resolver: &IdentityResolver, raw: &str, league: League) -> Result<String, RecordError> {
    resolver
        .resolve_prop_type(raw, league)
        .ok()
        .ok_or_else(|| RecordError::UnresolvedIdentifier {
            kind: IdentityKind::PropType,
            raw: raw.to_string(),
        })
}

/// An absent or blank team is simply unknown; a present one must resolve.
fn resolve_optional_team(
    resolver: &IdentityResolver,
    raw: Option<&str>,
    league: League,
) -> Result<Option<String>, RecordError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => match resolver.resolve_team(name, league) {
            Resolution::Resolved(abbr) => {
                if !resolver.is_known_team(&abbr, league) {
                    debug!(league = %league, team = %abbr, "short team code not in dictionary, kept as given");
                }
                Ok(Some(abbr))
            }
            Resolution::Unresolved => Err(RecordError::UnresolvedIdentifier {
                kind: IdentityKind::Team,
                raw: name.to_string(),
            }),
        },
    }
}

fn required(field: &str, raw: &str) -> Result<String, RecordError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RecordError::ConstraintViolation {
            field: field.to_string(),
            message: "must not be empty".into(),
        });
    }
    Ok(trimmed.to_string())
}

fn optional_odds(field: &str, raw: Option<&Value>) -> Result<Option<i32>, RecordError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_american_odds(field, v).map(Some),
    }
}

// ---------------------------------------------------------------------------
// Write counters
// ---------------------------------------------------------------------------

/// Shared tallies for concurrent sub-batch workers.
#[derive(Debug, Default)]
struct WriteCounters {
    inserted: AtomicUsize,
    updated: AtomicUsize,
    unchanged: AtomicUsize,
    errors: AtomicUsize,
}

impl WriteCounters {
    fn record(&self, outcome: UpsertOutcome) {
        let counter = match outcome {
            UpsertOutcome::Inserted => &self.inserted,
            UpsertOutcome::Updated => &self.updated,
            UpsertOutcome::Unchanged => &self.unchanged,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold the counters into `summary`. Records whose worker never
    /// reported (a panicked task) are counted as errors.
    fn apply(&self, summary: &mut ReconcileSummary, attempted: usize) {
        summary.inserted += self.inserted.load(Ordering::Relaxed);
        summary.updated += self.updated.load(Ordering::Relaxed);
        summary.unchanged += self.unchanged.load(Ordering::Relaxed);
        let reported = self.inserted.load(Ordering::Relaxed)
            + self.updated.load(Ordering::Relaxed)
            + self.unchanged.load(Ordering::Relaxed)
            + self.errors.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed) + attempted.saturating_sub(reported);
        summary.errors += errors;
        if errors > 0 {
            *summary.by_category.entry("store_error".to_string()).or_default() += errors;
        }
    }
}

fn write_one(db: &Database, record: &Prepared) -> anyhow::Result<UpsertOutcome> {
    match record {
        Prepared::PropLine { player, line } => {
            db.upsert_player(player)?;
            db.upsert_prop_line(line)
        }
        Prepared::GameLog { player, log } => {
            db.upsert_player(player)?;
            db.upsert_game_log(log)
        }
    }
}

fn write_chunk(db: &Database, chunk: &[Prepared], counters: &WriteCounters) {
    for record in chunk {
        match write_one(db, record) {
            Ok(outcome) => {
                debug!(key = %record.key(), ?outcome, "upserted");
                counters.record(outcome);
            }
            Err(e) => {
                error!(key = %record.key(), "store write failed: {e:#}");
                counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

fn record_sightings(db: &Database, sightings: &[Sighting]) {
    for s in sightings {
        if let Err(e) = db.record_missing(s.kind.as_str(), &s.raw, s.league) {
            warn!(kind = %s.kind, raw = %s.raw, "failed to record missing entity: {e:#}");
        }
    }
}

// ---------------------------------------------------------------------------
// Feed runs
// ---------------------------------------------------------------------------

/// Outcome of walking one feed's pages.
#[derive(Debug, Default)]
pub struct FeedRun {
    pub summary: ReconcileSummary,
    /// Pages fetched and reconciled.
    pub pages: usize,
    /// The failure that stopped the run early, if any. Pages before it stay
    /// committed.
    pub aborted: Option<UpstreamError>,
}

/// Paging settings for `run_feed`.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub retry: RetryPolicy,
    pub page_delay: Duration,
    pub max_pages: usize,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    db: Arc<Database>,
    resolver: Arc<IdentityResolver>,
    sub_batch_size: usize,
}

impl Reconciler {
    pub fn new(db: Arc<Database>, resolver: IdentityResolver, sub_batch_size: usize) -> Self {
        Self {
            db,
            resolver: Arc::new(resolver),
            sub_batch_size: sub_batch_size.max(1),
        }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Resolve every record, tally skips, and collapse duplicate keys so
    /// the last occurrence wins.
    fn prepare_batch(&self, batch: &[RawRecord]) -> PreparedBatch {
        let mut summary = ReconcileSummary {
            processed: batch.len(),
            ..Default::default()
        };
        let mut missing = Vec::new();
        let mut unique: Vec<Prepared> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for raw in batch {
            match prepare_record(&self.resolver, raw) {
                Ok(prepared) => match index.get(&prepared.key()) {
                    Some(&slot) => {
                        summary.duplicates += 1;
                        unique[slot] = prepared;
                    }
                    None => {
                        index.insert(prepared.key(), unique.len());
                        unique.push(prepared);
                    }
                },
                Err(e) => {
                    summary.skipped += 1;
                    summary.bump_category(e.category());
                    match &e {
                        RecordError::UnresolvedIdentifier { kind, raw: value } => {
                            warn!(kind = %kind, raw = %value, league = raw.league(), "unresolved identifier, skipping record");
                            missing.push(Sighting {
                                kind: *kind,
                                raw: value.clone(),
                                league: raw.league().parse().ok(),
                            });
                        }
                        RecordError::ConstraintViolation { .. } => {
                            warn!(league = raw.league(), "skipping record: {e}");
                        }
                    }
                }
            }
        }

        for record in &unique {
            *summary.by_league.entry(record.league().code().to_string()).or_default() += 1;
            *summary.by_prop_type.entry(record.prop_type().to_string()).or_default() += 1;
            if let Prepared::PropLine { line, .. } = record {
                *summary.by_sportsbook.entry(line.sportsbook.clone()).or_default() += 1;
            }
        }

        PreparedBatch {
            unique,
            missing,
            summary,
        }
    }

    /// Reconcile one batch, fanning sub-batches out to the blocking pool.
    pub async fn reconcile(&self, batch: Vec<RawRecord>) -> ReconcileSummary {
        let PreparedBatch {
            unique,
            missing,
            mut summary,
        } = self.prepare_batch(&batch);

        let counters = Arc::new(WriteCounters::default());
        let mut tasks = Vec::new();
        if !missing.is_empty() {
            let db = Arc::clone(&self.db);
            tasks.push(tokio::task::spawn_blocking(move || record_sightings(&db, &missing)));
        }
        for chunk in unique.chunks(self.sub_batch_size) {
            let chunk = chunk.to_vec();
            let db = Arc::clone(&self.db);
            let counters = Arc::clone(&counters);
            tasks.push(tokio::task::spawn_blocking(move || write_chunk(&db, &chunk, &counters)));
        }

        for result in futures_util::future::join_all(tasks).await {
            if let Err(e) = result {
                error!("reconcile worker failed: {e}");
            }
        }

        counters.apply(&mut summary, unique.len());
        summary
    }

    /// Reconcile one batch on the calling thread.
    pub fn reconcile_blocking(&self, batch: &[RawRecord]) -> ReconcileSummary {
        let PreparedBatch {
            unique,
            missing,
            mut summary,
        } = self.prepare_batch(batch);
        record_sightings(&self.db, &missing);
        let counters = WriteCounters::default();
        write_chunk(&self.db, &unique, &counters);
        counters.apply(&mut summary, unique.len());
        summary
    }

    /// Walk a feed page by page. Each fetch goes through the retry policy;
    /// when retries run out the run stops and reports the failure, keeping
    /// everything already written.
    pub async fn run_feed(&self, feed: &dyn RecordFeed, settings: &FeedSettings) -> FeedRun {
        let mut run = FeedRun::default();
        let mut cursor: Option<String> = None;
        let mut finished = false;

        while run.pages < settings.max_pages {
            if run.pages > 0 {
                tokio::time::sleep(settings.page_delay).await;
            }

            let current = cursor.as_deref();
            let page = match with_retry(&settings.retry, feed.name(), || feed.fetch_page(current)).await {
                Ok(page) => page,
                Err(e) => {
                    error!(feed = feed.name(), page = run.pages + 1, "page fetch failed, stopping feed: {e}");
                    run.summary.bump_category("upstream_failure");
                    run.aborted = Some(e);
                    break;
                }
            };

            let FeedPage { records, next_cursor } = page;
            let page_summary = self.reconcile(records).await;
            run.pages += 1;
            info!(feed = feed.name(), page = run.pages, "{page_summary}");
            run.summary.merge(&page_summary);

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    finished = true;
                    break;
                }
            }
        }

        if !finished && run.aborted.is_none() {
            warn!(feed = feed.name(), max_pages = settings.max_pages, "stopped at page limit");
        }
        run
    }
}

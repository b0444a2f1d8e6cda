// Health and consistency checks over the canonical store.
//
// The monitor only reports. It never rewrites aliases, merges franchises,
// or deletes leaked placeholder rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::{Database, TableStats};
use crate::identity::props::{is_canonical, is_canonical_anywhere};
use crate::identity::PLACEHOLDERS;
use crate::model::PropTypeAlias;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIssue {
    pub check: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl HealthIssue {
    fn new(check: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            check,
            severity,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub reference_date: NaiveDate,
    pub issues: Vec<HealthIssue>,
    /// Prop-type names connected through the alias table. Reported only.
    pub alias_classes: Vec<Vec<String>>,
}

impl HealthReport {
    pub fn worst(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn by_check(&self, check: &str) -> Vec<&HealthIssue> {
        self.issues.iter().filter(|i| i.check == check).collect()
    }

    /// Emit every issue at the matching tracing level.
    pub fn log(&self) {
        for issue in &self.issues {
            match issue.severity {
                Severity::Info => info!(check = issue.check, "{}", issue.message),
                Severity::Warning => warn!(check = issue.check, "{}", issue.message),
                Severity::Critical => error!(check = issue.check, "{}", issue.message),
            }
        }
        info!(
            reference_date = %self.reference_date,
            critical = self.count(Severity::Critical),
            warnings = self.count(Severity::Warning),
            alias_classes = self.alias_classes.len(),
            "health report complete"
        );
    }
}

pub struct HealthMonitor<'a> {
    db: &'a Database,
    stale_after_days: i64,
    sample_limit: usize,
}

impl<'a> HealthMonitor<'a> {
    pub fn new(db: &'a Database, stale_after_days: i64, sample_limit: usize) -> Self {
        Self {
            db,
            stale_after_days,
            sample_limit,
        }
    }

    /// Run every check against the store as of `today`.
    pub fn run(&self, today: NaiveDate) -> Result<HealthReport> {
        let mut issues = Vec::new();

        let lines = self.db.prop_line_stats()?;
        let logs = self.db.game_log_stats()?;
        self.check_table("prop_lines", &lines, today, &mut issues);
        self.check_table("player_game_logs", &logs, today, &mut issues);
        self.check_leagues(&mut issues)?;
        self.check_unresolved(&mut issues)?;
        self.check_placeholders(&mut issues)?;
        self.check_prop_overlap(&mut issues)?;

        let aliases = self.db.load_prop_aliases()?;
        let (alias_issues, alias_classes) = alias_graph_issues(&aliases);
        issues.extend(alias_issues);

        for (league, display_name, abbreviations) in self.db.duplicate_franchises()? {
            issues.push(HealthIssue::new(
                "duplicate_franchise",
                Severity::Warning,
                format!("{league} `{display_name}` stored under {}", abbreviations.join(", ")),
            ));
        }

        Ok(HealthReport {
            reference_date: today,
            issues,
            alias_classes,
        })
    }

    fn check_table(&self, table: &str, stats: &TableStats, today: NaiveDate, issues: &mut Vec<HealthIssue>) {
        let Some(latest) = stats.latest else {
            issues.push(HealthIssue::new("row_counts", Severity::Warning, format!("{table} is empty")));
            return;
        };
        let earliest = stats.earliest.map(|d| d.to_string()).unwrap_or_default();
        issues.push(HealthIssue::new(
            "row_counts",
            Severity::Info,
            format!("{table}: {} rows from {earliest} to {latest}", stats.rows),
        ));
        // A window reaching past the calendar's start can never be exceeded.
        let cutoff = Duration::try_days(self.stale_after_days).and_then(|d| today.checked_sub_signed(d));
        if cutoff.is_some_and(|cutoff| latest < cutoff) {
            issues.push(HealthIssue::new(
                "stale_data",
                Severity::Warning,
                format!(
                    "{table} newest date {latest} is more than {} days before {today}",
                    self.stale_after_days
                ),
            ));
        }
    }

    fn check_leagues(&self, issues: &mut Vec<HealthIssue>) -> Result<()> {
        for (league, lines, logs) in self.db.league_distribution()? {
            issues.push(HealthIssue::new(
                "league_distribution",
                Severity::Info,
                format!("{league}: {lines} prop lines, {logs} game logs"),
            ));
            if lines > 0 && logs == 0 {
                issues.push(HealthIssue::new(
                    "league_distribution",
                    Severity::Warning,
                    format!("{league} has prop lines but no game logs"),
                ));
            }
        }
        Ok(())
    }

    fn check_unresolved(&self, issues: &mut Vec<HealthIssue>) -> Result<()> {
        let total = self.db.missing_entity_count()?;
        if total == 0 {
            return Ok(());
        }
        let sample: Vec<String> = self
            .db
            .missing_entities(self.sample_limit)?
            .into_iter()
            .map(|m| format!("{}:{} (x{})", m.kind, m.raw_value, m.occurrences))
            .collect();
        issues.push(HealthIssue::new(
            "unresolved_identities",
            Severity::Warning,
            format!("{total} distinct unresolved identifiers; top: {}", sample.join(", ")),
        ));
        Ok(())
    }

    fn check_placeholders(&self, issues: &mut Vec<HealthIssue>) -> Result<()> {
        for (column, count) in self.db.placeholder_leaks(PLACEHOLDERS)? {
            issues.push(HealthIssue::new(
                "placeholder_leak",
                Severity::Critical,
                format!("{count} rows in {column} hold a placeholder value"),
            ));
        }
        Ok(())
    }

    fn check_prop_overlap(&self, issues: &mut Vec<HealthIssue>) -> Result<()> {
        let (lines, logs) = self.db.distinct_prop_types()?;
        if lines.is_empty() || logs.is_empty() {
            return Ok(());
        }
        let logs: BTreeSet<&str> = logs.iter().map(String::as_str).collect();
        let (covered, uncovered): (Vec<&str>, Vec<&str>) =
            lines.iter().map(String::as_str).partition(|p| logs.contains(p));
        if covered.is_empty() {
            issues.push(HealthIssue::new(
                "prop_type_overlap",
                Severity::Critical,
                "no prop type appears in both prop lines and game logs; analytics cannot be computed",
            ));
        } else if !uncovered.is_empty() {
            issues.push(HealthIssue::new(
                "prop_type_overlap",
                Severity::Info,
                format!("prop types with lines but no game logs: {}", uncovered.join(", ")),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Alias graph
// ---------------------------------------------------------------------------

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = ra.min(rb);
        }
    }
}

fn scope_label(row: &PropTypeAlias) -> &'static str {
    row.league.map(|l| l.code()).unwrap_or("global")
}

/// Inspect the alias table as a directed graph per league scope.
///
/// Flags bidirectional pairs, longer cycles, and targets outside the
/// canonical set. Also returns the equivalence classes (union-find over all
/// edges) that contain more than one name, sorted. Nothing is applied.
pub fn alias_graph_issues(aliases: &[PropTypeAlias]) -> (Vec<HealthIssue>, Vec<Vec<String>>) {
    let mut issues = Vec::new();

    let mut scopes: BTreeMap<&'static str, HashMap<&str, &str>> = BTreeMap::new();
    for row in aliases {
        scopes
            .entry(scope_label(row))
            .or_default()
            .insert(row.alias.as_str(), row.canonical.as_str());

        let canonical = match row.league {
            Some(league) => is_canonical(league, &row.canonical),
            None => is_canonical_anywhere(&row.canonical),
        };
        if !canonical {
            issues.push(HealthIssue::new(
                "alias_target",
                Severity::Warning,
                format!(
                    "[{}] `{}` maps to `{}`, which is not a canonical prop type",
                    scope_label(row),
                    row.alias,
                    row.canonical
                ),
            ));
        }
    }

    for (scope, edges) in &scopes {
        let mut seen_cycles: BTreeSet<Vec<&str>> = BTreeSet::new();
        for &start in edges.keys() {
            let mut path = vec![start];
            let mut node = start;
            while let Some(&next) = edges.get(node) {
                if next == start {
                    let mut members = path.clone();
                    members.sort_unstable();
                    if seen_cycles.insert(members.clone()) {
                        let (check, message) = if members.len() == 2 {
                            (
                                "alias_bidirectional",
                                format!("[{scope}] `{}` and `{}` alias each other", members[0], members[1]),
                            )
                        } else {
                            ("alias_cycle", format!("[{scope}] alias cycle through {}", members.join(" -> ")))
                        };
                        issues.push(HealthIssue::new(check, Severity::Warning, message));
                    }
                    break;
                }
                if path.contains(&next) || path.len() > edges.len() {
                    break;
                }
                path.push(next);
                node = next;
            }
        }
    }

    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for row in aliases {
        for name in [row.alias.as_str(), row.canonical.as_str()] {
            let next = index.len();
            index.entry(name).or_insert(next);
        }
    }
    let mut uf = UnionFind::new(index.len());
    for row in aliases {
        uf.union(index[row.alias.as_str()], index[row.canonical.as_str()]);
    }
    let mut classes: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (name, idx) in &index {
        classes.entry(uf.find(*idx)).or_default().push(name.to_string());
    }
    let mut classes: Vec<Vec<String>> = classes.into_values().filter(|c| c.len() > 1).collect();
    classes.sort();

    (issues, classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CanonicalPlayer, League, PropLine};

    fn alias(alias: &str, canonical: &str, league: Option<League>) -> PropTypeAlias {
        PropTypeAlias {
            alias: alias.to_string(),
            canonical: canonical.to_string(),
            league,
        }
    }

    #[test]
    fn sacks_pair_is_flagged_not_repaired() {
        let rows = vec![
            alias("sacks", "defense_sacks", Some(League::Nfl)),
            alias("defense_sacks", "sacks", Some(League::Nfl)),
            alias("pass_yds", "passing_yards", Some(League::Nfl)),
        ];
        let (issues, classes) = alias_graph_issues(&rows);

        let bidirectional: Vec<_> = issues.iter().filter(|i| i.check == "alias_bidirectional").collect();
        assert_eq!(bidirectional.len(), 1);
        assert!(bidirectional[0].message.contains("defense_sacks"));
        assert_eq!(issues.iter().filter(|i| i.check == "alias_target").count(), 2);

        assert_eq!(
            classes,
            vec![
                vec!["defense_sacks".to_string(), "sacks".to_string()],
                vec!["pass_yds".to_string(), "passing_yards".to_string()],
            ]
        );
    }

    #[test]
    fn longer_cycle_reported_once() {
        let rows = vec![
            alias("a", "b", None),
            alias("b", "c", None),
            alias("c", "a", None),
        ];
        let (issues, classes) = alias_graph_issues(&rows);
        let cycles: Vec<_> = issues.iter().filter(|i| i.check == "alias_cycle").collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].len(), 3);
    }

    #[test]
    fn clean_aliases_raise_nothing() {
        let rows = vec![
            alias("pts", "points", None),
            alias("sog", "shots_on_goal", Some(League::Nhl)),
        ];
        let (issues, _) = alias_graph_issues(&rows);
        assert!(issues.is_empty());
    }

    fn seeded() -> Database {
        let db = Database::open(":memory:").unwrap();
        db.upsert_player(&CanonicalPlayer {
            player_id: "josh-allen-1-nfl".to_string(),
            display_name: "Josh Allen".to_string(),
            league: League::Nfl,
            team_id: Some("BUF".to_string()),
            position: None,
        })
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        db.upsert_prop_line(&PropLine {
            conflict_key: "k1".to_string(),
            player_id: "josh-allen-1-nfl".to_string(),
            date,
            prop_type: "passing_yards".to_string(),
            sportsbook: "FanDuel".to_string(),
            league: League::Nfl,
            season: "2025".to_string(),
            line: 250.5,
            over_odds: None,
            under_odds: None,
            team_id: Some("BUF".to_string()),
            opponent_team_id: Some("UNK".to_string()),
            game_id: None,
        })
        .unwrap();
        db
    }

    #[test]
    fn report_flags_stale_leaks_and_missing_logs() {
        let db = seeded();
        db.record_missing("player", "Unknown Guy", Some(League::Nfl)).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 10, 19).unwrap();

        let report = HealthMonitor::new(&db, 7, 5).run(today).unwrap();

        assert_eq!(report.worst(), Some(Severity::Critical));
        assert_eq!(report.by_check("placeholder_leak").len(), 1);
        assert!(report.by_check("placeholder_leak")[0].message.contains("prop_lines.opponent_team_id"));
        assert!(report
            .by_check("stale_data")
            .iter()
            .any(|i| i.message.starts_with("prop_lines")));
        assert!(report
            .by_check("row_counts")
            .iter()
            .any(|i| i.message == "player_game_logs is empty"));
        assert!(report
            .by_check("league_distribution")
            .iter()
            .any(|i| i.severity == Severity::Warning));
        assert!(report.by_check("unresolved_identities")[0].message.contains("Unknown Guy"));
    }

    #[test]
    fn fresh_data_is_not_stale() {
        let db = seeded();
        let today = NaiveDate::from_ymd_opt(2025, 9, 3).unwrap();
        let report = HealthMonitor::new(&db, 7, 5).run(today).unwrap();
        assert!(report.by_check("stale_data").is_empty());
        assert!(report.by_check("unresolved_identities").is_empty());
    }

    #[test]
    fn huge_stale_window_never_flags() {
        let db = seeded();
        let today = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let report = HealthMonitor::new(&db, 100_000_000, 10).run(today).unwrap();
        assert!(report.by_check("stale_data").is_empty());

        let report = HealthMonitor::new(&db, i64::MAX, 10).run(today).unwrap();
        assert!(report.by_check("stale_data").is_empty());
    }
}

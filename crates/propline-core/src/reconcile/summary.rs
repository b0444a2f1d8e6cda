// Run summary for reconciliation batches and feed runs.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Counts for one batch, one page, or a whole run (via `merge`).
///
/// `processed` counts raw records received. Every processed record ends up
/// in exactly one of `inserted`, `updated`, `unchanged`, `skipped`,
/// `errors`, or `duplicates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Records superseded by a later record with the same key in the batch.
    pub duplicates: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_league: BTreeMap<String, usize>,
    pub by_sportsbook: BTreeMap<String, usize>,
    pub by_prop_type: BTreeMap<String, usize>,
}

impl ReconcileSummary {
    pub fn bump_category(&mut self, category: &str) {
        *self.by_category.entry(category.to_string()).or_default() += 1;
    }

    /// Rows written or confirmed by this batch.
    pub fn stored(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn merge(&mut self, other: &ReconcileSummary) {
        self.processed += other.processed;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.duplicates += other.duplicates;
        for (map, theirs) in [
            (&mut self.by_category, &other.by_category),
            (&mut self.by_league, &other.by_league),
            (&mut self.by_sportsbook, &other.by_sportsbook),
            (&mut self.by_prop_type, &other.by_prop_type),
        ] {
            for (key, count) in theirs {
                *map.entry(key.clone()).or_default() += count;
            }
        }
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} inserted={} updated={} unchanged={} skipped={} errors={} duplicates={}",
            self.processed, self.inserted, self.updated, self.unchanged, self.skipped, self.errors, self.duplicates
        )?;
        if !self.by_category.is_empty() {
            let parts: Vec<String> = self.by_category.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " [{}]", parts.join(" "))?;
        }
        Ok(())
    }
}

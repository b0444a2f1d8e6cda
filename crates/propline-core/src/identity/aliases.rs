// Hand-curated prop-type alias table: CSV loading and the in-memory lookup
// snapshot the resolver consults.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::identity::props::normalize_label;
use crate::model::{League, PropTypeAlias};

#[derive(Debug, thiserror::Error)]
pub enum AliasLoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// One CSV row: `alias,canonical,league`. An empty league column means the
/// alias applies to every league.
#[derive(Debug, Deserialize)]
struct RawAliasRow {
    alias: String,
    canonical: String,
    #[serde(default)]
    league: Option<String>,
}

/// Load alias rows from a CSV file on disk.
pub fn load_alias_csv(path: &Path) -> Result<Vec<PropTypeAlias>, AliasLoadError> {
    let file = std::fs::File::open(path).map_err(|e| AliasLoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_alias_csv(file, &path.display().to_string())
}

/// Parse alias rows from any reader. Rows with a blank alias or canonical
/// name, or an unknown league, are dropped with a warning.
pub fn parse_alias_csv<R: Read>(reader: R, label: &str) -> Result<Vec<PropTypeAlias>, AliasLoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut aliases = Vec::new();
    for result in rdr.deserialize::<RawAliasRow>() {
        let row = result.map_err(|e| AliasLoadError::Csv {
            path: label.to_string(),
            source: e,
        })?;
        if row.alias.is_empty() || row.canonical.is_empty() {
            warn!(file = label, alias = %row.alias, "skipping alias row with blank field");
            continue;
        }
        let league = match row.league.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(code) => match code.parse::<League>() {
                Ok(l) => Some(l),
                Err(e) => {
                    warn!(file = label, alias = %row.alias, "skipping alias row: {e}");
                    continue;
                }
            },
        };
        aliases.push(PropTypeAlias {
            alias: row.alias,
            canonical: row.canonical,
            league,
        });
    }
    Ok(aliases)
}

/// Lookup snapshot over the alias table.
///
/// Keys are stored twice: verbatim and normalized, so `"Sacks"` and
/// `"sacks"` find the same row. League-scoped rows win over global ones.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    scoped: HashMap<(League, String), String>,
    global: HashMap<String, String>,
}

impl AliasTable {
    pub fn new(rows: &[PropTypeAlias]) -> Self {
        let mut table = AliasTable::default();
        for row in rows {
            let canonical = row.canonical.trim().to_string();
            for key in [row.alias.trim().to_string(), normalize_label(&row.alias)] {
                if key.is_empty() {
                    continue;
                }
                match row.league {
                    Some(league) => {
                        table.scoped.insert((league, key), canonical.clone());
                    }
                    None => {
                        table.global.insert(key, canonical.clone());
                    }
                }
            }
        }
        table
    }

    /// Look up `key` for `league`, preferring a league-scoped row.
    pub fn get(&self, league: League, key: &str) -> Option<&str> {
        self.scoped
            .get(&(league, key.to_string()))
            .or_else(|| self.global.get(key))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scoped.len() + self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scoped.is_empty() && self.global.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "alias,canonical,league\n\
                       sacks,defense_sacks,\n\
                       defense_sacks,sacks,\n\
                       pts,points,NBA\n\
                       sog,shots_on_goal,NHL\n\
                       bogus,points,XFL\n\
                       ,points,\n";

    #[test]
    fn parses_rows_and_drops_bad_ones() {
        let rows = parse_alias_csv(CSV.as_bytes(), "inline").unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].alias, "sacks");
        assert_eq!(rows[0].league, None);
        assert_eq!(rows[2].league, Some(League::Nba));
    }

    #[test]
    fn scoped_rows_apply_only_to_their_league() {
        let rows = parse_alias_csv(CSV.as_bytes(), "inline").unwrap();
        let table = AliasTable::new(&rows);
        assert_eq!(table.get(League::Nba, "pts"), Some("points"));
        assert_eq!(table.get(League::Nfl, "pts"), None);
        assert_eq!(table.get(League::Nfl, "sacks"), Some("defense_sacks"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_alias_csv(Path::new("does/not/exist.csv")).unwrap_err();
        assert!(matches!(err, AliasLoadError::Io { .. }));
    }
}

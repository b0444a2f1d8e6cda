// Identity resolution: raw upstream strings -> canonical player, team, and
// prop-type identifiers.
//
// Every lookup walks the same ladder: exact match, case-insensitive retry,
// alias table, word-level fallback, and finally `Unresolved`. Nothing is
// ever upper-cased into existence; an input that clears no rung stays
// unresolved and the reconciler skips the record.

pub mod aliases;
pub mod players;
pub mod props;
pub mod teams;

use std::collections::HashMap;

use anyhow::Result;

use crate::db::Database;
use crate::model::{CanonicalPlayer, CanonicalTeam, League, PropTypeAlias};

use aliases::AliasTable;
use players::parse_upstream_player_id;
use props::{is_canonical, normalize_label};

/// Values upstream feeds use in place of a real identifier.
pub const PLACEHOLDERS: &[&str] = &[
    "", "unk", "unknown", "unknown player", "n/a", "na", "tbd", "home", "away", "null", "none",
    "undefined",
];

/// True for strings that must never become a canonical identifier.
pub fn is_placeholder(raw: &str) -> bool {
    let lower = raw.trim().to_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
}

// ---------------------------------------------------------------------------
// Resolution result
// ---------------------------------------------------------------------------

/// Outcome of a lookup. `Unresolved` is an explicit, expected result, not an
/// error: callers decide whether it means "skip" or "leave empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Resolved(T),
    Unresolved,
}

impl<T> Resolution<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Resolution::Resolved(v) => Some(v),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

impl<T> From<Option<T>> for Resolution<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Resolution::Resolved(v),
            None => Resolution::Unresolved,
        }
    }
}

/// A resolved player: the stable id plus the name to store on first sight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub player_id: String,
    pub display_name: String,
    pub league: Option<League>,
}

// ---------------------------------------------------------------------------
// Lookup directories
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TeamDirectory {
    /// Full name and abbreviation, verbatim.
    exact: HashMap<String, String>,
    /// Full name and abbreviation, lower-cased.
    lower: HashMap<String, String>,
    /// Alternate names, lower-cased.
    aliases: HashMap<String, String>,
}

impl TeamDirectory {
    fn insert(&mut self, team: &CanonicalTeam) {
        let abbr = team.abbreviation.clone();
        for key in [&team.abbreviation, &team.display_name] {
            self.exact.insert(key.clone(), abbr.clone());
            self.lower.insert(key.to_lowercase(), abbr.clone());
        }
        for alias in &team.aliases {
            self.aliases.insert(alias.to_lowercase(), abbr.clone());
        }
    }

    fn token(&self, token: &str) -> Option<&String> {
        let lower = token.to_lowercase();
        self.lower.get(&lower).or_else(|| self.aliases.get(&lower))
    }
}

#[derive(Debug, Default)]
struct PlayerDirectory {
    by_id: HashMap<String, CanonicalPlayer>,
    by_name: HashMap<String, Vec<String>>,
    by_lower_name: HashMap<String, Vec<String>>,
    aliases: HashMap<String, String>,
}

impl PlayerDirectory {
    fn identity(&self, player_id: &str) -> Option<PlayerIdentity> {
        self.by_id.get(player_id).map(|p| PlayerIdentity {
            player_id: p.player_id.clone(),
            display_name: p.display_name.clone(),
            league: Some(p.league),
        })
    }

    /// A name lookup only counts when it is unambiguous.
    fn unique(ids: Option<&Vec<String>>) -> Option<&str> {
        match ids {
            Some(ids) if ids.len() == 1 => Some(ids[0].as_str()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// IdentityResolver
// ---------------------------------------------------------------------------

/// Pure resolver over a snapshot of the static dictionaries, the known
/// players, and the alias tables. Build one per run.
#[derive(Debug, Default)]
pub struct IdentityResolver {
    teams: HashMap<League, TeamDirectory>,
    players: PlayerDirectory,
    prop_aliases: AliasTable,
}

impl IdentityResolver {
    pub fn new(
        teams: &[CanonicalTeam],
        players: &[CanonicalPlayer],
        player_aliases: &[(String, String)],
        prop_aliases: &[PropTypeAlias],
    ) -> Self {
        let mut team_dirs: HashMap<League, TeamDirectory> = HashMap::new();
        for team in teams {
            team_dirs.entry(team.league).or_default().insert(team);
        }

        let mut dir = PlayerDirectory::default();
        for p in players {
            dir.by_id.insert(p.player_id.clone(), p.clone());
            dir.by_name
                .entry(p.display_name.clone())
                .or_default()
                .push(p.player_id.clone());
            dir.by_lower_name
                .entry(p.display_name.to_lowercase())
                .or_default()
                .push(p.player_id.clone());
        }
        for (alias, player_id) in player_aliases {
            dir.aliases.insert(alias.trim().to_lowercase(), player_id.clone());
        }

        IdentityResolver {
            teams: team_dirs,
            players: dir,
            prop_aliases: AliasTable::new(prop_aliases),
        }
    }

    /// Build a resolver from the store's current reference data.
    pub fn load(db: &Database) -> Result<Self> {
        let teams = db.load_teams()?;
        let players = db.load_players()?;
        let player_aliases = db.load_player_aliases()?;
        let prop_aliases = db.load_prop_aliases()?;
        Ok(Self::new(&teams, &players, &player_aliases, &prop_aliases))
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Resolve a raw player string: known id or display name, then the
    /// player alias table, then the structured upstream id format.
    pub fn resolve_player(&self, raw: &str) -> Resolution<PlayerIdentity> {
        if is_placeholder(raw) {
            return Resolution::Unresolved;
        }
        let trimmed = raw.trim();
        let dir = &self.players;

        // (a) exact
        if let Some(identity) = dir.identity(trimmed) {
            return Resolution::Resolved(identity);
        }
        if let Some(id) = PlayerDirectory::unique(dir.by_name.get(trimmed)) {
            return dir.identity(id).into();
        }

        // (b) case-insensitive
        let lower = trimmed.to_lowercase();
        if let Some(identity) = dir.identity(&lower) {
            return Resolution::Resolved(identity);
        }
        if let Some(id) = PlayerDirectory::unique(dir.by_lower_name.get(&lower)) {
            return dir.identity(id).into();
        }

        // (c) alias table
        if let Some(id) = dir.aliases.get(&lower) {
            if let Some(identity) = dir.identity(id) {
                return Resolution::Resolved(identity);
            }
            return Resolution::Resolved(PlayerIdentity {
                player_id: id.clone(),
                display_name: trimmed.to_string(),
                league: None,
            });
        }

        // (d) structured upstream identifier
        if let Some(decoded) = parse_upstream_player_id(trimmed) {
            if let Some(identity) = dir.identity(&decoded.slug) {
                return Resolution::Resolved(identity);
            }
            return Resolution::Resolved(PlayerIdentity {
                player_id: decoded.slug,
                display_name: decoded.display_name,
                league: Some(decoded.league),
            });
        }

        Resolution::Unresolved
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Resolve a raw team string to the league's canonical abbreviation.
    pub fn resolve_team(&self, raw: &str, league: League) -> Resolution<String> {
        if is_placeholder(raw) {
            return Resolution::Unresolved;
        }
        let trimmed = raw.trim();
        let Some(dir) = self.teams.get(&league) else {
            return Resolution::Unresolved;
        };

        // (a) exact
        if let Some(abbr) = dir.exact.get(trimmed) {
            return Resolution::Resolved(abbr.clone());
        }

        // (b) case-insensitive
        let lower = trimmed.to_lowercase();
        if let Some(abbr) = dir.lower.get(&lower) {
            return Resolution::Resolved(abbr.clone());
        }

        // (c) alias table
        if let Some(abbr) = dir.aliases.get(&lower) {
            return Resolution::Resolved(abbr.clone());
        }

        // Already-abbreviated inputs pass through.
        if trimmed.len() <= 3 && trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Resolution::Resolved(trimmed.to_ascii_uppercase());
        }

        // (d) word-level fallback
        for token in trimmed.split_whitespace() {
            if let Some(abbr) = dir.token(token) {
                return Resolution::Resolved(abbr.clone());
            }
        }

        Resolution::Unresolved
    }

    /// True when `abbreviation` is in the league's dictionary, as opposed to
    /// an unknown short code that was passed through.
    pub fn is_known_team(&self, abbreviation: &str, league: League) -> bool {
        self.teams
            .get(&league)
            .is_some_and(|dir| dir.exact.get(abbreviation).is_some_and(|a| a == abbreviation))
    }

    // ------------------------------------------------------------------
    // Prop types
    // ------------------------------------------------------------------

    /// Resolve a raw prop label to a canonical prop type for `league`.
    ///
    /// An alias hit is returned as-is, even when its target is not in the
    /// league's canonical set; the health monitor reports such rows.
    pub fn resolve_prop_type(&self, raw: &str, league: League) -> Resolution<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_placeholder(trimmed) {
            return Resolution::Unresolved;
        }

        // (a) exact
        if is_canonical(league, trimmed) {
            return Resolution::Resolved(trimmed.to_string());
        }

        // (b) case-insensitive
        let normalized = normalize_label(trimmed);
        if is_canonical(league, &normalized) {
            return Resolution::Resolved(normalized);
        }

        // (c) alias table
        if let Some(canonical) = self
            .prop_aliases
            .get(league, trimmed)
            .or_else(|| self.prop_aliases.get(league, &normalized))
        {
            return Resolution::Resolved(canonical.to_string());
        }

        // (d) word-level fallback
        for token in trimmed.split_whitespace() {
            let token = normalize_label(token);
            if token.is_empty() {
                continue;
            }
            if is_canonical(league, &token) {
                return Resolution::Resolved(token);
            }
            if let Some(canonical) = self.prop_aliases.get(league, &token) {
                return Resolution::Resolved(canonical.to_string());
            }
        }

        Resolution::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(alias: &str, canonical: &str, league: Option<League>) -> PropTypeAlias {
        PropTypeAlias {
            alias: alias.into(),
            canonical: canonical.into(),
            league,
        }
    }

    fn resolver() -> IdentityResolver {
        let players = vec![
            CanonicalPlayer {
                player_id: "josh-allen-1-nfl".into(),
                display_name: "Josh Allen".into(),
                league: League::Nfl,
                team_id: Some("BUF".into()),
                position: Some("QB".into()),
            },
            CanonicalPlayer {
                player_id: "josh-allen-2-nfl".into(),
                display_name: "Josh Allen".into(),
                league: League::Nfl,
                team_id: Some("JAX".into()),
                position: Some("LB".into()),
            },
            CanonicalPlayer {
                player_id: "lebron-james-1-nba".into(),
                display_name: "LeBron James".into(),
                league: League::Nba,
                team_id: Some("LAL".into()),
                position: Some("SF".into()),
            },
        ];
        let player_aliases = vec![("King James".to_string(), "lebron-james-1-nba".to_string())];
        let prop_aliases = vec![
            alias("sacks", "defense_sacks", None),
            alias("defense_sacks", "sacks", None),
            alias("pass_yds", "passing_yards", Some(League::Nfl)),
            alias("pts", "points", Some(League::Nba)),
            alias("sog", "shots_on_goal", Some(League::Nhl)),
        ];
        IdentityResolver::new(&teams::all_static_teams(), &players, &player_aliases, &prop_aliases)
    }

    // -- players -----------------------------------------------------------

    #[test]
    fn player_exact_and_case_insensitive() {
        let r = resolver();
        let p = r.resolve_player("LeBron James").ok().unwrap();
        assert_eq!(p.player_id, "lebron-james-1-nba");
        let p = r.resolve_player("lebron james").ok().unwrap();
        assert_eq!(p.player_id, "lebron-james-1-nba");
        let p = r.resolve_player("josh-allen-2-nfl").ok().unwrap();
        assert_eq!(p.display_name, "Josh Allen");
    }

    #[test]
    fn ambiguous_display_name_is_unresolved() {
        let r = resolver();
        assert_eq!(r.resolve_player("Josh Allen"), Resolution::Unresolved);
    }

    #[test]
    fn player_alias_table() {
        let r = resolver();
        let p = r.resolve_player("king james").ok().unwrap();
        assert_eq!(p.player_id, "lebron-james-1-nba");
    }

    #[test]
    fn upstream_id_maps_to_known_player() {
        let r = resolver();
        let p = r.resolve_player("JOSH_ALLEN_1_NFL").ok().unwrap();
        assert_eq!(p.player_id, "josh-allen-1-nfl");
    }

    #[test]
    fn upstream_id_creates_new_identity() {
        let r = resolver();
        let p = r.resolve_player("JALEN_HURTS_1_NFL").ok().unwrap();
        assert_eq!(p.player_id, "jalen-hurts-1-nfl");
        assert_eq!(p.display_name, "Jalen Hurts");
        assert_eq!(p.league, Some(League::Nfl));
    }

    #[test]
    fn unknown_free_text_player_is_unresolved() {
        let r = resolver();
        assert_eq!(r.resolve_player("Some Guy"), Resolution::Unresolved);
        assert_eq!(r.resolve_player("Unknown Player"), Resolution::Unresolved);
        assert_eq!(r.resolve_player("  "), Resolution::Unresolved);
    }

    // -- teams -------------------------------------------------------------

    #[test]
    fn team_full_name_exact_and_case_insensitive() {
        let r = resolver();
        assert_eq!(r.resolve_team("Kansas City Chiefs", League::Nfl), Resolution::Resolved("KC".into()));
        assert_eq!(r.resolve_team("kansas city chiefs", League::Nfl), Resolution::Resolved("KC".into()));
        assert_eq!(r.resolve_team("Boston Celtics", League::Nba), Resolution::Resolved("BOS".into()));
    }

    #[test]
    fn team_aliases_resolve_within_league() {
        let r = resolver();
        assert_eq!(r.resolve_team("JAC", League::Nfl), Resolution::Resolved("JAX".into()));
        assert_eq!(r.resolve_team("Oakland Raiders", League::Nfl), Resolution::Resolved("LV".into()));
        assert_eq!(r.resolve_team("Rangers", League::Mlb), Resolution::Resolved("TEX".into()));
        assert_eq!(r.resolve_team("Rangers", League::Nhl), Resolution::Resolved("NYR".into()));
    }

    #[test]
    fn short_codes_pass_through() {
        let r = resolver();
        assert_eq!(r.resolve_team("gb", League::Nfl), Resolution::Resolved("GB".into()));
        assert_eq!(r.resolve_team("XYZ", League::Nfl), Resolution::Resolved("XYZ".into()));
        assert!(!r.is_known_team("XYZ", League::Nfl));
        assert!(r.is_known_team("GB", League::Nfl));
    }

    #[test]
    fn team_word_level_fallback() {
        let r = resolver();
        assert_eq!(r.resolve_team("the Chiefs offense", League::Nfl), Resolution::Resolved("KC".into()));
        assert_eq!(r.resolve_team("KC Chiefs", League::Nfl), Resolution::Resolved("KC".into()));
    }

    #[test]
    fn unrecognized_team_is_not_uppercased() {
        let r = resolver();
        assert_eq!(r.resolve_team("Springfield Isotopes", League::Mlb), Resolution::Unresolved);
        assert_eq!(r.resolve_team("UNK", League::Nfl), Resolution::Unresolved);
        assert_eq!(r.resolve_team("HOME", League::Nfl), Resolution::Unresolved);
    }

    // -- prop types --------------------------------------------------------

    #[test]
    fn prop_exact_and_case_insensitive() {
        let r = resolver();
        assert_eq!(r.resolve_prop_type("passing_yards", League::Nfl), Resolution::Resolved("passing_yards".into()));
        assert_eq!(r.resolve_prop_type("Passing Yards", League::Nfl), Resolution::Resolved("passing_yards".into()));
        assert_eq!(r.resolve_prop_type("SHOTS ON GOAL", League::Nhl), Resolution::Resolved("shots_on_goal".into()));
    }

    #[test]
    fn prop_aliases_respect_league_scope() {
        let r = resolver();
        assert_eq!(r.resolve_prop_type("pts", League::Nba), Resolution::Resolved("points".into()));
        assert_eq!(r.resolve_prop_type("PTS", League::Nba), Resolution::Resolved("points".into()));
        assert_eq!(r.resolve_prop_type("pts", League::Nfl), Resolution::Unresolved);
        assert_eq!(r.resolve_prop_type("Pass Yds", League::Nfl), Resolution::Resolved("passing_yards".into()));
    }

    #[test]
    fn sacks_alias_pair_reproduces_observed_mapping() {
        let r = resolver();
        assert_eq!(r.resolve_prop_type("sacks", League::Nfl), Resolution::Resolved("defense_sacks".into()));
        assert_eq!(r.resolve_prop_type("defense_sacks", League::Nfl), Resolution::Resolved("sacks".into()));
    }

    #[test]
    fn prop_word_level_first_match_wins() {
        let r = resolver();
        assert_eq!(r.resolve_prop_type("Player Rebounds", League::Nba), Resolution::Resolved("rebounds".into()));
        assert_eq!(r.resolve_prop_type("Total sog", League::Nhl), Resolution::Resolved("shots_on_goal".into()));
        assert_eq!(r.resolve_prop_type("assists points", League::Nba), Resolution::Resolved("assists".into()));
    }

    #[test]
    fn unknown_prop_is_unresolved() {
        let r = resolver();
        assert_eq!(r.resolve_prop_type("Longest Hot Dog", League::Nfl), Resolution::Unresolved);
        assert_eq!(r.resolve_prop_type("", League::Nfl), Resolution::Unresolved);
    }
}

// Canonical prop-type names per league. Each set is closed: anything outside
// it can only be reached through the alias table.

use crate::model::League;

const NFL_PROPS: &[&str] = &[
    "passing_yards",
    "passing_touchdowns",
    "passing_completions",
    "passing_attempts",
    "passing_interceptions",
    "passing_longest_completion",
    "rushing_yards",
    "rushing_touchdowns",
    "rushing_attempts",
    "rushing_longest",
    "receiving_yards",
    "receiving_touchdowns",
    "receptions",
    "receiving_longest",
    "passing_rushing_yards",
    "rushing_receiving_yards",
    "tackles",
    "field_goals_made",
    "extra_points_made",
    "kicking_points",
    "fantasy_score",
];

const NBA_PROPS: &[&str] = &[
    "points",
    "rebounds",
    "assists",
    "steals",
    "blocks",
    "turnovers",
    "three_pointers_made",
    "three_pointers_attempted",
    "field_goals_made",
    "field_goals_attempted",
    "free_throws_made",
    "points_rebounds",
    "points_assists",
    "rebounds_assists",
    "points_rebounds_assists",
    "steals_blocks",
    "double_double",
];

const MLB_PROPS: &[&str] = &[
    "hits",
    "runs",
    "runs_batted_in",
    "home_runs",
    "stolen_bases",
    "total_bases",
    "singles",
    "doubles",
    "triples",
    "walks",
    "batting_strikeouts",
    "hits_runs_rbis",
    "pitcher_strikeouts",
    "hits_allowed",
    "earned_runs",
    "outs_recorded",
    "walks_allowed",
];

const NHL_PROPS: &[&str] = &[
    "goals",
    "assists",
    "points",
    "shots_on_goal",
    "blocked_shots",
    "hits",
    "goalie_saves",
    "goals_against",
    "power_play_points",
    "penalty_minutes",
    "plus_minus",
];

/// The closed canonical prop-type set for a league.
pub fn canonical_prop_types(league: League) -> &'static [&'static str] {
    match league {
        League::Nfl => NFL_PROPS,
        League::Nba => NBA_PROPS,
        League::Mlb => MLB_PROPS,
        League::Nhl => NHL_PROPS,
    }
}

pub fn is_canonical(league: League, prop_type: &str) -> bool {
    canonical_prop_types(league).contains(&prop_type)
}

/// True when `prop_type` is canonical in at least one league.
pub fn is_canonical_anywhere(prop_type: &str) -> bool {
    League::ALL.iter().any(|l| is_canonical(*l, prop_type))
}

/// Lower-case a label and collapse every run of non-alphanumeric characters
/// into a single underscore: `"Pass Yds"` -> `"pass_yds"`,
/// `"Rush + Rec Yards"` -> `"rush_rec_yards"`.
pub fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Human-readable label for a canonical prop type.
pub fn display_label(prop_type: &str) -> String {
    match prop_type {
        "passing_rushing_yards" => return "Pass + Rush Yards".to_string(),
        "rushing_receiving_yards" => return "Rush + Rec Yards".to_string(),
        "points_rebounds_assists" => return "Pts + Reb + Ast".to_string(),
        "runs_batted_in" => return "RBIs".to_string(),
        "hits_runs_rbis" => return "Hits + Runs + RBIs".to_string(),
        "passing_touchdowns" => return "Passing TDs".to_string(),
        "rushing_touchdowns" => return "Rushing TDs".to_string(),
        "receiving_touchdowns" => return "Receiving TDs".to_string(),
        _ => {}
    }
    prop_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_label_collapses_separators() {
        assert_eq!(normalize_label("Passing Yards"), "passing_yards");
        assert_eq!(normalize_label("  Rush + Rec  Yards "), "rush_rec_yards");
        assert_eq!(normalize_label("3PM"), "3pm");
        assert_eq!(normalize_label("player-points"), "player_points");
        assert_eq!(normalize_label("---"), "");
    }

    #[test]
    fn sacks_are_not_canonical_anywhere() {
        assert!(!is_canonical_anywhere("sacks"));
        assert!(!is_canonical_anywhere("defense_sacks"));
    }

    #[test]
    fn display_labels() {
        assert_eq!(display_label("passing_yards"), "Passing Yards");
        assert_eq!(display_label("runs_batted_in"), "RBIs");
        assert_eq!(display_label("shots_on_goal"), "Shots On Goal");
    }

    #[test]
    fn canonical_sets_are_already_normalized() {
        for league in League::ALL {
            for p in canonical_prop_types(league) {
                assert_eq!(&normalize_label(p), p);
            }
        }
    }
}

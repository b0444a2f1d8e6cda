// Matchup/defensive rank calculator.
//
// Teams are ranked per (league, season, prop type) by the stat they allow
// per game; rank 1 is the stingiest defense. Rankings are always rebuilt
// from game logs and replace the previous rows wholesale.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::{Database, TeamAllowed};
use crate::model::League;

/// Values closer than this are the same `allowed_per_game` for ranking.
const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseRank {
    pub team_id: String,
    pub allowed_per_game: f64,
    pub games_tracked: i64,
    pub rank: i64,
    /// `(rank - 1) / (n - 1) * 100`, or `0` with a single ranked team.
    pub rank_percentile: f64,
}

/// Lookup result for an upcoming opponent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefenseRankDisplay {
    /// `0` when the opponent has no rank for the prop type.
    pub rank: i64,
    /// `"3rd of 32"`, or `"N/A"`.
    pub display: String,
}

/// Rank teams ascending by `allowed_per_game` with `RANK()` semantics:
/// tied teams share a rank and the next value's rank is one plus the number
/// of strictly better teams. Output is ordered by rank, then team.
pub fn rank_teams(mut teams: Vec<TeamAllowed>) -> Vec<DefenseRank> {
    teams.sort_by(|a, b| {
        a.allowed_per_game
            .total_cmp(&b.allowed_per_game)
            .then_with(|| a.team_id.cmp(&b.team_id))
    });

    let n = teams.len();
    let mut ranks = Vec::with_capacity(n);
    let mut rank = 0i64;
    // Value of the first team holding the current rank.
    let mut opener: Option<f64> = None;
    for (idx, team) in teams.into_iter().enumerate() {
        let tied = opener.is_some_and(|o| (team.allowed_per_game - o).abs() <= TIE_EPSILON);
        if !tied {
            rank = idx as i64 + 1;
            opener = Some(team.allowed_per_game);
        }
        ranks.push(DefenseRank {
            team_id: team.team_id,
            allowed_per_game: team.allowed_per_game,
            games_tracked: team.games_tracked,
            rank,
            rank_percentile: percentile(rank, n),
        });
    }
    ranks
}

fn percentile(rank: i64, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        (rank - 1) as f64 / (n - 1) as f64 * 100.0
    }
}

/// Recompute and store the ranking for one `(league, season, prop_type)`.
pub fn compute_defense_ranks(db: &Database, league: League, season: &str, prop_type: &str) -> Result<Vec<DefenseRank>> {
    let allowed = db.allowed_per_game(league, season, prop_type)?;
    let ranks = rank_teams(allowed);
    db.replace_defense_ranks(league, season, prop_type, &ranks)?;
    debug!(league = %league, season, prop_type, teams = ranks.len(), "defense ranks replaced");
    Ok(ranks)
}

/// Recompute rankings for every prop type with game logs in a league/season.
/// Returns the number of prop types ranked.
pub fn recompute_season(db: &Database, league: League, season: &str) -> Result<usize> {
    let prop_types = db.game_log_prop_types(league, season)?;
    for prop_type in &prop_types {
        compute_defense_ranks(db, league, season, prop_type)?;
    }
    info!(league = %league, season, prop_types = prop_types.len(), "defense ranks recomputed");
    Ok(prop_types.len())
}

/// How `opponent` ranks against `prop_type` for a player on `team`.
///
/// `team` and `position` do not partition the ranking; they are accepted
/// so callers can pass a full matchup.
pub fn defense_rank(
    db: &Database,
    league: League,
    team: &str,
    opponent: &str,
    prop_type: &str,
    position: Option<&str>,
    season: &str,
) -> Result<DefenseRankDisplay> {
    let found = db.defense_rank_for(league, season, prop_type, opponent)?;
    debug!(team, opponent, prop_type, position, found = found.is_some(), "defense rank lookup");
    Ok(match found {
        Some((rank, total)) if rank.rank > 0 => DefenseRankDisplay {
            rank: rank.rank,
            display: format!("{} of {total}", ordinal(rank.rank)),
        },
        _ => DefenseRankDisplay {
            rank: 0,
            display: "N/A".to_string(),
        },
    })
}

/// `1st`, `2nd`, `3rd`, `4th`, `11th`, `21st`, ...
pub fn ordinal(n: i64) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{CanonicalPlayer, PlayerGameLog};

    fn allowed(team: &str, value: f64) -> TeamAllowed {
        TeamAllowed {
            team_id: team.to_string(),
            allowed_per_game: value,
            games_tracked: 3,
        }
    }

    #[test]
    fn single_team_has_zero_percentile() {
        let ranks = rank_teams(vec![allowed("BUF", 312.4)]);
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks[0].rank, 1);
        assert_eq!(ranks[0].rank_percentile, 0.0);
    }

    #[test]
    fn ties_share_rank_and_skip_next() {
        let ranks = rank_teams(vec![
            allowed("MIA", 250.0),
            allowed("BUF", 200.0),
            allowed("NYJ", 200.0),
            allowed("NE", 180.0),
            allowed("KC", 300.0),
        ]);
        let by_team: Vec<(&str, i64)> = ranks.iter().map(|r| (r.team_id.as_str(), r.rank)).collect();
        assert_eq!(by_team, vec![("NE", 1), ("BUF", 2), ("NYJ", 2), ("MIA", 4), ("KC", 5)]);
        assert_eq!(ranks[0].rank_percentile, 0.0);
        assert_eq!(ranks[1].rank_percentile, 25.0);
        assert_eq!(ranks[4].rank_percentile, 100.0);
    }

    #[test]
    fn near_ties_do_not_chain_past_the_first_value() {
        let ranks = rank_teams(vec![
            allowed("BUF", 20.0),
            allowed("MIA", 20.0 + 0.6e-9),
            allowed("NE", 20.0 + 1.2e-9),
        ]);
        let by_team: Vec<(&str, i64)> = ranks.iter().map(|r| (r.team_id.as_str(), r.rank)).collect();
        assert_eq!(by_team, vec![("BUF", 1), ("MIA", 1), ("NE", 3)]);
    }

    #[test]
    fn lower_allowed_never_ranks_worse() {
        let teams: Vec<TeamAllowed> = (0..30)
            .map(|i| allowed(&format!("T{i:02}"), ((i * 37) % 11) as f64 * 1.5))
            .collect();
        let ranks = rank_teams(teams);
        for a in &ranks {
            for b in &ranks {
                if a.allowed_per_game < b.allowed_per_game {
                    assert!(a.rank <= b.rank);
                }
                if a.allowed_per_game == b.allowed_per_game {
                    assert_eq!(a.rank, b.rank);
                }
            }
            assert!((0.0..=100.0).contains(&a.rank_percentile));
        }
    }

    #[test]
    fn empty_input_ranks_nothing() {
        assert!(rank_teams(Vec::new()).is_empty());
    }

    #[test]
    fn ordinals() {
        let got: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 32, 101, 111].map(ordinal).to_vec();
        assert_eq!(
            got,
            ["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "23rd", "32nd", "101st", "111th"]
        );
    }

    fn log(db: &Database, player: &str, game: &str, opponent: &str, value: f64) {
        db.upsert_game_log(&PlayerGameLog {
            player_id: player.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 10, 5).unwrap(),
            prop_type: "receiving_yards".to_string(),
            league: League::Nfl,
            season: "2025".to_string(),
            game_id: game.to_string(),
            team_id: None,
            opponent_team_id: Some(opponent.to_string()),
            actual_value: value,
            hit: None,
        })
        .unwrap();
    }

    #[test]
    fn recompute_replaces_and_displays() {
        let db = Database::open(":memory:").unwrap();
        for id in ["a-1-nfl", "b-1-nfl", "c-1-nfl"] {
            db.upsert_player(&CanonicalPlayer {
                player_id: id.to_string(),
                display_name: id.to_string(),
                league: League::Nfl,
                team_id: None,
                position: None,
            })
            .unwrap();
        }
        // MIA allows 60 + 50 in one game; BUF allows 40.
        log(&db, "a-1-nfl", "g1", "MIA", 60.0);
        log(&db, "b-1-nfl", "g1", "MIA", 50.0);
        log(&db, "c-1-nfl", "g2", "BUF", 40.0);

        assert_eq!(recompute_season(&db, League::Nfl, "2025").unwrap(), 1);
        let ranks = db.load_defense_ranks(League::Nfl, "2025", "receiving_yards").unwrap();
        assert_eq!(ranks.len(), 2);
        assert_eq!((ranks[0].team_id.as_str(), ranks[0].allowed_per_game), ("BUF", 40.0));
        assert_eq!((ranks[1].team_id.as_str(), ranks[1].allowed_per_game), ("MIA", 110.0));

        let shown = defense_rank(&db, League::Nfl, "KC", "MIA", "receiving_yards", Some("WR"), "2025").unwrap();
        assert_eq!(shown.rank, 2);
        assert_eq!(shown.display, "2nd of 2");

        let missing = defense_rank(&db, League::Nfl, "KC", "DAL", "receiving_yards", None, "2025").unwrap();
        assert_eq!(missing, DefenseRankDisplay { rank: 0, display: "N/A".to_string() });
    }
}

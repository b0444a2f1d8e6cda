// Canonical data model shared by the resolver, the store, and the analytics
// stages, plus the raw upstream record shapes the reconciler consumes.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::reconcile::RecordError;

// ---------------------------------------------------------------------------
// League
// ---------------------------------------------------------------------------

/// The closed set of leagues the engine reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum League {
    Nfl,
    Nba,
    Mlb,
    Nhl,
}

impl League {
    pub const ALL: [League; 4] = [League::Nfl, League::Nba, League::Mlb, League::Nhl];

    /// Upper-case league code as stored in the database (e.g. `"NFL"`).
    pub fn code(self) -> &'static str {
        match self {
            League::Nfl => "NFL",
            League::Nba => "NBA",
            League::Mlb => "MLB",
            League::Nhl => "NHL",
        }
    }

    /// Whether games are played outdoors, making weather a relevant factor.
    pub fn is_outdoor(self) -> bool {
        matches!(self, League::Nfl | League::Mlb)
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown league `{0}`")]
pub struct UnknownLeague(pub String);

impl FromStr for League {
    type Err = UnknownLeague;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NFL" => Ok(League::Nfl),
            "NBA" => Ok(League::Nba),
            "MLB" => Ok(League::Mlb),
            "NHL" => Ok(League::Nhl),
            _ => Err(UnknownLeague(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Side of a prop bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::Over, Direction::Under];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Over => "over",
            Direction::Under => "under",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "over" | "o" => Ok(Direction::Over),
            "under" | "u" => Ok(Direction::Under),
            other => Err(format!("unknown direction `{other}`")),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical reference data
// ---------------------------------------------------------------------------

/// A player as known to the store. `player_id` is a stable slug such as
/// `patrick-mahomes-1-nfl`; `team_id` follows the player between teams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPlayer {
    pub player_id: String,
    pub display_name: String,
    pub league: League,
    pub team_id: Option<String>,
    pub position: Option<String>,
}

/// A franchise. `abbreviation` is unique per league and doubles as the team
/// identifier stored on prop lines and game logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTeam {
    pub league: League,
    pub abbreviation: String,
    pub display_name: String,
    pub aliases: Vec<String>,
}

/// One row of the hand-curated prop-type alias table. `league = None` means
/// the alias applies to every league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropTypeAlias {
    pub alias: String,
    pub canonical: String,
    pub league: Option<League>,
}

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

/// One betting line offered by one sportsbook for one player/prop/date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropLine {
    pub conflict_key: String,
    pub player_id: String,
    pub date: NaiveDate,
    pub prop_type: String,
    pub sportsbook: String,
    pub league: League,
    pub season: String,
    pub line: f64,
    pub over_odds: Option<i32>,
    pub under_odds: Option<i32>,
    pub team_id: Option<String>,
    pub opponent_team_id: Option<String>,
    pub game_id: Option<String>,
}

/// A player's actual statistical output for one game and prop type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameLog {
    pub player_id: String,
    pub date: NaiveDate,
    pub prop_type: String,
    pub league: League,
    pub season: String,
    pub game_id: String,
    pub team_id: Option<String>,
    pub opponent_team_id: Option<String>,
    pub actual_value: f64,
    pub hit: Option<bool>,
}

/// Build the idempotency token for a prop line:
/// `player_id|date|prop_type|sportsbook|league|season`.
pub fn conflict_key(
    player_id: &str,
    date: NaiveDate,
    prop_type: &str,
    sportsbook: &str,
    league: League,
    season: &str,
) -> String {
    format!(
        "{player_id}|{}|{prop_type}|{sportsbook}|{}|{season}",
        date.format("%Y-%m-%d"),
        league.code()
    )
}

// ---------------------------------------------------------------------------
// Raw upstream records
// ---------------------------------------------------------------------------

/// A loosely-structured upstream record, before identity resolution.
///
/// Numeric fields are kept as raw JSON values so that malformed input (a
/// non-numeric line, say) becomes a per-record constraint violation instead
/// of failing deserialization of the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawRecord {
    PropLine(RawPropLine),
    GameLog(RawGameLog),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPropLine {
    pub player: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub opponent: Option<String>,
    pub prop_type: String,
    pub league: String,
    pub season: String,
    pub date: String,
    pub sportsbook: String,
    pub line: Value,
    #[serde(default)]
    pub over_odds: Option<Value>,
    #[serde(default)]
    pub under_odds: Option<Value>,
    #[serde(default)]
    pub game_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGameLog {
    pub player: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub opponent: Option<String>,
    pub prop_type: String,
    pub league: String,
    pub season: String,
    pub date: String,
    #[serde(default)]
    pub game_id: Option<String>,
    pub value: Value,
    #[serde(default)]
    pub hit: Option<bool>,
}

impl RawRecord {
    /// Raw league string, used for logging before the league is validated.
    pub fn league(&self) -> &str {
        match self {
            RawRecord::PropLine(r) => &r.league,
            RawRecord::GameLog(r) => &r.league,
        }
    }
}

// ---------------------------------------------------------------------------
// Field parsing helpers
// ---------------------------------------------------------------------------

/// Parse a numeric field that upstream may send as a number or a numeric
/// string (`"25.5"`).
pub fn parse_number(field: &str, value: &Value) -> Result<f64, RecordError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(RecordError::ConstraintViolation {
            field: field.to_string(),
            message: format!("expected a number, got {value}"),
        }),
    }
}

/// Parse American odds from `-110`, `"+120"`, or `"-110"`. Values strictly
/// between -100 and +100 are not valid American odds.
pub fn parse_american_odds(field: &str, value: &Value) -> Result<i32, RecordError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().trim_start_matches('+').parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.abs() >= 100 && v.abs() <= 100_000 => Ok(v as i32),
        _ => Err(RecordError::ConstraintViolation {
            field: field.to_string(),
            message: format!("expected American odds, got {value}"),
        }),
    }
}

/// Parse a date given either as `YYYY-MM-DD` or as an RFC 3339 timestamp
/// (only the calendar date is kept).
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, RecordError> {
    let trimmed = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive());
    }
    Err(RecordError::ConstraintViolation {
        field: field.to_string(),
        message: format!("expected a date, got `{raw}`"),
    })
}

// Adapter for the upstream odds/events feed.
//
// Events carry an `odds` map keyed by `{statID}-{playerID}-{periodID}-{betTypeID}-{sideID}`.
// Full-game over/under entries on a player are player props; each `over`
// entry is paired with its `under` sibling per bookmaker to form one raw
// prop-line record.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{FeedPage, RecordFeed, UpstreamError};
use crate::identity::players::parse_upstream_player_id;
use crate::model::{League, RawPropLine, RawRecord};

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    data: Vec<Event>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "eventID")]
    event_id: String,
    #[serde(rename = "leagueID", default)]
    league_id: Option<String>,
    teams: EventTeams,
    status: EventStatus,
    #[serde(default)]
    players: HashMap<String, EventPlayer>,
    #[serde(default)]
    odds: BTreeMap<String, Odd>,
}

#[derive(Debug, Deserialize)]
struct EventTeams {
    home: EventTeam,
    away: EventTeam,
}

#[derive(Debug, Deserialize)]
struct EventTeam {
    #[serde(rename = "teamID", default)]
    team_id: Option<String>,
    names: TeamNames,
}

#[derive(Debug, Deserialize)]
struct TeamNames {
    short: String,
}

#[derive(Debug, Deserialize)]
struct EventStatus {
    #[serde(rename = "startsAt")]
    starts_at: String,
}

#[derive(Debug, Deserialize)]
struct EventPlayer {
    #[serde(rename = "teamID", default)]
    team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Odd {
    #[serde(rename = "byBookmaker", default)]
    by_bookmaker: BTreeMap<String, BookmakerOdds>,
}

#[derive(Debug, Deserialize)]
struct BookmakerOdds {
    #[serde(default)]
    odds: Option<Value>,
    #[serde(rename = "overUnder", default)]
    over_under: Option<Value>,
    #[serde(default)]
    available: bool,
}

// ---------------------------------------------------------------------------
// Odd keys
// ---------------------------------------------------------------------------

/// The five components of an odds-entry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OddKey<'a> {
    pub stat_id: &'a str,
    pub entity_id: &'a str,
    pub period_id: &'a str,
    pub bet_type_id: &'a str,
    pub side_id: &'a str,
}

impl OddKey<'_> {
    /// Full-game over/under on an individual player.
    pub fn is_player_prop(&self) -> bool {
        self.period_id == "game"
            && matches!(self.bet_type_id, "ou" | "over_under")
            && parse_upstream_player_id(self.entity_id).is_some()
    }
}

/// Split an odds-entry key. Stat and player ids use underscores, never
/// hyphens, so a well-formed key has exactly five hyphen-separated parts.
pub fn parse_odd_key(key: &str) -> Option<OddKey<'_>> {
    let parts: Vec<&str> = key.split('-').collect();
    let [stat_id, entity_id, period_id, bet_type_id, side_id] = parts[..] else {
        return None;
    };
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(OddKey {
        stat_id,
        entity_id,
        period_id,
        bet_type_id,
        side_id,
    })
}

/// Display name for a bookmaker id, ignoring case and spacing. Unknown ids
/// pass through trimmed.
pub fn bookmaker_name(id: &str) -> String {
    let key = id.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
    let name = match key.as_str() {
        "fanduel" => "FanDuel",
        "draftkings" => "DraftKings",
        "betmgm" => "BetMGM",
        "caesars" => "Caesars",
        "pointsbet" => "PointsBet",
        "betrivers" => "BetRivers",
        "bet365" => "Bet365",
        "pinnacle" => "Pinnacle",
        "bovada" => "Bovada",
        "unibet" => "Unibet",
        "espnbet" => "ESPN BET",
        "fanatics" => "Fanatics",
        "hardrockbet" => "Hard Rock Bet",
        "prizepicks" => "PrizePicks",
        "underdog" => "Underdog",
        _ => return id.trim().to_string(),
    };
    name.to_string()
}

// ---------------------------------------------------------------------------
// Page parsing
// ---------------------------------------------------------------------------

/// Parse one events page into raw prop-line records.
///
/// `league` is used when an event does not carry its own league id.
pub fn parse_events_page(body: &str, league: League, season: &str) -> Result<FeedPage, UpstreamError> {
    let response: EventsResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;

    let mut records = Vec::new();
    for event in &response.data {
        let before = records.len();
        extract_event(event, league, season, &mut records);
        debug!(
            event = %event.event_id,
            props = records.len() - before,
            "extracted player props from event"
        );
    }

    Ok(FeedPage {
        records,
        next_cursor: response.next_cursor.filter(|c| !c.is_empty()),
    })
}

fn extract_event(event: &Event, league: League, season: &str, out: &mut Vec<RawRecord>) {
    let home = &event.teams.home;
    let away = &event.teams.away;
    let league_code = event.league_id.clone().unwrap_or_else(|| league.code().to_string());

    for (key, over) in &event.odds {
        let Some(parsed) = parse_odd_key(key) else {
            continue;
        };
        if parsed.side_id != "over" || !parsed.is_player_prop() {
            continue;
        }
        let under_key = format!(
            "{}-{}-{}-{}-under",
            parsed.stat_id, parsed.entity_id, parsed.period_id, parsed.bet_type_id
        );
        let Some(under) = event.odds.get(&under_key) else {
            debug!(odd = %key, "no under side for over entry");
            continue;
        };

        let (team, opponent) = match event
            .players
            .get(parsed.entity_id)
            .and_then(|p| p.team_id.as_deref())
        {
            Some(id) if home.team_id.as_deref() == Some(id) => {
                (Some(home.names.short.clone()), Some(away.names.short.clone()))
            }
            Some(id) if away.team_id.as_deref() == Some(id) => {
                (Some(away.names.short.clone()), Some(home.names.short.clone()))
            }
            _ => (None, None),
        };

        for (bookmaker, over_book) in &over.by_bookmaker {
            if !over_book.available {
                continue;
            }
            let Some(under_book) = under.by_bookmaker.get(bookmaker).filter(|u| u.available) else {
                continue;
            };
            out.push(RawRecord::PropLine(RawPropLine {
                player: parsed.entity_id.to_string(),
                team: team.clone(),
                opponent: opponent.clone(),
                prop_type: parsed.stat_id.to_string(),
                league: league_code.clone(),
                season: season.to_string(),
                date: event.status.starts_at.clone(),
                sportsbook: bookmaker_name(bookmaker),
                line: over_book.over_under.clone().unwrap_or(Value::Null),
                over_odds: over_book.odds.clone(),
                under_odds: under_book.odds.clone(),
                game_id: Some(event.event_id.clone()),
            }));
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP feed
// ---------------------------------------------------------------------------

/// Live odds feed for one league and season.
pub struct HttpOddsFeed {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    league: League,
    season: String,
    name: String,
}

impl HttpOddsFeed {
    pub fn new(
        base_url: &str,
        api_key: &str,
        league: League,
        season: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            league,
            season: season.to_string(),
            name: format!("odds:{}", league.code()),
        })
    }
}

#[async_trait]
impl RecordFeed for HttpOddsFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, UpstreamError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("leagueID", self.league.code()),
            ("season", self.season.as_str()),
            ("oddsAvailable", "true"),
        ];
        if let Some(c) = cursor {
            query.push(("cursor", c));
        }

        let response = self
            .http
            .get(format!("{}/v2/events", self.base_url))
            .header("x-api-key", &self.api_key)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let page = parse_events_page(&body, self.league, &self.season)?;
        info!(
            feed = %self.name,
            records = page.records.len(),
            has_next = page.next_cursor.is_some(),
            "fetched odds page"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_json() -> String {
        json!({
            "success": true,
            "nextCursor": "page-2",
            "data": [{
                "eventID": "evt-1",
                "leagueID": "NFL",
                "teams": {
                    "home": { "teamID": "BUFFALO_BILLS_NFL", "names": { "short": "BUF", "long": "Buffalo Bills" } },
                    "away": { "teamID": "MIAMI_DOLPHINS_NFL", "names": { "short": "MIA", "long": "Miami Dolphins" } }
                },
                "status": { "startsAt": "2025-10-12T17:00:00Z" },
                "players": { "JOSH_ALLEN_1_NFL": { "teamID": "BUFFALO_BILLS_NFL" } },
                "odds": {
                    "passing_yards-JOSH_ALLEN_1_NFL-game-ou-over": {
                        "byBookmaker": {
                            "fanduel": { "odds": "-115", "overUnder": "250.5", "available": true },
                            "draftkings": { "odds": "-110", "overUnder": "249.5", "available": true },
                            "betmgm": { "odds": "-110", "overUnder": "250.5", "available": false }
                        }
                    },
                    "passing_yards-JOSH_ALLEN_1_NFL-game-ou-under": {
                        "byBookmaker": {
                            "fanduel": { "odds": "-105", "overUnder": "250.5", "available": true },
                            "draftkings": { "odds": "-110", "overUnder": "249.5", "available": false },
                            "betmgm": { "odds": "-110", "overUnder": "250.5", "available": true }
                        }
                    },
                    "points-all-game-ou-over": {
                        "byBookmaker": { "fanduel": { "odds": "-110", "overUnder": "45.5", "available": true } }
                    },
                    "passing_yards-JOSH_ALLEN_1_NFL-1h-ou-over": {
                        "byBookmaker": { "fanduel": { "odds": "-110", "overUnder": "125.5", "available": true } }
                    }
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn odd_key_parsing() {
        let key = parse_odd_key("passing_yards-JOSH_ALLEN_1_NFL-game-ou-over").unwrap();
        assert_eq!(key.stat_id, "passing_yards");
        assert_eq!(key.entity_id, "JOSH_ALLEN_1_NFL");
        assert!(key.is_player_prop());
        assert!(!parse_odd_key("points-all-game-ou-over").unwrap().is_player_prop());
        assert!(!parse_odd_key("passing_yards-JOSH_ALLEN_1_NFL-1h-ou-over").unwrap().is_player_prop());
        assert!(parse_odd_key("too-few-parts").is_none());
        assert!(parse_odd_key("a-b-c-d-e-f").is_none());
    }

    #[test]
    fn pairs_over_and_under_per_available_bookmaker() {
        let page = parse_events_page(&event_json(), League::Nfl, "2025").unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("page-2"));
        // draftkings' under and betmgm's over are unavailable: only fanduel pairs.
        assert_eq!(page.records.len(), 1);
        let RawRecord::PropLine(line) = &page.records[0] else {
            panic!("expected a prop line");
        };
        assert_eq!(line.player, "JOSH_ALLEN_1_NFL");
        assert_eq!(line.sportsbook, "FanDuel");
        assert_eq!(line.line, json!("250.5"));
        assert_eq!(line.over_odds, Some(json!("-115")));
        assert_eq!(line.under_odds, Some(json!("-105")));
        assert_eq!(line.team.as_deref(), Some("BUF"));
        assert_eq!(line.opponent.as_deref(), Some("MIA"));
        assert_eq!(line.date, "2025-10-12T17:00:00Z");
        assert_eq!(line.game_id.as_deref(), Some("evt-1"));
    }

    #[test]
    fn bookmaker_names_map_known_ids() {
        assert_eq!(bookmaker_name("draftkings"), "DraftKings");
        assert_eq!(bookmaker_name("betmgm"), "BetMGM");
        assert_eq!(bookmaker_name("localbook"), "localbook");
        assert_eq!(bookmaker_name("FanDuel"), "FanDuel");
        assert_eq!(bookmaker_name(" ESPN BET "), "ESPN BET");
        assert_eq!(bookmaker_name("Hard Rock Bet"), "Hard Rock Bet");
        assert_eq!(bookmaker_name("LocalBook"), "LocalBook");
    }

    #[test]
    fn malformed_page_is_decode_error() {
        let err = parse_events_page("{not json", League::Nfl, "2025").unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn empty_cursor_means_last_page() {
        let page = parse_events_page(r#"{"data": [], "nextCursor": ""}"#, League::Nfl, "2025").unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());
    }
}

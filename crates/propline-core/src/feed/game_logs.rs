// Adapter for the upstream game-log source: per-player, per-game stat values.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{FeedPage, RecordFeed, UpstreamError};
use crate::model::{League, RawGameLog, RawRecord};

#[derive(Debug, Deserialize)]
struct GameLogResponse {
    #[serde(default)]
    data: Vec<GameLogEntry>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GameLogEntry {
    player: String,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    opponent: Option<String>,
    #[serde(default)]
    league: Option<String>,
    #[serde(default)]
    season: Option<String>,
    date: String,
    #[serde(default)]
    game_id: Option<String>,
    stat_type: String,
    value: Value,
}

/// Parse one game-log page. Entries without a league or season inherit the
/// feed's.
pub fn parse_game_log_page(body: &str, league: League, season: &str) -> Result<FeedPage, UpstreamError> {
    let response: GameLogResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;

    let records = response
        .data
        .into_iter()
        .map(|entry| {
            RawRecord::GameLog(RawGameLog {
                player: entry.player,
                team: entry.team,
                opponent: entry.opponent,
                prop_type: entry.stat_type,
                league: entry.league.unwrap_or_else(|| league.code().to_string()),
                season: entry.season.unwrap_or_else(|| season.to_string()),
                date: entry.date,
                game_id: entry.game_id,
                value: entry.value,
                hit: None,
            })
        })
        .collect();

    Ok(FeedPage {
        records,
        next_cursor: response.next_cursor.filter(|c| !c.is_empty()),
    })
}

/// Live game-log feed for one league and season.
pub struct HttpGameLogFeed {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    league: League,
    season: String,
    name: String,
}

impl HttpGameLogFeed {
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
            name: format!("game-logs:{}", league.code()),
        })
    }
}

#[async_trait]
impl RecordFeed for HttpGameLogFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage, UpstreamError> {
        let mut query: Vec<(&str, &str)> = vec![("league", self.league.code()), ("season", self.season.as_str())];
        if let Some(c) = cursor {
            query.push(("cursor", c));
        }

        let response = self
            .http
            .get(format!("{}/game-logs", self.base_url))
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

        let page = parse_game_log_page(&body, self.league, &self.season)?;
        info!(feed = %self.name, records = page.records.len(), "fetched game-log page");
        Ok(page)
    }
}

// Static per-league team dictionaries: abbreviation, full name, and the
// alternate names upstream feeds are known to send.

use crate::model::{CanonicalTeam, League};

/// `(abbreviation, full name, alternate names)`.
type TeamEntry = (&'static str, &'static str, &'static [&'static str]);

const NFL_TEAMS: &[TeamEntry] = &[
    ("ARI", "Arizona Cardinals", &["AZ", "Cardinals", "Arizona"]),
    ("ATL", "Atlanta Falcons", &["Falcons", "Atlanta"]),
    ("BAL", "Baltimore Ravens", &["Ravens", "Baltimore"]),
    ("BUF", "Buffalo Bills", &["Bills", "Buffalo"]),
    ("CAR", "Carolina Panthers", &["Panthers", "Carolina"]),
    ("CHI", "Chicago Bears", &["Bears", "Chicago"]),
    ("CIN", "Cincinnati Bengals", &["Bengals", "Cincinnati"]),
    ("CLE", "Cleveland Browns", &["Browns", "Cleveland"]),
    ("DAL", "Dallas Cowboys", &["Cowboys", "Dallas"]),
    ("DEN", "Denver Broncos", &["Broncos", "Denver"]),
    ("DET", "Detroit Lions", &["Lions", "Detroit"]),
    ("GB", "Green Bay Packers", &["GBP", "Packers", "Green Bay"]),
    ("HOU", "Houston Texans", &["Texans", "Houston"]),
    ("IND", "Indianapolis Colts", &["Colts", "Indianapolis"]),
    ("JAX", "Jacksonville Jaguars", &["JAC", "Jaguars", "Jacksonville"]),
    ("KC", "Kansas City Chiefs", &["KCC", "Chiefs", "Kansas City"]),
    ("LV", "Las Vegas Raiders", &["LVR", "OAK", "Raiders", "Las Vegas", "Oakland Raiders"]),
    ("LAC", "Los Angeles Chargers", &["Chargers", "LA Chargers", "San Diego Chargers"]),
    ("LAR", "Los Angeles Rams", &["LA", "Rams", "LA Rams", "St. Louis Rams"]),
    ("MIA", "Miami Dolphins", &["Dolphins", "Miami"]),
    ("MIN", "Minnesota Vikings", &["Vikings", "Minnesota"]),
    ("NE", "New England Patriots", &["NEP", "Patriots", "New England"]),
    ("NO", "New Orleans Saints", &["NOS", "NOR", "Saints", "New Orleans"]),
    ("NYG", "New York Giants", &["Giants", "NY Giants"]),
    ("NYJ", "New York Jets", &["Jets", "NY Jets"]),
    ("PHI", "Philadelphia Eagles", &["Eagles", "Philadelphia"]),
    ("PIT", "Pittsburgh Steelers", &["Steelers", "Pittsburgh"]),
    ("SF", "San Francisco 49ers", &["SFO", "49ers", "Niners", "San Francisco"]),
    ("SEA", "Seattle Seahawks", &["Seahawks", "Seattle"]),
    ("TB", "Tampa Bay Buccaneers", &["TBB", "Bucs", "Buccaneers", "Tampa Bay"]),
    ("TEN", "Tennessee Titans", &["Titans", "Tennessee"]),
    ("WAS", "Washington Commanders", &["WSH", "Commanders", "Washington", "Washington Football Team"]),
];

const NBA_TEAMS: &[TeamEntry] = &[
    ("ATL", "Atlanta Hawks", &["Hawks", "Atlanta"]),
    ("BOS", "Boston Celtics", &["Celtics", "Boston"]),
    ("BKN", "Brooklyn Nets", &["BRK", "Nets", "Brooklyn"]),
    ("CHA", "Charlotte Hornets", &["CHO", "Hornets", "Charlotte"]),
    ("CHI", "Chicago Bulls", &["Bulls", "Chicago"]),
    ("CLE", "Cleveland Cavaliers", &["Cavaliers", "Cavs", "Cleveland"]),
    ("DAL", "Dallas Mavericks", &["Mavericks", "Mavs", "Dallas"]),
    ("DEN", "Denver Nuggets", &["Nuggets", "Denver"]),
    ("DET", "Detroit Pistons", &["Pistons", "Detroit"]),
    ("GSW", "Golden State Warriors", &["GS", "Warriors", "Golden State"]),
    ("HOU", "Houston Rockets", &["Rockets", "Houston"]),
    ("IND", "Indiana Pacers", &["Pacers", "Indiana"]),
    ("LAC", "Los Angeles Clippers", &["Clippers", "LA Clippers"]),
    ("LAL", "Los Angeles Lakers", &["Lakers", "LA Lakers"]),
    ("MEM", "Memphis Grizzlies", &["Grizzlies", "Memphis"]),
    ("MIA", "Miami Heat", &["Heat", "Miami"]),
    ("MIL", "Milwaukee Bucks", &["Bucks", "Milwaukee"]),
    ("MIN", "Minnesota Timberwolves", &["Timberwolves", "Wolves", "Minnesota"]),
    ("NOP", "New Orleans Pelicans", &["NO", "Pelicans", "New Orleans"]),
    ("NYK", "New York Knicks", &["NY", "Knicks"]),
    ("OKC", "Oklahoma City Thunder", &["Thunder", "Oklahoma City"]),
    ("ORL", "Orlando Magic", &["Magic", "Orlando"]),
    ("PHI", "Philadelphia 76ers", &["76ers", "Sixers", "Philadelphia"]),
    ("PHX", "Phoenix Suns", &["PHO", "Suns", "Phoenix"]),
    ("POR", "Portland Trail Blazers", &["Blazers", "Trail Blazers", "Portland"]),
    ("SAC", "Sacramento Kings", &["Kings", "Sacramento"]),
    ("SAS", "San Antonio Spurs", &["SA", "Spurs", "San Antonio"]),
    ("TOR", "Toronto Raptors", &["Raptors", "Toronto"]),
    ("UTA", "Utah Jazz", &["UTAH", "Jazz", "Utah"]),
    ("WAS", "Washington Wizards", &["WSH", "Wizards", "Washington"]),
];

const MLB_TEAMS: &[TeamEntry] = &[
    ("ARI", "Arizona Diamondbacks", &["AZ", "Diamondbacks", "D-backs", "Arizona"]),
    ("ATL", "Atlanta Braves", &["Braves", "Atlanta"]),
    ("BAL", "Baltimore Orioles", &["Orioles", "Baltimore"]),
    ("BOS", "Boston Red Sox", &["Red Sox", "Boston"]),
    ("CHC", "Chicago Cubs", &["Cubs"]),
    ("CWS", "Chicago White Sox", &["CHW", "White Sox"]),
    ("CIN", "Cincinnati Reds", &["Reds", "Cincinnati"]),
    ("CLE", "Cleveland Guardians", &["Guardians", "Cleveland"]),
    ("COL", "Colorado Rockies", &["Rockies", "Colorado"]),
    ("DET", "Detroit Tigers", &["Tigers", "Detroit"]),
    ("HOU", "Houston Astros", &["Astros", "Houston"]),
    ("KC", "Kansas City Royals", &["KCR", "Royals", "Kansas City"]),
    ("LAA", "Los Angeles Angels", &["ANA", "Angels"]),
    ("LAD", "Los Angeles Dodgers", &["Dodgers"]),
    ("MIA", "Miami Marlins", &["Marlins", "Miami"]),
    ("MIL", "Milwaukee Brewers", &["Brewers", "Milwaukee"]),
    ("MIN", "Minnesota Twins", &["Twins", "Minnesota"]),
    ("NYM", "New York Mets", &["Mets"]),
    ("NYY", "New York Yankees", &["Yankees"]),
    ("OAK", "Oakland Athletics", &["ATH", "Athletics", "A's", "Oakland"]),
    ("PHI", "Philadelphia Phillies", &["Phillies", "Philadelphia"]),
    ("PIT", "Pittsburgh Pirates", &["Pirates", "Pittsburgh"]),
    ("SD", "San Diego Padres", &["SDP", "Padres", "San Diego"]),
    ("SF", "San Francisco Giants", &["SFG", "Giants", "San Francisco"]),
    ("SEA", "Seattle Mariners", &["Mariners", "Seattle"]),
    ("STL", "St. Louis Cardinals", &["Cardinals", "St. Louis"]),
    ("TB", "Tampa Bay Rays", &["TBR", "Rays", "Tampa Bay"]),
    ("TEX", "Texas Rangers", &["Rangers", "Texas"]),
    ("TOR", "Toronto Blue Jays", &["Blue Jays", "Toronto"]),
    ("WSH", "Washington Nationals", &["WSN", "WAS", "Nationals", "Washington"]),
];

const NHL_TEAMS: &[TeamEntry] = &[
    ("ANA", "Anaheim Ducks", &["Ducks", "Anaheim"]),
    ("ARI", "Arizona Coyotes", &["Coyotes", "Arizona", "UTA", "Utah Hockey Club"]),
    ("BOS", "Boston Bruins", &["Bruins", "Boston"]),
    ("BUF", "Buffalo Sabres", &["Sabres", "Buffalo"]),
    ("CGY", "Calgary Flames", &["Flames", "Calgary"]),
    ("CAR", "Carolina Hurricanes", &["Hurricanes", "Canes", "Carolina"]),
    ("CHI", "Chicago Blackhawks", &["Blackhawks", "Chicago"]),
    ("COL", "Colorado Avalanche", &["Avalanche", "Avs", "Colorado"]),
    ("CBJ", "Columbus Blue Jackets", &["Blue Jackets", "Columbus"]),
    ("DAL", "Dallas Stars", &["Stars", "Dallas"]),
    ("DET", "Detroit Red Wings", &["Red Wings", "Detroit"]),
    ("EDM", "Edmonton Oilers", &["Oilers", "Edmonton"]),
    ("FLA", "Florida Panthers", &["Panthers", "Florida"]),
    ("LAK", "Los Angeles Kings", &["LA", "Kings", "LA Kings"]),
    ("MIN", "Minnesota Wild", &["Wild", "Minnesota"]),
    ("MTL", "Montreal Canadiens", &["MON", "Canadiens", "Habs", "Montreal"]),
    ("NSH", "Nashville Predators", &["Predators", "Preds", "Nashville"]),
    ("NJD", "New Jersey Devils", &["NJ", "Devils", "New Jersey"]),
    ("NYI", "New York Islanders", &["Islanders"]),
    ("NYR", "New York Rangers", &["Rangers"]),
    ("OTT", "Ottawa Senators", &["Senators", "Sens", "Ottawa"]),
    ("PHI", "Philadelphia Flyers", &["Flyers", "Philadelphia"]),
    ("PIT", "Pittsburgh Penguins", &["Penguins", "Pens", "Pittsburgh"]),
    ("SJS", "San Jose Sharks", &["SJ", "Sharks", "San Jose"]),
    ("SEA", "Seattle Kraken", &["Kraken", "Seattle"]),
    ("STL", "St. Louis Blues", &["Blues", "St. Louis"]),
    ("TBL", "Tampa Bay Lightning", &["TB", "Lightning", "Tampa Bay"]),
    ("TOR", "Toronto Maple Leafs", &["Maple Leafs", "Leafs", "Toronto"]),
    ("VAN", "Vancouver Canucks", &["Canucks", "Vancouver"]),
    ("VGK", "Vegas Golden Knights", &["VEG", "Golden Knights", "Vegas"]),
    ("WSH", "Washington Capitals", &["WAS", "Capitals", "Caps", "Washington"]),
    ("WPG", "Winnipeg Jets", &["Jets", "Winnipeg"]),
];

fn entries(league: League) -> &'static [TeamEntry] {
    match league {
        League::Nfl => NFL_TEAMS,
        League::Nba => NBA_TEAMS,
        League::Mlb => MLB_TEAMS,
        League::Nhl => NHL_TEAMS,
    }
}

/// The static dictionary for one league as canonical team rows.
pub fn static_teams(league: League) -> Vec<CanonicalTeam> {
    entries(league)
        .iter()
        .map(|(abbr, name, aliases)| CanonicalTeam {
            league,
            abbreviation: abbr.to_string(),
            display_name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        })
        .collect()
}

/// Every static team across all leagues, used to seed the `teams` table.
pub fn all_static_teams() -> Vec<CanonicalTeam> {
    League::ALL.iter().flat_map(|l| static_teams(*l)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn league_sizes() {
        assert_eq!(static_teams(League::Nfl).len(), 32);
        assert_eq!(static_teams(League::Nba).len(), 30);
        assert_eq!(static_teams(League::Mlb).len(), 30);
        assert_eq!(static_teams(League::Nhl).len(), 32);
    }

    #[test]
    fn abbreviations_unique_per_league() {
        for league in League::ALL {
            let teams = static_teams(league);
            let abbrs: HashSet<&str> = teams.iter().map(|t| t.abbreviation.as_str()).collect();
            assert_eq!(abbrs.len(), teams.len(), "duplicate abbreviation in {league}");
        }
    }

    #[test]
    fn aliases_never_collide_with_another_franchise_abbreviation() {
        for league in League::ALL {
            let teams = static_teams(league);
            let abbrs: HashSet<String> = teams.iter().map(|t| t.abbreviation.to_lowercase()).collect();
            for team in &teams {
                for alias in &team.aliases {
                    assert!(
                        !abbrs.contains(&alias.to_lowercase()) || alias.eq_ignore_ascii_case(&team.abbreviation),
                        "{league} alias {alias} of {} shadows another abbreviation",
                        team.abbreviation
                    );
                }
            }
        }
    }
}

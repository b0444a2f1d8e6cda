// Upstream player identifiers look like `PATRICK_MAHOMES_1_NFL`: name parts,
// a disambiguating number, and the league code.

use crate::model::League;

/// A player identity decoded from an upstream identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamPlayerId {
    pub slug: String,
    pub display_name: String,
    pub league: League,
}

/// Decode `FIRST_LAST_<n>_<LEAGUE>`. Returns `None` unless there are at
/// least two name parts (each holding a letter), a numeric suffix and a
/// known league code.
pub fn parse_upstream_player_id(raw: &str) -> Option<UpstreamPlayerId> {
    let parts: Vec<&str> = raw.trim().split('_').collect();
    if parts.len() < 4 {
        return None;
    }
    let league: League = parts[parts.len() - 1].parse().ok()?;
    let number = parts[parts.len() - 2];
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let name_parts = &parts[..parts.len() - 2];
    let valid_name = name_parts.iter().all(|p| {
        p.chars().any(char::is_alphabetic)
            && p.chars().all(|c| c.is_alphabetic() || c == '.' || c == '\'')
    });
    if !valid_name {
        return None;
    }

    let slug_name: Vec<String> = name_parts
        .iter()
        .map(|p| {
            p.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect()
        })
        .collect();
    let slug = format!("{}-{}-{}", slug_name.join("-"), number, league.code().to_lowercase());

    let display_name = name_parts
        .iter()
        .map(|p| title_case(p))
        .collect::<Vec<_>>()
        .join(" ");

    Some(UpstreamPlayerId {
        slug,
        display_name,
        league,
    })
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_two_part_names() {
        let p = parse_upstream_player_id("PATRICK_MAHOMES_1_NFL").unwrap();
        assert_eq!(p.slug, "patrick-mahomes-1-nfl");
        assert_eq!(p.display_name, "Patrick Mahomes");
        assert_eq!(p.league, League::Nfl);
    }

    #[test]
    fn keeps_every_name_part() {
        let p = parse_upstream_player_id("AMON_RA_ST_BROWN_1_NFL").unwrap();
        assert_eq!(p.slug, "amon-ra-st-brown-1-nfl");
        assert_eq!(p.display_name, "Amon Ra St Brown");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(parse_upstream_player_id("Josh Allen").is_none());
        assert!(parse_upstream_player_id("JOSH_ALLEN_NFL").is_none());
        assert!(parse_upstream_player_id("JOSH_ALLEN_X_NFL").is_none());
        assert!(parse_upstream_player_id("JOSH_ALLEN_1_XFL").is_none());
        assert!(parse_upstream_player_id("KANSAS_CITY_CHIEFS_NFL").is_none());
    }

    #[test]
    fn punctuation_only_name_part_is_rejected() {
        assert_eq!(parse_upstream_player_id("J_._SMITH_1_NFL"), None);
        assert_eq!(parse_upstream_player_id("D'_'_ANDRE_2_NBA"), None);
        let p = parse_upstream_player_id("A.J._BROWN_1_NFL").unwrap();
        assert_eq!(p.slug, "aj-brown-1-nfl");
    }
}

//! Match (fixture/result) records.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Final or current score of a played match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub home_score: u32,
    pub away_score: u32,
}

/// A fixture or result row. Named `Fixture` to stay clear of the keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub home_team: String,
    pub away_team: String,
    pub date: String,
    pub time: String,
    #[serde(default, rename = "utcDate")]
    pub utc_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
    #[serde(rename = "sourceURL")]
    pub source_url: String,
    #[serde(default)]
    pub league_id: String,
}

impl Fixture {
    /// Tag with the owning league and derive `utc_date` from the listing labels.
    pub fn resolve(mut self, league_id: &str, year: i32) -> Self {
        self.league_id = league_id.to_string();
        self.utc_date = parse_listing_date(&self.date, &self.time, year);
        self
    }
}

/// Parse listing labels like `"12 Oct"` + `"15:30"` into a UTC timestamp.
///
/// The listing omits the year, so the caller supplies it. Status labels
/// (`FT`, `Postp.`, `HT`) in the time slot yield `None`.
pub fn parse_listing_date(date: &str, time: &str, year: i32) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(&format!("{} {}", date.trim(), year), "%d %b %Y").ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()?;
    Some(NaiveDateTime::new(date, time).and_utc())
}

/// Current year in UTC, used when resolving listing dates.
pub fn current_year() -> i32 {
    Utc::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_listing_date() {
        let parsed = parse_listing_date("12 Oct", "15:30", 2024).unwrap();
        assert_eq!(parsed.month(), 10);
        assert_eq!(parsed.day(), 12);
        assert_eq!(parsed.hour(), 15);
        assert_eq!(parsed.minute(), 30);
        assert_eq!(parsed.year(), 2024);
    }

    #[test]
    fn test_status_labels_do_not_parse() {
        assert!(parse_listing_date("12 Oct", "FT", 2024).is_none());
        assert!(parse_listing_date("", "15:30", 2024).is_none());
    }

    #[test]
    fn test_resolve_sets_league_and_date() {
        let fixture = Fixture {
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            date: "03 Feb".to_string(),
            time: "20:00".to_string(),
            utc_date: None,
            result: None,
            source_url: "/en/football/england/premier-league/arsenal-vs-chelsea/1/".to_string(),
            league_id: String::new(),
        }
        .resolve("league-1", 2025);

        assert_eq!(fixture.league_id, "league-1");
        assert!(fixture.utc_date.is_some());
        let json = serde_json::to_value(&fixture).unwrap();
        assert!(json.get("result").is_none());
        assert!(json.get("utcDate").is_some());
    }
}

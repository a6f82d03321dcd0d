//! Competition (league) records.

use serde::{Deserialize, Serialize};

/// A league as listed on the competitions page.
///
/// `id` is assigned by the downstream competitions service and is only
/// present on leagues returned by the reference-data query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "sourceURL", alias = "liveScoreURL", alias = "url")]
    pub source_url: String,
    #[serde(default)]
    pub country: String,
}

impl League {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            source_url: source_url.into(),
            country: country.into(),
        }
    }

    /// Parse a league from its listing href, e.g. `/en/football/england/premier-league/`.
    ///
    /// The path segments are `/<lang>/<sport>/<country>/<league>/`.
    pub fn from_href(href: &str) -> Option<Self> {
        let segments: Vec<&str> = href.split('/').collect();
        let country = segments.get(3).filter(|s| !s.is_empty())?;
        let name = segments.get(4).filter(|s| !s.is_empty())?;
        Some(Self::new(*name, href, *country))
    }

    /// Join a page suffix (`table`, `fixtures`, `results`) onto this league's URL.
    pub fn page_url(&self, base_url: &str, suffix: &str) -> String {
        format!(
            "{}{}{}",
            base_url.trim_end_matches('/'),
            self.source_url,
            suffix
        )
    }

    /// Identifier used when tagging child records; falls back to the source URL.
    pub fn reference(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.source_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_href() {
        let league = League::from_href("/en/football/england/premier-league/").unwrap();
        assert_eq!(league.country, "england");
        assert_eq!(league.name, "premier-league");
        assert_eq!(league.source_url, "/en/football/england/premier-league/");
    }

    #[test]
    fn test_from_href_rejects_short_paths() {
        assert!(League::from_href("/en/football/").is_none());
    }

    #[test]
    fn test_page_url() {
        let league = League::new("laliga", "/en/football/spain/laliga/", "spain");
        assert_eq!(
            league.page_url("https://www.livescore.com/", "table"),
            "https://www.livescore.com/en/football/spain/laliga/table"
        );
    }

    #[test]
    fn test_payload_field_names() {
        let league = League::new("laliga", "/en/football/spain/laliga/", "spain");
        let json = serde_json::to_value(&league).unwrap();
        assert_eq!(json["sourceURL"], "/en/football/spain/laliga/");
        assert!(json.get("id").is_none());
    }
}

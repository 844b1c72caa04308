use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical match record, one row per external fixture id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// External fixture id from the feed provider (unique key)
    pub match_id: String,
    pub league_id: Option<String>,
    pub league_name: Option<String>,
    pub league_logo: Option<String>,
    pub league_country: Option<String>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub home_logo: Option<String>,
    pub away_logo: Option<String>,
    /// `None` until the provider reports a score; an explicit 0 stays `Some(0)`
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    /// Provider short status code, e.g. "NS" | "1H" | "HT" | "FT"
    pub status: String,
    /// Kickoff time
    pub date: Option<DateTime<Utc>>,
}

impl Match {
    /// A record carrying only its key; every other field null.
    pub fn bare(match_id: impl Into<String>) -> Self {
        Match {
            match_id: match_id.into(),
            league_id: None,
            league_name: None,
            league_logo: None,
            league_country: None,
            home_team: None,
            away_team: None,
            home_logo: None,
            away_logo: None,
            home_score: None,
            away_score: None,
            status: String::new(),
            date: None,
        }
    }

    pub fn state(&self) -> MatchState {
        MatchState::from_status(&self.status)
    }
}

/// A stored match together with the time of its last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMatch {
    #[serde(flatten)]
    pub record: Match,
    pub synced_at: DateTime<Utc>,
}

/// Coarse lifecycle bucket used by the list-by-state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchState {
    Upcoming,
    Live,
    Finished,
    /// Postponed, cancelled, abandoned, awarded, or unknown
    Other,
}

const UPCOMING_CODES: &[&str] = &["TBD", "NS"];
const LIVE_CODES: &[&str] = &["1H", "HT", "2H", "ET", "BT", "P", "SUSP", "INT", "LIVE"];
const FINISHED_CODES: &[&str] = &["FT", "AET", "PEN"];

impl MatchState {
    pub fn from_status(status: &str) -> Self {
        let code = status.trim().to_uppercase();
        if UPCOMING_CODES.contains(&code.as_str()) {
            MatchState::Upcoming
        } else if LIVE_CODES.contains(&code.as_str()) {
            MatchState::Live
        } else if FINISHED_CODES.contains(&code.as_str()) {
            MatchState::Finished
        } else {
            MatchState::Other
        }
    }

    /// Status codes belonging to this bucket. `Other` has no closed set.
    pub fn status_codes(self) -> &'static [&'static str] {
        match self {
            MatchState::Upcoming => UPCOMING_CODES,
            MatchState::Live => LIVE_CODES,
            MatchState::Finished => FINISHED_CODES,
            MatchState::Other => &[],
        }
    }
}

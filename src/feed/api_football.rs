use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::normalize::{canonical_id, lenient, non_empty, score, RawRecord};
use super::provider::FeedClient;
use crate::db::models::Match;
use crate::error::{SyncError, SyncResult};

/// Fixtures feed backed by API-Football v3.
/// Docs: <https://www.api-football.com/documentation-v3>
pub struct ApiFootball {
    http: Client,
    api_key: String,
    /// Full `/fixtures` URL including the query (e.g. `live=all`)
    endpoint: Url,
}

impl ApiFootball {
    pub fn new(base_url: &str, api_key: &str, query: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiFootball {
            http,
            api_key: api_key.to_string(),
            endpoint: fixtures_endpoint(base_url, query)?,
        })
    }
}

fn fixtures_endpoint(base_url: &str, query: &str) -> anyhow::Result<Url> {
    let mut base = Url::parse(base_url).with_context(|| format!("Invalid feed URL: {base_url}"))?;
    // Url::join drops the last path segment unless it ends in '/'
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let mut endpoint = base.join("fixtures").context("Failed to build fixtures URL")?;
    let query = query.trim().trim_start_matches('?');
    endpoint.set_query(if query.is_empty() { None } else { Some(query) });
    Ok(endpoint)
}

#[async_trait]
impl FeedClient for ApiFootball {
    fn name(&self) -> &str {
        "API-Football"
    }

    async fn fetch(&self) -> SyncResult<Vec<RawRecord>> {
        debug!("Fetching fixtures from {}", self.endpoint);

        let resp = self
            .http
            .get(self.endpoint.clone())
            .header("x-apisports-key", &self.api_key)
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("API-Football request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SyncError::Network(format!("Failed to read API-Football body: {e}")))?;

        if !status.is_success() {
            return Err(SyncError::UpstreamStatus {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        parse_fixtures_body(&body)
    }
}

/// Unwrap the `{ "errors": ..., "response": [...] }` envelope.
///
/// API-Football reports quota and auth problems with HTTP 200 and a non-empty
/// `errors` object, array or string, so that field is checked before `response`.
fn parse_fixtures_body(body: &str) -> SyncResult<Vec<RawRecord>> {
    let raw: Value = serde_json::from_str(body)
        .map_err(|e| SyncError::UpstreamFormat(format!("response is not JSON: {e}")))?;

    let has_errors = match raw.get("errors") {
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(list)) => !list.is_empty(),
        Some(Value::String(msg)) => !msg.trim().is_empty(),
        _ => false,
    };
    if has_errors {
        return Err(SyncError::UpstreamFormat(format!(
            "provider reported errors: {}",
            raw["errors"]
        )));
    }

    let items = raw
        .get("response")
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::UpstreamFormat("missing top-level `response` array".into()))?;

    // An element that is not even an object becomes an empty fixture, which
    // the normalizer rejects on its own without failing the batch.
    Ok(items
        .iter()
        .map(|item| {
            RawRecord::ApiFootball(serde_json::from_value(item.clone()).unwrap_or_default())
        })
        .collect())
}

// ── Payload types ──────────────────────────────────────────────────────────────

/// One element of the `/fixtures` `response` array. Every level is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiFootballFixture {
    #[serde(default, deserialize_with = "lenient")]
    pub fixture: Option<FixtureInfo>,
    #[serde(default, deserialize_with = "lenient")]
    pub league: Option<LeagueInfo>,
    #[serde(default, deserialize_with = "lenient")]
    pub teams: Option<Teams>,
    #[serde(default, deserialize_with = "lenient")]
    pub goals: Option<Goals>,
    /// Older payloads carried the scoreline under `scores`
    #[serde(default, deserialize_with = "lenient")]
    pub scores: Option<Goals>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureInfo {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<FixtureStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub short: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeagueInfo {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Teams {
    #[serde(default, deserialize_with = "lenient")]
    pub home: Option<Team>,
    #[serde(default, deserialize_with = "lenient")]
    pub away: Option<Team>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Team {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub logo: Option<String>,
}

/// Raw values so that `null`, `0` and `"0"` can be told apart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Goals {
    #[serde(default)]
    pub home: Option<Value>,
    #[serde(default)]
    pub away: Option<Value>,
}

// ── Normalizer ─────────────────────────────────────────────────────────────────

pub fn normalize(raw: &ApiFootballFixture) -> SyncResult<Match> {
    let fixture = raw.fixture.as_ref();

    let match_id = fixture
        .and_then(|f| f.id.as_ref())
        .and_then(canonical_id)
        .ok_or_else(|| SyncError::InvalidRecord("fixture.id missing or not a scalar".into()))?;

    let league = raw.league.as_ref();
    let home = raw.teams.as_ref().and_then(|t| t.home.as_ref());
    let away = raw.teams.as_ref().and_then(|t| t.away.as_ref());
    let goals = raw.goals.as_ref().or(raw.scores.as_ref());

    let status = fixture
        .and_then(|f| f.status.as_ref())
        .and_then(|s| s.short.as_deref())
        .and_then(non_empty)
        .unwrap_or_default();

    Ok(Match {
        match_id,
        league_id: league.and_then(|l| l.id.as_ref()).and_then(canonical_id),
        league_name: league.and_then(|l| l.name.as_deref()).and_then(non_empty),
        league_logo: league.and_then(|l| l.logo.as_deref()).and_then(non_empty),
        league_country: league.and_then(|l| l.country.as_deref()).and_then(non_empty),
        home_team: home.and_then(|t| t.name.as_deref()).and_then(non_empty),
        away_team: away.and_then(|t| t.name.as_deref()).and_then(non_empty),
        home_logo: home.and_then(|t| t.logo.as_deref()).and_then(non_empty),
        away_logo: away.and_then(|t| t.logo.as_deref()).and_then(non_empty),
        home_score: score(goals.and_then(|g| g.home.as_ref())),
        away_score: score(goals.and_then(|g| g.away.as_ref())),
        status,
        date: fixture.and_then(kickoff),
    })
}

/// `fixture.date` (RFC 3339), falling back to `fixture.timestamp` (unix seconds).
fn kickoff(fixture: &FixtureInfo) -> Option<DateTime<Utc>> {
    fixture
        .date
        .as_deref()
        .and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok())
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| fixture.timestamp.and_then(|ts| Utc.timestamp_opt(ts, 0).single()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn parse(v: Value) -> ApiFootballFixture {
        serde_json::from_value(v).unwrap()
    }

    fn full_fixture() -> Value {
        json!({
            "fixture": {
                "id": 1035037,
                "referee": "M. Oliver",
                "date": "2024-08-17T14:00:00+00:00",
                "timestamp": 1723903200,
                "status": { "long": "Second Half", "short": "2H", "elapsed": 67 }
            },
            "league": {
                "id": 39,
                "name": "Premier League",
                "country": "England",
                "logo": "https://media.api-sports.io/football/leagues/39.png",
                "season": 2024
            },
            "teams": {
                "home": { "id": 42, "name": "Arsenal", "logo": "https://media.api-sports.io/football/teams/42.png" },
                "away": { "id": 39, "name": "Wolves", "logo": "https://media.api-sports.io/football/teams/39.png" }
            },
            "goals": { "home": 1, "away": 0 },
            "score": { "halftime": { "home": 1, "away": 0 } }
        })
    }

    #[test]
    fn test_normalize_full_fixture() {
        let m = normalize(&parse(full_fixture())).unwrap();
        assert_eq!(m.match_id, "1035037");
        assert_eq!(m.league_id.as_deref(), Some("39"));
        assert_eq!(m.league_name.as_deref(), Some("Premier League"));
        assert_eq!(m.league_country.as_deref(), Some("England"));
        assert!(m.league_logo.as_deref().unwrap().ends_with("39.png"));
        assert_eq!(m.home_team.as_deref(), Some("Arsenal"));
        assert_eq!(m.away_team.as_deref(), Some("Wolves"));
        assert!(m.away_logo.as_deref().unwrap().ends_with("teams/39.png"));
        assert_eq!(m.home_score, Some(1));
        assert_eq!(m.away_score, Some(0));
        assert_eq!(m.status, "2H");
        assert_eq!(m.date, Some(Utc.with_ymd_and_hms(2024, 8, 17, 14, 0, 0).unwrap()));
    }

    #[test]
    fn test_missing_league_yields_null_league_fields() {
        let mut v = full_fixture();
        v.as_object_mut().unwrap().remove("league");
        let m = normalize(&parse(v)).unwrap();
        assert!(m.league_id.is_none());
        assert!(m.league_name.is_none());
        assert!(m.league_logo.is_none());
        assert!(m.league_country.is_none());
        assert_eq!(m.home_team.as_deref(), Some("Arsenal"));
    }

    #[test]
    fn test_only_id_present() {
        let m = normalize(&parse(json!({ "fixture": { "id": 5 } }))).unwrap();
        assert_eq!(m, Match::bare("5"));
    }

    #[test]
    fn test_wrongly_typed_branches_become_null() {
        let m = normalize(&parse(json!({
            "fixture": { "id": "77", "status": "FT", "date": 12 },
            "league": "Serie A",
            "teams": { "home": [], "away": { "name": 3 } },
            "goals": 2
        })))
        .unwrap();
        assert_eq!(m, Match::bare("77"));
    }

    #[test]
    fn test_explicit_nil_nil_differs_from_unstarted() {
        let nil_nil = normalize(&parse(json!({
            "fixture": { "id": 1, "status": { "short": "1H" } },
            "goals": { "home": 0, "away": 0 }
        })))
        .unwrap();
        let unstarted = normalize(&parse(json!({
            "fixture": { "id": 2, "status": { "short": "NS" } },
            "goals": { "home": null, "away": null }
        })))
        .unwrap();

        assert_eq!((nil_nil.home_score, nil_nil.away_score), (Some(0), Some(0)));
        assert_eq!((unstarted.home_score, unstarted.away_score), (None, None));
    }

    #[test]
    fn test_legacy_scores_field_is_read() {
        let m = normalize(&parse(json!({
            "fixture": { "id": 3 },
            "scores": { "home": "2", "away": "1" }
        })))
        .unwrap();
        assert_eq!((m.home_score, m.away_score), (Some(2), Some(1)));
    }

    #[test]
    fn test_timestamp_fallback_for_date() {
        let m = normalize(&parse(json!({
            "fixture": { "id": 4, "date": "not a date", "timestamp": 1723903200 }
        })))
        .unwrap();
        assert_eq!(m.date, Some(Utc.with_ymd_and_hms(2024, 8, 17, 14, 0, 0).unwrap()));
    }

    #[test]
    fn test_missing_id_is_invalid_record() {
        let err = normalize(&parse(json!({ "fixture": { "status": { "short": "NS" } } }))).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord(_)));
        let err = normalize(&ApiFootballFixture::default()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidRecord(_)));
    }

    #[test]
    fn test_fixtures_endpoint() {
        let url = fixtures_endpoint("https://v3.football.api-sports.io", "live=all").unwrap();
        assert_eq!(url.as_str(), "https://v3.football.api-sports.io/fixtures?live=all");
        let url = fixtures_endpoint("http://localhost:9000/proxy", "?date=2024-08-17").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/proxy/fixtures?date=2024-08-17");
        let url = fixtures_endpoint("http://localhost:9000/", "").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/fixtures");
        assert!(fixtures_endpoint("not a url", "").is_err());
    }

    #[test]
    fn test_parse_body_envelope() {
        let body = json!({ "errors": [], "results": 2, "response": [full_fixture(), 17] }).to_string();
        let records = parse_fixtures_body(&body).unwrap();
        assert_eq!(records.len(), 2);
        let RawRecord::ApiFootball(second) = &records[1];
        assert!(normalize(second).is_err());
    }

    #[test]
    fn test_parse_body_failures() {
        let err = parse_fixtures_body("<html>").unwrap_err();
        assert!(matches!(err, SyncError::UpstreamFormat(_)));

        let err = parse_fixtures_body(r#"{"results": 0}"#).unwrap_err();
        assert!(matches!(err, SyncError::UpstreamFormat(_)));

        let body = r#"{"errors": {"token": "Error/Missing application key"}, "response": []}"#;
        let err = parse_fixtures_body(body).unwrap_err();
        assert!(err.to_string().contains("Missing application key"));
    }

    #[test]
    fn test_parse_body_string_errors() {
        let body = r#"{"errors": "rate limited", "response": []}"#;
        let err = parse_fixtures_body(body).unwrap_err();
        assert!(matches!(err, SyncError::UpstreamFormat(_)));
        assert!(err.to_string().contains("rate limited"));

        let body = r#"{"errors": "  ", "response": []}"#;
        assert!(parse_fixtures_body(body).unwrap().is_empty());
    }

    /// Serve exactly one canned HTTP response; the request head is sent back on `rx`.
    async fn serve_once(status_line: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = sock.read(&mut buf).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let resp = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
        });
        (format!("http://{addr}"), rx)
    }

    fn client(base: &str) -> ApiFootball {
        ApiFootball::new(base, "secret", "live=all", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_sends_key_header() {
        let body = json!({ "errors": [], "response": [full_fixture()] }).to_string();
        let (base, rx) = serve_once("200 OK", body).await;

        let records = client(&base).fetch().await.unwrap();
        assert_eq!(records.len(), 1);

        let request = rx.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /fixtures?live=all "));
        assert!(request.contains("x-apisports-key: secret"));
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_upstream_status() {
        let (base, _rx) = serve_once("503 Service Unavailable", "{\"message\":\"down\"}".into()).await;
        match client(&base).fetch().await {
            Err(SyncError::UpstreamStatus { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.contains("down"));
            }
            other => panic!("expected UpstreamStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_malformed_body_is_upstream_format() {
        let (base, _rx) = serve_once("200 OK", "not json at all".into()).await;
        let err = client(&base).fetch().await.unwrap_err();
        assert!(matches!(err, SyncError::UpstreamFormat(_)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}")).fetch().await.unwrap_err();
        assert_eq!(err.category(), "network");
    }
}

use crate::error::BotError;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::{collections::HashSet, fmt, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    HdHub4U,
    DesireMovies,
}

impl Provider {
    /// Order in which results of both providers are merged.
    pub const ALL: [Provider; 2] = [Provider::HdHub4U, Provider::DesireMovies];

    /// Path segment used by the scraping API.
    pub fn slug(self) -> &'static str {
        match self {
            Provider::HdHub4U => "hdhub4u",
            Provider::DesireMovies => "desiremovies",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::HdHub4U => "HdHub4U",
            Provider::DesireMovies => "DesireMovies",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            Provider::HdHub4U => "🟢",
            Provider::DesireMovies => "🔵",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub provider: Provider,
    pub title: String,
    pub year: Option<String>,
    /// Release tag shown next to the title, e.g. `WEB-DL`.
    pub quality: Option<String>,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieDetails {
    pub provider: Provider,
    pub source_url: String,
    pub title: String,
    pub year: Option<String>,
    pub rating: Option<String>,
    pub duration: Option<String>,
    pub genre: Option<String>,
    pub plot: Option<String>,
    pub poster: Option<String>,
}

impl MovieDetails {
    /// Fills title and year from the search hit when the details page lacks them.
    pub fn with_fallback(mut self, hit: &SearchHit) -> Self {
        if self.title.is_empty() {
            self.title = hit.title.clone();
        }
        if self.year.is_none() {
            self.year = hit.year.clone();
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityLink {
    pub label: String,
    pub size: Option<String>,
    pub direct_url: String,
}

/// Client of the scraping API. One GET per call, authenticated by `x-api-key`.
#[derive(Clone)]
pub struct ScraperClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl ScraperClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("movie-scraper-bot/0.1")
            .build()?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Search hits in the provider's order. Zero usable hits is `NotFound`.
    pub async fn search(&self, provider: Provider, query: &str) -> Result<Vec<SearchHit>, BotError> {
        let body = self.get_json(provider, "search", "q", query).await?;
        let hits: Vec<SearchHit> = unwrap_list(body)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| serde_json::from_value::<RawHit>(v).ok())
            .filter_map(|raw| raw.into_hit(provider))
            .collect();
        if hits.is_empty() {
            return Err(BotError::NotFound { query: query.to_string() });
        }
        Ok(hits)
    }

    pub async fn details(&self, provider: Provider, source_url: &str) -> Result<MovieDetails, BotError> {
        let body = self.get_json(provider, "details", "url", source_url).await?;
        let raw: RawDetails = serde_json::from_value(body)
            .map_err(|e| BotError::upstream(provider, format!("malformed details: {e}")))?;
        Ok(raw.into_details(provider, source_url))
    }

    /// Direct links in upstream order, deduplicated by URL. May be empty.
    pub async fn magic_links(&self, provider: Provider, source_url: &str) -> Result<Vec<QualityLink>, BotError> {
        let body = self.get_json(provider, "magiclinks", "url", source_url).await?;
        Ok(normalize_links(body))
    }

    async fn get_json(
        &self,
        provider: Provider,
        endpoint: &str,
        param: &str,
        value: &str,
    ) -> Result<Value, BotError> {
        let url = format!("{}/api/{}/{}", self.base_url, provider.slug(), endpoint);
        let resp = self
            .http
            .get(url)
            .header("x-api-key", self.api_key.as_str())
            .query(&[(param, value)])
            .send()
            .await
            .map_err(|e| BotError::upstream(provider, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BotError::upstream(provider, format!("status {status}")));
        }
        let body = resp.text().await.map_err(|e| BotError::upstream(provider, e))?;
        serde_json::from_str(&body)
            .map_err(|e| BotError::upstream(provider, format!("malformed body: {e}")))
    }
}

/* ======= Normalization ======= */

const LIST_KEYS: [&str; 5] = ["downloadLinks", "results", "links", "downloads", "data"];

/// Accepts a bare list or an object wrapping it under one of [`LIST_KEYS`].
fn unwrap_list(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => LIST_KEYS.iter().find_map(|k| match map.remove(*k) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

fn str_field(item: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match item.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Flattens the magic-links payload. Nested entries inherit label and size
/// from their parent; the first occurrence of each URL wins.
fn normalize_links(body: Value) -> Vec<QualityLink> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for item in unwrap_list(body).unwrap_or_default() {
        let Value::Object(item) = item else { continue };
        let label = str_field(&item, &["quality", "label"]).unwrap_or_else(|| "Unknown".to_string());
        let size = str_field(&item, &["size"]);

        if let Some(url) = str_field(&item, &["url", "link", "directLink", "download"]) {
            if seen.insert(url.clone()) {
                out.push(QualityLink { label: label.clone(), size: size.clone(), direct_url: url });
            }
        }

        let nested = ["links", "files", "options"].iter().find_map(|k| {
            item.get(*k).and_then(Value::as_array).filter(|a| !a.is_empty())
        });
        for child in nested.into_iter().flatten() {
            let Value::Object(child) = child else { continue };
            let Some(url) = str_field(child, &["url", "link", "download"]) else { continue };
            if !seen.insert(url.clone()) {
                continue;
            }
            out.push(QualityLink {
                label: str_field(child, &["quality", "label"]).unwrap_or_else(|| label.clone()),
                size: str_field(child, &["size"]).or_else(|| size.clone()),
                direct_url: url,
            });
        }
    }
    out
}

/* ======= DTOs ======= */

/// Strings and numbers both become text; anything else is treated as absent.
fn lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Deserialize, Debug)]
struct RawHit {
    #[serde(default, deserialize_with = "lenient")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    year: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    quality: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    link: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
}

impl RawHit {
    fn into_hit(self, provider: Provider) -> Option<SearchHit> {
        let source_url = self.link.or(self.url)?;
        Some(SearchHit {
            provider,
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            year: self.year,
            quality: self.quality,
            source_url,
        })
    }
}

#[derive(Deserialize, Debug)]
struct RawDetails {
    #[serde(default, deserialize_with = "lenient")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    year: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    rating: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    duration: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    genre: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    plot: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    poster: Option<String>,
}

impl RawDetails {
    fn into_details(self, provider: Provider, source_url: &str) -> MovieDetails {
        MovieDetails {
            provider,
            source_url: source_url.to_string(),
            title: self.title.unwrap_or_default(),
            year: self.year,
            rating: self.rating,
            duration: self.duration,
            genre: self.genre,
            plot: self.plot,
            poster: self.poster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ScraperClient {
        ScraperClient::new(server.uri(), "secret", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn search_maps_hits_in_upstream_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/hdhub4u/search"))
            .and(query_param("q", "inception"))
            .and(header("x-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"title": "Inception", "year": 2010, "quality": "BluRay", "link": "https://hd/1"},
                {"title": "Inception 2", "year": "N/A", "link": "https://hd/2"},
                {"title": "No link"}
            ])))
            .mount(&server)
            .await;

        let hits = client(&server).search(Provider::HdHub4U, "inception").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Inception");
        assert_eq!(hits[0].year.as_deref(), Some("2010"));
        assert_eq!(hits[0].quality.as_deref(), Some("BluRay"));
        assert_eq!(hits[0].source_url, "https://hd/1");
        assert_eq!(hits[1].provider, Provider::HdHub4U);
        assert_eq!(hits[1].source_url, "https://hd/2");
    }

    #[tokio::test]
    async fn empty_search_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(path("/api/desiremovies/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client(&server).search(Provider::DesireMovies, "zzz").await.unwrap_err();
        assert_eq!(err, BotError::NotFound { query: "zzz".to_string() });
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/hdhub4u/search"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server).search(Provider::HdHub4U, "x").await.unwrap_err();
        assert!(matches!(err, BotError::Upstream { provider: Provider::HdHub4U, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/hdhub4u/details"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).details(Provider::HdHub4U, "https://hd/1").await.unwrap_err();
        assert!(matches!(err, BotError::Upstream { .. }));
    }

    #[tokio::test]
    async fn details_accept_numeric_fields() {
        let server = MockServer::start().await;
        Mock::given(path("/api/desiremovies/details"))
            .and(query_param("url", "https://dm/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Dune", "year": 2021, "rating": 8.1,
                "duration": "2h 35m", "genre": "Sci-Fi", "plot": null
            })))
            .mount(&server)
            .await;

        let d = client(&server).details(Provider::DesireMovies, "https://dm/9").await.unwrap();
        assert_eq!(d.title, "Dune");
        assert_eq!(d.year.as_deref(), Some("2021"));
        assert_eq!(d.rating.as_deref(), Some("8.1"));
        assert_eq!(d.plot, None);
        assert_eq!(d.source_url, "https://dm/9");
        assert_eq!(d.provider, Provider::DesireMovies);
    }

    #[tokio::test]
    async fn magic_links_may_be_empty() {
        let server = MockServer::start().await;
        Mock::given(path("/api/hdhub4u/magiclinks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "none"})))
            .mount(&server)
            .await;

        let links = client(&server).magic_links(Provider::HdHub4U, "https://hd/1").await.unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn links_are_unwrapped_flattened_and_deduplicated() {
        let body = json!({
            "downloadLinks": [
                {"quality": "720p", "size": "1.1GB", "link": "https://cdn/720"},
                {"label": "1080p", "files": [
                    {"url": "https://cdn/1080a"},
                    {"url": "https://cdn/1080b", "quality": "1080p HEVC", "size": "2GB"},
                    {"url": "https://cdn/720"}
                ]},
                {"directLink": "https://cdn/4k"},
                "garbage"
            ]
        });

        let links = normalize_links(body);
        let got: Vec<(&str, Option<&str>, &str)> = links
            .iter()
            .map(|l| (l.label.as_str(), l.size.as_deref(), l.direct_url.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("720p", Some("1.1GB"), "https://cdn/720"),
                ("1080p", None, "https://cdn/1080a"),
                ("1080p HEVC", Some("2GB"), "https://cdn/1080b"),
                ("Unknown", None, "https://cdn/4k"),
            ]
        );
    }

    #[test]
    fn fallback_fills_missing_title_and_year() {
        let hit = SearchHit {
            provider: Provider::HdHub4U,
            title: "Heat".into(),
            year: Some("1995".into()),
            quality: None,
            source_url: "https://hd/heat".into(),
        };
        let raw: RawDetails = serde_json::from_value(json!({"rating": "8.3"})).unwrap();
        let d = raw.into_details(Provider::HdHub4U, &hit.source_url).with_fallback(&hit);
        assert_eq!(d.title, "Heat");
        assert_eq!(d.year.as_deref(), Some("1995"));
    }
}

//! Location descriptions from Wikipedia article intros.
//!
//! [`WikipediaService::describe_location`] reverse-geocodes a coordinate,
//! then tries the resulting place names one by one against the MediaWiki
//! `prop=extracts` API until one yields a non-empty intro extract.
//!
//! Every failure collapses to `None`: a geocoder error, a network error,
//! a malformed response and an empty extract all mean "no description".
//! There are no retries and nothing is cached between calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use geomemories_core::Coordinate;

use crate::config::WikipediaConfig;
use crate::geocode::{Placemark, ReverseGeocoder};

#[derive(Debug, Deserialize)]
struct WikiApiResponse {
    query: WikiQuery,
}

#[derive(Debug, Deserialize)]
struct WikiQuery {
    #[serde(default)]
    pages: HashMap<String, WikiPage>,
}

#[derive(Debug, Deserialize)]
struct WikiPage {
    #[serde(default)]
    extract: Option<String>,
}

pub struct WikipediaService {
    geocoder: Arc<dyn ReverseGeocoder>,
    client: reqwest::Client,
    api_url: String,
}

impl WikipediaService {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, config: &WikipediaConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            geocoder,
            client: builder.build()?,
            api_url: config.api_url.clone(),
        })
    }

    /// Find a short description of the place at `coordinate`.
    ///
    /// Returns `None` when nothing suitable is found or `token` is cancelled.
    pub async fn describe_location(
        &self,
        coordinate: Coordinate,
        token: &CancellationToken,
    ) -> Option<String> {
        let placemark = tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            res = self.geocoder.reverse(coordinate) => match res {
                Ok(Some(p)) => p,
                Ok(None) => {
                    debug!(%coordinate, "no placemark for coordinate");
                    return None;
                }
                Err(e) => {
                    warn!(%coordinate, error = %e, "reverse geocoding failed");
                    return None;
                }
            },
        };

        for query in candidate_queries(&placemark) {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                res = self.fetch_extract(&query) => res,
            };
            match result {
                Ok(Some(extract)) => {
                    debug!(query = %query, "found description");
                    return Some(extract);
                }
                Ok(None) => debug!(query = %query, "empty extract"),
                Err(e) => warn!(query = %query, error = %e, "wikipedia lookup failed"),
            }
        }
        None
    }

    /// Intro extract for the article titled `query`, if non-empty.
    pub async fn fetch_extract(&self, query: &str) -> Result<Option<String>> {
        let url = self.extract_url(query);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Wikipedia request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Wikipedia API error {}", status);
        }

        let body: WikiApiResponse = response
            .json()
            .await
            .context("Invalid Wikipedia response")?;

        Ok(body
            .query
            .pages
            .into_values()
            .filter_map(|page| page.extract)
            .find(|extract| !extract.trim().is_empty()))
    }

    fn extract_url(&self, query: &str) -> String {
        format!(
            "{}?format=json&action=query&prop=extracts&exintro&explaintext&redirects=1&titles={}",
            self.api_url,
            urlencoding::encode(query)
        )
    }
}

/// Queries to try, most specific first. Blank and repeated names are skipped.
pub fn candidate_queries(placemark: &Placemark) -> Vec<String> {
    let ordered = [
        &placemark.city_with_context,
        &placemark.region,
        &placemark.name,
        &placemark.thoroughfare,
        &placemark.sub_thoroughfare,
        &placemark.locality,
        &placemark.sub_administrative_area,
        &placemark.administrative_area,
        &placemark.postal_code,
        &placemark.country,
    ];

    let mut out: Vec<String> = Vec::new();
    for part in ordered.into_iter().flatten() {
        let part = part.trim();
        if !part.is_empty() && !out.iter().any(|seen| seen == part) {
            out.push(part.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::StaticGeocoder;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(extract: &str) -> serde_json::Value {
        serde_json::json!({
            "batchcomplete": "",
            "query": { "pages": { "123": { "pageid": 123, "title": "t", "extract": extract } } }
        })
    }

    fn service(server: &MockServer, placemark: Placemark) -> WikipediaService {
        let config = WikipediaConfig {
            api_url: format!("{}/w/api.php", server.uri()),
            timeout_secs: Some(5),
        };
        WikipediaService::new(Arc::new(StaticGeocoder::new(placemark)), &config).unwrap()
    }

    #[test]
    fn test_candidates_ordered_and_deduplicated() {
        let placemark = Placemark {
            city_with_context: Some("Paris, France".into()),
            region: Some("France".into()),
            name: Some("  ".into()),
            locality: Some("Paris".into()),
            country: Some("France".into()),
            ..Placemark::default()
        };
        assert_eq!(
            candidate_queries(&placemark),
            vec!["Paris, France", "France", "Paris"]
        );
        assert!(candidate_queries(&Placemark::default()).is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_past_empty_extract() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Nowhere Street"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Springfield"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("A town.")))
            .mount(&server)
            .await;

        let svc = service(
            &server,
            Placemark {
                thoroughfare: Some("Nowhere Street".into()),
                locality: Some("Springfield".into()),
                ..Placemark::default()
            },
        );
        let found = svc
            .describe_location(Coordinate::new(1.0, 1.0), &CancellationToken::new())
            .await;
        assert_eq!(found.as_deref(), Some("A town."));
    }

    #[tokio::test]
    async fn test_none_when_every_candidate_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Atlantis"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("titles", "Ocean"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let svc = service(
            &server,
            Placemark {
                name: Some("Atlantis".into()),
                country: Some("Ocean".into()),
                ..Placemark::default()
            },
        );
        assert!(svc
            .describe_location(Coordinate::new(0.0, 0.0), &CancellationToken::new())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_titles_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("Big city.")))
            .mount(&server)
            .await;

        let svc = service(
            &server,
            Placemark {
                locality: Some("São Paulo".into()),
                ..Placemark::default()
            },
        );
        svc.describe_location(Coordinate::new(-23.55, -46.63), &CancellationToken::new())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let query = requests[0].url.query().unwrap_or_default().to_string();
        assert!(query.starts_with("format=json&action=query&prop=extracts&exintro&explaintext"));
        assert!(query.ends_with("titles=S%C3%A3o%20Paulo"));
    }

    #[tokio::test]
    async fn test_no_candidates_makes_no_requests() {
        let server = MockServer::start().await;
        let svc = service(&server, Placemark::default());
        assert!(svc
            .describe_location(Coordinate::new(0.0, 0.0), &CancellationToken::new())
            .await
            .is_none());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("text")))
            .mount(&server)
            .await;

        let svc = service(
            &server,
            Placemark {
                country: Some("Chile".into()),
                ..Placemark::default()
            },
        );
        let token = CancellationToken::new();
        token.cancel();
        assert!(svc
            .describe_location(Coordinate::new(0.0, 0.0), &token)
            .await
            .is_none());
    }
}

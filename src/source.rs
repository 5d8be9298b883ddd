//! Where heat cells come from: the query type and the HTTP aggregation endpoint.

use crate::error::{FetchError, HeatmapError};
use crate::heat_cell::{HeatCell, DEFAULT_RESOLUTION};
use crate::metric::Metric;
use async_trait::async_trait;
use h3o::Resolution;
use serde::Serialize;

/// One (metric, resolution) request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeatmapQuery {
    pub metric: Metric,
    pub resolution: Resolution,
}

#[derive(Serialize)]
struct QueryParams {
    resolution: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    col_name: Option<&'static str>,
}

impl HeatmapQuery {
    pub fn new(metric: Metric, resolution: u8) -> Result<Self, HeatmapError> {
        let resolution =
            Resolution::try_from(resolution).map_err(|_| HeatmapError::InvalidResolution(resolution))?;
        Ok(Self { metric, resolution })
    }

    fn params(&self) -> QueryParams {
        QueryParams {
            resolution: u8::from(self.resolution),
            col_name: self.metric.col_name(),
        }
    }
}

impl Default for HeatmapQuery {
    fn default() -> Self {
        Self {
            metric: Metric::None,
            resolution: DEFAULT_RESOLUTION,
        }
    }
}

#[async_trait]
pub trait HeatmapSource: Send + Sync {
    async fn fetch(&self, query: &HeatmapQuery) -> Result<Vec<HeatCell>, FetchError>;
}

/// Client for the `GET /heatmap` aggregation endpoint.
pub struct HttpHeatmapSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHeatmapSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/heatmap", self.base_url)
    }
}

const BODY_EXCERPT_CHARS: usize = 200;

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

#[async_trait]
impl HeatmapSource for HttpHeatmapSource {
    async fn fetch(&self, query: &HeatmapQuery) -> Result<Vec<HeatCell>, FetchError> {
        let resp = self
            .client
            .get(self.endpoint())
            .query(&query.params())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %excerpt(&body), "heatmap endpoint rejected request");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let cells: Vec<HeatCell> = serde_json::from_str(&body)?;
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn heatmap(Query(params): Query<HashMap<String, String>>) -> (StatusCode, String) {
        match params.get("resolution").map(String::as_str) {
            Some("5") => (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
            Some("6") => (StatusCode::OK, "not json".to_string()),
            Some(res) => {
                let avg = params
                    .get("col_name")
                    .map(|col| format!(r#", "avg_value": {}"#, col.len()))
                    .unwrap_or_default();
                let body = format!(
                    r#"[{{"latitude": 51.09, "longitude": 71.43, "weight": {res}, "unique_values": 1, "h3_id": "A"{avg}}}]"#
                );
                (StatusCode::OK, body)
            }
            None => (StatusCode::BAD_REQUEST, "missing resolution".to_string()),
        }
    }

    async fn echo(Query(params): Query<HashMap<String, String>>) -> Json<HashMap<String, String>> {
        Json(params)
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/heatmap", get(heatmap))
            .route("/echo/heatmap", get(echo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_rejects_out_of_range_resolution() {
        assert!(HeatmapQuery::new(Metric::Speed, 15).is_ok());
        assert!(matches!(
            HeatmapQuery::new(Metric::Speed, 16),
            Err(HeatmapError::InvalidResolution(16))
        ));
    }

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        assert_eq!(
            HttpHeatmapSource::new("http://localhost:8000/").endpoint(),
            "http://localhost:8000/heatmap"
        );
    }

    #[tokio::test]
    async fn test_sends_resolution_and_col_name() {
        let base = serve().await;
        let source = HttpHeatmapSource::new(format!("{base}/echo"));
        let client = reqwest::Client::new();

        let query = HeatmapQuery::new(Metric::Speed, 9).unwrap();
        let params: HashMap<String, String> = client
            .get(source.endpoint())
            .query(&query.params())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(params.get("resolution").unwrap(), "9");
        assert_eq!(params.get("col_name").unwrap(), "speed");

        let query = HeatmapQuery::new(Metric::None, 8).unwrap();
        let params: HashMap<String, String> = client
            .get(source.endpoint())
            .query(&query.params())
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!params.contains_key("col_name"));
    }

    #[tokio::test]
    async fn test_parses_successful_response() {
        let source = HttpHeatmapSource::new(serve().await);
        let cells = source
            .fetch(&HeatmapQuery::new(Metric::Speed, 10).unwrap())
            .await
            .unwrap();

        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].weight, 10.0);
        assert_eq!(cells[0].avg_value, Some(5.0));
    }

    #[tokio::test]
    async fn test_server_error_is_a_status_failure() {
        let source = HttpHeatmapSource::new(serve().await);
        let err = source
            .fetch(&HeatmapQuery::new(Metric::None, 5).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 500, ref body } if body == "boom"));
    }

    #[test]
    fn test_status_message_leaves_out_the_body() {
        let err = FetchError::Status {
            status: 502,
            body: "<html>".repeat(500),
        };
        assert_eq!(err.to_string(), "heatmap request failed with HTTP 502");
        assert_eq!(excerpt(&"é".repeat(300)).chars().count(), BODY_EXCERPT_CHARS);
        assert_eq!(excerpt("boom"), "boom");
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_failure() {
        let source = HttpHeatmapSource::new(serve().await);
        let err = source
            .fetch(&HeatmapQuery::new(Metric::None, 6).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = HttpHeatmapSource::new(format!("http://{addr}"));
        let err = source.fetch(&HeatmapQuery::default()).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}

//! HTTP transport to the ingestion endpoints

use reqwest::Client as ReqwestClient;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::config::{Endpoint, IngestConfig};
use super::error::IngestError;

/// Header carrying the shared ingest secret
pub const INGEST_KEY_HEADER: &str = "x-ingest-key";

/// Longest non-JSON error body kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// One rejected row reported by the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidEntry {
    pub index: usize,
    pub reason: String,
}

/// Response body of an ingestion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    #[serde(default)]
    pub ok: bool,
    pub received: Option<usize>,
    pub valid: Option<usize>,
    #[serde(default)]
    pub invalid_count: usize,
    pub upserted: Option<usize>,
    pub invalid: Option<Vec<InvalidEntry>>,
    pub error: Option<String>,
    pub details: Option<serde_json::Value>,
    pub debug: Option<serde_json::Value>,
}

/// Sends one batch to an ingestion endpoint.
#[allow(async_fn_in_trait)]
pub trait IngestTransport {
    /// POST `batch` as a JSON array.
    ///
    /// Returns the parsed body of an accepted batch. A non-success status,
    /// an `ok: false` body or a transport failure is an error.
    async fn send_batch<P: Serialize + Sync>(
        &self,
        endpoint: Endpoint,
        batch: &[P],
    ) -> Result<IngestResponse, IngestError>;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpIngestTransport {
    client: ReqwestClient,
    players_url: Url,
    special_moves_url: Url,
    ingest_key: String,
    anon_key: Option<String>,
}

impl HttpIngestTransport {
    /// Create a transport from the ingest configuration
    pub fn new(config: &IngestConfig) -> Result<Self, IngestError> {
        let ingest_key = config
            .ingest_key
            .clone()
            .ok_or_else(|| IngestError::Config("ingest key is required to upload".into()))?;
        let client = ReqwestClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            players_url: config.endpoint_url(Endpoint::Players)?,
            special_moves_url: config.endpoint_url(Endpoint::SpecialMoves)?,
            ingest_key,
            anon_key: config.anon_key.clone(),
        })
    }

    fn url(&self, endpoint: Endpoint) -> &Url {
        match endpoint {
            Endpoint::Players => &self.players_url,
            Endpoint::SpecialMoves => &self.special_moves_url,
        }
    }
}

impl IngestTransport for HttpIngestTransport {
    #[instrument(skip(self, batch), fields(size = batch.len()), level = "debug")]
    async fn send_batch<P: Serialize + Sync>(
        &self,
        endpoint: Endpoint,
        batch: &[P],
    ) -> Result<IngestResponse, IngestError> {
        let url = self.url(endpoint);
        let body = serde_json::to_vec(batch)?;

        let mut request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(INGEST_KEY_HEADER, &self.ingest_key)
            .body(body);
        if let Some(anon_key) = &self.anon_key {
            request = request.header(AUTHORIZATION, format!("Bearer {anon_key}"));
        }

        debug!("Sending POST request to {}", url);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed = serde_json::from_str::<IngestResponse>(&text);
        match parsed {
            Ok(body) if status.is_success() && body.ok => Ok(body),
            Ok(body) => {
                warn!(
                    "{} rejected batch: status={} error={:?} details={:?} debug={:?}",
                    endpoint.path(),
                    status,
                    body.error,
                    body.details,
                    body.debug
                );
                Err(IngestError::Rejected {
                    status: status.as_u16(),
                    message: body.error.unwrap_or_else(|| "ok=false".to_string()),
                })
            }
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => Err(IngestError::Rejected {
                status: status.as_u16(),
                message: text.chars().take(MAX_ERROR_BODY).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn transport(server: &Server, anon_key: Option<&str>) -> HttpIngestTransport {
        let mut builder = IngestConfig::builder()
            .api_base(format!("{}/functions/v1", server.url()))
            .ingest_key("s3cret");
        if let Some(anon_key) = anon_key {
            builder = builder.anon_key(anon_key);
        }
        HttpIngestTransport::new(&builder.build().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_accepted_batch() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/functions/v1/ingest-players")
            .match_header("x-ingest-key", "s3cret")
            .match_header("authorization", "Bearer anon")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!([{"id": "a"}, {"id": "b"}])))
            .with_status(200)
            .with_body(
                r#"{"ok":true,"received":2,"valid":1,"invalidCount":1,"upserted":1,
                    "invalid":[{"index":1,"reason":"Unreleased placeholder"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let response = transport(&server, Some("anon"))
            .send_batch(Endpoint::Players, &[json!({"id": "a"}), json!({"id": "b"})])
            .await
            .unwrap();

        assert_eq!(response.upserted, Some(1));
        assert_eq!(response.invalid_count, 1);
        assert_eq!(
            response.invalid,
            Some(vec![InvalidEntry {
                index: 1,
                reason: "Unreleased placeholder".into()
            }])
        );
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_bearer_is_optional() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/functions/v1/ingest-special-moves")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"ok":true,"upserted":1}"#)
            .create_async()
            .await;

        let response = transport(&server, None)
            .send_batch(Endpoint::SpecialMoves, &[json!({"id": "m"})])
            .await
            .unwrap();
        assert_eq!(response.upserted, Some(1));
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_batch() {
        let mut server = Server::new_async().await;
        let _unauthorized = server
            .mock("POST", "/functions/v1/ingest-players")
            .with_status(401)
            .with_body(r#"{"ok":false,"error":"Unauthorized"}"#)
            .create_async()
            .await;

        let err = transport(&server, None)
            .send_batch(Endpoint::Players, &[json!({})])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Rejected { status: 401, ref message } if message == "Unauthorized"
        ));
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let mut server = Server::new_async().await;
        let _gateway = server
            .mock("POST", "/functions/v1/ingest-players")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let err = transport(&server, None)
            .send_batch(Endpoint::Players, &[json!({})])
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Rejected { status: 502, .. }));
    }
}

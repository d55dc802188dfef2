//! HTTP snapshot source backed by `reqwest`.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use spawnwatch_core::config::ServerConfig;
use spawnwatch_core::scheduler::{FetchError, SnapshotSource};

use crate::error::ClientError;

/// Fetches the map-data payload from the map server.
///
/// Every kind is always requested; feeds the user has switched off are
/// dropped by the engine, not the server.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    /// Build a source for the configured server.
    pub fn new(server: &ServerConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(server.fetch_timeout_ms))
            .build()
            .map_err(|e| ClientError::Http {
                message: format!("failed to build client: {e}"),
            })?;
        Ok(Self {
            client,
            url: server.data_url(),
        })
    }

    /// Endpoint being polled.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch(&self) -> impl Future<Output = Result<Value, FetchError>> + Send + 'static {
        let client = self.client.clone();
        let url = self.url.clone();
        async move {
            let response = client
                .get(&url)
                .query(&[("pokemon", "true"), ("gyms", "true"), ("scanned", "true")])
                .send()
                .await
                .map_err(|e| FetchError::Request {
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                });
            }

            response.json::<Value>().await.map_err(|e| FetchError::Decode {
                message: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> ServerConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0_u8; 2048];
            let _ = socket.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        ServerConfig {
            base_url: format!("http://{addr}"),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn successful_fetch_returns_the_payload() {
        let server = serve_once("200 OK", r#"{"pokemons": [], "gyms": []}"#).await;
        let source = HttpSnapshotSource::new(&server).unwrap();

        let body = source.fetch().await.unwrap();

        assert!(body.get("pokemons").unwrap().as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_status_is_a_fetch_failure() {
        let server = serve_once("503 Service Unavailable", "{}").await;
        let source = HttpSnapshotSource::new(&server).unwrap();

        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn non_json_body_is_a_decode_failure() {
        let server = serve_once("200 OK", "<html>").await;
        let source = HttpSnapshotSource::new(&server).unwrap();

        assert!(matches!(
            source.fetch().await,
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn url_joins_base_and_path() {
        let source = HttpSnapshotSource::new(&ServerConfig {
            base_url: "http://maps.example:5000/".to_owned(),
            ..ServerConfig::default()
        })
        .unwrap();
        assert_eq!(source.url(), "http://maps.example:5000/map-data");
    }
}

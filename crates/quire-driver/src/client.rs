use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1;
use hyper::{header, Request, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::{debug, warn};

use quire_overlay::{Driver, DriverError, DriverResult};
use quire_types::{Block, BoardMember};

use crate::config::DriverConfig;

/// Placeholder authority; the socket path decides where requests go.
const DRIVER_HOST: &str = "driver";

/// A [`Driver`] reached over HTTP/1.1 on a local Unix socket.
///
/// Every call opens a fresh connection and issues
/// `GET http://driver/<endpoint>?boardID=<id>`. A 200 carries a JSON array,
/// a 404 means the driver has nothing for the board, and any other status
/// is an error. Connection failures and timeouts are retried with linear
/// backoff; status and decode errors are not.
#[derive(Clone, Debug)]
pub struct RpcDriver {
    config: DriverConfig,
}

impl RpcDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        board_id: &str,
    ) -> DriverResult<Vec<T>> {
        let uri = request_uri(endpoint, board_id);
        let mut retries = 0u32;
        loop {
            match self.attempt(&uri).await {
                Ok((status, body)) => return decode_rows(status, &body),
                Err(err) if err.is_transient() && retries < self.config.max_retries => {
                    retries += 1;
                    let delay = self.config.retry_backoff * retries;
                    warn!(
                        driver = %self.config.name,
                        endpoint,
                        retry = retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "driver request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One bounded request/response exchange.
    async fn attempt(&self, uri: &str) -> DriverResult<(StatusCode, Bytes)> {
        let exchange = async {
            let stream = UnixStream::connect(&self.config.socket_path)
                .await
                .map_err(|e| DriverError::Connect(e.to_string()))?;
            let (mut sender, connection) = http1::handshake(TokioIo::new(stream))
                .await
                .map_err(|e| DriverError::Connect(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!(error = %e, "driver connection closed with error");
                }
            });

            let request = Request::get(uri)
                .header(header::HOST, DRIVER_HOST)
                .header(header::ACCEPT, "application/json")
                .body(Empty::<Bytes>::new())
                .map_err(|e| DriverError::Request(e.to_string()))?;
            let response = sender
                .send_request(request)
                .await
                .map_err(|e| DriverError::Request(e.to_string()))?;

            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| DriverError::Request(e.to_string()))?
                .to_bytes();
            debug!(
                driver = %self.config.name,
                uri,
                status = status.as_u16(),
                bytes = body.len(),
                "driver responded"
            );
            Ok::<_, DriverError>((status, body))
        };

        tokio::time::timeout(self.config.timeout, exchange)
            .await
            .map_err(|_| DriverError::Timeout(self.config.timeout))?
    }
}

fn request_uri(endpoint: &str, board_id: &str) -> String {
    format!(
        "http://{DRIVER_HOST}/{endpoint}?boardID={}",
        utf8_percent_encode(board_id, NON_ALPHANUMERIC)
    )
}

fn decode_rows<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> DriverResult<Vec<T>> {
    match status {
        StatusCode::OK => {
            serde_json::from_slice(body).map_err(|e| DriverError::Decode(e.to_string()))
        }
        StatusCode::NOT_FOUND => Ok(Vec::new()),
        other => Err(DriverError::Status {
            status: other.as_u16(),
        }),
    }
}

#[async_trait]
impl Driver for RpcDriver {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_blocks_for_board(&self, board_id: &str) -> DriverResult<Vec<Block>> {
        self.get_rows("blocks", board_id).await
    }

    async fn get_members_for_board(&self, board_id: &str) -> DriverResult<Vec<BoardMember>> {
        self.get_rows("members", board_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use hyper::server::conn::http1 as server_http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use tempfile::TempDir;
    use tokio::net::UnixListener;
    use tokio::task::JoinHandle;
    use tower::ServiceExt;

    use quire_overlay::{Driver, DriverError};
    use quire_types::{Block, BlockType, BoardMember};

    use super::*;

    /// An axum app served on a Unix socket inside a temporary directory.
    struct Fixture {
        _dir: TempDir,
        socket: PathBuf,
        server: JoinHandle<()>,
    }

    impl Fixture {
        async fn serve(app: Router) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let socket = dir.path().join("driver.sock");
            let listener = UnixListener::bind(&socket).unwrap();

            let server = tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let app = app.clone();
                    tokio::spawn(async move {
                        let service = service_fn(move |request| app.clone().oneshot(request));
                        let _ = server_http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service)
                            .await;
                    });
                }
            });

            Self {
                _dir: dir,
                socket,
                server,
            }
        }

        fn driver(&self) -> RpcDriver {
            RpcDriver::new(DriverConfig {
                timeout: Duration::from_millis(500),
                retry_backoff: Duration::from_millis(1),
                ..DriverConfig::new("fixture", &self.socket)
            })
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.server.abort();
        }
    }

    type Hits = Arc<AtomicUsize>;

    async fn echo_blocks(
        State(hits): State<Hits>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Vec<Block>> {
        hits.fetch_add(1, Ordering::SeqCst);
        let board_id = params.get("boardID").cloned().unwrap_or_default();
        Json(vec![Block::new(
            "remote-card",
            BlockType::Card,
            board_id.clone(),
            board_id.clone(),
            board_id,
        )])
    }

    async fn members(Query(params): Query<HashMap<String, String>>) -> Json<Vec<BoardMember>> {
        let board_id = params.get("boardID").cloned().unwrap_or_default();
        Json(vec![BoardMember::admin(board_id, "remote-user")])
    }

    async fn failing(State(hits): State<Hits>) -> StatusCode {
        hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::INTERNAL_SERVER_ERROR
    }

    async fn slow(State(hits): State<Hits>) -> Json<Vec<Block>> {
        hits.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        Json(Vec::new())
    }

    async fn garbage() -> &'static str {
        "this is not json"
    }

    fn app(hits: Hits) -> Router {
        Router::new()
            .route("/blocks", get(echo_blocks))
            .route("/members", get(members))
            .with_state(hits)
    }

    // -----------------------------------------------------------------------
    // Request encoding and status mapping
    // -----------------------------------------------------------------------

    #[test]
    fn board_id_is_percent_encoded() {
        assert_eq!(
            request_uri("blocks", "b1 &x=y"),
            "http://driver/blocks?boardID=b1%20%26x%3Dy"
        );
    }

    #[test]
    fn status_mapping() {
        let ok: Vec<Block> = decode_rows(StatusCode::OK, b"[]").unwrap();
        assert!(ok.is_empty());
        let missing: Vec<Block> = decode_rows(StatusCode::NOT_FOUND, b"gone").unwrap();
        assert!(missing.is_empty());
        let err = decode_rows::<Block>(StatusCode::BAD_GATEWAY, b"").unwrap_err();
        assert_eq!(err, DriverError::Status { status: 502 });
        let err = decode_rows::<Block>(StatusCode::OK, b"{").unwrap_err();
        assert!(matches!(err, DriverError::Decode(_)));
    }

    // -----------------------------------------------------------------------
    // Live socket exchanges
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn fetches_blocks_and_members() {
        let hits = Hits::default();
        let fixture = Fixture::serve(app(hits.clone())).await;
        let driver = fixture.driver();

        let blocks = driver.get_blocks_for_board("board 1/α").await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].board_id, "board 1/α");

        let members = driver.get_members_for_board("b1").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "remote-user");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_means_empty() {
        let fixture = Fixture::serve(Router::new()).await;
        let driver = fixture.driver();
        assert!(driver.get_blocks_for_board("b1").await.unwrap().is_empty());
        assert!(driver.get_members_for_board("b1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let hits = Hits::default();
        let app = Router::new()
            .route("/blocks", get(failing))
            .with_state(hits.clone());
        let fixture = Fixture::serve(app).await;

        let err = fixture.driver().get_blocks_for_board("b1").await.unwrap_err();
        assert_eq!(err, DriverError::Status { status: 500 });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let fixture = Fixture::serve(Router::new().route("/blocks", get(garbage))).await;
        let err = fixture.driver().get_blocks_for_board("b1").await.unwrap_err();
        assert!(matches!(err, DriverError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_driver_times_out_after_retries() {
        let hits = Hits::default();
        let app = Router::new()
            .route("/blocks", get(slow))
            .with_state(hits.clone());
        let fixture = Fixture::serve(app).await;
        let driver = RpcDriver::new(DriverConfig {
            timeout: Duration::from_millis(50),
            max_retries: 1,
            retry_backoff: Duration::from_millis(1),
            ..DriverConfig::new("slow", &fixture.socket)
        });

        let err = driver.get_blocks_for_board("b1").await.unwrap_err();
        assert_eq!(err, DriverError::Timeout(Duration::from_millis(50)));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_socket_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let driver = RpcDriver::new(DriverConfig {
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
            ..DriverConfig::new("absent", dir.path().join("absent.sock"))
        });

        let err = driver.get_blocks_for_board("b1").await.unwrap_err();
        assert!(matches!(err, DriverError::Connect(_)));
        assert!(err.is_transient());
    }
}

//! Loopback axum server answering with canned responses, used by the source tests.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct Canned {
    status: StatusCode,
    body: String,
}

impl Canned {
    pub fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: body.to_string(),
        }
    }
}

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: HashMap<String, String>,
    pub user_agent: Option<String>,
}

#[derive(Default)]
struct ServerState {
    responses: Mutex<VecDeque<Canned>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Requests received so far, in arrival order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }
}

async fn respond(
    State(state): State<Arc<ServerState>>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.requests.lock().await.push(RecordedRequest {
        path: uri.path().to_string(),
        query,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    match state.responses.lock().await.pop_front() {
        Some(canned) => (
            canned.status,
            [(header::CONTENT_TYPE, "application/json")],
            canned.body,
        )
            .into_response(),
        None => (StatusCode::GONE, "no canned response left").into_response(),
    }
}

/// Serves `responses` in order, one per request, on any path.
/// Requests beyond the canned ones get `410 Gone`.
pub async fn serve(responses: Vec<Canned>) -> TestServer {
    let state = Arc::new(ServerState {
        responses: Mutex::new(responses.into()),
        requests: Mutex::default(),
    });
    let app = Router::new()
        .fallback(respond)
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::warn!("test server stopped: {}", e);
        }
    });

    TestServer { addr, state }
}

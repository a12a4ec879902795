//! Shared test doubles: a scripted data service and a local HTTP server.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Request;
use hyper::Response;
use hyper::body::Bytes;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tubular_lib::api::DataRequest;
use tubular_lib::error::ApiError;
use tubular_lib::service::DataService;

// =============================================================================
// Scripted data service
// =============================================================================

type Responder = dyn Fn(&DataRequest) -> Result<Option<Value>, ApiError> + Send + Sync;

/// Data service that answers from a closure and records every request.
pub struct ScriptedService {
    responder: Box<Responder>,
    requests: Mutex<Vec<DataRequest>>,
    calls: AtomicUsize,
}

impl ScriptedService {
    pub fn new(
        responder: impl Fn(&DataRequest) -> Result<Option<Value>, ApiError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    /// Always answers with `body`.
    pub fn answering(body: Value) -> Arc<Self> {
        Self::new(move |_| Ok(Some(body.clone())))
    }

    /// Always fails with `error`.
    pub fn failing(status: u16, message: &'static str) -> Arc<Self> {
        Self::new(move |_| Err(ApiError::http(status, message)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DataRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> DataRequest {
        self.requests().pop().expect("no request was made")
    }
}

#[async_trait]
impl DataService for ScriptedService {
    async fn retrieve(&self, request: DataRequest) -> Result<Option<Value>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(&request)
    }
}

/// A grid response body with the given records on page one.
pub fn page(records: Vec<Value>, total: i64) -> Value {
    let filtered = records.len() as i64;
    json!({
        "Payload": records,
        "CurrentPage": 1,
        "TotalPages": 1,
        "TotalRecordCount": total,
        "FilteredRecordCount": filtered,
    })
}

pub fn orders() -> Vec<Value> {
    vec![
        json!({"OrderId": 1, "CustomerName": "Acme", "Amount": 120.5, "ShippedDate": "2024-01-05T00:00:00"}),
        json!({"OrderId": 2, "CustomerName": "Blue Sky", "Amount": 80.0, "ShippedDate": "2024-02-11T00:00:00"}),
        json!({"OrderId": 3, "CustomerName": "Contoso", "Amount": 42.0, "ShippedDate": null}),
    ]
}

// =============================================================================
// Local HTTP server
// =============================================================================

/// A request as seen by the test server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path and query.
    pub uri: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or_default()
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// What the test server answers.
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path() == path)
            .collect()
    }
}

/// Starts an HTTP/1 server on a random local port.
pub async fn serve(handler: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let log = log.clone();
            let handler = handler.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let log = log.clone();
                    let handler = handler.clone();
                    async move {
                        let method = req.method().to_string();
                        let uri = req
                            .uri()
                            .path_and_query()
                            .map(|p| p.to_string())
                            .unwrap_or_default();
                        let authorization = req
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let bytes = req.into_body().collect().await.map(|b| b.to_bytes());
                        let body = String::from_utf8_lossy(&bytes.unwrap_or_default()).into_owned();

                        let recorded = Recorded {
                            method,
                            uri,
                            authorization,
                            body,
                        };
                        log.lock().unwrap().push(recorded.clone());

                        let reply = handler(&recorded);
                        if !reply.delay.is_zero() {
                            tokio::time::sleep(reply.delay).await;
                        }

                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(reply.status)
                                .header("Content-Type", "application/json")
                                .body(Full::new(Bytes::from(reply.body)))
                                .unwrap(),
                        )
                    }
                });

                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    TestServer { addr, requests }
}

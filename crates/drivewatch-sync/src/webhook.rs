//! Push notification receiver
//!
//! Drive POSTs to the channel address whenever the change feed of the
//! watched account moves. The request carries no useful body; it only means
//! "poll now". The receiver answers `200 OK` right away and runs the cycle
//! in the background through the account's [`PipelineRunner`], so a slow
//! cycle never makes Drive retry the notification.
//!
//! Routes:
//!
//! - `POST /webhook/<account>`
//! - `POST /webhook` with the account id in `X-Goog-Channel-Token`
//!
//! The `sync` resource state, sent once right after a channel is
//! registered, is acknowledged without a cycle.
//!
//! When built [`with_events`](WebhookServer::with_events), the same server
//! also serves `GET /events`, a Server-Sent Events stream of every
//! classified change (see [`crate::events`]).

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events;
use crate::runner::{PipelineRunner, TriggerSource};
use crate::sinks::BroadcastSink;

const WEBHOOK_PATH: &str = "/webhook";
const EVENTS_PATH: &str = "/events";
const RESOURCE_STATE_HEADER: &str = "x-goog-resource-state";
const CHANNEL_TOKEN_HEADER: &str = "x-goog-channel-token";
const CHANNEL_ID_HEADER: &str = "x-goog-channel-id";

type Runners = HashMap<String, Arc<PipelineRunner>>;
type ResponseBody = BoxBody<Bytes, Infallible>;

/// HTTP server that turns Drive push notifications into cycles
pub struct WebhookServer {
    addr: SocketAddr,
    runners: Arc<Runners>,
    events: Option<BroadcastSink>,
}

impl WebhookServer {
    /// Creates a server for the given runners
    ///
    /// # Arguments
    /// * `bind_address` - Address to bind, e.g. `"127.0.0.1:8787"`
    /// * `runners` - One runner per account; routed by account id
    pub fn new(
        bind_address: &str,
        runners: impl IntoIterator<Item = Arc<PipelineRunner>>,
    ) -> anyhow::Result<Self> {
        let addr: SocketAddr = bind_address.parse()?;
        let runners = runners
            .into_iter()
            .map(|r| (r.account_id().to_string(), r))
            .collect();
        Ok(Self {
            addr,
            runners: Arc::new(runners),
            events: None,
        })
    }

    /// Serves `GET /events` from `sink`
    pub fn with_events(mut self, sink: BroadcastSink) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the configured address and serves until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, accounts = self.runners.len(), "Webhook server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept webhook connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let runners = Arc::clone(&self.runners);
                    let events = self.events.clone();
                    let streams_done = shutdown.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let response =
                                handle_request(req, &runners, events.as_ref(), &streams_done);
                            async move { Ok::<_, Infallible>(response) }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            error!(peer = %peer, error = %e, "Webhook HTTP connection error");
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    info!("Webhook server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Outcome of routing one notification
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Trigger(String),
    Handshake(String),
    Events,
    UnknownAccount,
    NotFound,
    MethodNotAllowed,
}

fn route(method: &Method, path: &str, headers: &HeaderMap, runners: &Runners) -> Route {
    if path == EVENTS_PATH {
        return if *method == Method::GET {
            Route::Events
        } else {
            Route::MethodNotAllowed
        };
    }

    let Some(rest) = path.strip_prefix(WEBHOOK_PATH) else {
        return Route::NotFound;
    };
    if !rest.is_empty() && !rest.starts_with('/') {
        return Route::NotFound;
    }

    let account = match rest.trim_matches('/') {
        "" => headers
            .get(CHANNEL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        segment if !segment.contains('/') => Some(segment.to_string()),
        _ => return Route::NotFound,
    };

    if *method != Method::POST {
        return Route::MethodNotAllowed;
    }

    let Some(account) = account.filter(|a| runners.contains_key(a)) else {
        return Route::UnknownAccount;
    };

    let state = headers
        .get(RESOURCE_STATE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state.eq_ignore_ascii_case("sync") {
        Route::Handshake(account)
    } else {
        Route::Trigger(account)
    }
}

fn handle_request(
    req: Request<hyper::body::Incoming>,
    runners: &Runners,
    events: Option<&BroadcastSink>,
    shutdown: &CancellationToken,
) -> Response<ResponseBody> {
    let channel = req
        .headers()
        .get(CHANNEL_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let status = match route(req.method(), req.uri().path(), req.headers(), runners) {
        Route::Trigger(account) => {
            debug!(account = %account, channel = %channel, "Push notification received");
            if let Some(runner) = runners.get(&account) {
                let runner = Arc::clone(runner);
                tokio::spawn(async move {
                    runner.trigger(TriggerSource::Push).await;
                });
            }
            StatusCode::OK
        }
        Route::Handshake(account) => {
            info!(account = %account, channel = %channel, "Push channel handshake acknowledged");
            StatusCode::OK
        }
        Route::Events => match events {
            Some(sink) => {
                debug!(subscribers = sink.subscriber_count() + 1, "Event stream opened");
                return event_stream_response(events::subscribe(sink, shutdown.child_token()));
            }
            None => StatusCode::NOT_FOUND,
        },
        Route::UnknownAccount => {
            warn!(path = %req.uri().path(), channel = %channel, "Push notification for unknown account");
            StatusCode::NOT_FOUND
        }
        Route::NotFound => StatusCode::NOT_FOUND,
        Route::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
    };

    text_response(status)
}

fn text_response(status: StatusCode) -> Response<ResponseBody> {
    let body = if status == StatusCode::OK {
        "OK"
    } else {
        status.canonical_reason().unwrap_or("")
    };
    let mut response = Response::new(Full::new(Bytes::from(body)).boxed());
    *response.status_mut() = status;
    response
}

fn event_stream_response(stream: events::EventStream) -> Response<ResponseBody> {
    let mut response = Response::new(stream.boxed());
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

//! Scripted [`HttpTransport`] for tests.
//!
//! Routes are matched by method and URL prefix in registration order; every
//! call is recorded so tests can assert exactly which endpoints were hit
//! (including "never called").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::http::{HttpClient, HttpError, HttpRequest, HttpResponse, HttpTransport};

/// Canned behaviour for a matched route.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with a status and raw text body.
    Text(u16, String),
    /// Respond with a status and JSON body.
    Json(u16, Value),
    /// Fail the exchange with the given error.
    Error(HttpError),
    /// Never complete; only a caller-side timeout ends the call.
    Hang,
    /// Wait (on the tokio clock), then behave like the inner reply.
    After(Duration, Box<Reply>),
    /// Panic inside the transport call.
    Panic(&'static str),
}

impl Reply {
    pub fn after(delay: Duration, reply: Reply) -> Self {
        Reply::After(delay, Box::new(reply))
    }
}

struct Route {
    method: Method,
    url_prefix: String,
    reply: Reply,
    once: bool,
}

#[derive(Default)]
struct InFlight {
    current: HashMap<String, usize>,
    peak: HashMap<String, usize>,
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<HttpRequest>>,
    in_flight: Mutex<InFlight>,
}

/// Decrements the in-flight count for a URL when the call ends, including
/// when the call is cancelled or panics.
struct InFlightGuard<'a> {
    fake: &'a FakeTransport,
    url: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.fake.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = in_flight.current.get_mut(&self.url) {
            *count = count.saturating_sub(1);
        }
    }
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn add_route(&self, method: Method, url_prefix: &str, reply: Reply, once: bool) -> &Self {
        self.routes.lock().unwrap().push(Route {
            method,
            url_prefix: url_prefix.to_string(),
            reply,
            once,
        });
        self
    }

    /// Register a route. The first registered match wins.
    pub fn on(&self, method: Method, url_prefix: &str, reply: Reply) -> &Self {
        self.add_route(method, url_prefix, reply, false)
    }

    /// Register a route that answers one call and is then removed.
    pub fn on_once(&self, method: Method, url_prefix: &str, reply: Reply) -> &Self {
        self.add_route(method, url_prefix, reply, true)
    }

    pub fn client(self: &Arc<Self>) -> HttpClient {
        HttpClient::new(Arc::clone(self) as Arc<dyn HttpTransport>)
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of calls whose URL starts with `url_prefix`.
    pub fn calls_to(&self, url_prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url.starts_with(url_prefix))
            .count()
    }

    /// Calls to exactly `url` that have not completed yet.
    pub fn in_flight(&self, url: &str) -> usize {
        self.in_flight
            .lock()
            .unwrap()
            .current
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of simultaneous calls seen to exactly `url`.
    pub fn peak_in_flight(&self, url: &str) -> usize {
        self.in_flight
            .lock()
            .unwrap()
            .peak
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn enter(&self, url: &str) -> InFlightGuard<'_> {
        let mut in_flight = self.in_flight.lock().unwrap();
        let current = in_flight.current.entry(url.to_string()).or_default();
        *current += 1;
        let now = *current;
        let peak = in_flight.peak.entry(url.to_string()).or_default();
        *peak = (*peak).max(now);
        InFlightGuard {
            fake: self,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let index = routes
                .iter()
                .position(|r| r.method == request.method && request.url.starts_with(&r.url_prefix));
            match index {
                Some(i) if routes[i].once => Some(routes.remove(i).reply),
                Some(i) => Some(routes[i].reply.clone()),
                None => None,
            }
        };
        let method = request.method.clone();
        let url = request.url.clone();
        self.calls.lock().unwrap().push(request);
        let _guard = self.enter(&url);

        let mut reply = reply;
        while let Some(Reply::After(delay, next)) = reply {
            tokio::time::sleep(delay).await;
            reply = Some(*next);
        }

        match reply {
            Some(Reply::Text(status, body)) => Ok(HttpResponse { status, body }),
            Some(Reply::Json(status, body)) => Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            Some(Reply::Error(err)) => Err(err),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Panic(message)) => panic!("{message}"),
            Some(Reply::After(..)) => unreachable!("delays are unwrapped above"),
            None => Err(HttpError::Request(format!("no route for {method} {url}"))),
        }
    }
}

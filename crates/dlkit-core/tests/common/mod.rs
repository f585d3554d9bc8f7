//! In-process HTTP server for download tests

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::StreamExt;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Deterministic, non-repeating test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

struct ServerState {
    body: Bytes,
    accept_ranges: bool,
    honor_ranges: bool,
    failures_left: AtomicUsize,
    chunk_size: usize,
    chunk_delay: Duration,
    requests: AtomicUsize,
    range_requests: AtomicUsize,
}

pub struct MockServerBuilder {
    body: Vec<u8>,
    accept_ranges: bool,
    honor_ranges: bool,
    fail_first: usize,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl MockServerBuilder {
    /// Advertise and honor byte ranges
    pub fn ranges(mut self) -> Self {
        self.accept_ranges = true;
        self.honor_ranges = true;
        self
    }

    /// Advertise byte ranges but always answer 200 with the full body
    pub fn ignore_ranges(mut self) -> Self {
        self.accept_ranges = true;
        self.honor_ranges = false;
        self
    }

    /// Answer the first `n` requests with 500
    pub fn fail_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    pub fn always_fail(self) -> Self {
        self.fail_first(usize::MAX)
    }

    /// Send the body in `chunk_size` pieces, sleeping `delay` before each
    pub fn throttle(mut self, chunk_size: usize, delay: Duration) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_delay = delay;
        self
    }

    pub async fn start(self) -> MockServer {
        let state = Arc::new(ServerState {
            body: Bytes::from(self.body),
            accept_ranges: self.accept_ranges,
            honor_ranges: self.honor_ranges,
            failures_left: AtomicUsize::new(self.fail_first),
            chunk_size: self.chunk_size,
            chunk_delay: self.chunk_delay,
            requests: AtomicUsize::new(0),
            range_requests: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/file", get(serve_file))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockServer { addr, state }
    }
}

pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockServer {
    pub fn builder(body: Vec<u8>) -> MockServerBuilder {
        MockServerBuilder {
            body,
            accept_ranges: false,
            honor_ranges: false,
            fail_first: 0,
            chunk_size: 0,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn file_url(&self) -> String {
        self.url("/file")
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    pub fn range_requests(&self) -> usize {
        self.state.range_requests.load(Ordering::SeqCst)
    }
}

fn requested_offset(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::RANGE)?
        .to_str()
        .ok()?
        .strip_prefix("bytes=")?
        .strip_suffix('-')?
        .parse()
        .ok()
}

async fn serve_file(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let fail = state
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if fail {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let total = state.body.len();
    let offset = requested_offset(&headers);
    if offset.is_some() {
        state.range_requests.fetch_add(1, Ordering::SeqCst);
    }

    let mut builder = axum::http::Response::builder();
    if state.accept_ranges {
        builder = builder.header(header::ACCEPT_RANGES, "bytes");
    }

    let start = match offset.filter(|_| state.honor_ranges) {
        Some(start) if start >= total => {
            return builder
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(header::CONTENT_RANGE, format!("bytes */{}", total))
                .body(Body::empty())
                .unwrap();
        }
        Some(start) => {
            builder = builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, total - 1, total),
                );
            start
        }
        None => {
            builder = builder.status(StatusCode::OK);
            0
        }
    };

    let slice = state.body.slice(start..);
    builder = builder.header(header::CONTENT_LENGTH, slice.len().to_string());

    let body = if state.chunk_size == 0 {
        Body::from(slice)
    } else {
        let delay = state.chunk_delay;
        let chunks: Vec<Bytes> = slice
            .chunks(state.chunk_size)
            .map(Bytes::copy_from_slice)
            .collect();
        let stream = futures::stream::iter(chunks).then(move |chunk| async move {
            tokio::time::sleep(delay).await;
            Ok::<_, Infallible>(chunk)
        });
        Body::from_stream(stream)
    };

    builder.body(body).unwrap()
}

/// Listener that accepts connections and closes them without answering
pub async fn closing_listener() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    tokio::spawn({
        let accepted = accepted.clone();
        async move {
            while let Ok((socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        }
    });
    (format!("http://{}/file", addr), accepted)
}

/// Poll `condition` every 10ms until it holds; panics after `limit`
pub async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(limit, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use paper_crawler::http::Sleeper;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Sleeper that records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Waits requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// HTTP/1.1 server that sends response headers at once and the body only
/// after a per-request delay.
///
/// Request `n` (0-indexed) waits `body_delays[n]`; the last delay repeats.
/// A request counts as in flight from the moment its head is read until
/// just before its body is written.
#[derive(Debug)]
pub struct DelayedBodyServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl DelayedBodyServer {
    /// Binds a localhost port; `None` when sockets are unavailable.
    pub async fn start(body: &'static str, body_delays: Vec<Duration>) -> Option<Self> {
        if socket_guard::should_skip_socket_bound_test() {
            return None;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        let requests = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak_in_flight = Arc::new(AtomicUsize::new(0));

        let counters = (
            Arc::clone(&requests),
            Arc::clone(&in_flight),
            Arc::clone(&peak_in_flight),
        );
        tokio::spawn(async move {
            let (requests, in_flight, peak) = counters;
            while let Ok((stream, _)) = listener.accept().await {
                let index = requests.fetch_add(1, Ordering::SeqCst);
                let delay = body_delays
                    .get(index)
                    .or_else(|| body_delays.last())
                    .copied()
                    .unwrap_or_default();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _ = serve_one(stream, body, delay, &in_flight, &peak).await;
                });
            }
        });

        Some(Self {
            addr,
            requests,
            peak_in_flight,
        })
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Connections accepted so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Most requests ever in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

async fn serve_one(
    mut stream: TcpStream,
    body: &str,
    delay: Duration,
    in_flight: &AtomicUsize,
    peak: &AtomicUsize,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            return Ok(());
        }
        head.extend_from_slice(&buf[..read]);
    }

    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    peak.fetch_max(now, Ordering::SeqCst);

    let headers = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(headers.as_bytes()).await?;
    stream.flush().await?;

    tokio::time::sleep(delay).await;
    in_flight.fetch_sub(1, Ordering::SeqCst);

    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await
}

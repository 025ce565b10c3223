//! Shared fakes for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::agent::{AgentTransport, ResponseSink, TransportResponse};
use crate::auth::{CredentialProvider, TokenRequest};
use crate::bus::OutboundMessage;
use crate::error::{RelayError, Result};

/// Serve exactly one HTTP response, returning the raw request text.
pub async fn one_shot_server(status: u16, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_string();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason(status),
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
        request
    });
    (format!("http://{}", addr), handle)
}

/// Accept one connection and never answer.
pub async fn silent_server() -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(stream);
    });
    (format!("http://{}", addr), handle)
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Status",
    }
}

/// Credential provider returning scripted results and recording requests.
pub struct FakeCredential {
    results: Mutex<VecDeque<Result<String>>>,
    pub requests: Mutex<Vec<TokenRequest>>,
    pub calls: AtomicU32,
}

impl FakeCredential {
    pub fn new(results: Vec<Result<String>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<TokenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialProvider for FakeCredential {
    fn name(&self) -> &str {
        "fake"
    }

    async fn acquire(&self, request: &TokenRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RelayError::Credential("no scripted result".into())))
    }
}

/// Agent transport returning scripted responses and recording calls.
pub struct FakeTransport {
    results: Mutex<VecDeque<Result<TransportResponse>>>,
    pub bodies: Mutex<Vec<(String, String, Value)>>,
    pub calls: AtomicU32,
}

impl FakeTransport {
    pub fn new(results: Vec<Result<TransportResponse>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            bodies: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn ok(status: u16, body: &str) -> Self {
        Self::new(vec![Ok(TransportResponse {
            status,
            body: body.to_string(),
        })])
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentTransport for FakeTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &Value,
        _timeout: Duration,
    ) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push((
            url.to_string(),
            bearer_token.to_string(),
            body.clone(),
        ));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RelayError::agent_transport("no scripted response")))
    }
}

/// Agent transport that accepts the call and never answers.
pub struct HangingTransport {
    pub calls: AtomicU32,
}

impl HangingTransport {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentTransport for HangingTransport {
    async fn post_json(
        &self,
        _url: &str,
        _bearer_token: &str,
        _body: &Value,
        _timeout: Duration,
    ) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(RelayError::agent_transport("hanging transport woke up"))
    }
}

/// Sink that records every message, optionally failing the first N sends.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<OutboundMessage>>,
    fail_first: AtomicU32,
}

impl RecordingSink {
    pub fn failing_first(n: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(n),
        }
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn send(&self, msg: OutboundMessage) -> Result<()> {
        let remaining = self.fail_first.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_first.store(remaining - 1, Ordering::SeqCst);
            return Err(RelayError::Dispatch("sink unavailable".into()));
        }
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }
}

//! In-process HTTP stub for runner integration tests
//!
//! Routes:
//! - `/status/{code}/...` answers `{code}` with a JSON echo of the request
//! - `/slow/...` sleeps for five seconds, then answers 200
//! - `/text/...` answers 200 with a non-JSON body
//! - `/truncated/{code}/...` answers `{code}` but closes after part of the
//!   announced body
//! - anything else answers 200 with the JSON echo

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use apisuite_core::document::HttpMethod;
use apisuite_core::model::{SuiteGroup, TestScenario};

pub struct Stub {
    pub base_url: String,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Stub {
    /// Highest number of requests handled at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn spawn() -> Stub {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let (a, p) = (Arc::clone(&a), Arc::clone(&p));
            thread::spawn(move || {
                let _ = handle(stream, &a, &p);
            });
        }
    });

    Stub {
        base_url: format!("http://{addr}"),
        active,
        peak,
    }
}

fn handle(stream: TcpStream, active: &AtomicUsize, peak: &AtomicUsize) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = BTreeMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
    }
    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;

    // Counted until the response is written, so a client never sees its
    // previous request still in flight.
    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
    peak.fetch_max(now, Ordering::SeqCst);

    let path = target.split('?').next().unwrap_or_default().to_string();
    thread::sleep(Duration::from_millis(10));

    let echo = serde_json::json!({
        "method": method,
        "path": path,
        "authorization": headers.get("authorization"),
        "body": String::from_utf8_lossy(&body),
    })
    .to_string();

    let (status, payload) = if let Some(rest) = path.strip_prefix("/status/") {
        let code = rest.split('/').next().and_then(|c| c.parse().ok()).unwrap_or(500u16);
        (code, echo)
    } else if path.starts_with("/slow") {
        thread::sleep(Duration::from_secs(5));
        (200, echo)
    } else if path.starts_with("/text") {
        (200, "definitely not json".to_string())
    } else {
        (200, echo)
    };

    active.fetch_sub(1, Ordering::SeqCst);

    let mut stream = stream;
    if let Some(rest) = path.strip_prefix("/truncated/") {
        let code: u16 = rest.split('/').next().and_then(|c| c.parse().ok()).unwrap_or(500);
        write!(
            stream,
            "HTTP/1.1 {code} Stub\r\nContent-Type: application/json\r\nX-Trace: stub\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{{\"a\""
        )?;
        stream.flush()?;
        return stream.shutdown(std::net::Shutdown::Both);
    }
    write!(
        stream,
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    )?;
    stream.flush()
}

/// Scenario with the given URL and expected status; no schema or header hints.
pub fn scenario(document_id: &str, name: &str, url: &str, expected: u16) -> TestScenario {
    TestScenario {
        id: format!("scn-{name}"),
        document_id: document_id.to_string(),
        group: SuiteGroup::System,
        name: name.to_string(),
        description: String::new(),
        method: HttpMethod::Get,
        url: url.to_string(),
        body: None,
        expected_status: Some(expected),
        expected_schema: None,
        expected_headers: None,
        steps: String::new(),
        requires_auth: true,
    }
}

//! Minimal in-process HTTP server for client tests.
//!
//! Connections are served one at a time; every reply closes its connection.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct State {
    routes: HashMap<String, (u16, Vec<u8>)>,
    requests: Vec<CapturedRequest>,
}

pub struct MockServer {
    pub addr: String,
    state: Arc<Mutex<State>>,
}

fn read_request(stream: &TcpStream) -> Option<CapturedRequest> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_owned();
    let path = parts.next()?.to_owned();

    let mut headers = HashMap::new();
    loop {
        line.clear();
        reader.read_line(&mut line).ok()?;
        let Some((name, value)) = line.trim_end().split_once(':') else {
            break;
        };
        headers.insert(name.to_lowercase(), value.trim().to_owned());
    }

    let len = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).ok()?;
    Some(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}

impl MockServer {
    /// Unknown paths answer 404.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(Mutex::new(State::default()));

        let shared = Arc::clone(&state);
        std::thread::spawn(move || {
            for mut stream in listener.incoming().map_while(Result::ok) {
                let Some(request) = read_request(&stream) else {
                    continue;
                };
                let (code, payload) = {
                    let mut state = shared.lock().unwrap();
                    let reply = state
                        .routes
                        .get(&request.path)
                        .cloned()
                        .unwrap_or((404, Vec::new()));
                    state.requests.push(request);
                    reply
                };
                let head = format!(
                    "HTTP/1.1 {code} Mock\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    payload.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&payload);
            }
        });

        MockServer { addr, state }
    }

    pub fn respond(&self, path: &str, code: u16, body: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(path.to_owned(), (code, body.to_vec()));
    }

    pub fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

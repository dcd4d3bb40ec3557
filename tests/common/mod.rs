//! Minimal single-threaded HTTP stub standing in for a control plane.
//!
//! Each route carries a queue of responses: successive hits consume the
//! queue and the last entry repeats, which is enough to script a resource
//! moving through its statuses. Unrouted requests get a 404 so the client
//! under test sees them as missing resources.

use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

pub struct Route {
    pub method: &'static str,
    pub path: String,
    pub responses: Vec<(u16, Value)>,
}

pub fn route(method: &'static str, path: &str, responses: Vec<(u16, Value)>) -> Route {
    Route {
        method,
        path: path.to_string(),
        responses,
    }
}

type RouteTable = Arc<Mutex<HashMap<String, Vec<(u16, Value)>>>>;

pub struct StubPlane {
    endpoint: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl StubPlane {
    pub fn start(routes: Vec<Route>) -> StubPlane {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub listener");
        let endpoint = format!("http://{}", listener.local_addr().expect("stub address"));
        let table: RouteTable = Arc::new(Mutex::new(
            routes
                .into_iter()
                .map(|r| (format!("{} {}", r.method, r.path), r.responses))
                .collect(),
        ));
        let hits = Arc::new(Mutex::new(Vec::new()));
        {
            let table = Arc::clone(&table);
            let hits = Arc::clone(&hits);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    match stream {
                        Ok(stream) => handle(stream, &table, &hits),
                        Err(_) => break,
                    }
                }
            });
        }
        StubPlane { endpoint, hits }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn hit_count(&self, key: &str) -> usize {
        self.hits
            .lock()
            .expect("hits lock")
            .iter()
            .filter(|hit| hit.as_str() == key)
            .count()
    }
}

fn handle(mut stream: TcpStream, table: &RouteTable, hits: &Arc<Mutex<Vec<String>>>) {
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(clone) => clone,
        Err(_) => return,
    });

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let lowered = line.to_ascii_lowercase();
        if let Some(value) = lowered.strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        let _ = reader.read_exact(&mut body);
    }

    let key = format!("{method} {path}");
    hits.lock().expect("hits lock").push(key.clone());

    let (status, body) = next_response(table, &key);
    let body_text = body.to_string();
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body_text}",
        body_text.len()
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn next_response(table: &RouteTable, key: &str) -> (u16, Value) {
    let mut table = table.lock().expect("routes lock");
    match table.get_mut(key) {
        Some(queue) if !queue.is_empty() => {
            if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            }
        }
        _ => (
            404,
            serde_json::json!({"message": format!("no route for {key}")}),
        ),
    }
}

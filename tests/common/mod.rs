//! Shared test infrastructure for odbgraph integration tests.
//!
//! Provides a scripted transport and a TestEnv wrapping a connection to it.

#![allow(dead_code)]

use eyre::Result;
use odbgraph::{
    Connection, ConnectionConfig, DriverError, EdgeRef, HttpReply, HttpRequest, Method, Transport, VertexRef,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport answering from a queue of replies and recording every request.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<HttpReply>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn push(&self, reply: HttpReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpReply> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| eyre::eyre!(DriverError::Transport("connection refused".to_string())))
    }
}

/// SQL text carried by a command request.
pub fn decoded_sql(request: &HttpRequest) -> Option<String> {
    let encoded = request.url.split("/sql/").nth(1)?;
    url::form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(sql, _)| sql.into_owned())
}

/// Driver error carried by a report.
pub fn driver_err(report: eyre::Report) -> DriverError {
    report
        .downcast::<DriverError>()
        .expect("expected a DriverError")
}

/// A vertex record as the server sends it.
pub fn vertex_record(rid: &str, class: &str, version: i64, props: Value) -> Value {
    let mut record = json!({"@type": "d", "@rid": rid, "@class": class, "@version": version});
    if let (Some(target), Some(extra)) = (record.as_object_mut(), props.as_object()) {
        for (k, v) in extra {
            target.insert(k.clone(), v.clone());
        }
    }
    record
}

/// An edge record as the server sends it.
pub fn edge_record(rid: &str, class: &str, out: &str, inn: &str) -> Value {
    json!({"@type": "d", "@rid": rid, "@class": class, "@version": 1, "out": out, "in": inn})
}

/// Test environment around a connection with a scripted transport.
pub struct TestEnv {
    pub transport: Arc<MockTransport>,
    pub conn: Connection,
}

impl TestEnv {
    /// Connection over a fresh mock, not yet connected.
    pub fn new() -> Self {
        Self::with_transport(MockTransport::new(), Some(Duration::from_secs(5)))
    }

    pub fn with_transport(transport: MockTransport, timeout: Option<Duration>) -> Self {
        let transport = Arc::new(transport);
        let config = ConnectionConfig::new("localhost", "GratefulDeadConcerts", "admin", "admin").with_timeout(timeout);
        let conn = Connection::with_transport(config, transport.clone()).expect("Failed to create connection");
        Self { transport, conn }
    }

    /// Connected environment with no commands issued yet.
    pub fn connected() -> Self {
        let mut env = Self::new();
        env.transport
            .push(HttpReply::new(204, "").with_cookie("OSESSIONID=OS1234; Path=/; HttpOnly"));
        env.conn.connect().expect("Failed to connect");
        env
    }

    /// Queue a `{"result": [...]}` reply.
    pub fn push_result(&self, records: Value) {
        self.transport
            .push(HttpReply::new(200, json!({ "result": records }).to_string()));
    }

    /// Queue an `{"errors": [...]}` reply.
    pub fn push_error(&self, reason: &str, content: &str) {
        self.transport.push(HttpReply::new(
            500,
            json!({"errors": [{"code": 500, "reason": reason, "content": content}]}).to_string(),
        ));
    }

    /// SQL of every command sent so far.
    pub fn commands(&self) -> Vec<String> {
        self.transport
            .requests()
            .iter()
            .filter(|r| r.method == Method::Post)
            .filter_map(decoded_sql)
            .collect()
    }

    pub fn command_count(&self) -> usize {
        self.commands().len()
    }

    /// Load one vertex into the cache through a select.
    pub fn load_vertex(&mut self, record: Value) -> VertexRef {
        let rid = record["@rid"].as_str().expect("record without @rid").to_string();
        self.push_result(json!([record]));
        self.conn
            .select_vertexes(&rid, None, "")
            .expect("Failed to select vertex")
            .remove(0)
    }

    /// Load edges into the cache through a select.
    pub fn load_edges(&mut self, records: Value) -> Vec<EdgeRef> {
        self.push_result(records);
        self.conn.select_edges("E", None, "").expect("Failed to select edges")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

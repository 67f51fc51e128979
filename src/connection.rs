//! Session with the database: authentication, commands and write-back.

use crate::cache::GraphCache;
use crate::config::ConnectionConfig;
use crate::document::Document;
use crate::error::{DriverError, driver_error};
use crate::protocol::{self, Record};
use crate::transport::{HttpReply, HttpRequest, HttpTransport, Method, Transport};
use crate::types::{Direction, Edge, EdgeRef, Vertex, VertexRef};
use eyre::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// A session with one database.
///
/// Owns the session cookie, a bounded-time executor for HTTP exchanges, and
/// the cache holding the canonical vertex and edge for every RID seen.
/// Handles are `Rc`-based, so a connection stays on the thread that made it.
pub struct Connection {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    runtime: Option<Runtime>,
    session: Option<String>,
    pub(crate) cache: GraphCache,
}

impl Connection {
    /// Create a connection that talks HTTP. Does not contact the server.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.timeout()));
        Self::with_transport(config, transport)
    }

    /// Create a connection over a custom transport.
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .context("Failed to create runtime")?;

        Ok(Self {
            config,
            transport,
            runtime: Some(runtime),
            session: None,
            cache: GraphCache::new(),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// True once `connect` has obtained a session cookie.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    /// Cached vertex by RID.
    pub fn vertex(&self, rid: &str) -> Option<VertexRef> {
        self.cache.vertex(rid)
    }

    /// Cached edge by RID.
    pub fn edge(&self, rid: &str) -> Option<EdgeRef> {
        self.cache.edge(rid)
    }

    /// Run one exchange on a worker, giving up after the configured timeout.
    ///
    /// A timeout stops the wait, not the worker.
    fn exchange(&self, request: HttpRequest) -> Result<HttpReply> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| eyre::eyre!(DriverError::Transport("connection is shut down".to_string())))?;
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.timeout();

        let exchange = async move {
            let task = tokio::task::spawn_blocking(move || transport.send(request));
            let joined = match timeout {
                Some(limit) => tokio::time::timeout(limit, task)
                    .await
                    .map_err(|_| eyre::eyre!(DriverError::Timeout(limit)))?,
                None => task.await,
            };
            joined.map_err(|e| eyre::eyre!(DriverError::Transport(format!("request worker failed: {}", e))))?
        };

        // block_on panics on a thread that is already driving a runtime
        if tokio::runtime::Handle::try_current().is_err() {
            return runtime.block_on(exchange);
        }
        std::thread::scope(|scope| {
            scope
                .spawn(|| runtime.block_on(exchange))
                .join()
                .map_err(|_| eyre::eyre!(DriverError::Transport("request thread panicked".to_string())))?
        })
    }

    fn authorization(&self) -> String {
        protocol::basic_auth(&self.config.username, &self.config.password)
    }

    /// Authenticate and obtain a session cookie.
    pub fn connect(&mut self) -> Result<()> {
        let url = protocol::connect_url(&self.config);
        let request = HttpRequest::new(Method::Get, url.as_str()).header("Authorization", self.authorization());
        self.session = None;
        let reply = self.exchange(request)?;

        if reply.status != 204 {
            return Err(eyre::eyre!(DriverError::Credential { status: reply.status }));
        }
        let cookie = protocol::session_cookie(&reply.set_cookies)?;
        self.session = Some(cookie);

        log::info!("Connected to {} as {}", url, self.config.username);
        Ok(())
    }

    /// Execute a SQL command and return the records of its result.
    pub fn command(&self, text: &str) -> Result<Vec<Record>> {
        log::debug!("Executing command: {}", text);

        let mut request = HttpRequest::new(Method::Post, protocol::command_url(&self.config, text))
            .header("Content-Length", "0")
            .header("Authorization", self.authorization());
        if let Some(cookie) = &self.session {
            request = request.header("Cookie", cookie.as_str());
        }

        let reply = self.exchange(request)?;
        protocol::parse_command_response(text, &reply.body)
    }

    /// Fetch vertexes and register them in the cache.
    ///
    /// `target` is a class, a RID or a RID list; `params` is appended verbatim
    /// (e.g. a `WHERE` clause). Records without identity fields are skipped; a
    /// malformed relation field fails the call.
    pub fn select_vertexes(&mut self, target: &str, limit: Option<usize>, params: &str) -> Result<Vec<VertexRef>> {
        let records = self.command(&protocol::select_command(target, params, limit))?;

        let mut vertexes = Vec::with_capacity(records.len());
        for record in records {
            match Vertex::from_record(record) {
                Ok(vertex) => vertexes.push(self.cache.register_vertex(vertex)),
                Err(e) if matches!(driver_error(&e), Some(DriverError::Decode { .. })) => return Err(e),
                Err(e) => log::warn!("Skipping vertex record from {}: {}", target, e),
            }
        }
        Ok(vertexes)
    }

    /// Fetch edges and register them in the cache. Any malformed record fails the call.
    pub fn select_edges(&mut self, target: &str, limit: Option<usize>, params: &str) -> Result<Vec<EdgeRef>> {
        let records = self.command(&protocol::select_command(target, params, limit))?;

        let mut edges = Vec::with_capacity(records.len());
        for record in records {
            let raw = Value::Object(record.clone()).to_string();
            let edge = Edge::from_record(record)
                .map_err(|e| eyre::eyre!(DriverError::decode(format!("edge cannot be read properly: {}", e), raw)))?;
            edges.push(self.cache.register_edge(edge));
        }
        Ok(edges)
    }

    fn insert_entry(&self, command: &str) -> Result<String> {
        let records = self.command(command)?;
        records
            .first()
            .and_then(|r| r.get("@rid"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| {
                eyre::eyre!(DriverError::UnexpectedResponse(format!(
                    "no @rid in response to {}",
                    command
                )))
            })
    }

    /// Create the vertex on the server, assign its RID and register it.
    pub fn insert_vertex(&mut self, vertex: &VertexRef) -> Result<()> {
        let command = {
            let v = vertex.borrow();
            require_class(&v.doc)?;
            protocol::create_vertex_command(&v.class, v.properties())
        };
        let rid = self.insert_entry(&command)?;

        {
            let mut v = vertex.borrow_mut();
            v.rid = rid;
            v.mark_synced(1);
        }
        self.cache.adopt_vertex(vertex);
        Ok(())
    }

    /// Create the edge on the server, assign its RID and register it.
    ///
    /// Cached endpoint vertexes get the new edge in their adjacency index;
    /// vertexes fetched later pick it up from the server.
    pub fn insert_edge(&mut self, edge: &EdgeRef) -> Result<()> {
        let (command, class, from, to) = {
            let e = edge.borrow();
            require_class(&e.doc)?;
            if e.from_rid().is_empty() || e.to_rid().is_empty() {
                return Err(eyre::eyre!(DriverError::MissingRid(
                    "both edge endpoints must be persisted before the edge".to_string()
                )));
            }
            (
                protocol::create_edge_command(&e.class, e.from_rid(), e.to_rid(), e.properties()),
                e.class.clone(),
                e.from_rid().to_string(),
                e.to_rid().to_string(),
            )
        };
        let rid = self.insert_entry(&command)?;

        {
            let mut e = edge.borrow_mut();
            e.rid = rid.clone();
            e.mark_synced(1);
        }
        self.cache.adopt_edge(edge);

        for (vertex_rid, dirn) in [(from, Direction::Out), (to, Direction::In)] {
            if let Some(vertex) = self.cache.vertex(&vertex_rid) {
                match vertex.try_borrow_mut() {
                    Ok(mut v) => v.add_stub(dirn, &class, &rid),
                    Err(_) => log::warn!("Vertex {} is borrowed, edge {} not indexed", vertex_rid, rid),
                }
            }
        }
        Ok(())
    }

    /// Send the vertex's changed properties.
    pub fn update_vertex(&mut self, vertex: &VertexRef) -> Result<()> {
        let command = update_for(&vertex.borrow().doc)?;
        if let Some(command) = command {
            let version = self.run_update(&command)?;
            vertex.borrow_mut().mark_synced(version);
        }
        Ok(())
    }

    /// Send the edge's changed properties.
    pub fn update_edge(&mut self, edge: &EdgeRef) -> Result<()> {
        let command = update_for(&edge.borrow().doc)?;
        if let Some(command) = command {
            let version = self.run_update(&command)?;
            edge.borrow_mut().mark_synced(version);
        }
        Ok(())
    }

    fn run_update(&self, command: &str) -> Result<i64> {
        let records = self.command(command)?;
        records
            .first()
            .and_then(|r| r.get("value").or_else(|| r.get("@version")))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                eyre::eyre!(DriverError::UnexpectedResponse(format!(
                    "no version in response to {}",
                    command
                )))
            })
    }

    /// Delete vertexes by RID and forget them, along with their cached edges.
    pub fn delete_vertexes(&mut self, rids: &[&str]) -> Result<()> {
        require_rids(rids)?;
        self.command(&protocol::delete_command("VERTEX", rids))?;

        for rid in rids {
            self.cache.evict_vertex(rid);
            for edge_rid in self.cache.edges_touching(rid) {
                self.forget_edge(&edge_rid);
            }
        }
        Ok(())
    }

    /// Delete edges by RID and drop them from cached adjacency indexes.
    pub fn delete_edges(&mut self, rids: &[&str]) -> Result<()> {
        require_rids(rids)?;
        self.command(&protocol::delete_command("EDGE", rids))?;

        for rid in rids {
            self.forget_edge(rid);
        }
        Ok(())
    }

    fn forget_edge(&mut self, rid: &str) {
        let Some(edge) = self.cache.evict_edge(rid) else {
            return;
        };
        let endpoints: Vec<String> = {
            let e = edge.borrow();
            vec![e.from_rid().to_string(), e.to_rid().to_string()]
        };
        for vertex_rid in endpoints {
            if let Some(vertex) = self.cache.vertex(&vertex_rid)
                && let Ok(mut v) = vertex.try_borrow_mut()
            {
                v.drop_stub(rid);
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Workers stuck on a hung server must not hold up the drop.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn require_class(doc: &Document) -> Result<()> {
    if doc.class.is_empty() {
        return Err(eyre::eyre!(DriverError::Argument("entity has no class".to_string())));
    }
    Ok(())
}

fn require_rids(rids: &[&str]) -> Result<()> {
    if rids.is_empty() || rids.iter().any(|r| r.is_empty()) {
        return Err(eyre::eyre!(DriverError::Argument("expected one or more RIDs".to_string())));
    }
    Ok(())
}

/// `None` when there is nothing to send.
fn update_for(doc: &Document) -> Result<Option<String>> {
    if !doc.is_persisted() {
        return Err(eyre::eyre!(DriverError::MissingRid(
            "entity has no associated RID, did it come from the database?".to_string()
        )));
    }
    if !doc.is_dirty() {
        return Ok(None);
    }
    let (set, remove) = doc.pending_changes();
    Ok(Some(protocol::update_command(&doc.rid, &set, &remove)))
}

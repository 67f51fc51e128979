//! odbgraph: an OrientDB HTTP client with a local graph cache.
//!
//! A [`Connection`] authenticates against the server's HTTP endpoint, runs
//! SQL commands, and keeps one canonical [`Vertex`] / [`Edge`] per RID.
//! Relationships are resolved from the cached adjacency index, falling back
//! to one batched fetch for edges that are not cached yet, and updates send
//! only the properties changed since the last sync.
//!
//! # Example
//!
//! ```no_run
//! use odbgraph::{Connection, ConnectionConfig, Direction, Vertex};
//!
//! let config = ConnectionConfig::new("localhost", "GratefulDeadConcerts", "admin", "admin");
//! let mut conn = Connection::new(config).unwrap();
//! conn.connect().unwrap();
//!
//! // Create a vertex
//! let sue = Vertex::new("Gopher").into_ref();
//! sue.borrow_mut().set_props([("name", "Sue")]).unwrap();
//! conn.insert_vertex(&sue).unwrap();
//!
//! // Fetch and walk relationships
//! let gophers = conn.select_vertexes("Gopher", Some(10), "").unwrap();
//! let owes = conn.vertex_edges(&gophers[0], Direction::Out, None, Some("owes")).unwrap();
//!
//! // Partial write-back
//! sue.borrow_mut().set_prop("name", "Mary");
//! conn.update_vertex(&sue).unwrap();
//! # let _ = owes;
//! ```

mod cache;
mod document;
mod relations;
mod types;

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export public API
pub use cache::GraphCache;
pub use config::ConnectionConfig;
pub use connection::Connection;
pub use document::Document;
pub use error::{DriverError, driver_error};
pub use protocol::Record;
pub use transport::{HttpReply, HttpRequest, HttpTransport, Method, Transport};
pub use types::{ClassIndex, Direction, Edge, EdgeRef, Vertex, VertexRef, create_edge};

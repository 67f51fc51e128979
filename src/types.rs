//! Vertex and edge types.

use crate::document::Document;
use crate::error::DriverError;
use crate::protocol::Record;
use eyre::Result;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Shared handle to a cached vertex.
pub type VertexRef = Rc<RefCell<Vertex>>;

/// Shared handle to a cached edge.
pub type EdgeRef = Rc<RefCell<Edge>>;

/// Direction of an edge relative to a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges pointing at the vertex
    In,
    /// Edges leaving the vertex
    Out,
    /// `In` followed by `Out`
    Both,
    /// Matches nothing
    None,
}

impl Direction {
    /// The other end of an edge seen from this direction.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
            other => *other,
        }
    }

    /// Field name used by the server for this end of an edge.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Both => "both",
            Direction::None => "none",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            "both" => Ok(Direction::Both),
            "none" => Ok(Direction::None),
            other => Err(DriverError::Argument(format!("unknown direction '{}'", other))),
        }
    }
}

/// Edge class name to edge RIDs.
pub type ClassIndex = HashMap<String, Vec<String>>;

/// A vertex: a document plus its adjacency index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vertex {
    pub doc: Document,
    inbound: ClassIndex,
    outbound: ClassIndex,
}

impl Vertex {
    /// Create a local vertex of the given class.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            doc: Document::new(class),
            ..Default::default()
        }
    }

    /// Decode a server record.
    ///
    /// `out_<class>` / `in_<class>` fields become adjacency stubs and are
    /// removed from the property bag.
    pub fn from_record(record: Record) -> Result<Self> {
        let mut vertex = Self {
            doc: Document::from_record(record)?,
            ..Default::default()
        };

        let relation_keys: Vec<(String, Direction, String)> = vertex
            .doc
            .properties()
            .keys()
            .filter_map(|key| {
                if let Some(class) = key.strip_prefix("out_").filter(|c| !c.is_empty()) {
                    Some((key.clone(), Direction::Out, class.to_string()))
                } else {
                    key.strip_prefix("in_")
                        .filter(|c| !c.is_empty())
                        .map(|class| (key.clone(), Direction::In, class.to_string()))
                }
            })
            .collect();

        for (key, dirn, class) in relation_keys {
            let Some(raw) = vertex.doc.properties_mut().remove(&key) else {
                continue;
            };
            let rids = parse_stubs(&raw).ok_or_else(|| {
                eyre::eyre!(DriverError::decode(
                    format!("cannot process {} edges of class {} on {}", dirn, class, vertex.doc.rid),
                    raw.to_string()
                ))
            })?;
            if let Some(index) = vertex.index_mut(dirn) {
                index.insert(class, rids);
            }
        }

        Ok(vertex)
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> VertexRef {
        Rc::new(RefCell::new(self))
    }

    /// Adjacency index for `In` or `Out`.
    pub fn index(&self, dirn: Direction) -> Option<&ClassIndex> {
        match dirn {
            Direction::In => Some(&self.inbound),
            Direction::Out => Some(&self.outbound),
            _ => None,
        }
    }

    pub(crate) fn index_mut(&mut self, dirn: Direction) -> Option<&mut ClassIndex> {
        match dirn {
            Direction::In => Some(&mut self.inbound),
            Direction::Out => Some(&mut self.outbound),
            _ => None,
        }
    }

    /// Edge RIDs in one direction, optionally limited to one class.
    ///
    /// Without a class every bucket is listed, in no particular class order.
    pub fn stubs(&self, dirn: Direction, class: Option<&str>) -> Vec<String> {
        let Some(index) = self.index(dirn) else {
            return Vec::new();
        };
        match class {
            Some(class) => index.get(class).cloned().unwrap_or_default(),
            None => index.values().flatten().cloned().collect(),
        }
    }

    /// Record a new edge stub.
    pub(crate) fn add_stub(&mut self, dirn: Direction, class: &str, edge_rid: &str) {
        if let Some(index) = self.index_mut(dirn) {
            index.entry(class.to_string()).or_default().push(edge_rid.to_string());
        }
    }

    /// Forget an edge stub wherever it appears.
    pub(crate) fn drop_stub(&mut self, edge_rid: &str) {
        for index in [&mut self.inbound, &mut self.outbound] {
            for rids in index.values_mut() {
                rids.retain(|r| r != edge_rid);
            }
        }
    }
}

impl Deref for Vertex {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.doc
    }
}

impl DerefMut for Vertex {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.doc
    }
}

fn parse_stubs(raw: &Value) -> Option<Vec<String>> {
    raw.as_array()?
        .iter()
        .map(|rid| rid.as_str().map(String::from))
        .collect()
}

/// An edge: a document plus the RIDs of both endpoints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Edge {
    pub doc: Document,
    out_rid: String,
    in_rid: String,
}

impl Edge {
    /// Create a local edge of class `class` from `from` to `to`.
    pub fn new(from_rid: impl Into<String>, class: impl Into<String>, to_rid: impl Into<String>) -> Self {
        Self {
            doc: Document::new(class),
            out_rid: from_rid.into(),
            in_rid: to_rid.into(),
        }
    }

    /// Decode a server record; `out` and `in` must be RID strings.
    pub fn from_record(record: Record) -> Result<Self> {
        let mut doc = Document::from_record(record)?;
        let out_rid = doc.get_str("out")?.to_string();
        let in_rid = doc.get_str("in")?.to_string();
        doc.properties_mut().remove("out");
        doc.properties_mut().remove("in");
        Ok(Self { doc, out_rid, in_rid })
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> EdgeRef {
        Rc::new(RefCell::new(self))
    }

    /// RID of the endpoint in the given direction (`Out` is the source).
    pub fn endpoint(&self, dirn: Direction) -> Option<&str> {
        match dirn {
            Direction::Out => Some(&self.out_rid),
            Direction::In => Some(&self.in_rid),
            _ => None,
        }
    }

    pub fn from_rid(&self) -> &str {
        &self.out_rid
    }

    pub fn to_rid(&self) -> &str {
        &self.in_rid
    }
}

impl Deref for Edge {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.doc
    }
}

impl DerefMut for Edge {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.doc
    }
}

/// Build a local edge between two vertexes.
///
/// Inserting it fails if either vertex has not been persisted.
pub fn create_edge(from: &Vertex, class: &str, to: &Vertex) -> Edge {
    Edge::new(from.rid.clone(), class, to.rid.clone())
}

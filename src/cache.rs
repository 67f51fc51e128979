//! RID-indexed mirror of vertexes and edges fetched from the server.

use crate::types::{Edge, EdgeRef, Vertex, VertexRef};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Canonical handle per RID.
///
/// Registering a RID that is already cached overwrites the cached object in
/// place, so handles held by callers see the fresh state. Property bags are
/// never merged: the latest fetch wins.
#[derive(Debug, Default)]
pub struct GraphCache {
    vertexes: HashMap<String, VertexRef>,
    edges: HashMap<String, EdgeRef>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(&self, rid: &str) -> Option<VertexRef> {
        self.vertexes.get(rid).cloned()
    }

    pub fn edge(&self, rid: &str) -> Option<EdgeRef> {
        self.edges.get(rid).cloned()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertexes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Store a vertex under its RID and return the canonical handle.
    pub fn register_vertex(&mut self, vertex: Vertex) -> VertexRef {
        let rid = vertex.rid.clone();
        register(&mut self.vertexes, rid, vertex)
    }

    /// Store an edge under its RID and return the canonical handle.
    pub fn register_edge(&mut self, edge: Edge) -> EdgeRef {
        let rid = edge.rid.clone();
        register(&mut self.edges, rid, edge)
    }

    /// Make an existing handle canonical for its RID.
    pub fn adopt_vertex(&mut self, vertex: &VertexRef) {
        let rid = vertex.borrow().rid.clone();
        self.vertexes.insert(rid, Rc::clone(vertex));
    }

    /// Make an existing handle canonical for its RID.
    pub fn adopt_edge(&mut self, edge: &EdgeRef) {
        let rid = edge.borrow().rid.clone();
        self.edges.insert(rid, Rc::clone(edge));
    }

    pub fn evict_vertex(&mut self, rid: &str) -> Option<VertexRef> {
        self.vertexes.remove(rid)
    }

    pub fn evict_edge(&mut self, rid: &str) -> Option<EdgeRef> {
        self.edges.remove(rid)
    }

    /// RIDs of cached edges with `vertex_rid` at either end.
    pub fn edges_touching(&self, vertex_rid: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|(_, edge)| {
                let e = edge.borrow();
                e.from_rid() == vertex_rid || e.to_rid() == vertex_rid
            })
            .map(|(rid, _)| rid.clone())
            .collect()
    }
}

fn register<T>(map: &mut HashMap<String, Rc<RefCell<T>>>, rid: String, value: T) -> Rc<RefCell<T>> {
    if let Some(existing) = map.get(&rid) {
        match existing.try_borrow_mut() {
            Ok(mut slot) => {
                *slot = value;
                drop(slot);
                return Rc::clone(existing);
            }
            Err(_) => {
                log::warn!("Cached record {} is borrowed, replacing its handle", rid);
            }
        }
    }
    let handle = Rc::new(RefCell::new(value));
    map.insert(rid, Rc::clone(&handle));
    handle
}

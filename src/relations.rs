//! Relationship resolution: cached adjacency first, one batched fetch for the rest.

use crate::connection::Connection;
use crate::error::DriverError;
use crate::protocol;
use crate::types::{Direction, EdgeRef, VertexRef};
use eyre::Result;

impl Connection {
    /// Edges of `vertex` in direction `dirn`.
    ///
    /// `other` keeps only edges whose far endpoint has that RID; `class` keeps
    /// one edge class, otherwise every class bucket is read (class order is
    /// unspecified). Stubs already cached are answered locally; all remaining
    /// RIDs are fetched with a single `SELECT` and cached.
    ///
    /// `Both` is `In` followed by `Out`; `None` matches nothing.
    pub fn vertex_edges(
        &mut self,
        vertex: &VertexRef,
        dirn: Direction,
        other: Option<&str>,
        class: Option<&str>,
    ) -> Result<Vec<EdgeRef>> {
        match dirn {
            Direction::None => return Ok(Vec::new()),
            Direction::Both => {
                let mut edges = self.vertex_edges(vertex, Direction::In, other, class)?;
                edges.extend(self.vertex_edges(vertex, Direction::Out, other, class)?);
                return Ok(edges);
            }
            Direction::In | Direction::Out => {}
        }

        let stubs = vertex.borrow().stubs(dirn, class);
        let far = dirn.opposite();

        let mut edges = Vec::new();
        let mut missing = Vec::new();
        for rid in stubs {
            match self.cache.edge(&rid) {
                Some(edge) => {
                    let keep = other.is_none_or(|o| edge.borrow().endpoint(far) == Some(o));
                    if keep {
                        edges.push(edge);
                    }
                }
                None => missing.push(rid),
            }
        }

        if !missing.is_empty() {
            let condition = other
                .map(|o| format!("WHERE {} = {}", far.as_str(), o))
                .unwrap_or_default();
            log::debug!("Fetching {} uncached {} edges", missing.len(), dirn);
            let fetched = self.select_edges(&protocol::rid_list(&missing), None, &condition)?;
            edges.extend(fetched);
        }

        Ok(edges)
    }

    /// Source vertex of an edge, fetched if not cached.
    pub fn edge_from(&mut self, edge: &EdgeRef) -> Result<VertexRef> {
        self.edge_endpoint(edge, Direction::Out)
    }

    /// Target vertex of an edge, fetched if not cached.
    pub fn edge_to(&mut self, edge: &EdgeRef) -> Result<VertexRef> {
        self.edge_endpoint(edge, Direction::In)
    }

    fn edge_endpoint(&mut self, edge: &EdgeRef, dirn: Direction) -> Result<VertexRef> {
        let rid = edge.borrow().endpoint(dirn).unwrap_or_default().to_string();
        if rid.is_empty() {
            return Err(eyre::eyre!(DriverError::MissingRid(format!("edge has no {} endpoint", dirn))));
        }
        if let Some(vertex) = self.cache.vertex(&rid) {
            return Ok(vertex);
        }

        self.select_vertexes(&rid, None, "")?
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!(DriverError::UnexpectedResponse(format!("vertex {} not found", rid))))
    }
}

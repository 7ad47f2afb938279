use serde::Serialize;

use super::{QueryBuilder, QueryParts};
use crate::protocol::Crud;

/// Query request, posted on the `query` port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub a: Crud,
    #[serde(flatten)]
    parts: QueryParts,
}

impl QueryRequest {
    /// Select from `mtabl`, optionally aliased, through connection `conn`
    pub fn new(conn: Option<&str>, mtabl: &str, malias: Option<&str>) -> Self {
        Self {
            a: Crud::Read,
            parts: QueryParts::new(conn, mtabl, malias),
        }
    }
}

impl QueryBuilder for QueryRequest {
    fn parts(&self) -> &QueryParts {
        &self.parts
    }

    fn parts_mut(&mut self) -> &mut QueryParts {
        &mut self.parts
    }
}

//! Pager state
//!
//! One [`PagingState`] per pager id, created on first bind and updated from
//! responses only. Responses are applied in arrival order without sequence
//! checks, so the last one to arrive wins.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{ClientError, Result};

/// State of one pager
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagingState {
    /// Query form whose fields become where conditions
    pub query_id: Option<String>,
    pub total: i64,
    /// Zero based page index
    pub page: i64,
    pub size: i64,
}

impl PagingState {
    pub fn new(query_id: Option<String>, size: i64) -> Self {
        Self {
            query_id,
            total: 0,
            page: 0,
            size,
        }
    }
}

/// Pagers keyed by id
#[derive(Debug, Default)]
pub struct PagerRegistry {
    pagers: HashMap<String, PagingState>,
}

impl PagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a pager, keeping the state of one bound before
    pub fn bind(&mut self, pager_id: &str, query_id: Option<String>, size: i64) -> &PagingState {
        self.pagers
            .entry(pager_id.to_string())
            .or_insert_with(|| {
                tracing::debug!("Pager {} bound, page size {}", pager_id, size);
                PagingState::new(query_id, size)
            })
    }

    pub fn get(&self, pager_id: &str) -> Option<&PagingState> {
        self.pagers.get(pager_id)
    }

    /// Record the page a response was for and the total it reported
    pub fn apply_response(
        &mut self,
        pager_id: &str,
        page: i64,
        size: i64,
        total: i64,
    ) -> Result<PagingState> {
        let state = self
            .pagers
            .get_mut(pager_id)
            .ok_or_else(|| ClientError::PagerNotBound(pager_id.to_string()))?;
        state.page = page;
        state.size = size;
        state.total = total;
        Ok(state.clone())
    }

    pub fn len(&self) -> usize {
        self.pagers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pagers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_bind_creates_state() {
        let mut reg = PagerRegistry::new();
        let st = reg.bind("irpager", Some("irquery".to_string()), 20).clone();
        assert_eq!(st, PagingState::new(Some("irquery".to_string()), 20));

        reg.apply_response("irpager", 1, 20, 45).unwrap();
        // rebinding keeps the page
        assert_eq!(reg.bind("irpager", None, 50).page, 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_pagers_independent() {
        let mut reg = PagerRegistry::new();
        reg.bind("p1", None, 10);
        reg.bind("p2", None, 20);

        reg.apply_response("p1", 3, 10, 100).unwrap();
        assert_eq!(reg.get("p1").unwrap().page, 3);
        assert_eq!(reg.get("p2").unwrap(), &PagingState::new(None, 20));
    }

    #[test]
    fn test_last_response_wins() {
        let mut reg = PagerRegistry::new();
        reg.bind("p", None, 20);

        // page 2 requested after page 1, but page 1's response arrives last
        reg.apply_response("p", 2, 20, 45).unwrap();
        reg.apply_response("p", 1, 20, 44).unwrap();
        let st = reg.get("p").unwrap();
        assert_eq!((st.page, st.total), (1, 44));
    }

    #[test]
    fn test_unbound_pager() {
        let mut reg = PagerRegistry::new();
        assert!(matches!(
            reg.apply_response("nope", 0, 20, 0),
            Err(ClientError::PagerNotBound(_))
        ));
    }
}

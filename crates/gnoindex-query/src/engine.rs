//! Lookup and search over the transaction index.

use std::str::FromStr;
use std::sync::Arc;

use gnoindex_core::{Query, QueryError, TxHash, TxRecord, TxStore};
use serde::{Deserialize, Serialize};

use crate::pagination::{skip_count, validate_page, validate_per_page};

/// Result ordering by `(height, index)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

impl FromStr for OrderBy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(QueryError::InvalidOrderBy(other.to_string())),
        }
    }
}

/// Parameters of a filtered search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// 1-based; absent means the first page.
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub per_page: Option<i64>,
    /// `"asc"`, `"desc"` or empty.
    #[serde(default)]
    pub order_by: String,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn per_page(mut self, per_page: i64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self
    }
}

/// One page of matches plus the size of the whole match set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub txs: Vec<TxRecord>,
    pub total_count: usize,
}

/// Read-only access to the index. Cheap to clone; safe to share with the
/// sync engine's writer.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn TxStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn TxStore>) -> Self {
        Self { store }
    }

    /// Exact lookup by hash.
    pub async fn get_tx(&self, hash: &TxHash) -> Result<TxRecord, QueryError> {
        self.store
            .get(hash)
            .await?
            .ok_or_else(|| QueryError::NotFound(hash.to_string()))
    }

    /// Filter, sort, then paginate.
    pub async fn search_tx(&self, req: &SearchRequest) -> Result<SearchResult, QueryError> {
        let query = Query::parse(&req.query)?;
        let order: OrderBy = req.order_by.parse()?;

        let mut txs = self.store.search(&query).await?;
        match order {
            OrderBy::Asc => txs.sort_by_key(TxRecord::position),
            OrderBy::Desc => txs.sort_by(|a, b| b.position().cmp(&a.position())),
        }

        let total_count = txs.len();
        let per_page = validate_per_page(req.per_page);
        let page = validate_page(req.page, per_page, total_count)?;
        let skip = skip_count(page, per_page).min(total_count);

        tracing::debug!(
            query = %query,
            total_count,
            page,
            per_page,
            order = ?order,
            "tx search"
        );

        let txs = txs.into_iter().skip(skip).take(per_page).collect();
        Ok(SearchResult { txs, total_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnoindex_core::{Event, EventAttribute, ExecResult, TxStore};
    use gnoindex_storage::MemoryStorage;

    fn rec(height: u64, index: u32) -> TxRecord {
        let events = vec![Event::new(
            "message",
            vec![
                EventAttribute::indexed("module", "bank"),
                EventAttribute::indexed("action", "transfer"),
                EventAttribute::indexed("sender", "g1sender"),
            ],
        )];
        TxRecord::new(
            height,
            index,
            format!("tx-{height}-{index}").into_bytes(),
            ExecResult { events, ..Default::default() },
        )
    }

    async fn engine() -> QueryEngine {
        let store = Arc::new(MemoryStorage::new());
        // Insert out of order; results must not depend on it.
        for (h, i) in [(12, 1), (10, 0), (11, 0), (12, 0), (10, 1)] {
            store.index(&rec(h, i)).await.unwrap();
        }
        QueryEngine::new(store)
    }

    fn positions(res: &SearchResult) -> Vec<(u64, u32)> {
        res.txs.iter().map(TxRecord::position).collect()
    }

    #[tokio::test]
    async fn ascending_order_is_default() {
        let engine = engine().await;
        let res = engine.search_tx(&SearchRequest::new("message.sender = 'g1sender'")).await.unwrap();
        assert_eq!(res.total_count, 5);
        assert_eq!(positions(&res), vec![(10, 0), (10, 1), (11, 0), (12, 0), (12, 1)]);
    }

    #[tokio::test]
    async fn descending_order() {
        let engine = engine().await;
        let req = SearchRequest::new("message.sender = 'g1sender'").order_by("desc");
        let res = engine.search_tx(&req).await.unwrap();
        assert_eq!(positions(&res), vec![(12, 1), (12, 0), (11, 0), (10, 1), (10, 0)]);
    }

    #[tokio::test]
    async fn pagination() {
        let engine = engine().await;
        let base = SearchRequest::new("message.action = 'transfer'").per_page(2);

        let first = engine.search_tx(&base).await.unwrap();
        assert_eq!(positions(&first), vec![(10, 0), (10, 1)]);

        let third = engine.search_tx(&base.clone().page(3)).await.unwrap();
        assert_eq!(positions(&third), vec![(12, 1)]);
        assert_eq!(third.total_count, 5);

        let err = engine.search_tx(&base.clone().page(6)).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidPage { page: 6, total_pages: 3 }));
    }

    #[tokio::test]
    async fn oversized_per_page_is_clamped() {
        let engine = engine().await;
        let res = engine
            .search_tx(&SearchRequest::new("tx.height >= 10").per_page(1_000))
            .await
            .unwrap();
        assert_eq!(res.txs.len(), 5);
    }

    #[tokio::test]
    async fn no_matches_is_an_empty_first_page() {
        let engine = engine().await;
        let res = engine.search_tx(&SearchRequest::new("tx.height > 100")).await.unwrap();
        assert_eq!(res.total_count, 0);
        assert!(res.txs.is_empty());
    }

    #[tokio::test]
    async fn rejects_bad_requests() {
        let engine = engine().await;
        assert!(matches!(
            engine.search_tx(&SearchRequest::new("")).await,
            Err(QueryError::InvalidFilter(_))
        ));
        assert!(matches!(
            engine.search_tx(&SearchRequest::new("tx.height =")).await,
            Err(QueryError::InvalidFilter(_))
        ));
        assert!(matches!(
            engine.search_tx(&SearchRequest::new("tx.height > 1").order_by("sideways")).await,
            Err(QueryError::InvalidOrderBy(_))
        ));
    }

    #[tokio::test]
    async fn get_tx() {
        let engine = engine().await;
        let known = rec(11, 0);
        assert_eq!(engine.get_tx(&known.hash).await.unwrap(), known);

        let err = engine.get_tx(&TxHash::of(b"unknown")).await.unwrap_err();
        assert!(matches!(err, QueryError::NotFound(_)));
    }

    #[test]
    fn order_by_parsing() {
        assert_eq!("".parse::<OrderBy>().unwrap(), OrderBy::Asc);
        assert_eq!("asc".parse::<OrderBy>().unwrap(), OrderBy::Asc);
        assert_eq!("desc".parse::<OrderBy>().unwrap(), OrderBy::Desc);
        assert!("DESC".parse::<OrderBy>().is_err());
    }
}

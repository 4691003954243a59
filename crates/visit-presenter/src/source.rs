use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;
use visit_spec::VisitRecord;

#[derive(Debug, Error)]
pub enum DataFetchError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Storage of visit records, paged per client.
///
/// Pages are zero-based. A page past the end is an empty list, not an error.
pub trait VisitDataSource: Send + Sync + 'static {
    fn fetch_records(
        &self,
        entity_id: &str,
        page: usize,
    ) -> impl Future<Output = Result<Vec<VisitRecord>, DataFetchError>> + Send;

    fn fetch_page_count(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<usize, DataFetchError>> + Send;
}

/// Records held in memory, served newest first.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    records: HashMap<String, Vec<VisitRecord>>,
    page_size: usize,
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE)
    }
}

impl InMemorySource {
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    pub fn new(page_size: usize) -> Self {
        Self {
            records: HashMap::new(),
            page_size: page_size.max(1),
        }
    }

    pub fn with_records(
        mut self,
        entity_id: impl Into<String>,
        mut records: Vec<VisitRecord>,
    ) -> Self {
        // Undated visits sort last.
        records.sort_by(|a, b| b.visit_date.cmp(&a.visit_date));
        self.records.insert(entity_id.into(), records);
        self
    }

    fn page(&self, entity_id: &str, page: usize) -> Vec<VisitRecord> {
        self.records
            .get(entity_id)
            .map(|records| {
                records
                    .iter()
                    .skip(page.saturating_mul(self.page_size))
                    .take(self.page_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn page_count(&self, entity_id: &str) -> usize {
        self.records
            .get(entity_id)
            .map_or(0, |records| records.len().div_ceil(self.page_size))
    }
}

impl VisitDataSource for InMemorySource {
    async fn fetch_records(
        &self,
        entity_id: &str,
        page: usize,
    ) -> Result<Vec<VisitRecord>, DataFetchError> {
        Ok(self.page(entity_id, page))
    }

    async fn fetch_page_count(&self, entity_id: &str) -> Result<usize, DataFetchError> {
        Ok(self.page_count(entity_id))
    }
}

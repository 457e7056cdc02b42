//! In-memory granule index.
//!
//! Linear scan over a vector of records. Good enough for tests, benchmarks
//! and small mosaics that are described by a manifest rather than a
//! database.

use crate::error::{IndexError, Result};
use crate::query::{Filter, IndexQuery};
use crate::record::{AttributeValue, IndexRecord, RecordId};
use crate::GranuleIndex;
use async_trait::async_trait;
use mosaic_common::BoundingBox;
use std::cmp::Ordering;
use tokio::sync::RwLock;
use tracing::debug;

pub struct MemoryIndex {
    records: RwLock<Vec<IndexRecord>>,
    sorting: bool,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::from_records(Vec::new())
    }

    pub fn from_records(records: Vec<IndexRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            sorting: true,
        }
    }

    /// Disable sort support, as some file-based indexes do.
    pub fn without_sorting(mut self) -> Self {
        self.sorting = false;
        self
    }

    /// Add a record, replacing any record with the same id.
    pub async fn insert(&self, record: IndexRecord) {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GranuleIndex for MemoryIndex {
    async fn query(&self, query: &IndexQuery) -> Result<Vec<IndexRecord>> {
        if let Some(sort) = &query.sort_by {
            if !self.sorting {
                return Err(IndexError::SortingNotSupported(sort.attribute.clone()));
            }
        }

        let records = self.records.read().await;
        let mut matched: Vec<IndexRecord> = records
            .iter()
            .filter(|r| query.filter.evaluate(r))
            .cloned()
            .collect();
        drop(records);

        if let Some(sort) = &query.sort_by {
            // Stable, so insertion order breaks ties.
            matched.sort_by(|a, b| sort.compare(a, b));
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        debug!(matched = matched.len(), "Memory index query");
        Ok(matched)
    }

    async fn aggregate_max(
        &self,
        attribute: &str,
        filter: &Filter,
    ) -> Result<Option<(AttributeValue, RecordId)>> {
        let records = self.records.read().await;
        let mut best: Option<(&AttributeValue, &RecordId)> = None;

        for record in records.iter().filter(|r| filter.evaluate(r)) {
            let Some(value) = record.attribute(attribute) else {
                continue;
            };
            let replace = match best {
                None => true,
                Some((current, _)) => value.partial_cmp(current) == Some(Ordering::Greater),
            };
            if replace {
                best = Some((value, &record.id));
            }
        }

        Ok(best.map(|(v, id)| (v.clone(), id.clone())))
    }

    fn supports_sorting(&self) -> bool {
        self.sorting
    }

    async fn bounds(&self) -> Result<Option<BoundingBox>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .map(|r| r.footprint)
            .reduce(|acc, b| acc.union(&b)))
    }

    async fn distinct_values(&self, attribute: &str) -> Result<Vec<AttributeValue>> {
        let records = self.records.read().await;
        let mut values: Vec<AttributeValue> = records
            .iter()
            .filter_map(|r| r.attribute(attribute).cloned())
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        values.dedup();
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_replaces_same_id() {
        let index = MemoryIndex::new();
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        index
            .insert(IndexRecord::new("a", bbox).with_attribute("location", "old.tif"))
            .await;
        index
            .insert(IndexRecord::new("a", bbox).with_attribute("location", "new.tif"))
            .await;

        assert_eq!(index.len().await, 1);
        let all = index.query(&IndexQuery::new(Filter::Include)).await.unwrap();
        assert_eq!(all[0].text("location"), Some("new.tif"));
    }

    #[tokio::test]
    async fn test_empty_index_bounds() {
        let index = MemoryIndex::default();
        assert!(index.is_empty().await);
        assert_eq!(index.bounds().await.unwrap(), None);
    }
}

//! Filters and queries against a granule index.
//!
//! # Examples
//!
//! ```rust
//! use mosaic_common::BoundingBox;
//! use mosaic_index::{Filter, IndexQuery, SortBy};
//!
//! let query = IndexQuery::new(
//!     Filter::intersects(BoundingBox::new(0.0, 0.0, 10.0, 10.0))
//!         .and(Filter::equals("elevation", 500.0)),
//! )
//! .sorted_by(SortBy::descending("time"))
//! .with_limit(10);
//! assert_eq!(query.limit, Some(10));
//! ```

use crate::record::{AttributeValue, IndexRecord, RecordId};
use mosaic_common::BoundingBox;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Predicate over index records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every record.
    Include,
    /// Footprint intersects the box (shared edges do not count).
    Intersects(BoundingBox),
    /// Attribute equals the value.
    Equals {
        attribute: String,
        value: AttributeValue,
    },
    /// All sub-filters match.
    And(Vec<Filter>),
    /// Record has this id.
    Id(RecordId),
}

impl Filter {
    pub fn intersects(bbox: BoundingBox) -> Self {
        Filter::Intersects(bbox)
    }

    pub fn equals(attribute: &str, value: impl Into<AttributeValue>) -> Self {
        Filter::Equals {
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    /// AND-combine, flattening nested conjunctions and dropping `Include`.
    pub fn and(self, other: Filter) -> Filter {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Filter::Include => {}
                Filter::And(inner) => parts.extend(inner),
                f => parts.push(f),
            }
        }
        match parts.len() {
            0 => Filter::Include,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    pub fn evaluate(&self, record: &IndexRecord) -> bool {
        match self {
            Filter::Include => true,
            Filter::Intersects(bbox) => record.footprint.intersects(bbox),
            Filter::Equals { attribute, value } => record
                .attribute(attribute)
                .map(|v| v == value)
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.evaluate(record)),
            Filter::Id(id) => &record.id == id,
        }
    }
}

/// Sort order on one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub attribute: String,
    pub descending: bool,
}

impl SortBy {
    pub fn ascending(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            descending: false,
        }
    }

    pub fn descending(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            descending: true,
        }
    }

    /// Compare two records. Records missing the attribute sort last in
    /// either direction.
    pub fn compare(&self, a: &IndexRecord, b: &IndexRecord) -> Ordering {
        match (a.attribute(&self.attribute), b.attribute(&self.attribute)) {
            (Some(va), Some(vb)) => {
                let ord = va.partial_cmp(vb).unwrap_or(Ordering::Equal);
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// A filter plus optional ordering and limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuery {
    pub filter: Filter,
    pub sort_by: Option<SortBy>,
    pub limit: Option<usize>,
}

impl IndexQuery {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort_by: None,
            limit: None,
        }
    }

    pub fn sorted_by(mut self, sort: SortBy) -> Self {
        self.sort_by = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

use std::fmt;
use std::sync::Arc;

use super::query::{Query, QueryShape};

/// Opaque cache key: entity identifier plus query shape.
///
/// Keys are built by deterministic concatenation (`"{entity}:{shape}"`).
/// Batch keys digest the normalized symbol list so that arbitrarily long
/// lists still map to bounded keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn for_query(query: &Query) -> Self {
        match query.query_shape {
            QueryShape::BatchQuote => {
                let joined = query.symbols().join(",");
                let digest = md5::compute(joined.as_bytes());
                Self(Arc::from(format!("batch-quote:{:x}", digest)))
            }
            shape => {
                let entity = query.entity_id.trim().to_lowercase();
                Self(Arc::from(format!("{}:{}", entity, shape.tag())))
            }
        }
    }

    /// Wrap a caller-chosen key (e.g. "btc-1d").
    pub fn from_raw(raw: impl AsRef<str>) -> Self {
        Self(Arc::from(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

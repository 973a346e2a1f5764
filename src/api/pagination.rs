use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_LIMIT: i64 = 20;
pub(crate) const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

const fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl PageQuery {
    pub(crate) fn skip(&self) -> i64 {
        self.skip.max(0)
    }

    pub(crate) fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

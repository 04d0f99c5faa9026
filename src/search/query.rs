use std::collections::BTreeMap;

/// The query shapes the engine issues against an index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    /// Every document.
    All,
    /// Exact match on one stored value of a flattened field name.
    Field { name: String, value: String },
    /// Full-text match (FTS5 syntax) over the text fields.
    Text(String),
}

impl IndexQuery {
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        IndexQuery::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn text(query: impl Into<String>) -> Self {
        IndexQuery::Text(query.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub skip: u64,
    pub take: u64,
}

impl SearchOptions {
    pub fn new(skip: u64, take: u64) -> Self {
        Self { skip, take }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { skip: 0, take: 50 }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    /// Higher is better. Zero for non-ranked queries.
    pub score: f64,
    /// Stored values keyed by flattened field name.
    pub values: BTreeMap<String, Vec<String>>,
}

impl SearchResult {
    pub fn first_value(&self, field: &str) -> Option<&str> {
        self.values
            .get(field)
            .and_then(|v| v.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    /// Matches before skip/take were applied.
    pub total_item_count: u64,
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

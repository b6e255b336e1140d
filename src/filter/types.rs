use serde::{Deserialize, Serialize};

/// Logical keys the filter grammar reserves but does not evaluate
pub const LOGICAL_OPERATORS: &[&str] = &["$or", "$and"];

/// What the compiler does with a reserved logical key (`$or`, `$and`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperatorPolicy {
    /// Skip the key; it contributes no criterion
    #[default]
    Ignore,
    /// Fail with `FilterError::UnsupportedOperator`
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct FilterWhereOptions {
    pub logical_operators: LogicalOperatorPolicy,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_descending(descending: bool) -> Self {
        if descending { SortDirection::Desc } else { SortDirection::Asc }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortDirection::Desc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub field: String,
    pub direction: SortDirection,
}

impl SortDescriptor {
    pub fn new(field: impl Into<String>, descending: bool) -> Self {
        Self { field: field.into(), direction: SortDirection::from_descending(descending) }
    }
}

/// Sort and pagination options for `find`
///
/// Slicing only happens when `limit` is set; `offset` defaults to 0 and is
/// ignored on its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort: Vec<SortDescriptor>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sort key; `descending = true` reverses the order for this field
    pub fn sort_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort.push(SortDescriptor::new(field, descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.offset.is_none() && self.sort.is_empty()
    }
}

/// A compiled query, ready to hand to an `ObjectStore`
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub collection: String,
    /// Native predicate; `None` means no filtering
    pub predicate: Option<String>,
    pub sort: Vec<SortDescriptor>,
    /// Half-open `[start, end)` slice applied after sorting
    pub range: Option<(usize, usize)>,
}

impl StoreQuery {
    pub fn collection(name: impl Into<String>) -> Self {
        Self { collection: name.into(), predicate: None, sort: vec![], range: None }
    }
}

use serde_json::Value;

use super::error::FilterError;
use super::filter_where::FilterWhere;
use super::types::{FilterWhereOptions, FindOptions, SortDescriptor, StoreQuery};
use crate::config::FilterConfig;

/// Builds a `StoreQuery` for one collection from a filter and find options
pub struct Filter {
    collection: String,
    where_data: Option<Value>,
    order_data: Vec<SortDescriptor>,
    limit: Option<usize>,
    offset: Option<usize>,
    config: FilterConfig,
}

impl Filter {
    pub fn new(collection: impl Into<String>, config: &FilterConfig) -> Result<Self, FilterError> {
        let collection = collection.into();
        Self::validate_collection_name(&collection)?;
        Ok(Self {
            collection,
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            config: config.clone(),
        })
    }

    pub fn assign(&mut self, options: &FindOptions) -> Result<&mut Self, FilterError> {
        self.order(options.sort.clone());
        if let Some(limit) = options.limit {
            self.limit(limit, options.offset);
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: &Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(conditions)?;
        self.where_data = Some(conditions.clone());
        Ok(self)
    }

    pub fn order(&mut self, sort: Vec<SortDescriptor>) -> &mut Self {
        self.order_data = sort;
        self
    }

    pub fn limit(&mut self, limit: usize, offset: Option<usize>) -> &mut Self {
        let applied_limit = match self.config.max_limit {
            Some(max_limit) if limit > max_limit => {
                tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max_limit);
                max_limit
            }
            _ => limit,
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        self
    }

    /// Compile only the predicate; `None` when the filter yields no criteria
    pub fn to_predicate(&self) -> Result<Option<String>, FilterError> {
        let predicate = match self.where_data {
            Some(ref where_data) => FilterWhere::generate(where_data, &self.where_options())?,
            None => String::new(),
        };
        Ok(if predicate.is_empty() { None } else { Some(predicate) })
    }

    pub fn to_query(&self) -> Result<StoreQuery, FilterError> {
        Ok(StoreQuery {
            collection: self.collection.clone(),
            predicate: self.to_predicate()?,
            sort: self.order_data.clone(),
            range: self.build_range(),
        })
    }

    fn where_options(&self) -> FilterWhereOptions {
        FilterWhereOptions {
            logical_operators: self.config.logical_operators,
            debug_logging: self.config.debug_logging,
        }
    }

    fn validate_collection_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        match chars.next() {
            None => Err(FilterError::InvalidCollectionName("Collection name cannot be empty".to_string())),
            Some(first) if !(first.is_alphabetic() || first == '_') => {
                Err(FilterError::InvalidCollectionName(format!("Invalid collection name format: {}", name)))
            }
            Some(_) if !chars.all(|c| c.is_alphanumeric() || c == '_') => {
                Err(FilterError::InvalidCollectionName(format!("Invalid collection name format: {}", name)))
            }
            Some(_) => Ok(()),
        }
    }

    fn build_range(&self) -> Option<(usize, usize)> {
        self.limit.map(|limit| {
            let offset = self.offset.unwrap_or(0);
            (offset, offset.saturating_add(limit))
        })
    }
}

//! Attribute filters for object search.

use serde::{Deserialize, Serialize};

/// A single attribute predicate.
///
/// These are the only predicate forms the fetch pipeline uses: string
/// equality for index-object lookup and a numeric range for direct block
/// search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "kebab-case")]
pub enum Filter {
    /// The attribute equals the given string.
    StringEqual {
        /// Attribute name.
        attribute: String,
        /// Expected value.
        value: String,
    },
    /// The attribute, read as an integer, is `>= value`.
    NumGe {
        /// Attribute name.
        attribute: String,
        /// Lower bound, inclusive.
        value: u64,
    },
    /// The attribute, read as an integer, is `<= value`.
    NumLe {
        /// Attribute name.
        attribute: String,
        /// Upper bound, inclusive.
        value: u64,
    },
}

impl Filter {
    /// The attribute this filter constrains.
    pub fn attribute(&self) -> &str {
        match self {
            Self::StringEqual { attribute, .. }
            | Self::NumGe { attribute, .. }
            | Self::NumLe { attribute, .. } => attribute,
        }
    }
}

/// An ordered, conjunctive set of attribute filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    filters: Vec<Filter>,
}

impl SearchQuery {
    /// Create an empty query.
    pub const fn new() -> Self {
        Self { filters: Vec::new() }
    }

    /// Require string equality on an attribute.
    pub fn string_equal(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters
            .push(Filter::StringEqual { attribute: attribute.into(), value: value.into() });
        self
    }

    /// Require a numeric attribute to be `>= value`.
    pub fn num_ge(mut self, attribute: impl Into<String>, value: u64) -> Self {
        self.filters.push(Filter::NumGe { attribute: attribute.into(), value });
        self
    }

    /// Require a numeric attribute to be `<= value`.
    pub fn num_le(mut self, attribute: impl Into<String>, value: u64) -> Self {
        self.filters.push(Filter::NumLe { attribute: attribute.into(), value });
        self
    }

    /// The filters, in insertion order.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_order() {
        let query = SearchQuery::new().num_ge("height", 10).num_le("height", 19);
        assert_eq!(
            query.filters(),
            &[
                Filter::NumGe { attribute: "height".into(), value: 10 },
                Filter::NumLe { attribute: "height".into(), value: 19 },
            ]
        );
    }

    #[test]
    fn wire_shape() {
        let filter = Filter::StringEqual { attribute: "index".into(), value: "3".into() };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "match": "string-equal", "attribute": "index", "value": "3" })
        );
    }
}

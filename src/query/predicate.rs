use crate::core::Value;
use std::fmt;

/// Logical condition over a JSON attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The attribute's value (a list or document) contains `value`.
    Contains { attribute: String, value: Value },
    /// Some value selected by `path` (wildcards allowed) contains `value`.
    ContainsAtPath {
        attribute: String,
        path: String,
        value: Value,
    },
    /// The single value at `path` equals `value`.
    FieldEquals {
        attribute: String,
        path: String,
        value: Value,
    },
}

impl Predicate {
    pub fn contains(attribute: &str, value: impl Into<Value>) -> Self {
        Self::Contains {
            attribute: attribute.to_string(),
            value: value.into(),
        }
    }

    pub fn contains_at_path(attribute: &str, path: &str, value: impl Into<Value>) -> Self {
        Self::ContainsAtPath {
            attribute: attribute.to_string(),
            path: path.to_string(),
            value: value.into(),
        }
    }

    pub fn field_equals(attribute: &str, path: &str, value: impl Into<Value>) -> Self {
        Self::FieldEquals {
            attribute: attribute.to_string(),
            path: path.to_string(),
            value: value.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            Self::Contains { attribute, .. }
            | Self::ContainsAtPath { attribute, .. }
            | Self::FieldEquals { attribute, .. } => attribute,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contains { attribute, value } => write!(f, "{} contains {}", attribute, value),
            Self::ContainsAtPath {
                attribute,
                path,
                value,
            } => write!(f, "{} at {} contains {}", attribute, path, value),
            Self::FieldEquals {
                attribute,
                path,
                value,
            } => write!(f, "{} at {} = {}", attribute, path, value),
        }
    }
}

/// Conjunction of predicates. Empty means no filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl From<Predicate> for Filter {
    fn from(predicate: Predicate) -> Self {
        Self::new().and(predicate)
    }
}

//! Row filters shared by metrics and access policies

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Comparison operator of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 8] = [
        FilterOperator::Equals,
        FilterOperator::NotEquals,
        FilterOperator::GreaterThan,
        FilterOperator::GreaterThanOrEqualTo,
        FilterOperator::LessThan,
        FilterOperator::LessThanOrEqualTo,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "EQUALS",
            FilterOperator::NotEquals => "NOT_EQUALS",
            FilterOperator::GreaterThan => "GREATER_THAN",
            FilterOperator::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            FilterOperator::LessThan => "LESS_THAN",
            FilterOperator::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            FilterOperator::IsNull => "IS_NULL",
            FilterOperator::IsNotNull => "IS_NOT_NULL",
        }
    }

    /// Null checks take no operand
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownValue {
                field: "filter operator",
                value: s.to_string(),
            })
    }
}

/// A single `column <operator> value` condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub column: String,

    pub operator: FilterOperator,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Some(value.into()),
        }
    }

    pub fn unary(column: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            column: column.into(),
            operator,
            value: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.operator.is_unary(), self.value.is_some()) {
            (true, true) => Err(ValidationError::InvalidFilter {
                column: self.column.clone(),
                operator: self.operator,
                reason: "does not take a value",
            }),
            (false, false) => Err(ValidationError::InvalidFilter {
                column: self.column.clone(),
                operator: self.operator,
                reason: "requires a value",
            }),
            _ => Ok(()),
        }
    }
}

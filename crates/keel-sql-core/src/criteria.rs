//! Per-operation query state.

use crate::condition::Condition;
use crate::dialect::Dialect;
use crate::model::Model;

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Column or `alias.column` path.
    pub path: String,
    pub descending: bool,
}

/// Everything one statement is rendered from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub model: Model,
    pub condition: Option<Condition>,
    pub order_bys: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Rust field names left out of the model.
    pub omit_fields: Vec<String>,
    /// Skip every reference join.
    pub omit_join: bool,
}

impl Criteria {
    /// Creates criteria over `model` with no filter.
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// Wraps the condition as `pk = ? AND (condition)` when the model's
    /// primary key is set. `qualified` prefixes the column with the table
    /// name, which joined SELECTs need.
    pub fn merge_pk_condition(&mut self, dialect: &dyn Dialect, qualified: bool) {
        let Some(pk) = self.model.primary_key().filter(|pk| !pk.value.is_zero()) else {
            return;
        };
        let column = if qualified {
            dialect.quote_identifier(&format!("{}.{}", self.model.table, pk.column))
        } else {
            dialect.quote_identifier(&pk.column)
        };
        let mut condition = Condition::equal(&column, pk.value.clone());
        if let Some(user) = self.condition.take() {
            condition = condition.and_condition(user);
        }
        self.condition = Some(condition);
    }
}

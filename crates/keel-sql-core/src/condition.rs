//! Composable WHERE conditions.
//!
//! A [`Condition`] is a head expression followed by an ordered list of
//! `(combinator, condition)` links. Rendering is a left fold: every link
//! wraps everything before it in parentheses, so
//! `a.and(b).or(c)` renders as `((a) AND (b)) OR (c)`. Precedence is always
//! construction order.

use crate::value::SqlValue;

/// How a link joins the expression before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    const fn keyword(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// A WHERE expression with `?` placeholders and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    expr: String,
    args: Vec<SqlValue>,
    links: Vec<(Combinator, Condition)>,
}

impl Condition {
    /// Creates a condition from a raw expression.
    ///
    /// ```
    /// use keel_sql_core::{condition::Condition, params};
    ///
    /// let c = Condition::new("score <= ?", params![60]).or("score >= ?", params![80]);
    /// assert_eq!(c.merge().0, "(score <= ?) OR (score >= ?)");
    /// ```
    pub fn new(expr: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            expr: expr.into(),
            args,
            links: Vec::new(),
        }
    }

    /// Creates `column = ?`.
    pub fn equal(column: &str, value: SqlValue) -> Self {
        Self::new(format!("{column} = ?"), vec![value])
    }

    /// Creates `column IN (?, ?, ...)`. An empty list matches nothing.
    pub fn in_list(column: &str, values: Vec<SqlValue>) -> Self {
        if values.is_empty() {
            return Self::new("1 = 0", Vec::new());
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        Self::new(format!("{column} IN ({placeholders})"), values)
    }

    #[must_use]
    pub fn and(self, expr: impl Into<String>, args: Vec<SqlValue>) -> Self {
        self.link(Combinator::And, Self::new(expr, args))
    }

    #[must_use]
    pub fn and_equal(self, column: &str, value: SqlValue) -> Self {
        self.link(Combinator::And, Self::equal(column, value))
    }

    #[must_use]
    pub fn and_condition(self, sub: Self) -> Self {
        self.link(Combinator::And, sub)
    }

    #[must_use]
    pub fn or(self, expr: impl Into<String>, args: Vec<SqlValue>) -> Self {
        self.link(Combinator::Or, Self::new(expr, args))
    }

    #[must_use]
    pub fn or_equal(self, column: &str, value: SqlValue) -> Self {
        self.link(Combinator::Or, Self::equal(column, value))
    }

    #[must_use]
    pub fn or_condition(self, sub: Self) -> Self {
        self.link(Combinator::Or, sub)
    }

    fn link(mut self, combinator: Combinator, sub: Self) -> Self {
        self.links.push((combinator, sub));
        self
    }

    /// Renders the expression and its arguments in placeholder order.
    #[must_use]
    pub fn merge(&self) -> (String, Vec<SqlValue>) {
        let mut expr = self.expr.clone();
        let mut args = self.args.clone();
        for (combinator, sub) in &self.links {
            let (sub_expr, sub_args) = sub.merge();
            expr = format!("({expr}){}({sub_expr})", combinator.keyword());
            args.extend(sub_args);
        }
        (expr, args)
    }
}

//! immutable boolean filter-expression tree
//!
//! three disjoint groups — must (AND), should (OR), must-not (AND NOT) —
//! each capped at 32 conditions. constructors are the only gatekeeper: once
//! built, an `Expression` cannot be mutated.

use crate::error::{Error, Result};

pub const MAX_CONDITIONS_PER_GROUP: usize = 32;

/// either side of a numeric range; `gt`/`gte` and `lt`/`lte` are mutually
/// exclusive within a side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
}

/// a single filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// exact-match over a tag field
    TagMatch { key: String, value: String },
    /// range over a numeric field; `low`/`high` are each optional and, when
    /// present, drawn from `Bound::{Gt,Gte}` / `Bound::{Lt,Lte}` respectively
    NumericRange {
        key: String,
        low: Option<Bound>,
        high: Option<Bound>,
    },
}

impl Condition {
    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::TagMatch {
            key: key.into(),
            value: value.into(),
        }
    }

    /// builds a numeric range condition, rejecting a low bound that isn't
    /// `Gt`/`Gte` or a high bound that isn't `Lt`/`Lte`.
    pub fn range(key: impl Into<String>, low: Option<Bound>, high: Option<Bound>) -> Result<Self> {
        if let Some(b) = low {
            if !matches!(b, Bound::Gt(_) | Bound::Gte(_)) {
                return Err(Error::InvalidSchema(
                    "range low bound must be gt/gte".to_string(),
                ));
            }
        }
        if let Some(b) = high {
            if !matches!(b, Bound::Lt(_) | Bound::Lte(_)) {
                return Err(Error::InvalidSchema(
                    "range high bound must be lt/lte".to_string(),
                ));
            }
        }
        Ok(Condition::NumericRange {
            key: key.into(),
            low,
            high,
        })
    }

    pub fn key(&self) -> &str {
        match self {
            Condition::TagMatch { key, .. } => key,
            Condition::NumericRange { key, .. } => key,
        }
    }
}

/// the immutable must/should/must-not expression tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    must: Vec<Condition>,
    should: Vec<Condition>,
    must_not: Vec<Condition>,
}

impl Expression {
    pub fn must(&self) -> &[Condition] {
        &self.must
    }

    pub fn should(&self) -> &[Condition] {
        &self.should
    }

    pub fn must_not(&self) -> &[Condition] {
        &self.must_not
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }
}

/// the only way to build an `Expression`; once `.build()` is called the
/// result is frozen.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    must: Vec<Condition>,
    should: Vec<Condition>,
    must_not: Vec<Condition>,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, condition: Condition) -> Result<Self> {
        check_group_cap(&self.must)?;
        self.must.push(condition);
        Ok(self)
    }

    pub fn should(mut self, condition: Condition) -> Result<Self> {
        check_group_cap(&self.should)?;
        self.should.push(condition);
        Ok(self)
    }

    pub fn must_not(mut self, condition: Condition) -> Result<Self> {
        check_group_cap(&self.must_not)?;
        self.must_not.push(condition);
        Ok(self)
    }

    pub fn build(self) -> Expression {
        Expression {
            must: self.must,
            should: self.should,
            must_not: self.must_not,
        }
    }
}

fn check_group_cap(group: &[Condition]) -> Result<()> {
    if group.len() >= MAX_CONDITIONS_PER_GROUP {
        Err(Error::InvalidSchema(format!(
            "filter group exceeds {MAX_CONDITIONS_PER_GROUP} conditions"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_group_at_32_conditions() {
        let mut builder = ExpressionBuilder::new();
        for i in 0..MAX_CONDITIONS_PER_GROUP {
            builder = builder.must(Condition::tag("k", i.to_string())).unwrap();
        }
        assert!(builder.must(Condition::tag("k", "overflow")).is_err());
    }

    #[test]
    fn rejects_mismatched_bound_sides() {
        assert!(Condition::range("price", Some(Bound::Lt(5.0)), None).is_err());
        assert!(Condition::range("price", None, Some(Bound::Gte(5.0))).is_err());
        assert!(Condition::range("price", Some(Bound::Gte(1.0)), Some(Bound::Lte(5.0))).is_ok());
    }

    #[test]
    fn empty_expression_reports_empty() {
        let e = ExpressionBuilder::new().build();
        assert!(e.is_empty());
    }
}

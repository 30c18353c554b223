//! Picks the narrowest scan for a query.
//!
//! Backends use the plan to fetch a candidate set, then apply the full
//! [`Query::matches`] predicate to every candidate.

use gnoindex_core::query::{Field, Op, Operand};
use gnoindex_core::{Query, TxHash};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scan {
    /// Nothing can match.
    Empty,
    Hash(TxHash),
    /// Inclusive height range.
    Height(u64, u64),
    /// Inclusive in-block index range.
    Index(u64, u64),
    /// One `(composite key, value)` pair of the secondary index.
    AttributeValue { key: String, value: String },
    /// Every secondary entry under one composite key.
    AttributeKey(String),
}

impl Scan {
    fn rank(&self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Hash(_) => 1,
            Self::AttributeValue { .. } => 2,
            Self::Height(lo, hi) if lo == hi => 2,
            Self::Height(..) => 3,
            Self::AttributeKey(_) => 4,
            Self::Index(..) => 5,
        }
    }
}

/// Cheapest scan among the query's conditions.
pub(crate) fn plan(query: &Query) -> Scan {
    query
        .conditions()
        .iter()
        .map(|c| match &c.field {
            Field::Hash(hash) => Scan::Hash(*hash),
            Field::Height => match c.numeric_bounds() {
                Some((lo, hi)) => Scan::Height(lo, hi),
                None => Scan::Empty,
            },
            Field::Index => match c.numeric_bounds() {
                Some((lo, hi)) => Scan::Index(lo, hi),
                None => Scan::Empty,
            },
            Field::Attribute(key) => match (&c.op, &c.operand) {
                (Op::Eq, Some(Operand::Str(value))) => Scan::AttributeValue {
                    key: key.clone(),
                    value: value.clone(),
                },
                _ => Scan::AttributeKey(key.clone()),
            },
        })
        .min_by_key(Scan::rank)
        .unwrap_or(Scan::Empty)
}

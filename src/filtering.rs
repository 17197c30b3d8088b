//! Client-side filtering of retrieved tables.
//!
//! Filters run after retrieval, over rows already held in memory. Both
//! [`FilterSpec`] (raw records) and [`AggregateFilter`] (per-source rows)
//! implement [`Predicate`], so [`narrow`] applies either one.

pub mod aggregate_filter;
pub mod log_filter;
pub mod selection;
pub mod time_range;

pub use aggregate_filter::{AggregateFilter, AggregateFilterParams};
pub use log_filter::{FilterSpec, LogFilterParams};
pub use selection::Selection;
pub use time_range::{Bound, TimeRange};

use log::debug;

pub trait Predicate<Row> {
    fn matches(&self, row: &Row) -> bool;

    /// A predicate that accepts every row lets [`narrow`] skip the scan.
    fn is_unconstrained(&self) -> bool {
        false
    }
}

/// Keeps the rows accepted by `predicate`, in their original order.
pub fn narrow<Row, P>(mut rows: Vec<Row>, predicate: &P) -> Vec<Row>
where
    P: Predicate<Row> + ?Sized,
{
    if predicate.is_unconstrained() {
        return rows;
    }
    let original_len = rows.len();
    rows.retain(|row| predicate.matches(row));
    debug!("Filter kept {} of {} row(s)", rows.len(), original_len);
    rows
}

//! Paginated retrieval from the log store.
//!
//! Each component owns an explicit store handle and loops over pages until
//! the store is exhausted (or the requested size is reached). Components
//! offer a `try_*` form returning `Result` and a plain form returning a
//! [`QueryOutcome`].

pub mod aggregator;
pub mod bounded_scan;
pub mod outcome;
pub mod source_scan;


pub use aggregator::Aggregator;
pub use bounded_scan::{BoundedScan, ScrollGuard};
pub use outcome::QueryOutcome;
pub use source_scan::SourceScan;

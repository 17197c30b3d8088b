pub mod cache;
pub mod configuration;
pub mod error_handling;
pub mod explorer;
pub mod export;
pub mod filtering;
pub mod records;
pub mod retrieval;
pub mod stats;
pub mod store;
pub mod table;
pub mod web_interface;

#[cfg(test)]
pub mod test_support;

pub use explorer::FlowExplorer;

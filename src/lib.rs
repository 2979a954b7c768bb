pub mod app;
pub mod config;
pub mod directory;
pub mod domain;
pub mod error;
pub mod graph;
pub mod output;
pub mod query;
pub mod records;
pub mod snapshot;
pub mod store;

pub mod debug;
pub mod error;
pub mod fetcher;
pub mod flatten;
pub mod models;
pub mod pagination;
pub mod query;
pub mod store;
pub mod tui;

pub mod aggregate;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod ledger;
pub mod log;
pub mod runner;
pub mod scheduler;
pub mod stage;
pub mod types;

//! Side-effecting host adapters and persistence.

pub mod config;
pub mod fetch;
pub mod pkg;
pub mod process;
pub mod run_log;
pub mod svc;
pub mod users;

//! Side-effecting operations: filesystem layout, child processes, config.

pub mod config;
pub mod instances;
pub mod meta;
pub mod process;
pub mod result_table;
pub mod run_dir;

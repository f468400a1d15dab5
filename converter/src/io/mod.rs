//! I/O helpers for converter commands.

pub mod config;
pub mod fs_ops;
pub mod process;
pub mod report;
pub mod staging;
pub mod tool;

//! Deterministic, pure logic shared by the converter.
//!
//! Core modules must be free of I/O side effects. They classify file names and
//! compute staging plans from paths alone, so every rule is testable without
//! touching the filesystem.

pub mod layout;
pub mod naming;
pub mod types;

//! In-place and batch conversion of GameMaker projects with `ProjectTool`.
//!
//! The crate keeps a strict split:
//!
//! - **[`core`]**: pure naming and staging plans. No I/O.
//! - **[`io`]**: filesystem primitives, the staging journal, process
//!   execution, config and reports.
//!
//! Orchestration modules ([`convert`], [`discover`], [`batch`]) combine them
//! to implement the CLI commands.

pub mod batch;
pub mod convert;
pub mod core;
pub mod discover;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

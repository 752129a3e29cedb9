//! Workflow session driver for AI coding agents.
//!
//! A session enters a *mode* (planning, implementation, debugging, ...),
//! receives a generated list of dependent tasks derived from the mode's
//! template and an optional phased spec document, and is released only when
//! the mode's stop conditions are satisfied. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (phase validation, task
//!   expansion, guidance projection, stop-condition evaluation). No I/O,
//!   fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (configuration and document
//!   loading, session state storage, git, subprocesses). Isolated to enable
//!   faking in tests.
//!
//! Orchestration modules ([`enter`], [`can_exit`], [`leave`], [`progress`],
//! [`validate`]) coordinate core logic with I/O to implement CLI commands.

pub mod can_exit;
pub mod core;
pub mod enter;
pub mod exit_codes;
pub mod io;
pub mod leave;
pub mod logging;
pub mod progress;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;

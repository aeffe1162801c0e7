//! Idempotent, fallback-aware host provisioning sequencer.
//!
//! This crate prepares a single Amazon Linux 2023 host with Docker, a
//! Docker Compose capability, the AWS CLI, and (optionally) Kubernetes
//! client tooling. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (status types, architecture
//!   token mapping). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (package manager, service
//!   manager, downloads, user directory, process execution, run log).
//!   Every external collaborator sits behind a trait so tests can script it.
//!
//! Orchestration modules ([`step`], [`fallback`], [`probe`], [`plan`],
//! [`sequence`], [`report`]) coordinate core logic with I/O to implement
//! the CLI.

pub mod core;
pub mod exit_codes;
pub mod fallback;
pub mod io;
pub mod logging;
pub mod plan;
pub mod probe;
pub mod report;
pub mod sequence;
pub mod step;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
